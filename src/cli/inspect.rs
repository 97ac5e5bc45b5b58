//! Read-only commands: `ps`, `images`, `check`

use anyhow::{bail, Result};

use itt::containers::runtime_binary;
use itt::{ContainerRuntime, ContainerRuntimeInterface, Harness, Settings};

use super::CliReporter;

pub fn ps(settings: Settings) -> Result<()> {
    let harness = Harness::from_settings(settings)?.with_reporter(CliReporter);
    harness.dump_running();
    Ok(())
}

pub fn images(settings: Settings) -> Result<()> {
    let runtime = ContainerRuntime::from_name(settings.runtime);
    let mut images = runtime.list_local_images()?;
    images.sort();
    images.dedup();
    for image in images {
        println!("{image}");
    }
    Ok(())
}

pub fn check(settings: Settings) -> Result<()> {
    let binary = runtime_binary(&settings);
    let runtime = ContainerRuntime::from_name(settings.runtime);

    if !runtime.is_available() {
        bail!("{binary} is not installed or not on PATH");
    }
    let version = runtime.get_version()?;
    println!("✓ {binary} {version}");

    if !runtime.is_daemon_running() {
        bail!("{binary} is installed but its daemon is not reachable");
    }
    println!("✓ {binary} daemon is running");
    Ok(())
}
