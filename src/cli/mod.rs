//! `itt` command line: provision fixtures by hand and inspect the runtime.

mod inspect;
mod up;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use itt::config::{ContainerRuntimeName, Settings};
use itt::Reporter;

pub use inspect::{check, images, ps};
pub use up::UpArgs;

#[derive(Parser)]
#[command(name = "itt", version, about = "Ephemeral container fixtures for integration tests")]
pub struct Cli {
    /// Settings file (defaults to $ITT_CONFIG or the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Container runtime to use, overriding the settings file
    #[arg(long, global = true)]
    pub runtime: Option<ContainerRuntimeName>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start containers, print their port mappings, and stop them on Ctrl-C
    Up(UpArgs),

    /// List containers created by itt
    Ps,

    /// List images available locally
    Images,

    /// Check that the container runtime is installed and reachable
    Check,
}

impl Cli {
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load_from(path)?,
            None => Settings::load()?,
        };
        if let Some(runtime) = self.runtime {
            settings.runtime = runtime;
        }
        Ok(settings)
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let settings = cli.settings()?;
    match cli.command {
        Commands::Up(args) => up::run(settings, args).await,
        Commands::Ps => ps(settings),
        Commands::Images => images(settings),
        Commands::Check => check(settings),
    }
}

/// Reporter for interactive use: plain output, and `fatal` exits the process.
pub struct CliReporter;

impl Reporter for CliReporter {
    fn log(&self, message: &str) {
        println!("{message}");
    }

    fn error(&self, message: &str) {
        eprintln!("✗ {message}");
    }

    fn fatal(&self, message: &str) -> ! {
        eprintln!("✗ {message}");
        std::process::exit(1);
    }
}
