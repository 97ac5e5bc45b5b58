//! `itt up` implementation

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use itt::{ContainerDecl, Fixture, Harness, PortMappings, Settings};

use super::CliReporter;

#[derive(Args)]
pub struct UpArgs {
    /// Images to start, e.g. redis or postgres:13
    #[arg(required = true)]
    pub images: Vec<String>,

    /// Publish exposed ports on the same host port instead of random ones
    #[arg(long)]
    pub fixed_ports: bool,

    /// Ready delay in milliseconds (defaults to the settings file)
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Print the port table as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ContainerSummary {
    id: String,
    name: String,
    image: String,
    ports: PortMappings,
}

#[derive(Serialize)]
struct UpSummary {
    containers: Vec<ContainerSummary>,
    ports: PortMappings,
}

fn declarations(settings: &Settings, args: &UpArgs) -> Vec<ContainerDecl> {
    args.images
        .iter()
        .map(|name| {
            let mut decl = ContainerDecl::with_defaults(name.as_str(), settings);
            if args.fixed_ports {
                decl = decl.random_ports(false);
            }
            if let Some(ms) = args.delay_ms {
                decl = decl.ready_delay(Duration::from_millis(ms));
            }
            decl
        })
        .collect()
}

fn summarize(fixture: &Fixture) -> UpSummary {
    UpSummary {
        containers: fixture
            .containers()
            .iter()
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                name: c.name.clone(),
                image: c.image.identity(),
                ports: c.ports.clone(),
            })
            .collect(),
        ports: fixture.port_mappings().clone(),
    }
}

fn print_table(summary: &UpSummary) {
    for container in &summary.containers {
        println!("✓ {} ({})", container.image, container.name);
        let mut ports: Vec<_> = container.ports.iter().collect();
        ports.sort();
        for (container_port, host_port) in ports {
            println!("    {container_port} -> localhost:{host_port}");
        }
    }
}

pub async fn run(settings: Settings, args: UpArgs) -> Result<()> {
    let json = args.json;

    let fixture = tokio::task::spawn_blocking(move || -> Result<Fixture> {
        let decls = declarations(&settings, &args);
        let harness = Harness::from_settings(settings)?.with_reporter(CliReporter);
        Ok(harness.provision(decls)?)
    })
    .await
    .context("provisioning task failed")??;

    let summary = summarize(&fixture);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_table(&summary);
        println!("Press Ctrl-C to stop.");
    }

    tokio::signal::ctrl_c().await?;

    let result = tokio::task::spawn_blocking(move || fixture.close())
        .await
        .context("teardown task failed")?;
    if let Err(e) = result {
        anyhow::bail!(e);
    }
    println!("✓ Stopped {} container(s)", summary.containers.len());
    Ok(())
}
