//! itt - ephemeral container fixtures for integration tests

mod cli;

use anyhow::Result;
use clap::Parser;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    itt::logging::init();

    let cli = Cli::parse();
    cli::run(cli).await
}
