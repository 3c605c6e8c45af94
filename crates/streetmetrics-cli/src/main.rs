//! StreetMetrics CLI - Command-line interface
//!
//! Refreshes district road metrics from GeoJSON sources and reads the
//! published results back.

mod cli;
mod commands;
mod config_loader;
mod errors;
mod output;
mod output_types;
mod source;
mod storage;

use anyhow::Result;
use clap::Parser;
use cli::Cli;

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json;

    let runtime = tokio::runtime::Runtime::new()?;
    if let Err(err) = runtime.block_on(commands::execute(cli)) {
        errors::from_anyhow(err).display(json);
        std::process::exit(1);
    }

    Ok(())
}
