//! Command implementations

mod inspect;
mod refresh;
mod status;
mod tiles;
mod trend;

use crate::cli::{Cli, Commands, InspectArgs, InspectTarget};
use crate::config_loader::load_config_with_overrides;
use crate::output::OutputWriter;
use crate::storage::Storage;
use anyhow::Result;

/// Execute a CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let output = OutputWriter::new(cli.json);
    let config = load_config_with_overrides(cli.config.as_deref(), &cli.overrides)?;

    // Config inspection must work even when the store is unreachable
    if let Commands::Inspect(InspectArgs { target: InspectTarget::Config }) = &cli.command {
        return inspect::inspect_config(&config, &output);
    }

    let settings = config.resolve()?;
    let storage = Storage::new(cli.storage).await?;

    match cli.command {
        Commands::Refresh(args) => refresh::execute(args, &storage, settings, &output).await,
        Commands::Status(args) => status::execute(args, &storage, &output).await,
        Commands::Inspect(args) => {
            inspect::execute(args, &config, &storage, &settings, &output).await
        }
        Commands::Tiles(args) => tiles::execute(args, &storage, &settings, &output).await,
        Commands::Trend(args) => trend::execute(args, &storage, &settings, &output).await,
    }
}
