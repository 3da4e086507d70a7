//! Guildkeeper CLI binary.
//!
//! Runs the schema lifecycle of the community catalog:
//! - Create, drop or reset every table
//! - Print the catalog as DDL or as a JSON snapshot
//! - Diff a saved snapshot against the current catalog

use clap::Parser;
use guildkeeper::cli::{Cli, Commands, handle_schema_command};
use guildkeeper::{GuildkeeperConfig, ObservabilityConfig, init_observability};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    init_observability(
        &ObservabilityConfig::new()
            .with_verbose(cli.verbose)
            .with_json_logs(cli.json_logs),
    )?;

    // GUILDKEEPER__* overrides may live in .env alongside DATABASE_*
    let _ = dotenvy::dotenv();
    let config = match &cli.config {
        Some(path) => GuildkeeperConfig::from_file(path)?,
        None => GuildkeeperConfig::load()?,
    };

    match cli.command {
        Commands::Schema(schema_cmd) => {
            handle_schema_command(schema_cmd, &config).await?;
        }
    }

    Ok(())
}
