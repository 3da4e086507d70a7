//! CLI command definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Guildkeeper - persistence and schema tooling for a Discord community bot
#[derive(Parser, Debug)]
#[command(name = "guildkeeper")]
#[command(about = "Persistence and schema tooling for a Discord community bot", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Configuration file used instead of the user configuration files
    #[arg(long, global = true, env = "GUILDKEEPER_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Schema lifecycle commands
    #[command(subcommand)]
    Schema(SchemaCommands),
}

/// Schema lifecycle subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum SchemaCommands {
    /// Create every table of the community catalog
    Create {
        /// Fail if a table already exists
        #[arg(long)]
        no_exists_ok: bool,
    },

    /// Drop every table of the community catalog
    Drop,

    /// Drop and recreate every table
    Reset,

    /// Print the catalog as DDL, or as a JSON snapshot
    Print {
        /// Print a JSON snapshot instead of DDL
        #[arg(long)]
        json: bool,
    },

    /// List changes from a saved snapshot to the current catalog
    Diff {
        /// Snapshot written earlier by `schema print --json`
        snapshot: PathBuf,
    },
}
