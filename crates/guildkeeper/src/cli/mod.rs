//! Command-line interface for the guildkeeper binary.

mod commands;
mod schema;

pub use commands::{Cli, Commands, SchemaCommands};
pub use schema::{handle_schema_command, render_ddl, render_diff};
