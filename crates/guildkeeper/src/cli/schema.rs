//! Schema command handlers.

use super::commands::SchemaCommands;
use crate::{GuildkeeperConfig, SchemaSettings, prepare_schema};
use guildkeeper_database::{Database, SchemaChange, SchemaRegistry, SchemaSnapshot, catalog};
use guildkeeper_error::{ConfigError, GuildkeeperResult};
use std::path::Path;
use tracing::{info, instrument};

/// `CREATE` statements for every table, in creation order.
pub fn render_ddl(registry: &SchemaRegistry) -> String {
    registry
        .tables()
        .iter()
        .flat_map(|table| table.create_table_sql(true))
        .map(|statement| format!("{};\n", statement))
        .collect()
}

/// One line per change, or a note that nothing changed.
pub fn render_diff(changes: &[SchemaChange]) -> String {
    if changes.is_empty() {
        return "No schema changes\n".to_string();
    }
    changes.iter().map(|change| format!("{}\n", change)).collect()
}

async fn connect(config: &GuildkeeperConfig) -> GuildkeeperResult<Database> {
    Ok(Database::connect(config.database_config()?, catalog()?).await?)
}

fn read_snapshot(path: &Path) -> GuildkeeperResult<SchemaSnapshot> {
    let json = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::new(format!("Failed to read snapshot {}: {}", path.display(), e))
    })?;
    Ok(SchemaSnapshot::from_json(&json)?)
}

/// Run a schema subcommand.
///
/// # Errors
///
/// Propagates configuration, schema and database failures.
#[instrument(skip(config))]
pub async fn handle_schema_command(
    cmd: SchemaCommands,
    config: &GuildkeeperConfig,
) -> GuildkeeperResult<()> {
    match cmd {
        SchemaCommands::Create { no_exists_ok } => {
            let db = connect(config).await?;
            let settings = SchemaSettings {
                exists_ok: config.schema.exists_ok && !no_exists_ok,
                ..config.schema
            };
            prepare_schema(&db, &settings).await?;
            info!(tables = db.registry().len(), "Schema ready");
        }
        SchemaCommands::Drop => {
            let db = connect(config).await?;
            db.drop_all().await?;
            info!(tables = db.registry().len(), "Schema dropped");
        }
        SchemaCommands::Reset => {
            let db = connect(config).await?;
            db.reset().await?;
            info!(tables = db.registry().len(), "Schema reset");
        }
        SchemaCommands::Print { json } => {
            let registry = catalog()?;
            if json {
                println!("{}", SchemaSnapshot::of(&registry).to_json()?);
            } else {
                print!("{}", render_ddl(&registry));
            }
        }
        SchemaCommands::Diff { snapshot } => {
            let saved = read_snapshot(&snapshot)?;
            let current = SchemaSnapshot::of(&catalog()?);
            print!("{}", render_diff(&saved.diff(&current)));
        }
    }
    Ok(())
}
