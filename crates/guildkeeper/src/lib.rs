//! Guildkeeper - persistence for a Discord community bot.
//!
//! Guildkeeper stores guilds, members, roles, channels, invites and activity
//! counters in PostgreSQL. Tables are declared at runtime, every value is
//! checked against its column before it is bound, and the whole schema can
//! be created, dropped, printed or compared against a saved snapshot.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use guildkeeper::{CommunityRepository, Database, GuildkeeperConfig, catalog, prepare_schema};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GuildkeeperConfig::load()?;
//!     let db = Database::connect(config.database_config()?, catalog()?).await?;
//!     prepare_schema(&db, &config.schema).await?;
//!
//!     let repo = CommunityRepository::new(db);
//!     repo.record_message(1234, 42).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `guildkeeper-error` - Error types
//! - `guildkeeper-database` - Type system, registry, CRUD engine, catalog
//!
//! This crate (`guildkeeper`) re-exports everything for convenience and adds
//! configuration, logging setup and the `guildkeeper` binary.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
mod config;
mod observability;

pub use config::{DatabaseSettings, GuildkeeperConfig, SchemaSettings};
pub use observability::{ObservabilityConfig, init_observability};

pub use guildkeeper_database::*;
pub use guildkeeper_error::{
    ConfigError, GuildkeeperError, GuildkeeperErrorKind, GuildkeeperResult, RetryableError,
};

use tracing::instrument;

/// Bring the schema in line with `settings`: drop and recreate every table
/// when `reset_on_startup` is set, otherwise create missing tables.
///
/// # Errors
///
/// Fails on the first table that cannot be dropped or created; nothing is
/// changed then.
#[instrument(skip(db))]
pub async fn prepare_schema(db: &Database, settings: &SchemaSettings) -> GuildkeeperResult<()> {
    if settings.reset_on_startup {
        db.reset().await?;
    } else {
        db.create_all(settings.exists_ok).await?;
    }
    Ok(())
}
