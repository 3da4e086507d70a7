//! Layered configuration for the Guildkeeper binary.
//!
//! Sources, later ones overriding earlier ones:
//! - Bundled defaults (include_str! from guildkeeper.toml)
//! - `~/.config/guildkeeper/guildkeeper.toml`
//! - `./guildkeeper.toml`
//! - `GUILDKEEPER__<SECTION>__<KEY>` environment variables

use config::{Config, Environment, File, FileFormat};
use guildkeeper_database::DatabaseConfig;
use guildkeeper_error::{ConfigError, GuildkeeperError, GuildkeeperResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, instrument};

/// Bundled default configuration.
const DEFAULT_CONFIG: &str = include_str!("../../../guildkeeper.toml");

/// Pool settings from the `[database]` table.
///
/// Credentials normally come from the environment; see
/// [`DatabaseConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct DatabaseSettings {
    /// Connection URL overriding the environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Maximum pooled connections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_size: Option<u32>,
    /// Seconds to wait for a pool checkout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_timeout_secs: Option<u64>,
}

/// Schema preparation policy from the `[schema]` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct SchemaSettings {
    /// Drop and recreate every table when preparing the schema
    #[serde(default)]
    pub reset_on_startup: bool,
    /// Tolerate existing tables when creating the schema
    #[serde(default = "exists_ok_default")]
    pub exists_ok: bool,
}

fn exists_ok_default() -> bool {
    true
}

impl Default for SchemaSettings {
    fn default() -> Self {
        Self {
            reset_on_startup: false,
            exists_ok: true,
        }
    }
}

/// Top-level Guildkeeper configuration.
///
/// # Example
///
/// ```no_run
/// use guildkeeper::GuildkeeperConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = GuildkeeperConfig::load()?;
/// let database = config.database_config()?;
/// println!("pool size: {}", database.pool_size);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct GuildkeeperConfig {
    /// `[database]` table
    #[serde(default)]
    pub database: DatabaseSettings,
    /// `[schema]` table
    #[serde(default)]
    pub schema: SchemaSettings,
}

fn config_error(context: &str, err: impl std::fmt::Display) -> GuildkeeperError {
    GuildkeeperError::from(ConfigError::new(format!("{}: {}", context, err)))
}

impl GuildkeeperConfig {
    /// Load bundled defaults overridden by user files and the environment.
    ///
    /// User files are optional and skipped when absent.
    ///
    /// # Errors
    ///
    /// Fails when a present file does not parse or a value has the wrong type.
    #[instrument]
    pub fn load() -> GuildkeeperResult<Self> {
        debug!("Loading configuration: env > current dir > home dir > bundled defaults");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/guildkeeper/guildkeeper.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder
            .add_source(File::with_name("guildkeeper").required(false))
            .add_source(
                Environment::with_prefix("GUILDKEEPER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder
            .build()
            .map_err(|e| config_error("Failed to build configuration", e))?
            .try_deserialize()
            .map_err(|e| config_error("Failed to parse configuration", e))
    }

    /// Load a single TOML file on top of the bundled defaults.
    ///
    /// # Errors
    ///
    /// Fails when the file is missing or does not parse.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> GuildkeeperResult<Self> {
        Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                config_error(
                    &format!("Failed to read configuration from {}", path.as_ref().display()),
                    e,
                )
            })?
            .try_deserialize()
            .map_err(|e| config_error("Failed to parse configuration", e))
    }

    /// Parse configuration from a TOML string, without any other layer.
    ///
    /// # Errors
    ///
    /// Fails when the text does not parse.
    pub fn from_toml(text: &str) -> GuildkeeperResult<Self> {
        Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()
            .map_err(|e| config_error("Failed to build configuration", e))?
            .try_deserialize()
            .map_err(|e| config_error("Failed to parse configuration", e))
    }

    /// Connection settings: the configured URL or the `DATABASE_*`
    /// environment, with the configured pool settings applied on top.
    ///
    /// # Errors
    ///
    /// Fails when no URL is configured and the environment lacks credentials,
    /// or when the pool size is zero.
    pub fn database_config(&self) -> GuildkeeperResult<DatabaseConfig> {
        let mut config = match &self.database.url {
            Some(url) => DatabaseConfig::with_url(url.as_str()),
            None => DatabaseConfig::from_env()?,
        };
        if let Some(pool_size) = self.database.pool_size {
            if pool_size == 0 {
                return Err(ConfigError::for_key("database.pool_size", "must be at least 1").into());
            }
            config.pool_size = pool_size;
        }
        if let Some(timeout) = self.database.connection_timeout_secs {
            config.connection_timeout_secs = timeout;
        }
        Ok(config)
    }
}
