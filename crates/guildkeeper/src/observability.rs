//! Tracing subscriber setup for the Guildkeeper binary.

use guildkeeper_error::{ConfigError, GuildkeeperResult};
use std::env;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g., "info", "debug")
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,
}

impl ObservabilityConfig {
    /// Configuration honouring `RUST_LOG`, defaulting to `info`.
    pub fn new() -> Self {
        Self {
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            json_logs: false,
        }
    }

    /// Set the log level.
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enable JSON-formatted logs.
    pub fn with_json_logs(mut self, enabled: bool) -> Self {
        self.json_logs = enabled;
        self
    }

    /// `debug` when verbose, otherwise the current level.
    pub fn with_verbose(self, verbose: bool) -> Self {
        if verbose {
            self.with_log_level("debug")
        } else {
            self
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the global tracing subscriber.
///
/// `config.log_level` is used as an [`EnvFilter`] directive.
///
/// # Errors
///
/// Fails when the filter directive does not parse or a subscriber is already
/// installed.
pub fn init_observability(config: &ObservabilityConfig) -> GuildkeeperResult<()> {
    let env_filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| ConfigError::for_key("log_level", format!("invalid filter '{}': {}", config.log_level, e)))?;

    let fmt_layer = if config.json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_level(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_level(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| ConfigError::new(format!("Failed to install subscriber: {}", e)))?;

    Ok(())
}
