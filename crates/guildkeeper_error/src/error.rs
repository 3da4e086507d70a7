//! Top-level error wrapper types.

use crate::{ConfigError, SchemaError};
#[cfg(feature = "database")]
use crate::DatabaseError;

/// Every failure class the workspace can surface.
///
/// # Examples
///
/// ```
/// use guildkeeper_error::{ConfigError, GuildkeeperError};
///
/// let err: GuildkeeperError = ConfigError::new("missing pool size").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum GuildkeeperErrorKind {
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Schema definition error
    #[from(SchemaError)]
    Schema(SchemaError),
    /// Database error
    #[cfg(feature = "database")]
    #[from(DatabaseError)]
    Database(DatabaseError),
}

/// Guildkeeper error with kind discrimination.
///
/// # Examples
///
/// ```
/// use guildkeeper_error::{GuildkeeperResult, ConfigError};
///
/// fn might_fail() -> GuildkeeperResult<()> {
///     Err(ConfigError::new("Missing field"))?
/// }
///
/// assert!(might_fail().is_err());
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Guildkeeper Error: {}", _0)]
pub struct GuildkeeperError(Box<GuildkeeperErrorKind>);

impl GuildkeeperError {
    /// Create a new error from a kind.
    pub fn new(kind: GuildkeeperErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &GuildkeeperErrorKind {
        &self.0
    }
}

impl<T> From<T> for GuildkeeperError
where
    T: Into<GuildkeeperErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Guildkeeper operations.
pub type GuildkeeperResult<T> = std::result::Result<T, GuildkeeperError>;
