//! Configuration error types.

/// Failure while loading or applying configuration.
///
/// `key` names the offending setting when one can be singled out, using the
/// dotted path of the TOML file (e.g. `schema.exists_ok`).
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display(
    "Configuration Error{}: {} at line {} in {}",
    key.as_ref().map(|k| format!(" [{}]", k)).unwrap_or_default(),
    message,
    line,
    file
)]
pub struct ConfigError {
    /// Setting the error concerns, if known
    pub key: Option<String>,
    /// Error message
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl ConfigError {
    /// Error not tied to a single setting.
    ///
    /// # Examples
    ///
    /// ```
    /// use guildkeeper_error::ConfigError;
    ///
    /// let err = ConfigError::new("no configuration source could be read");
    /// assert!(err.key.is_none());
    /// assert!(err.to_string().starts_with("Configuration Error: no configuration"));
    /// ```
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            key: None,
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }

    /// Error about one setting.
    ///
    /// # Examples
    ///
    /// ```
    /// use guildkeeper_error::ConfigError;
    ///
    /// let err = ConfigError::for_key("database.pool_size", "must be at least 1");
    /// assert!(err.to_string().starts_with("Configuration Error [database.pool_size]:"));
    /// ```
    #[track_caller]
    pub fn for_key(key: impl Into<String>, message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            key: Some(key.into()),
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }
}
