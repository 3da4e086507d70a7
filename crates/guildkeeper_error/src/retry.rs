//! Retry classification shared by error types.

/// Classifies whether an error is transient.
///
/// Callers own the retry policy; nothing inside the workspace retries on
/// its own.
///
/// # Examples
///
/// ```
/// use guildkeeper_error::{RetryableError, SchemaError, SchemaErrorKind};
///
/// let err = SchemaError::new(SchemaErrorKind::MissingPrimaryKey("users".into()));
/// assert!(!err.is_retryable());
/// ```
pub trait RetryableError {
    /// Returns true if repeating the same call may succeed.
    fn is_retryable(&self) -> bool;
}
