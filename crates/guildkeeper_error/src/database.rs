//! Database error types.

use crate::{RetryableError, SchemaError};

/// Database error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum DatabaseErrorKind {
    /// Pool checkout or connection establishment failed
    #[display("Database connection error: {}", _0)]
    Connection(String),
    /// Driver-level failure while executing a statement
    #[display("Database storage error: {}", _0)]
    Storage(String),
    /// Unique or primary key constraint rejected a write
    #[display("Duplicate row: {}", _0)]
    Duplicate(String),
    /// Foreign key constraint rejected a write
    #[display("Foreign key violation: {}", _0)]
    ForeignKeyViolation(String),
    /// NOT NULL constraint rejected a write
    #[display("Not null violation: {}", _0)]
    NotNullViolation(String),
    /// Caller supplied null for a non-nullable column
    #[display("Cannot pass null to non-nullable column '{}.{}'", table, column)]
    NullValue {
        /// Table name
        table: String,
        /// Column name
        column: String,
    },
    /// Caller supplied a value the column type cannot hold
    #[display("Column '{}.{}' expected {}, received {}", table, column, expected, received)]
    TypeMismatch {
        /// Table name
        table: String,
        /// Column name
        column: String,
        /// Storage type of the column
        expected: String,
        /// Kind of the supplied value
        received: String,
    },
    /// Field or filter names a column the table does not declare
    #[display("Table '{}' has no column '{}'", table, column)]
    UnknownColumn {
        /// Table name
        table: String,
        /// Column name
        column: String,
    },
    /// Filter rejected before execution
    #[display("Invalid filter: {}", _0)]
    InvalidFilter(String),
    /// Assignment list rejected before execution
    #[display("Invalid assignment: {}", _0)]
    InvalidAssignment(String),
    /// Table is not part of the schema registry
    #[display("Table '{}' is not registered", _0)]
    TableNotRegistered(String),
    /// Row could not be decoded
    #[display("Serialization error: {}", _0)]
    Serialization(String),
    /// Blocking worker panicked or was aborted
    #[display("Database task failed: {}", _0)]
    Task(String),
    /// Schema definition failure surfaced through a database call
    #[display("{}", _0)]
    Schema(SchemaError),
    /// DDL for one table failed during a lifecycle operation
    #[display("Schema operation on table '{}' failed: {}", table, cause)]
    Lifecycle {
        /// Table whose statement failed
        table: String,
        /// Classified driver failure
        cause: Box<DatabaseErrorKind>,
    },
}

impl DatabaseErrorKind {
    /// True for transient connectivity and driver failures.
    ///
    /// A lifecycle failure is retryable when its cause is.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Storage(_) => true,
            Self::Lifecycle { cause, .. } => cause.is_retryable(),
            _ => false,
        }
    }

    /// True when the storage engine rejected a write on a constraint.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::Duplicate(_) | Self::ForeignKeyViolation(_) | Self::NotNullViolation(_)
        )
    }
}

/// Database error with source location tracking.
///
/// # Examples
///
/// ```
/// use guildkeeper_error::{DatabaseError, DatabaseErrorKind, RetryableError};
///
/// let err = DatabaseError::new(DatabaseErrorKind::Duplicate("users_pkey".into()));
/// assert!(err.is_constraint_violation());
/// assert!(!err.is_retryable());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Database Error: {} at line {} in {}", kind, line, file)]
pub struct DatabaseError {
    /// The kind of error that occurred
    pub kind: DatabaseErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl DatabaseError {
    /// Create a new DatabaseError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: DatabaseErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &DatabaseErrorKind {
        &self.kind
    }

    /// True when the storage engine rejected a unique or primary key.
    pub fn is_duplicate(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::Duplicate(_))
    }

    /// True when the storage engine rejected a write on a constraint.
    pub fn is_constraint_violation(&self) -> bool {
        self.kind.is_constraint_violation()
    }
}

impl RetryableError for DatabaseError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<SchemaError> for DatabaseError {
    #[track_caller]
    fn from(err: SchemaError) -> Self {
        DatabaseError::new(DatabaseErrorKind::Schema(err))
    }
}

impl From<diesel::result::Error> for DatabaseError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::DatabaseErrorKind as DieselKind;
        use diesel::result::Error as DieselError;

        match err {
            DieselError::DatabaseError(kind, info) => {
                let message = match info.constraint_name() {
                    Some(constraint) => format!("{} ({})", info.message(), constraint),
                    None => info.message().to_string(),
                };
                let kind = match kind {
                    DieselKind::UniqueViolation => DatabaseErrorKind::Duplicate(message),
                    DieselKind::ForeignKeyViolation => {
                        DatabaseErrorKind::ForeignKeyViolation(message)
                    }
                    DieselKind::NotNullViolation => DatabaseErrorKind::NotNullViolation(message),
                    DieselKind::ClosedConnection => DatabaseErrorKind::Connection(message),
                    _ => DatabaseErrorKind::Storage(message),
                };
                DatabaseError::new(kind)
            }
            DieselError::BrokenTransactionManager => {
                DatabaseError::new(DatabaseErrorKind::Connection(err.to_string()))
            }
            DieselError::DeserializationError(e) => {
                DatabaseError::new(DatabaseErrorKind::Serialization(e.to_string()))
            }
            _ => DatabaseError::new(DatabaseErrorKind::Storage(err.to_string())),
        }
    }
}

impl From<diesel::ConnectionError> for DatabaseError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        DatabaseError::new(DatabaseErrorKind::Connection(err.to_string()))
    }
}

impl From<diesel::r2d2::PoolError> for DatabaseError {
    #[track_caller]
    fn from(err: diesel::r2d2::PoolError) -> Self {
        DatabaseError::new(DatabaseErrorKind::Connection(err.to_string()))
    }
}

impl From<serde_json::Error> for DatabaseError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        DatabaseError::new(DatabaseErrorKind::Serialization(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_retryability_follows_cause() {
        let lost = DatabaseError::new(DatabaseErrorKind::Lifecycle {
            table: "guilds".to_string(),
            cause: Box::new(DatabaseErrorKind::Connection("server closed the connection".into())),
        });
        assert!(lost.is_retryable());
        assert!(lost.to_string().contains("table 'guilds'"));

        let duplicate = DatabaseError::new(DatabaseErrorKind::Lifecycle {
            table: "guilds".to_string(),
            cause: Box::new(DatabaseErrorKind::Duplicate("guilds_pkey".into())),
        });
        assert!(!duplicate.is_retryable());
    }

    #[test]
    fn test_closed_connection_is_connection_kind() {
        let err = DatabaseError::from(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::ClosedConnection,
            Box::new("terminating connection".to_string()),
        ));
        assert!(matches!(err.kind, DatabaseErrorKind::Connection(_)));
        assert!(err.is_retryable());
    }
}
