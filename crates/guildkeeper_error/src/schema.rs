//! Schema definition error types.

use crate::RetryableError;

/// Definition-time failures of types, columns, tables and the registry.
///
/// These are programmer errors: they surface while entity definitions are
/// built, never while a statement executes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum SchemaErrorKind {
    /// Integer requested as both big and small
    #[display("Integer column type cannot be both big and small")]
    IntegerWidthConflict,
    /// Numeric precision outside 0..=1000
    #[display("Numeric precision must be between 0 and 1000, got {}", _0)]
    PrecisionOutOfRange(u32),
    /// Fixed-width string without a length
    #[display("Cannot have a fixed string with no length")]
    FixedWithoutLength,
    /// String length of zero
    #[display("String length must be greater than zero")]
    ZeroLength,
    /// Interval field outside the supported unit set
    #[display("Invalid interval field '{}'", _0)]
    InvalidIntervalField(String),
    /// Foreign key with an empty table or column
    #[display("Foreign key is missing the {} to reference", _0)]
    EmptyReference(&'static str),
    /// Referential action outside the supported set
    #[display("Invalid referential action '{}'", _0)]
    InvalidReferentialAction(String),
    /// Array or foreign key wrapping a non-terminal type
    #[display("Wrapped sql type must be a real type, got {}", _0)]
    NotRealType(String),
    /// More than one of unique, primary_key and default on a column
    #[display("Column '{}': unique, primary_key and default are mutually exclusive", _0)]
    ColumnConstraintConflict(String),
    /// Table or column name outside `[a-z_][a-z0-9_]*`
    #[display("Invalid identifier '{}'", _0)]
    InvalidIdentifier(String),
    /// Column declared twice on one table
    #[display("Column '{}' declared more than once on table '{}'", column, table)]
    DuplicateColumn {
        /// Table name
        table: String,
        /// Column name
        column: String,
    },
    /// Table registered twice
    #[display("Table '{}' is already registered", _0)]
    DuplicateTable(String),
    /// Table without columns
    #[display("Table '{}' declares no columns", _0)]
    NoColumns(String),
    /// Table without a primary key column
    #[display("Table '{}' declares no primary key column", _0)]
    MissingPrimaryKey(String),
    /// Foreign key pointing at an unregistered table or undeclared column
    #[display("Column '{}.{}' references unknown target {}", table, column, target)]
    UnresolvedReference {
        /// Referencing table
        table: String,
        /// Referencing column
        column: String,
        /// Referenced `table.column`
        target: String,
    },
    /// Column builder missing a required field
    #[display("Missing required field: {}", _0)]
    MissingField(String),
    /// Snapshot could not be parsed
    #[display("Invalid schema snapshot: {}", _0)]
    InvalidSnapshot(String),
}

/// Schema error with source location tracking.
///
/// # Examples
///
/// ```
/// use guildkeeper_error::{SchemaError, SchemaErrorKind};
///
/// let err = SchemaError::new(SchemaErrorKind::IntegerWidthConflict);
/// assert!(format!("{}", err).contains("both big and small"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Schema Error: {} at line {} in {}", kind, line, file)]
pub struct SchemaError {
    /// The kind of error that occurred
    pub kind: SchemaErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl SchemaError {
    /// Create a new SchemaError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: SchemaErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &SchemaErrorKind {
        &self.kind
    }
}

// SchemaError carries a source location, so equality and ordering only look at the kind.
impl PartialEq for SchemaError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for SchemaError {}

impl std::hash::Hash for SchemaError {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
    }
}

impl PartialOrd for SchemaError {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SchemaError {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.kind.cmp(&other.kind)
    }
}

impl RetryableError for SchemaError {
    fn is_retryable(&self) -> bool {
        false
    }
}

/// Convert from a derive_builder missing-field error.
impl From<derive_builder::UninitializedFieldError> for SchemaError {
    #[track_caller]
    fn from(err: derive_builder::UninitializedFieldError) -> Self {
        Self::new(SchemaErrorKind::MissingField(err.field_name().to_string()))
    }
}

/// Result type for schema definitions.
pub type SchemaResult<T> = Result<T, SchemaError>;
