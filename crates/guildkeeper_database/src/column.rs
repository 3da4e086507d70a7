//! Column descriptors.

use crate::{SqlType, validate_identifier};
use derive_builder::Builder;
use guildkeeper_error::{SchemaError, SchemaErrorKind, SchemaResult};
use serde::{Deserialize, Serialize};

/// Server-side default for a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ColumnDefault {
    /// Quoted string literal
    Text(String),
    /// TRUE or FALSE
    Boolean(bool),
    /// Integer literal
    Integer(i64),
    /// Raw SQL expression such as `now()`
    Expression(String),
}

impl ColumnDefault {
    /// Render the default as it appears after `DEFAULT`.
    pub fn to_sql(&self) -> String {
        match self {
            Self::Text(text) => format!("'{}'", text.replace('\'', "''")),
            Self::Boolean(true) => "TRUE".to_string(),
            Self::Boolean(false) => "FALSE".to_string(),
            Self::Integer(value) => format!("({})", value),
            Self::Expression(expr) => format!("({})", expr),
        }
    }
}

impl From<&str> for ColumnDefault {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<bool> for ColumnDefault {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for ColumnDefault {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

/// Named, typed column with constraint flags.
///
/// At most one of `unique`, `primary_key` and `default_value` may be set.
///
/// # Examples
///
/// ```
/// use guildkeeper_database::{Column, SqlType};
///
/// let column = Column::builder("bot_prefix", SqlType::varchar(20).unwrap())
///     .default_value("!")
///     .build()
///     .unwrap();
/// assert_eq!(column.create_fragment(), "bot_prefix VARCHAR(20) DEFAULT '!'");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Builder, derive_getters::Getters)]
#[builder(
    pattern = "owned",
    setter(into),
    build_fn(validate = "Self::validate", error = "SchemaError")
)]
pub struct Column {
    /// Column name
    name: String,
    /// Column type
    sql_type: SqlType,
    /// Whether a secondary index is created for the column
    #[builder(default)]
    #[serde(default)]
    index: bool,
    /// Whether the column is part of the primary key
    #[builder(default)]
    #[serde(default)]
    primary_key: bool,
    /// Whether the column accepts null
    #[builder(default = "true")]
    #[serde(default = "nullable_default")]
    nullable: bool,
    /// Whether the column carries a UNIQUE constraint
    #[builder(default)]
    #[serde(default)]
    unique: bool,
    /// Server-side default
    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    default_value: Option<ColumnDefault>,
}

fn nullable_default() -> bool {
    true
}

impl ColumnBuilder {
    fn validate(&self) -> Result<(), SchemaError> {
        if let Some(name) = &self.name {
            validate_identifier(name)?;
        }
        if let Some(sql_type) = &self.sql_type {
            sql_type.validate()?;
        }
        let flags = [
            self.unique.unwrap_or(false),
            self.primary_key.unwrap_or(false),
            matches!(self.default_value, Some(Some(_))),
        ];
        if flags.iter().filter(|set| **set).count() > 1 {
            return Err(SchemaError::new(SchemaErrorKind::ColumnConstraintConflict(
                self.name.clone().unwrap_or_default(),
            )));
        }
        Ok(())
    }
}

impl Column {
    /// Start a builder with the required name and type filled in.
    pub fn builder(name: impl Into<String>, sql_type: SqlType) -> ColumnBuilder {
        ColumnBuilder::default().name(name).sql_type(sql_type)
    }

    /// Nullable column without constraints.
    ///
    /// # Errors
    ///
    /// Fails on an invalid name or type.
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> SchemaResult<Self> {
        Self::builder(name, sql_type).build()
    }

    /// `SERIAL` primary key column.
    ///
    /// # Errors
    ///
    /// Fails on an invalid name.
    pub fn serial_primary_key(name: impl Into<String>) -> SchemaResult<Self> {
        Self::builder(name, SqlType::serial()).primary_key(true).build()
    }

    /// Whether an insert may omit the column.
    pub fn has_server_value(&self) -> bool {
        self.default_value.is_some()
            || matches!(self.sql_type, SqlType::Integer(integer) if *integer.auto_increment())
    }

    /// Column definition as it appears inside `CREATE TABLE`.
    pub fn create_fragment(&self) -> String {
        let mut fragment = format!("{} {}", self.name, self.sql_type.to_sql());
        if let Some(default) = &self.default_value {
            fragment.push_str(" DEFAULT ");
            fragment.push_str(&default.to_sql());
        } else if self.unique {
            fragment.push_str(" UNIQUE");
        }
        if !self.nullable {
            fragment.push_str(" NOT NULL");
        }
        fragment
    }

    /// Re-check builder invariants, e.g. after deserializing a snapshot.
    ///
    /// # Errors
    ///
    /// Returns the first invariant the column violates.
    pub fn validate(&self) -> SchemaResult<()> {
        let mut builder = ColumnBuilder::default()
            .name(self.name.clone())
            .sql_type(self.sql_type.clone())
            .index(self.index)
            .primary_key(self.primary_key)
            .nullable(self.nullable)
            .unique(self.unique);
        if let Some(default) = &self.default_value {
            builder = builder.default_value(default.clone());
        }
        builder.validate()
    }
}
