//! Table definitions and their DDL.

use crate::{Column, ForeignKey, SqlType};
use guildkeeper_error::{SchemaError, SchemaErrorKind, SchemaResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Check that `name` is a plain lowercase SQL identifier (`[a-z_][a-z0-9_]*`).
///
/// Table and column names are interpolated into statements, so nothing else
/// is accepted.
///
/// # Errors
///
/// Fails when the name is empty or contains other characters.
pub fn validate_identifier(name: &str) -> SchemaResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_lowercase() || first == '_' => {
            chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(SchemaError::new(SchemaErrorKind::InvalidIdentifier(
            name.to_string(),
        )))
    }
}

/// Named, ordered set of columns with at least one primary key column.
///
/// Tables are immutable once built; construct them with [`Table::builder`].
///
/// # Examples
///
/// ```
/// use guildkeeper_database::{Column, SqlType, Table};
///
/// let table = Table::builder("users")
///     .column(Column::serial_primary_key("id").unwrap())
///     .column(Column::new("name", SqlType::text()).unwrap())
///     .build()
///     .unwrap();
/// assert_eq!(
///     table.create_table_sql(true),
///     vec!["CREATE TABLE IF NOT EXISTS users (id SERIAL, name TEXT, PRIMARY KEY (id))"]
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TableDefinition")]
pub struct Table {
    name: String,
    columns: Vec<Column>,
}

/// Unvalidated table shape as it appears in serialized snapshots.
#[derive(Debug, Clone, Deserialize)]
struct TableDefinition {
    name: String,
    columns: Vec<Column>,
}

impl TryFrom<TableDefinition> for Table {
    type Error = SchemaError;

    fn try_from(definition: TableDefinition) -> SchemaResult<Self> {
        for column in &definition.columns {
            column.validate()?;
        }
        TableBuilder {
            name: definition.name,
            columns: definition.columns,
        }
        .build()
    }
}

/// Builder for [`Table`].
#[derive(Debug, Clone)]
pub struct TableBuilder {
    name: String,
    columns: Vec<Column>,
}

impl TableBuilder {
    /// Append a column. Declaration order is preserved in DDL and snapshots.
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Append several columns.
    pub fn columns(mut self, columns: impl IntoIterator<Item = Column>) -> Self {
        self.columns.extend(columns);
        self
    }

    /// Validate and freeze the table.
    ///
    /// # Errors
    ///
    /// Fails on an invalid name, no columns, a repeated column name or no
    /// primary key column.
    pub fn build(self) -> SchemaResult<Table> {
        validate_identifier(&self.name)?;
        if self.columns.is_empty() {
            return Err(SchemaError::new(SchemaErrorKind::NoColumns(self.name)));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name()) {
                return Err(SchemaError::new(SchemaErrorKind::DuplicateColumn {
                    table: self.name.clone(),
                    column: column.name().to_string(),
                }));
            }
        }
        if !self.columns.iter().any(|column| *column.primary_key()) {
            return Err(SchemaError::new(SchemaErrorKind::MissingPrimaryKey(
                self.name,
            )));
        }
        debug!(table = %self.name, columns = self.columns.len(), "Built table definition");
        Ok(Table {
            name: self.name,
            columns: self.columns,
        })
    }
}

impl Table {
    /// Start a table definition.
    pub fn builder(name: impl Into<String>) -> TableBuilder {
        TableBuilder {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Start a table definition named after `T`, lowercased.
    ///
    /// `struct UserProfiles` yields a table named `userprofiles`.
    pub fn builder_for<T: ?Sized>() -> TableBuilder {
        let full = std::any::type_name::<T>();
        let base = full.split('<').next().unwrap_or(full);
        let short = base.rsplit("::").next().unwrap_or(base);
        Self::builder(short.to_ascii_lowercase())
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name() == name)
    }

    /// Primary key columns in declaration order.
    pub fn primary_key(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|column| *column.primary_key())
    }

    /// Columns that reference another table.
    pub fn foreign_keys(&self) -> impl Iterator<Item = (&Column, &ForeignKey)> {
        self.columns
            .iter()
            .filter_map(|column| match column.sql_type() {
                SqlType::ForeignKey(fk) => Some((column, fk)),
                _ => None,
            })
    }

    /// Name of the secondary index created for `column`.
    pub fn index_name(&self, column: &str) -> String {
        format!("{}_{}_idx", self.name, column)
    }

    /// Statements creating the table and its secondary indexes.
    ///
    /// With `exists_ok` the table statement tolerates an existing table.
    /// Index statements are always idempotent.
    pub fn create_table_sql(&self, exists_ok: bool) -> Vec<String> {
        let mut definitions: Vec<String> =
            self.columns.iter().map(Column::create_fragment).collect();
        let keys: Vec<&str> = self.primary_key().map(|column| column.name().as_str()).collect();
        definitions.push(format!("PRIMARY KEY ({})", keys.join(", ")));

        let mut statements = vec![format!(
            "CREATE TABLE {}{} ({})",
            if exists_ok { "IF NOT EXISTS " } else { "" },
            self.name,
            definitions.join(", ")
        )];
        statements.extend(self.columns.iter().filter(|c| *c.index()).map(|column| {
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                self.index_name(column.name()),
                self.name,
                column.name()
            )
        }));
        statements
    }

    /// Statement removing the table and anything depending on it.
    pub fn drop_table_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {} CASCADE", self.name)
    }
}
