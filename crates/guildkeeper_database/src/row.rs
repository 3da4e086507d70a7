//! Materialized rows.

use crate::{DatabaseError, DatabaseErrorKind, DatabaseResult, SqlType, Table};
use base64::{Engine, engine::general_purpose::STANDARD};
use diesel::QueryableByName;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

/// Single JSON column produced by the read statements in [`crate::query`].
#[derive(Debug, QueryableByName)]
pub(crate) struct JsonRow {
    #[diesel(sql_type = diesel::sql_types::Json)]
    pub(crate) json: JsonValue,
}

/// One row read from a table, keyed by column name.
///
/// Rows are read-only snapshots; they carry no identity beyond their fields.
///
/// NUMERIC values arrive as exact decimal text (`get::<String>`), BYTEA
/// values as byte arrays (`get::<Vec<u8>>`).
///
/// # Examples
///
/// ```
/// use guildkeeper_database::Row;
/// use serde_json::json;
///
/// let row = Row::try_from(json!({"user_id": 1, "nickname": null})).unwrap();
/// assert_eq!(row.get::<i64>("user_id").unwrap(), 1);
/// assert_eq!(row.get::<Option<String>>("nickname").unwrap(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row(Map<String, JsonValue>);

impl Row {
    /// Decode one column. A missing column decodes like NULL.
    ///
    /// # Errors
    ///
    /// Fails when the stored value does not deserialize into `T`.
    pub fn get<T: DeserializeOwned>(&self, column: &str) -> DatabaseResult<T> {
        let value = self.0.get(column).cloned().unwrap_or(JsonValue::Null);
        serde_json::from_value(value).map_err(|e| {
            DatabaseError::new(DatabaseErrorKind::Serialization(format!(
                "column '{}': {}",
                column, e
            )))
        })
    }

    /// Raw JSON value of one column.
    pub fn value(&self, column: &str) -> Option<&JsonValue> {
        self.0.get(column)
    }

    /// Decode the whole row into a typed struct.
    ///
    /// # Errors
    ///
    /// Fails when the row does not deserialize into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> DatabaseResult<T> {
        Ok(serde_json::from_value(JsonValue::Object(self.0.clone()))?)
    }

    /// Column names present in the row.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Underlying JSON object.
    pub fn into_inner(self) -> Map<String, JsonValue> {
        self.0
    }
}

impl Row {
    /// Row read from `table`, with BYTEA columns decoded from base64.
    pub(crate) fn from_json_row(row: JsonRow, table: &Table) -> DatabaseResult<Self> {
        let mut row = Self::try_from(row)?;
        for column in table.columns() {
            let Some(value) = row.0.get_mut(column.name().as_str()) else {
                continue;
            };
            match column.sql_type().value_type() {
                SqlType::Binary => decode_bytes(column.name(), value)?,
                SqlType::Array(array) if matches!(array.element().value_type(), SqlType::Binary) => {
                    if let JsonValue::Array(elements) = value {
                        for element in elements.iter_mut() {
                            decode_bytes(column.name(), element)?;
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(row)
    }
}

/// Replace base64 text with the array of bytes it encodes. NULL stays NULL.
fn decode_bytes(column: &str, value: &mut JsonValue) -> DatabaseResult<()> {
    if let JsonValue::String(text) = value {
        let bytes = STANDARD.decode(text.as_bytes()).map_err(|e| {
            DatabaseError::new(DatabaseErrorKind::Serialization(format!(
                "column '{}': invalid bytea encoding: {}",
                column, e
            )))
        })?;
        *value = JsonValue::from(bytes);
    }
    Ok(())
}

impl TryFrom<JsonValue> for Row {
    type Error = DatabaseError;

    fn try_from(value: JsonValue) -> DatabaseResult<Self> {
        match value {
            JsonValue::Object(map) => Ok(Self(map)),
            other => Err(DatabaseError::new(DatabaseErrorKind::Serialization(
                format!("expected a JSON object row, got {}", other),
            ))),
        }
    }
}

impl TryFrom<JsonRow> for Row {
    type Error = DatabaseError;

    fn try_from(row: JsonRow) -> DatabaseResult<Self> {
        Self::try_from(row.json)
    }
}
