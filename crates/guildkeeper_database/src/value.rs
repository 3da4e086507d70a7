//! Values, field maps and update assignments passed to CRUD operations.

use crate::{IntegerWidth, SqlType};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

/// A single value bound to a statement parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    /// SQL NULL
    Null,
    /// Boolean
    Bool(bool),
    /// Any integer
    Int(i64),
    /// Any floating point number
    Float(f64),
    /// Text, also used for NUMERIC and INTERVAL literals
    Text(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Timestamp without time zone
    Timestamp(NaiveDateTime),
    /// Timestamp with time zone
    TimestampTz(DateTime<Utc>),
    /// Calendar date
    Date(NaiveDate),
    /// Time of day
    Time(NaiveTime),
    /// JSON document
    Json(JsonValue),
    /// One-dimensional array of scalar values
    Array(Vec<SqlValue>),
}

impl SqlValue {
    /// Array from anything convertible to values.
    pub fn array<T: Into<SqlValue>>(values: impl IntoIterator<Item = T>) -> Self {
        Self::Array(values.into_iter().map(Into::into).collect())
    }

    /// Whether the value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the value's kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Timestamp(_) => "timestamp",
            Self::TimestampTz(_) => "timestamptz",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::Json(_) => "json",
            Self::Array(_) => "array",
        }
    }

    /// Text form of an array element, `None` for NULL.
    ///
    /// Arrays are bound as `text[]` and cast server-side to the element type,
    /// so every element needs a literal PostgreSQL can parse.
    pub fn to_array_element(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(value) => Some(value.to_string()),
            Self::Int(value) => Some(value.to_string()),
            Self::Float(value) => Some(value.to_string()),
            Self::Text(value) => Some(value.clone()),
            Self::Bytes(bytes) => Some(format!(
                "\\x{}",
                bytes.iter().map(|b| format!("{:02x}", b)).collect::<String>()
            )),
            Self::Timestamp(value) => Some(value.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            Self::TimestampTz(value) => Some(value.to_rfc3339()),
            Self::Date(value) => Some(value.to_string()),
            Self::Time(value) => Some(value.to_string()),
            Self::Json(value) => Some(value.to_string()),
            Self::Array(values) => Some(serde_json::Value::from(
                values
                    .iter()
                    .map(|v| v.to_array_element().map_or(JsonValue::Null, JsonValue::from))
                    .collect::<Vec<_>>(),
            )
            .to_string()),
        }
    }
}

impl SqlType {
    /// Whether `value` can be written into, or compared with, a column of
    /// this type. NULL is accepted here; nullability is a column concern.
    pub fn accepts(&self, value: &SqlValue) -> bool {
        match (self.value_type(), value) {
            (_, SqlValue::Null) => true,
            (SqlType::Binary, SqlValue::Bytes(_)) => true,
            (SqlType::Boolean, SqlValue::Bool(_)) => true,
            (SqlType::Date, SqlValue::Date(_)) => true,
            (SqlType::Datetime { .. }, SqlValue::Timestamp(_) | SqlValue::TimestampTz(_)) => true,
            (SqlType::Double | SqlType::Float, SqlValue::Float(_) | SqlValue::Int(_)) => true,
            (SqlType::Integer(integer), SqlValue::Int(value)) => match *integer.width() {
                IntegerWidth::Small => i16::try_from(*value).is_ok(),
                IntegerWidth::Regular => i32::try_from(*value).is_ok(),
                IntegerWidth::Big => true,
            },
            (SqlType::Interval { .. }, SqlValue::Text(_)) => true,
            (SqlType::Json, SqlValue::Json(_)) => true,
            (SqlType::Numeric(_), SqlValue::Int(_) | SqlValue::Float(_) | SqlValue::Text(_)) => {
                true
            }
            (SqlType::String(_), SqlValue::Text(_)) => true,
            (SqlType::Time { .. }, SqlValue::Time(_)) => true,
            (SqlType::Array(array), SqlValue::Array(values)) => values
                .iter()
                .all(|v| !matches!(v, SqlValue::Array(_)) && array.element().accepts(v)),
            _ => false,
        }
    }
}

macro_rules! impl_from_value {
    ($($source:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(
            impl From<$source> for SqlValue {
                fn from(value: $source) -> Self {
                    Self::$variant(value $(as $cast)?)
                }
            }
        )*
    };
}

impl_from_value! {
    bool => Bool,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int,
    u8 => Int as i64,
    u16 => Int as i64,
    u32 => Int as i64,
    f32 => Float as f64,
    f64 => Float,
    String => Text,
    Vec<u8> => Bytes,
    NaiveDateTime => Timestamp,
    DateTime<Utc> => TimestampTz,
    NaiveDate => Date,
    NaiveTime => Time,
    JsonValue => Json,
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<&[u8]> for SqlValue {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Ordered mapping from column name to value.
///
/// Used for insert payloads and equality filters. Setting a name twice keeps
/// the latest value in the original position.
///
/// # Examples
///
/// ```
/// use guildkeeper_database::{Fields, SqlValue};
///
/// let fields = Fields::new().with("user_id", 42_i64).with("coins", 10);
/// assert_eq!(fields.get("coins"), Some(&SqlValue::Int(10)));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields(Vec<(String, SqlValue)>);

impl Fields {
    /// Empty field map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Set `name` to `value`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<SqlValue>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((name, value)),
        }
    }

    /// Value for `name`.
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.0
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<SqlValue>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Self::new();
        for (name, value) in iter {
            fields.set(name, value);
        }
        fields
    }
}

/// How an assignment combines with the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum AssignOp {
    /// `column = value`
    #[display("replace")]
    Replace,
    /// `column = column + value`
    #[display("increment")]
    Increment,
}

/// One `SET` clause of an update.
#[derive(Debug, Clone, PartialEq, derive_getters::Getters)]
pub struct Assignment {
    column: String,
    op: AssignOp,
    value: SqlValue,
}

impl Assignment {
    /// `column = value`
    pub fn set(column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self {
            column: column.into(),
            op: AssignOp::Replace,
            value: value.into(),
        }
    }

    /// `column = column + amount`
    pub fn increment(column: impl Into<String>, amount: impl Into<SqlValue>) -> Self {
        Self {
            column: column.into(),
            op: AssignOp::Increment,
            value: amount.into(),
        }
    }
}

/// Sort direction for [`ListOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, derive_more::Display)]
pub enum SortOrder {
    /// Smallest first
    #[default]
    #[display("ASC")]
    Ascending,
    /// Largest first
    #[display("DESC")]
    Descending,
}

/// Ordering and limit for multi-row reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, derive_getters::Getters)]
pub struct ListOptions {
    order_by: Option<String>,
    order: SortOrder,
    limit: Option<i64>,
}

impl ListOptions {
    /// No ordering, no limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sort ascending by `column`.
    pub fn sorted_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self.order = SortOrder::Ascending;
        self
    }

    /// Sort descending by `column`.
    pub fn sorted_by_desc(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self.order = SortOrder::Descending;
        self
    }

    /// Return at most `limit` rows.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Numeric;

    #[test]
    fn test_integer_width_bounds() {
        assert!(SqlType::small_integer().accepts(&SqlValue::Int(i16::MAX as i64)));
        assert!(!SqlType::small_integer().accepts(&SqlValue::Int(i16::MAX as i64 + 1)));
        assert!(!SqlType::integer().accepts(&SqlValue::Int(i64::MAX)));
        assert!(SqlType::big_integer().accepts(&SqlValue::Int(i64::MAX)));
        assert!(SqlType::serial().accepts(&SqlValue::Int(7)));
    }

    #[test]
    fn test_mismatched_kinds_rejected() {
        assert!(!SqlType::integer().accepts(&SqlValue::from("7")));
        assert!(!SqlType::text().accepts(&SqlValue::Int(7)));
        assert!(!SqlType::Boolean.accepts(&SqlValue::Int(1)));
        assert!(SqlType::Boolean.accepts(&SqlValue::Null));
    }

    #[test]
    fn test_foreign_key_accepts_inner_type() {
        let fk = SqlType::references("users", "user_id", SqlType::big_integer()).unwrap();
        assert!(fk.accepts(&SqlValue::Int(1 << 40)));
        assert!(!fk.accepts(&SqlValue::from("x")));
    }

    #[test]
    fn test_numeric_accepts_literals() {
        let numeric = SqlType::Numeric(Numeric::new(Some(10), Some(2)).unwrap());
        assert!(numeric.accepts(&SqlValue::from("12.50")));
        assert!(numeric.accepts(&SqlValue::Float(1.5)));
    }

    #[test]
    fn test_array_elements_checked() {
        let array = SqlType::array(SqlType::integer()).unwrap();
        assert!(array.accepts(&SqlValue::array([1, 2, 3])));
        assert!(array.accepts(&SqlValue::array([Some(1), None])));
        assert!(!array.accepts(&SqlValue::array(["a"])));
        assert!(!array.accepts(&SqlValue::Array(vec![SqlValue::array([1])])));
    }

    #[test]
    fn test_array_element_text() {
        assert_eq!(SqlValue::Bytes(vec![0, 255]).to_array_element().as_deref(), Some("\\x00ff"));
        assert_eq!(SqlValue::Null.to_array_element(), None);
        assert_eq!(SqlValue::Bool(true).to_array_element().as_deref(), Some("true"));
    }

    #[test]
    fn test_fields_replace_in_place() {
        let fields = Fields::new().with("a", 1).with("b", 2).with("a", 3);
        let entries: Vec<_> = fields.iter().collect();
        assert_eq!(
            entries,
            vec![("a", &SqlValue::Int(3)), ("b", &SqlValue::Int(2))]
        );
    }

    #[test]
    fn test_option_converts_to_null() {
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some("x")), SqlValue::Text("x".to_string()));
    }

    #[test]
    fn test_list_options() {
        let options = ListOptions::new().sorted_by_desc("messages").with_limit(10);
        assert_eq!(options.order_by().as_deref(), Some("messages"));
        assert_eq!(*options.order(), SortOrder::Descending);
        assert_eq!(*options.limit(), Some(10));
    }
}
