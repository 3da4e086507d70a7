//! Semantic column types and their PostgreSQL storage names.
//!
//! Every variant renders a canonical storage type through [`SqlType::to_sql`].
//! Configurations that PostgreSQL would reject, or that the query engine cannot
//! bind, fail at construction with a [`SchemaError`].

use guildkeeper_error::{SchemaError, SchemaErrorKind, SchemaResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of an integer column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegerWidth {
    /// SMALLINT / SMALLSERIAL
    Small,
    /// INTEGER / SERIAL
    #[default]
    Regular,
    /// BIGINT / BIGSERIAL
    Big,
}

/// Integer column type.
///
/// # Examples
///
/// ```
/// use guildkeeper_database::Integer;
///
/// assert!(Integer::new(true, true, false).is_err());
/// assert_eq!(Integer::new(true, false, true).unwrap().to_sql(), "BIGSERIAL");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, derive_getters::Getters,
)]
pub struct Integer {
    /// Column width
    width: IntegerWidth,
    /// Whether the column draws from a sequence
    auto_increment: bool,
}

impl Integer {
    /// Build an integer type from flag-style options.
    ///
    /// # Errors
    ///
    /// Fails when both `big` and `small` are requested.
    pub fn new(big: bool, small: bool, auto_increment: bool) -> SchemaResult<Self> {
        let width = match (big, small) {
            (true, true) => {
                return Err(SchemaError::new(SchemaErrorKind::IntegerWidthConflict));
            }
            (true, false) => IntegerWidth::Big,
            (false, true) => IntegerWidth::Small,
            (false, false) => IntegerWidth::Regular,
        };
        Ok(Self {
            width,
            auto_increment,
        })
    }

    /// Plain integer of the given width.
    pub const fn with_width(width: IntegerWidth) -> Self {
        Self {
            width,
            auto_increment: false,
        }
    }

    /// Auto-incrementing integer of the given width.
    pub const fn serial(width: IntegerWidth) -> Self {
        Self {
            width,
            auto_increment: true,
        }
    }

    /// Storage type name.
    pub fn to_sql(&self) -> &'static str {
        match (self.auto_increment, self.width) {
            (true, IntegerWidth::Big) => "BIGSERIAL",
            (true, IntegerWidth::Small) => "SMALLSERIAL",
            (true, IntegerWidth::Regular) => "SERIAL",
            (false, IntegerWidth::Big) => "BIGINT",
            (false, IntegerWidth::Small) => "SMALLINT",
            (false, IntegerWidth::Regular) => "INTEGER",
        }
    }

    /// Value type of the column, ignoring the sequence.
    pub fn value_type(&self) -> &'static str {
        match self.width {
            IntegerWidth::Big => "BIGINT",
            IntegerWidth::Small => "SMALLINT",
            IntegerWidth::Regular => "INTEGER",
        }
    }
}

/// Restriction on the fields stored by an interval column.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::IntoStaticStr,
    strum::EnumIter,
)]
#[strum(ascii_case_insensitive)]
#[serde(try_from = "String", into = "String")]
pub enum IntervalField {
    #[strum(serialize = "YEAR")]
    Year,
    #[strum(serialize = "MONTH")]
    Month,
    #[strum(serialize = "DAY")]
    Day,
    #[strum(serialize = "HOUR")]
    Hour,
    #[strum(serialize = "MINUTE")]
    Minute,
    #[strum(serialize = "SECOND")]
    Second,
    #[strum(serialize = "YEAR TO MONTH")]
    YearToMonth,
    #[strum(serialize = "DAY TO HOUR")]
    DayToHour,
    #[strum(serialize = "DAY TO MINUTE")]
    DayToMinute,
    #[strum(serialize = "DAY TO SECOND")]
    DayToSecond,
    #[strum(serialize = "HOUR TO MINUTE")]
    HourToMinute,
    #[strum(serialize = "HOUR TO SECOND")]
    HourToSecond,
    #[strum(serialize = "MINUTE TO SECOND")]
    MinuteToSecond,
}

impl IntervalField {
    /// Parse a field name such as `"day to second"` (case-insensitive).
    ///
    /// # Errors
    ///
    /// Fails when the name is outside the supported unit set.
    pub fn parse(field: &str) -> SchemaResult<Self> {
        field.trim().parse().map_err(|_| {
            SchemaError::new(SchemaErrorKind::InvalidIntervalField(field.to_string()))
        })
    }

    /// SQL spelling of the field.
    pub fn as_sql(&self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for IntervalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl TryFrom<String> for IntervalField {
    type Error = SchemaError;

    fn try_from(value: String) -> SchemaResult<Self> {
        Self::parse(&value)
    }
}

impl From<IntervalField> for String {
    fn from(field: IntervalField) -> Self {
        field.as_sql().to_string()
    }
}

/// Action taken on referencing rows when the referenced row changes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::IntoStaticStr,
    strum::EnumIter,
)]
#[strum(ascii_case_insensitive)]
#[serde(try_from = "String", into = "String")]
pub enum ReferentialAction {
    #[strum(serialize = "NO ACTION")]
    NoAction,
    #[strum(serialize = "RESTRICT")]
    Restrict,
    #[strum(serialize = "CASCADE")]
    Cascade,
    #[strum(serialize = "SET NULL")]
    SetNull,
    #[strum(serialize = "SET DEFAULT")]
    SetDefault,
}

impl ReferentialAction {
    /// Parse an action such as `"set null"` (case-insensitive).
    ///
    /// # Errors
    ///
    /// Fails when the action is outside the supported set.
    pub fn parse(action: &str) -> SchemaResult<Self> {
        action.trim().parse().map_err(|_| {
            SchemaError::new(SchemaErrorKind::InvalidReferentialAction(action.to_string()))
        })
    }

    /// SQL spelling of the action.
    pub fn as_sql(&self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl TryFrom<String> for ReferentialAction {
    type Error = SchemaError;

    fn try_from(value: String) -> SchemaResult<Self> {
        Self::parse(&value)
    }
}

impl From<ReferentialAction> for String {
    fn from(action: ReferentialAction) -> Self {
        action.as_sql().to_string()
    }
}

/// Arbitrary-precision numeric type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, derive_getters::Getters,
)]
pub struct Numeric {
    /// Total significant digits, if constrained
    precision: Option<u32>,
    /// Digits after the decimal point, if constrained
    scale: Option<u32>,
}

impl Numeric {
    /// Largest precision PostgreSQL accepts.
    pub const MAX_PRECISION: u32 = 1000;

    /// Build a numeric type. Scale defaults to 0 when a precision is given.
    ///
    /// # Errors
    ///
    /// Fails when `precision` exceeds [`Numeric::MAX_PRECISION`].
    pub fn new(precision: Option<u32>, scale: Option<u32>) -> SchemaResult<Self> {
        let scale = match precision {
            Some(p) if p > Self::MAX_PRECISION => {
                return Err(SchemaError::new(SchemaErrorKind::PrecisionOutOfRange(p)));
            }
            Some(_) => Some(scale.unwrap_or(0)),
            None => scale,
        };
        Ok(Self { precision, scale })
    }

    /// Storage type name.
    pub fn to_sql(&self) -> String {
        match self.precision {
            Some(p) => format!("NUMERIC({}, {})", p, self.scale.unwrap_or(0)),
            None => "NUMERIC".to_string(),
        }
    }
}

/// Character string type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, derive_getters::Getters,
)]
pub struct StringType {
    /// Maximum (or fixed) length
    length: Option<u32>,
    /// Whether the string is blank-padded to its length
    fixed: bool,
}

impl StringType {
    /// Build a string type.
    ///
    /// # Errors
    ///
    /// Fails when `fixed` is requested without a length, or the length is zero.
    pub fn new(length: Option<u32>, fixed: bool) -> SchemaResult<Self> {
        match length {
            None if fixed => Err(SchemaError::new(SchemaErrorKind::FixedWithoutLength)),
            Some(0) => Err(SchemaError::new(SchemaErrorKind::ZeroLength)),
            _ => Ok(Self { length, fixed }),
        }
    }

    /// Unbounded TEXT.
    pub const fn unbounded() -> Self {
        Self {
            length: None,
            fixed: false,
        }
    }

    /// Storage type name.
    pub fn to_sql(&self) -> String {
        match (self.length, self.fixed) {
            (None, _) => "TEXT".to_string(),
            (Some(n), true) => format!("CHAR({})", n),
            (Some(n), false) => format!("VARCHAR({})", n),
        }
    }
}

/// Array of a real element type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_getters::Getters)]
pub struct ArrayType {
    /// Element type
    element: Box<SqlType>,
}

impl ArrayType {
    /// Wrap an element type.
    ///
    /// # Errors
    ///
    /// Fails when `element` is not a real type.
    pub fn new(element: SqlType) -> SchemaResult<Self> {
        require_real(&element)?;
        Ok(Self {
            element: Box::new(element),
        })
    }
}

/// Reference to a column of another table.
///
/// # Examples
///
/// ```
/// use guildkeeper_database::{ForeignKey, IntegerWidth, Integer, ReferentialAction, SqlType};
///
/// let fk = ForeignKey::new("guilds", "guild_id")
///     .unwrap()
///     .with_sql_type(SqlType::Integer(Integer::with_width(IntegerWidth::Big)))
///     .unwrap()
///     .on_delete(ReferentialAction::Cascade);
/// assert_eq!(
///     fk.to_sql(),
///     "BIGINT REFERENCES guilds (guild_id) ON DELETE CASCADE ON UPDATE NO ACTION"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_getters::Getters)]
pub struct ForeignKey {
    /// Referenced table
    table: String,
    /// Referenced column
    column: String,
    /// Value type of the referencing column
    sql_type: Box<SqlType>,
    /// ON DELETE action
    #[serde(rename = "on_delete")]
    delete_action: ReferentialAction,
    /// ON UPDATE action
    #[serde(rename = "on_update")]
    update_action: ReferentialAction,
}

impl ForeignKey {
    /// Reference `table.column` with an INTEGER value, cascading deletes.
    ///
    /// # Errors
    ///
    /// Fails when `table` or `column` is empty.
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> SchemaResult<Self> {
        let table = table.into();
        let column = column.into();
        if table.trim().is_empty() {
            return Err(SchemaError::new(SchemaErrorKind::EmptyReference("table")));
        }
        if column.trim().is_empty() {
            return Err(SchemaError::new(SchemaErrorKind::EmptyReference("column")));
        }
        Ok(Self {
            table,
            column,
            sql_type: Box::new(SqlType::Integer(Integer::default())),
            delete_action: ReferentialAction::Cascade,
            update_action: ReferentialAction::NoAction,
        })
    }

    /// Replace the value type of the referencing column.
    ///
    /// # Errors
    ///
    /// Fails when `sql_type` is not a real type.
    pub fn with_sql_type(mut self, sql_type: SqlType) -> SchemaResult<Self> {
        require_real(&sql_type)?;
        self.sql_type = Box::new(sql_type);
        Ok(self)
    }

    /// Set the ON DELETE action.
    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.delete_action = action;
        self
    }

    /// Set the ON UPDATE action.
    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.update_action = action;
        self
    }

    /// Storage type with its REFERENCES clause.
    pub fn to_sql(&self) -> String {
        format!(
            "{} REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
            self.sql_type.to_sql(),
            self.table,
            self.column,
            self.delete_action,
            self.update_action
        )
    }
}

/// Semantic column type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SqlType {
    /// BYTEA
    Binary,
    /// BOOLEAN
    Boolean,
    /// DATE
    Date,
    /// TIMESTAMP, optionally WITH TIME ZONE
    Datetime {
        /// Store with time zone
        timezone: bool,
    },
    /// REAL
    Double,
    /// FLOAT
    Float,
    /// Integer family, including serials
    Integer(Integer),
    /// INTERVAL, optionally restricted to a field range
    Interval {
        /// Field restriction
        field: Option<IntervalField>,
    },
    /// JSONB
    Json,
    /// NUMERIC
    Numeric(Numeric),
    /// TEXT, VARCHAR(n) or CHAR(n)
    String(StringType),
    /// TIME, optionally WITH TIME ZONE
    Time {
        /// Store with time zone
        timezone: bool,
    },
    /// Array of a real type
    Array(ArrayType),
    /// Reference to another table's column
    ForeignKey(ForeignKey),
}

impl SqlType {
    /// INTEGER
    pub const fn integer() -> Self {
        Self::Integer(Integer::with_width(IntegerWidth::Regular))
    }

    /// BIGINT
    pub const fn big_integer() -> Self {
        Self::Integer(Integer::with_width(IntegerWidth::Big))
    }

    /// SMALLINT
    pub const fn small_integer() -> Self {
        Self::Integer(Integer::with_width(IntegerWidth::Small))
    }

    /// SERIAL
    pub const fn serial() -> Self {
        Self::Integer(Integer::serial(IntegerWidth::Regular))
    }

    /// TEXT
    pub const fn text() -> Self {
        Self::String(StringType::unbounded())
    }

    /// VARCHAR(length)
    ///
    /// # Errors
    ///
    /// Fails on a zero length.
    pub fn varchar(length: u32) -> SchemaResult<Self> {
        Ok(Self::String(StringType::new(Some(length), false)?))
    }

    /// TIMESTAMP without time zone
    pub const fn timestamp() -> Self {
        Self::Datetime { timezone: false }
    }

    /// INTERVAL restricted to `field`, parsed case-insensitively.
    ///
    /// # Errors
    ///
    /// Fails when the field is outside the supported unit set.
    pub fn interval(field: Option<&str>) -> SchemaResult<Self> {
        let field = field.map(IntervalField::parse).transpose()?;
        Ok(Self::Interval { field })
    }

    /// Array of `element`.
    ///
    /// # Errors
    ///
    /// Fails when `element` is not a real type.
    pub fn array(element: SqlType) -> SchemaResult<Self> {
        Ok(Self::Array(ArrayType::new(element)?))
    }

    /// Reference to `table.column` holding values of `sql_type`.
    ///
    /// # Errors
    ///
    /// Fails on an empty table or column, or a non-real `sql_type`.
    pub fn references(
        table: impl Into<String>,
        column: impl Into<String>,
        sql_type: SqlType,
    ) -> SchemaResult<Self> {
        Ok(Self::ForeignKey(
            ForeignKey::new(table, column)?.with_sql_type(sql_type)?,
        ))
    }

    /// Canonical storage type used in DDL.
    pub fn to_sql(&self) -> String {
        match self {
            Self::Binary => "BYTEA".to_string(),
            Self::Boolean => "BOOLEAN".to_string(),
            Self::Date => "DATE".to_string(),
            Self::Datetime { timezone: true } => "TIMESTAMP WITH TIME ZONE".to_string(),
            Self::Datetime { timezone: false } => "TIMESTAMP".to_string(),
            Self::Double => "REAL".to_string(),
            Self::Float => "FLOAT".to_string(),
            Self::Integer(integer) => integer.to_sql().to_string(),
            Self::Interval { field: Some(field) } => format!("INTERVAL {}", field),
            Self::Interval { field: None } => "INTERVAL".to_string(),
            Self::Json => "JSONB".to_string(),
            Self::Numeric(numeric) => numeric.to_sql(),
            Self::String(string) => string.to_sql(),
            Self::Time { timezone: true } => "TIME WITH TIME ZONE".to_string(),
            Self::Time { timezone: false } => "TIME".to_string(),
            Self::Array(array) => format!("{} ARRAY", array.element.to_sql()),
            Self::ForeignKey(fk) => fk.to_sql(),
        }
    }

    /// Type a bound parameter is cast to when compared with or written into
    /// a column of this type.
    ///
    /// Serials cast to their plain integer, foreign keys to their value type.
    /// Strings, numerics and intervals cast to their unconstrained form so an
    /// explicit cast never truncates or rounds what the caller supplied.
    pub fn cast_name(&self) -> String {
        match self {
            Self::Integer(integer) => integer.value_type().to_string(),
            Self::String(_) => "TEXT".to_string(),
            Self::Numeric(_) => "NUMERIC".to_string(),
            Self::Interval { .. } => "INTERVAL".to_string(),
            Self::Array(array) => format!("{}[]", array.element.cast_name()),
            Self::ForeignKey(fk) => fk.sql_type.cast_name(),
            other => other.to_sql(),
        }
    }

    /// Whether the type is terminal, i.e. usable inside Array or ForeignKey.
    pub fn is_real(&self) -> bool {
        match self {
            Self::Integer(integer) => !integer.auto_increment,
            Self::Array(_) | Self::ForeignKey(_) => false,
            _ => true,
        }
    }

    /// Type that values written to this column must match.
    pub fn value_type(&self) -> &SqlType {
        match self {
            Self::ForeignKey(fk) => fk.sql_type.value_type(),
            other => other,
        }
    }

    /// Whether values of this type support server-side addition.
    pub fn is_additive(&self) -> bool {
        matches!(
            self.value_type(),
            Self::Integer(_) | Self::Numeric(_) | Self::Double | Self::Float | Self::Interval { .. }
        )
    }

    /// Re-check invariants, e.g. after deserializing a snapshot.
    ///
    /// # Errors
    ///
    /// Returns the first invariant the type violates.
    pub fn validate(&self) -> SchemaResult<()> {
        match self {
            Self::Numeric(numeric) => Numeric::new(numeric.precision, numeric.scale).map(|_| ()),
            Self::String(string) => StringType::new(string.length, string.fixed).map(|_| ()),
            Self::Array(array) => {
                require_real(&array.element)?;
                array.element.validate()
            }
            Self::ForeignKey(fk) => {
                ForeignKey::new(fk.table.as_str(), fk.column.as_str())?;
                require_real(&fk.sql_type)?;
                fk.sql_type.validate()
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

impl From<Integer> for SqlType {
    fn from(integer: Integer) -> Self {
        Self::Integer(integer)
    }
}

impl From<Numeric> for SqlType {
    fn from(numeric: Numeric) -> Self {
        Self::Numeric(numeric)
    }
}

impl From<StringType> for SqlType {
    fn from(string: StringType) -> Self {
        Self::String(string)
    }
}

impl From<ForeignKey> for SqlType {
    fn from(fk: ForeignKey) -> Self {
        Self::ForeignKey(fk)
    }
}

impl From<ArrayType> for SqlType {
    fn from(array: ArrayType) -> Self {
        Self::Array(array)
    }
}

fn require_real(sql_type: &SqlType) -> SchemaResult<()> {
    if sql_type.is_real() {
        Ok(())
    } else {
        Err(SchemaError::new(SchemaErrorKind::NotRealType(
            sql_type.to_sql(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_integer_rendering() {
        assert_eq!(SqlType::integer().to_sql(), "INTEGER");
        assert_eq!(SqlType::big_integer().to_sql(), "BIGINT");
        assert_eq!(SqlType::small_integer().to_sql(), "SMALLINT");
        assert_eq!(SqlType::serial().to_sql(), "SERIAL");
        assert_eq!(
            SqlType::from(Integer::serial(IntegerWidth::Small)).to_sql(),
            "SMALLSERIAL"
        );
    }

    #[test]
    fn test_integer_rejects_big_and_small() {
        for auto_increment in [false, true] {
            let err = Integer::new(true, true, auto_increment).unwrap_err();
            assert_eq!(err.kind, SchemaErrorKind::IntegerWidthConflict);
        }
    }

    #[test]
    fn test_serial_is_not_real() {
        assert!(!SqlType::serial().is_real());
        assert!(SqlType::integer().is_real());
        assert_eq!(SqlType::serial().cast_name(), "INTEGER");
    }

    #[test]
    fn test_numeric_precision_bounds() {
        assert_eq!(Numeric::new(None, None).unwrap().to_sql(), "NUMERIC");
        assert_eq!(Numeric::new(Some(10), None).unwrap().to_sql(), "NUMERIC(10, 0)");
        assert_eq!(Numeric::new(Some(10), Some(2)).unwrap().to_sql(), "NUMERIC(10, 2)");
        assert!(Numeric::new(Some(0), None).is_ok());
        assert!(Numeric::new(Some(1000), None).is_ok());
        for precision in [1001, 5000, u32::MAX] {
            let err = Numeric::new(Some(precision), None).unwrap_err();
            assert_eq!(err.kind, SchemaErrorKind::PrecisionOutOfRange(precision));
        }
    }

    #[test]
    fn test_string_rendering_and_validation() {
        assert_eq!(SqlType::text().to_sql(), "TEXT");
        assert_eq!(StringType::new(Some(20), false).unwrap().to_sql(), "VARCHAR(20)");
        assert_eq!(StringType::new(Some(2), true).unwrap().to_sql(), "CHAR(2)");
        assert_eq!(
            StringType::new(None, true).unwrap_err().kind,
            SchemaErrorKind::FixedWithoutLength
        );
        assert_eq!(
            StringType::new(Some(0), false).unwrap_err().kind,
            SchemaErrorKind::ZeroLength
        );
    }

    #[test]
    fn test_interval_fields() {
        assert_eq!(SqlType::interval(None).unwrap().to_sql(), "INTERVAL");
        assert_eq!(
            SqlType::interval(Some("day to second")).unwrap().to_sql(),
            "INTERVAL DAY TO SECOND"
        );
        for field in IntervalField::iter() {
            assert_eq!(IntervalField::parse(field.as_sql()).unwrap(), field);
        }
        let err = SqlType::interval(Some("fortnight")).unwrap_err();
        assert_eq!(
            err.kind,
            SchemaErrorKind::InvalidIntervalField("fortnight".to_string())
        );
    }

    #[test]
    fn test_foreign_key_rendering() {
        let fk = SqlType::references("users", "user_id", SqlType::big_integer()).unwrap();
        assert_eq!(
            fk.to_sql(),
            "BIGINT REFERENCES users (user_id) ON DELETE CASCADE ON UPDATE NO ACTION"
        );
        assert_eq!(fk.cast_name(), "BIGINT");
        assert!(!fk.is_real());
    }

    #[test]
    fn test_foreign_key_validation() {
        assert_eq!(
            ForeignKey::new("", "id").unwrap_err().kind,
            SchemaErrorKind::EmptyReference("table")
        );
        assert_eq!(
            ForeignKey::new("users", " ").unwrap_err().kind,
            SchemaErrorKind::EmptyReference("column")
        );
        let err = ForeignKey::new("users", "id")
            .unwrap()
            .with_sql_type(SqlType::serial())
            .unwrap_err();
        assert_eq!(err.kind, SchemaErrorKind::NotRealType("SERIAL".to_string()));
    }

    #[test]
    fn test_foreign_key_getters() {
        let fk = ForeignKey::new("guilds", "guild_id")
            .unwrap()
            .on_delete(ReferentialAction::SetNull);
        assert_eq!(fk.table(), "guilds");
        assert_eq!(fk.column(), "guild_id");
        assert_eq!(**fk.sql_type(), SqlType::integer());
        assert_eq!(*fk.delete_action(), ReferentialAction::SetNull);
        assert_eq!(*fk.update_action(), ReferentialAction::NoAction);
    }

    #[test]
    fn test_referential_actions() {
        for action in ReferentialAction::iter() {
            assert_eq!(ReferentialAction::parse(action.as_sql()).unwrap(), action);
        }
        assert_eq!(
            ReferentialAction::parse("set null").unwrap(),
            ReferentialAction::SetNull
        );
        assert_eq!(
            ReferentialAction::parse("DESTROY").unwrap_err().kind,
            SchemaErrorKind::InvalidReferentialAction("DESTROY".to_string())
        );
    }

    #[test]
    fn test_array_requires_real_element() {
        let array = SqlType::array(SqlType::integer()).unwrap();
        assert_eq!(array.to_sql(), "INTEGER ARRAY");
        assert_eq!(array.cast_name(), "INTEGER[]");
        assert!(SqlType::array(array.clone()).is_err());
        assert!(SqlType::array(SqlType::serial()).is_err());
        let fk = SqlType::references("users", "user_id", SqlType::big_integer()).unwrap();
        assert!(SqlType::array(fk).is_err());
    }

    #[test]
    fn test_remaining_storage_names() {
        assert_eq!(SqlType::Binary.to_sql(), "BYTEA");
        assert_eq!(SqlType::Boolean.to_sql(), "BOOLEAN");
        assert_eq!(SqlType::Date.to_sql(), "DATE");
        assert_eq!(SqlType::timestamp().to_sql(), "TIMESTAMP");
        assert_eq!(
            SqlType::Datetime { timezone: true }.to_sql(),
            "TIMESTAMP WITH TIME ZONE"
        );
        assert_eq!(SqlType::Double.to_sql(), "REAL");
        assert_eq!(SqlType::Float.to_sql(), "FLOAT");
        assert_eq!(SqlType::Json.to_sql(), "JSONB");
        assert_eq!(SqlType::Time { timezone: true }.to_sql(), "TIME WITH TIME ZONE");
    }

    #[test]
    fn test_serde_round_trip_keeps_structure() {
        let fk = SqlType::references("guilds", "guild_id", SqlType::big_integer()).unwrap();
        let json = serde_json::to_value(&fk).unwrap();
        assert_eq!(json["type"], "foreign_key");
        assert_eq!(json["on_delete"], "CASCADE");
        let back: SqlType = serde_json::from_value(json).unwrap();
        assert_eq!(back, fk);
    }

    #[test]
    fn test_serde_rejects_invalid_interval() {
        let json = serde_json::json!({"type": "interval", "field": "WEEK"});
        assert!(serde_json::from_value::<SqlType>(json).is_err());
    }
}
