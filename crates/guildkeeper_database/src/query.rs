//! Statement building for CRUD operations.
//!
//! Every caller-supplied value becomes a positional parameter rendered as
//! `$n::<cast>`, where the cast comes from the column's declared type. Only
//! validated identifiers from the schema are interpolated into statement text.
//!
//! Reads project every declared column into one JSON object per row. NUMERIC
//! columns are projected as text so no digits are lost, and BYTEA columns as
//! base64 text, which [`Row`](crate::Row) turns back into bytes.

use crate::{
    AssignOp, Assignment, Column, DatabaseError, DatabaseErrorKind, DatabaseResult, Fields,
    ListOptions, SqlType, SqlValue, Table,
};
use std::collections::HashSet;

/// Statement text plus the values bound to its placeholders, in order.
#[derive(Debug, Clone, PartialEq, derive_getters::Getters)]
pub struct Statement {
    sql: String,
    params: Vec<SqlValue>,
}

impl Statement {
    /// Split into text and parameters.
    pub fn into_parts(self) -> (String, Vec<SqlValue>) {
        (self.sql, self.params)
    }
}

#[derive(Debug, Default)]
struct Binder {
    params: Vec<SqlValue>,
}

impl Binder {
    fn bind(&mut self, value: SqlValue, column: &Column) -> String {
        self.params.push(value);
        format!("${}::{}", self.params.len(), column.sql_type().cast_name())
    }

    fn finish(self, sql: String) -> Statement {
        Statement {
            sql,
            params: self.params,
        }
    }
}

fn lookup<'t>(table: &'t Table, name: &str) -> DatabaseResult<&'t Column> {
    table.column(name).ok_or_else(|| {
        DatabaseError::new(DatabaseErrorKind::UnknownColumn {
            table: table.name().to_string(),
            column: name.to_string(),
        })
    })
}

fn check_type(table: &Table, column: &Column, value: &SqlValue) -> DatabaseResult<()> {
    if column.sql_type().accepts(value) {
        Ok(())
    } else {
        Err(DatabaseError::new(DatabaseErrorKind::TypeMismatch {
            table: table.name().to_string(),
            column: column.name().to_string(),
            expected: column.sql_type().value_type().to_sql(),
            received: value.kind_name().to_string(),
        }))
    }
}

fn check_nullable(table: &Table, column: &Column, value: &SqlValue) -> DatabaseResult<()> {
    if value.is_null() && !*column.nullable() {
        Err(DatabaseError::new(DatabaseErrorKind::NullValue {
            table: table.name().to_string(),
            column: column.name().to_string(),
        }))
    } else {
        Ok(())
    }
}

fn require_filter(table: &Table, filter: &Fields, operation: &str) -> DatabaseResult<()> {
    if filter.is_empty() {
        Err(DatabaseError::new(DatabaseErrorKind::InvalidFilter(format!(
            "{} on '{}' requires at least one filter column",
            operation,
            table.name()
        ))))
    } else {
        Ok(())
    }
}

/// Equality predicate for one filter entry against `qualifier.column`.
fn predicate(
    binder: &mut Binder,
    qualifier: &str,
    name: &str,
    column: &Column,
    value: &SqlValue,
) -> String {
    if value.is_null() {
        format!("{}.{} IS NULL", qualifier, name)
    } else {
        let placeholder = binder.bind(value.clone(), column);
        format!("{}.{} = {}", qualifier, name, placeholder)
    }
}

/// Alias of the per-row projection in read statements.
const ROW_ALIAS: &str = "_row";

/// BYTEA expression as unwrapped base64 text.
fn base64_text(expr: &str) -> String {
    format!("replace(encode({}, 'base64'), chr(10), '')", expr)
}

/// Select-list entry reading one column from `qualifier`.
fn projection(qualifier: &str, column: &Column) -> String {
    let source = format!("{}.{}", qualifier, column.name());
    let expr = match column.sql_type().value_type() {
        SqlType::Numeric(_) => format!("{}::TEXT", source),
        SqlType::Binary => base64_text(&source),
        SqlType::Array(array) => match array.element().value_type() {
            SqlType::Numeric(_) => format!("{}::TEXT[]", source),
            SqlType::Binary => format!(
                "CASE WHEN {s} IS NULL THEN NULL ELSE ARRAY(SELECT {} \
                 FROM unnest({s}) WITH ORDINALITY AS u(e, i) ORDER BY i) END",
                base64_text("e"),
                s = source
            ),
            _ => source,
        },
        _ => source,
    };
    format!("{} AS {}", expr, column.name())
}

/// `SELECT row_to_json(_row) AS json FROM <from> CROSS JOIN LATERAL (...)`,
/// the lateral subquery projecting every column of `table` read through
/// `qualifier`.
fn select_rows(table: &Table, qualifier: &str, from: &str) -> String {
    let columns: Vec<String> = table
        .columns()
        .iter()
        .map(|column| projection(qualifier, column))
        .collect();
    format!(
        "SELECT row_to_json({a}) AS json FROM {} CROSS JOIN LATERAL (SELECT {}) AS {a}",
        from,
        columns.join(", "),
        a = ROW_ALIAS
    )
}

fn where_clause(predicates: &[String]) -> String {
    if predicates.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", predicates.join(" AND "))
    }
}

/// `INSERT INTO t (cols) VALUES (params)`, or `DEFAULT VALUES` with no fields.
///
/// # Errors
///
/// Fails on an unknown column, a value of the wrong type, or null for a
/// non-nullable column.
pub fn insert(table: &Table, fields: &Fields) -> DatabaseResult<Statement> {
    let mut binder = Binder::default();
    let mut names = Vec::with_capacity(fields.len());
    let mut placeholders = Vec::with_capacity(fields.len());
    for (name, value) in fields.iter() {
        let column = lookup(table, name)?;
        check_nullable(table, column, value)?;
        check_type(table, column, value)?;
        names.push(name);
        placeholders.push(binder.bind(value.clone(), column));
    }
    let sql = if names.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", table.name())
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.name(),
            names.join(", "),
            placeholders.join(", ")
        )
    };
    Ok(binder.finish(sql))
}

/// [`insert`] returning the stored row, server defaults included.
///
/// # Errors
///
/// See [`insert`].
pub fn insert_returning(table: &Table, fields: &Fields) -> DatabaseResult<Statement> {
    let (sql, params) = insert(table, fields)?.into_parts();
    Ok(Statement {
        sql: format!(
            "WITH inserted AS ({} RETURNING *) {}",
            sql,
            select_rows(table, "inserted", "inserted")
        ),
        params,
    })
}

/// Single-row lookup.
///
/// A filter on a foreign-key column joins the referenced table and compares
/// against the referenced column.
///
/// # Errors
///
/// Fails on an empty filter, an unknown column or a value of the wrong type.
pub fn get(table: &Table, filter: &Fields) -> DatabaseResult<Statement> {
    require_filter(table, filter, "get")?;
    let mut binder = Binder::default();
    let mut joins = Vec::new();
    let mut joined = HashSet::new();
    let mut predicates = Vec::with_capacity(filter.len());
    for (name, value) in filter.iter() {
        let column = lookup(table, name)?;
        check_type(table, column, value)?;
        let reference = table
            .foreign_keys()
            .find(|(fk_column, _)| fk_column.name() == name)
            .map(|(_, fk)| fk);
        match reference {
            Some(fk) => {
                let alias = format!("ref_{}", name);
                if joined.insert(alias.clone()) {
                    joins.push(format!(
                        " LEFT JOIN {} AS {} ON {}.{} = {}.{}",
                        fk.table(),
                        alias,
                        table.name(),
                        name,
                        alias,
                        fk.column()
                    ));
                }
                predicates.push(predicate(&mut binder, &alias, fk.column(), column, value));
            }
            None => predicates.push(predicate(&mut binder, table.name(), name, column, value)),
        }
    }
    let from = format!("{}{}", table.name(), joins.concat());
    let sql = format!(
        "{}{} LIMIT 1",
        select_rows(table, table.name(), &from),
        where_clause(&predicates)
    );
    Ok(binder.finish(sql))
}

/// Multi-row lookup with optional ordering and row cap.
///
/// # Errors
///
/// Fails on an unknown filter or ordering column, a value of the wrong type,
/// or a negative limit.
pub fn get_many(
    table: &Table,
    filter: &Fields,
    options: &ListOptions,
) -> DatabaseResult<Statement> {
    let mut binder = Binder::default();
    let mut predicates = Vec::with_capacity(filter.len());
    for (name, value) in filter.iter() {
        let column = lookup(table, name).map_err(|_| {
            DatabaseError::new(DatabaseErrorKind::InvalidFilter(format!(
                "table '{}' has no column '{}'",
                table.name(),
                name
            )))
        })?;
        check_type(table, column, value)?;
        predicates.push(predicate(&mut binder, table.name(), name, column, value));
    }
    let mut sql = format!(
        "{}{}",
        select_rows(table, table.name(), table.name()),
        where_clause(&predicates)
    );
    if let Some(order_by) = options.order_by() {
        let column = lookup(table, order_by)?;
        sql.push_str(&format!(
            " ORDER BY {}.{} {}",
            table.name(),
            column.name(),
            options.order()
        ));
    }
    if let Some(limit) = *options.limit() {
        if limit < 0 {
            return Err(DatabaseError::new(DatabaseErrorKind::InvalidFilter(format!(
                "limit must not be negative, got {}",
                limit
            ))));
        }
        binder.params.push(SqlValue::Int(limit));
        sql.push_str(&format!(" LIMIT ${}::BIGINT", binder.params.len()));
    }
    Ok(binder.finish(sql))
}

/// `UPDATE t SET ... WHERE ...` from structured assignments.
///
/// Increments treat a null column as zero of the column's own type, so
/// interval columns add to `'0'::INTERVAL`.
///
/// # Errors
///
/// Fails on an empty filter or assignment list, a column assigned twice, an
/// increment on a non-additive column or by null, an unknown column, a
/// value of the wrong type, or null for a non-nullable column.
pub fn update(
    table: &Table,
    filter: &Fields,
    assignments: &[Assignment],
) -> DatabaseResult<Statement> {
    require_filter(table, filter, "update")?;
    if assignments.is_empty() {
        return Err(DatabaseError::new(DatabaseErrorKind::InvalidAssignment(
            format!("update on '{}' requires at least one assignment", table.name()),
        )));
    }
    let mut binder = Binder::default();
    let mut assigned = HashSet::new();
    let mut sets = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        let name = assignment.column().as_str();
        let column = lookup(table, name)?;
        let value = assignment.value();
        if !assigned.insert(name) {
            return Err(DatabaseError::new(DatabaseErrorKind::InvalidAssignment(
                format!("column '{}' assigned more than once", name),
            )));
        }
        check_type(table, column, value)?;
        match assignment.op() {
            AssignOp::Replace => {
                check_nullable(table, column, value)?;
                let placeholder = binder.bind(value.clone(), column);
                sets.push(format!("{} = {}", name, placeholder));
            }
            AssignOp::Increment => {
                if !column.sql_type().is_additive() {
                    return Err(DatabaseError::new(DatabaseErrorKind::InvalidAssignment(
                        format!(
                            "cannot increment column '{}' of type {}",
                            name,
                            column.sql_type().value_type()
                        ),
                    )));
                }
                if value.is_null() {
                    return Err(DatabaseError::new(DatabaseErrorKind::InvalidAssignment(
                        format!("cannot increment column '{}' by null", name),
                    )));
                }
                let cast = column.sql_type().cast_name();
                let placeholder = binder.bind(value.clone(), column);
                sets.push(format!(
                    "{n} = COALESCE({n}, '0'::{}) + {}",
                    cast,
                    placeholder,
                    n = name
                ));
            }
        }
    }
    let mut predicates = Vec::with_capacity(filter.len());
    for (name, value) in filter.iter() {
        let column = lookup(table, name)?;
        check_type(table, column, value)?;
        predicates.push(predicate(&mut binder, table.name(), name, column, value));
    }
    let sql = format!(
        "UPDATE {} SET {}{}",
        table.name(),
        sets.join(", "),
        where_clause(&predicates)
    );
    Ok(binder.finish(sql))
}

/// `DELETE FROM t WHERE ...`
///
/// # Errors
///
/// Fails on an empty filter, an unknown column or a value of the wrong type.
pub fn delete(table: &Table, filter: &Fields) -> DatabaseResult<Statement> {
    require_filter(table, filter, "delete")?;
    let mut binder = Binder::default();
    let mut predicates = Vec::with_capacity(filter.len());
    for (name, value) in filter.iter() {
        let column = lookup(table, name)?;
        check_type(table, column, value)?;
        predicates.push(predicate(&mut binder, table.name(), name, column, value));
    }
    let sql = format!("DELETE FROM {}{}", table.name(), where_clause(&predicates));
    Ok(binder.finish(sql))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Numeric;
    use chrono::NaiveDate;

    fn users() -> Table {
        Table::builder("users")
            .column(
                Column::builder("user_id", SqlType::integer())
                    .primary_key(true)
                    .build()
                    .unwrap(),
            )
            .column(Column::new("created_at", SqlType::timestamp()).unwrap())
            .build()
            .unwrap()
    }

    fn profiles() -> Table {
        Table::builder("user_profiles")
            .column(Column::serial_primary_key("id").unwrap())
            .column(
                Column::new(
                    "user_id",
                    SqlType::references("users", "user_id", SqlType::big_integer()).unwrap(),
                )
                .unwrap(),
            )
            .column(
                Column::builder("coins", SqlType::integer())
                    .nullable(false)
                    .default_value(0_i64)
                    .build()
                    .unwrap(),
            )
            .column(Column::new("nickname", SqlType::text()).unwrap())
            .column(Column::new("joined_at", SqlType::timestamp()).unwrap())
            .build()
            .unwrap()
    }

    fn kind(err: DatabaseError) -> DatabaseErrorKind {
        err.kind
    }

    #[test]
    fn test_insert_binds_every_value() {
        let t0 = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let statement = insert(
            &users(),
            &Fields::new().with("user_id", 1).with("created_at", t0),
        )
        .unwrap();
        assert_eq!(
            statement.sql(),
            "INSERT INTO users (user_id, created_at) VALUES ($1::INTEGER, $2::TIMESTAMP)"
        );
        assert_eq!(
            statement.params(),
            &vec![SqlValue::Int(1), SqlValue::Timestamp(t0)]
        );
    }

    #[test]
    fn test_insert_hostile_text_is_bound() {
        let statement = insert(
            &profiles(),
            &Fields::new().with("nickname", "'); DROP TABLE users; --"),
        )
        .unwrap();
        assert!(!statement.sql().contains("DROP"));
        assert_eq!(statement.params().len(), 1);
    }

    #[test]
    fn test_insert_default_values() {
        let statement = insert(&profiles(), &Fields::new()).unwrap();
        assert_eq!(statement.sql(), "INSERT INTO user_profiles DEFAULT VALUES");
        assert!(statement.params().is_empty());
    }

    #[test]
    fn test_insert_returning() {
        let statement = insert_returning(&users(), &Fields::new().with("user_id", 3)).unwrap();
        assert_eq!(
            statement.sql(),
            "WITH inserted AS (INSERT INTO users (user_id) VALUES ($1::INTEGER) RETURNING *) \
             SELECT row_to_json(_row) AS json FROM inserted CROSS JOIN LATERAL \
             (SELECT inserted.user_id AS user_id, inserted.created_at AS created_at) AS _row"
        );
    }

    #[test]
    fn test_insert_rejects_null_for_non_nullable() {
        let err = insert(&profiles(), &Fields::new().with("coins", SqlValue::Null)).unwrap_err();
        assert_eq!(
            kind(err),
            DatabaseErrorKind::NullValue {
                table: "user_profiles".to_string(),
                column: "coins".to_string()
            }
        );
    }

    #[test]
    fn test_insert_rejects_unknown_column_and_wrong_type() {
        let err = insert(&users(), &Fields::new().with("email", "x")).unwrap_err();
        assert!(matches!(kind(err), DatabaseErrorKind::UnknownColumn { .. }));
        let err = insert(&users(), &Fields::new().with("user_id", "1")).unwrap_err();
        assert!(matches!(kind(err), DatabaseErrorKind::TypeMismatch { .. }));
    }

    #[test]
    fn test_get_plain_filter() {
        let statement = get(&users(), &Fields::new().with("user_id", 1)).unwrap();
        assert_eq!(
            statement.sql(),
            "SELECT row_to_json(_row) AS json FROM users CROSS JOIN LATERAL \
             (SELECT users.user_id AS user_id, users.created_at AS created_at) AS _row \
             WHERE users.user_id = $1::INTEGER LIMIT 1"
        );
    }

    #[test]
    fn test_get_joins_foreign_key() {
        let statement = get(
            &profiles(),
            &Fields::new().with("user_id", 10_i64).with("coins", 5),
        )
        .unwrap();
        assert!(statement.sql().starts_with(
            "SELECT row_to_json(_row) AS json FROM user_profiles \
             LEFT JOIN users AS ref_user_id ON user_profiles.user_id = ref_user_id.user_id \
             CROSS JOIN LATERAL (SELECT user_profiles.id AS id, "
        ));
        assert!(statement.sql().ends_with(
            " AS _row WHERE ref_user_id.user_id = $1::BIGINT AND user_profiles.coins = $2::INTEGER LIMIT 1"
        ));
        assert_eq!(statement.params().len(), 2);
    }

    #[test]
    fn test_get_null_filter_uses_is_null() {
        let statement = get(&profiles(), &Fields::new().with("nickname", None::<String>)).unwrap();
        assert!(statement.sql().contains("user_profiles.nickname IS NULL"));
        assert!(statement.params().is_empty());
    }

    #[test]
    fn test_get_requires_filter() {
        let err = get(&users(), &Fields::new()).unwrap_err();
        assert!(matches!(kind(err), DatabaseErrorKind::InvalidFilter(_)));
    }

    #[test]
    fn test_get_many_order_and_limit() {
        let options = ListOptions::new().sorted_by_desc("coins").with_limit(5);
        let statement = get_many(&profiles(), &Fields::new().with("user_id", 1_i64), &options)
            .unwrap();
        assert!(statement.sql().ends_with(
            " AS _row WHERE user_profiles.user_id = $1::BIGINT \
             ORDER BY user_profiles.coins DESC LIMIT $2::BIGINT"
        ));
        assert_eq!(statement.params(), &vec![SqlValue::Int(1), SqlValue::Int(5)]);
    }

    #[test]
    fn test_get_many_without_filter() {
        let statement = get_many(&users(), &Fields::new(), &ListOptions::new()).unwrap();
        assert_eq!(
            statement.sql(),
            "SELECT row_to_json(_row) AS json FROM users CROSS JOIN LATERAL \
             (SELECT users.user_id AS user_id, users.created_at AS created_at) AS _row"
        );
    }

    #[test]
    fn test_get_many_rejects_undeclared_filter() {
        let err = get_many(&users(), &Fields::new().with("guild_id", 1), &ListOptions::new())
            .unwrap_err();
        assert!(matches!(kind(err), DatabaseErrorKind::InvalidFilter(_)));
    }

    #[test]
    fn test_get_many_rejects_unknown_order_and_negative_limit() {
        let err = get_many(&users(), &Fields::new(), &ListOptions::new().sorted_by("nope"))
            .unwrap_err();
        assert!(matches!(kind(err), DatabaseErrorKind::UnknownColumn { .. }));
        let err = get_many(&users(), &Fields::new(), &ListOptions::new().with_limit(-1))
            .unwrap_err();
        assert!(matches!(kind(err), DatabaseErrorKind::InvalidFilter(_)));
    }

    #[test]
    fn test_update_structured_assignments() {
        let statement = update(
            &profiles(),
            &Fields::new().with("id", 7),
            &[
                Assignment::increment("coins", 5),
                Assignment::set("nickname", "bob"),
            ],
        )
        .unwrap();
        assert_eq!(
            statement.sql(),
            "UPDATE user_profiles SET coins = COALESCE(coins, '0'::INTEGER) + $1::INTEGER, nickname = $2::TEXT \
             WHERE user_profiles.id = $3::INTEGER"
        );
        assert_eq!(
            statement.params(),
            &vec![
                SqlValue::Int(5),
                SqlValue::Text("bob".to_string()),
                SqlValue::Int(7)
            ]
        );
    }

    fn ledger() -> Table {
        Table::builder("ledger")
            .column(Column::serial_primary_key("id").unwrap())
            .column(Column::new("played", SqlType::interval(None).unwrap()).unwrap())
            .column(
                Column::new("balance", SqlType::Numeric(Numeric::new(Some(30), Some(10)).unwrap()))
                    .unwrap(),
            )
            .column(Column::new("avatar", SqlType::Binary).unwrap())
            .column(Column::new("thumbs", SqlType::array(SqlType::Binary).unwrap()).unwrap())
            .column(Column::new("rates", SqlType::array(SqlType::Numeric(Numeric::default())).unwrap()).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn test_increment_zero_matches_column_type() {
        let statement = update(
            &ledger(),
            &Fields::new().with("id", 1),
            &[
                Assignment::increment("played", "1 hour"),
                Assignment::increment("balance", "0.5"),
            ],
        )
        .unwrap();
        assert_eq!(
            statement.sql(),
            "UPDATE ledger SET played = COALESCE(played, '0'::INTERVAL) + $1::INTERVAL, \
             balance = COALESCE(balance, '0'::NUMERIC) + $2::NUMERIC \
             WHERE ledger.id = $3::INTEGER"
        );
    }

    #[test]
    fn test_numeric_and_bytes_are_projected_as_text() {
        let statement = get(&ledger(), &Fields::new().with("id", 1)).unwrap();
        let sql = statement.sql();
        assert!(sql.contains("ledger.played AS played"));
        assert!(sql.contains("ledger.balance::TEXT AS balance"));
        assert!(sql.contains("replace(encode(ledger.avatar, 'base64'), chr(10), '') AS avatar"));
        assert!(sql.contains(
            "CASE WHEN ledger.thumbs IS NULL THEN NULL ELSE ARRAY(SELECT \
             replace(encode(e, 'base64'), chr(10), '') \
             FROM unnest(ledger.thumbs) WITH ORDINALITY AS u(e, i) ORDER BY i) END AS thumbs"
        ));
        assert!(sql.contains("ledger.rates::TEXT[] AS rates"));
    }

    #[test]
    fn test_update_rejections() {
        let table = profiles();
        let filter = Fields::new().with("id", 1);
        let err = update(&table, &filter, &[]).unwrap_err();
        assert!(matches!(kind(err), DatabaseErrorKind::InvalidAssignment(_)));

        let err = update(&table, &filter, &[Assignment::increment("nickname", "x")]).unwrap_err();
        assert!(matches!(kind(err), DatabaseErrorKind::InvalidAssignment(_)));

        let err = update(&table, &filter, &[Assignment::increment("coins", SqlValue::Null)])
            .unwrap_err();
        assert!(matches!(kind(err), DatabaseErrorKind::InvalidAssignment(_)));

        let err = update(
            &table,
            &filter,
            &[Assignment::set("coins", 1), Assignment::increment("coins", 1)],
        )
        .unwrap_err();
        assert!(matches!(kind(err), DatabaseErrorKind::InvalidAssignment(_)));

        let err = update(&table, &filter, &[Assignment::set("coins", SqlValue::Null)]).unwrap_err();
        assert!(matches!(kind(err), DatabaseErrorKind::NullValue { .. }));

        let err = update(&table, &Fields::new(), &[Assignment::set("coins", 1)]).unwrap_err();
        assert!(matches!(kind(err), DatabaseErrorKind::InvalidFilter(_)));
    }

    #[test]
    fn test_delete() {
        let statement = delete(&users(), &Fields::new().with("user_id", 1)).unwrap();
        assert_eq!(
            statement.sql(),
            "DELETE FROM users WHERE users.user_id = $1::INTEGER"
        );
        let err = delete(&users(), &Fields::new()).unwrap_err();
        assert!(matches!(kind(err), DatabaseErrorKind::InvalidFilter(_)));
    }
}
