//! CRUD and schema lifecycle on a single connection.

use crate::query::{self, Statement};
use crate::row::JsonRow;
use crate::{
    Assignment, DatabaseError, DatabaseErrorKind, DatabaseResult, Fields, ListOptions,
    MaybeAcquire, Row, SchemaRegistry, SqlValue, Table,
};
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_types::{
    Array, BigInt, Binary, Bool, Date, Double, Jsonb, Nullable, Text, Time, Timestamp,
    Timestamptz,
};
use tracing::{debug, info, instrument};

/// Attach every parameter to a raw statement with its wire type.
///
/// NUMERIC and INTERVAL values travel as text, arrays as `text[]`; the
/// placeholder casts in the statement convert them server-side.
fn bind_params(sql: String, params: Vec<SqlValue>) -> BoxedSqlQuery<'static, Pg, SqlQuery> {
    let mut query = diesel::sql_query(sql).into_boxed::<Pg>();
    for value in params {
        query = match value {
            SqlValue::Null => query.bind::<Nullable<Text>, _>(None::<String>),
            SqlValue::Bool(v) => query.bind::<Bool, _>(v),
            SqlValue::Int(v) => query.bind::<BigInt, _>(v),
            SqlValue::Float(v) => query.bind::<Double, _>(v),
            SqlValue::Text(v) => query.bind::<Text, _>(v),
            SqlValue::Bytes(v) => query.bind::<Binary, _>(v),
            SqlValue::Timestamp(v) => query.bind::<Timestamp, _>(v),
            SqlValue::TimestampTz(v) => query.bind::<Timestamptz, _>(v),
            SqlValue::Date(v) => query.bind::<Date, _>(v),
            SqlValue::Time(v) => query.bind::<Time, _>(v),
            SqlValue::Json(v) => query.bind::<Jsonb, _>(v),
            SqlValue::Array(values) => {
                let elements: Vec<Option<String>> =
                    values.iter().map(SqlValue::to_array_element).collect();
                query.bind::<Array<Nullable<Text>>, _>(elements)
            }
        };
    }
    query
}

fn execute(conn: &mut PgConnection, statement: Statement) -> DatabaseResult<usize> {
    let (sql, params) = statement.into_parts();
    debug!(sql = %sql, params = params.len(), "Executing statement");
    let affected = bind_params(sql, params).execute(conn)?;
    debug!(affected, "Statement complete");
    Ok(affected)
}

fn load(conn: &mut PgConnection, table: &Table, statement: Statement) -> DatabaseResult<Vec<Row>> {
    let (sql, params) = statement.into_parts();
    debug!(sql = %sql, params = params.len(), "Executing query");
    let rows = bind_params(sql, params)
        .load::<JsonRow>(conn)?
        .into_iter()
        .map(|row| Row::from_json_row(row, table))
        .collect::<DatabaseResult<Vec<_>>>()?;
    debug!(count = rows.len(), "Retrieved rows");
    Ok(rows)
}

/// Name the failing table while keeping the driver failure's classification.
fn lifecycle_error(table: &Table, err: diesel::result::Error) -> DatabaseError {
    let cause = DatabaseError::from(err).kind;
    DatabaseError::new(DatabaseErrorKind::Lifecycle {
        table: table.name().to_string(),
        cause: Box::new(cause),
    })
}

fn create_statements(conn: &mut PgConnection, table: &Table, exists_ok: bool) -> DatabaseResult<()> {
    for sql in table.create_table_sql(exists_ok) {
        debug!(sql = %sql, "Executing DDL");
        diesel::sql_query(sql)
            .execute(conn)
            .map_err(|e| lifecycle_error(table, e))?;
    }
    info!(table = %table.name(), "Created table");
    Ok(())
}

fn drop_statement(conn: &mut PgConnection, table: &Table) -> DatabaseResult<()> {
    let sql = table.drop_table_sql();
    debug!(sql = %sql, "Executing DDL");
    diesel::sql_query(sql)
        .execute(conn)
        .map_err(|e| lifecycle_error(table, e))?;
    info!(table = %table.name(), "Dropped table");
    Ok(())
}

/// Registry-aware operations bound to one connection.
///
/// The connection is either supplied by the caller or checked out of the
/// pool; a checked-out connection returns to the pool when the session
/// drops. Tables are addressed by name and must be registered.
pub struct Session<'a> {
    conn: MaybeAcquire<'a>,
    registry: &'a SchemaRegistry,
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("conn", &self.conn)
            .field("tables", &self.registry.len())
            .finish()
    }
}

impl<'a> Session<'a> {
    /// Wrap an acquired connection.
    pub fn new(conn: MaybeAcquire<'a>, registry: &'a SchemaRegistry) -> Self {
        Self { conn, registry }
    }

    /// Underlying connection, for statements outside the registry.
    pub fn connection(&mut self) -> &mut PgConnection {
        &mut self.conn
    }

    /// Registry the session resolves tables against.
    pub fn registry(&self) -> &'a SchemaRegistry {
        self.registry
    }

    fn table(&self, name: &str) -> DatabaseResult<&'a Table> {
        self.registry
            .get(name)
            .map(|table| table.as_ref())
            .ok_or_else(|| DatabaseError::new(DatabaseErrorKind::TableNotRegistered(name.to_string())))
    }

    /// Insert one row.
    ///
    /// # Errors
    ///
    /// Validation failures are reported before anything is sent. A unique or
    /// primary key collision is reported as [`DatabaseErrorKind::Duplicate`].
    #[instrument(skip(self, fields), fields(columns = fields.len()))]
    pub fn insert(&mut self, table: &str, fields: &Fields) -> DatabaseResult<()> {
        let statement = query::insert(self.table(table)?, fields)?;
        execute(&mut self.conn, statement)?;
        Ok(())
    }

    /// Insert one row and read it back, server defaults included.
    ///
    /// # Errors
    ///
    /// See [`insert`](Self::insert).
    #[instrument(skip(self, fields), fields(columns = fields.len()))]
    pub fn insert_returning(&mut self, table: &str, fields: &Fields) -> DatabaseResult<Row> {
        let target = self.table(table)?;
        let statement = query::insert_returning(target, fields)?;
        load(&mut self.conn, target, statement)?.into_iter().next().ok_or_else(|| {
            DatabaseError::new(DatabaseErrorKind::Storage(format!(
                "insert into '{}' returned no row",
                table
            )))
        })
    }

    /// First row matching every filter entry, or `None`.
    ///
    /// # Errors
    ///
    /// Fails on an empty filter, an unknown column, a mistyped value or a
    /// driver failure. No match is not an error.
    #[instrument(skip(self, filter), fields(filter_columns = filter.len()))]
    pub fn get(&mut self, table: &str, filter: &Fields) -> DatabaseResult<Option<Row>> {
        let target = self.table(table)?;
        let statement = query::get(target, filter)?;
        Ok(load(&mut self.conn, target, statement)?.into_iter().next())
    }

    /// Every row matching the filter, ordered and capped per `options`.
    ///
    /// # Errors
    ///
    /// Fails on an undeclared filter or ordering column, a mistyped value or
    /// a driver failure. No match yields an empty vector.
    #[instrument(skip(self, filter, options), fields(filter_columns = filter.len(), limit = ?options.limit()))]
    pub fn get_many(
        &mut self,
        table: &str,
        filter: &Fields,
        options: &ListOptions,
    ) -> DatabaseResult<Vec<Row>> {
        let target = self.table(table)?;
        let statement = query::get_many(target, filter, options)?;
        load(&mut self.conn, target, statement)
    }

    /// Apply `assignments` to every matching row; returns the number of rows
    /// changed.
    ///
    /// # Errors
    ///
    /// Fails on an empty filter or assignment list, an invalid assignment,
    /// a mistyped value, a constraint violation or a driver failure.
    #[instrument(skip(self, filter, assignments), fields(filter_columns = filter.len(), assignments = assignments.len()))]
    pub fn update(
        &mut self,
        table: &str,
        filter: &Fields,
        assignments: &[Assignment],
    ) -> DatabaseResult<usize> {
        let statement = query::update(self.table(table)?, filter, assignments)?;
        execute(&mut self.conn, statement)
    }

    /// Delete every matching row; returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Fails on an empty filter, an unknown column, a mistyped value or a
    /// driver failure. No match is not an error.
    #[instrument(skip(self, filter), fields(filter_columns = filter.len()))]
    pub fn delete(&mut self, table: &str, filter: &Fields) -> DatabaseResult<usize> {
        let statement = query::delete(self.table(table)?, filter)?;
        execute(&mut self.conn, statement)
    }

    /// Create one table and its indexes atomically.
    ///
    /// # Errors
    ///
    /// Fails when the table is not registered, or it exists and `exists_ok`
    /// is false.
    #[instrument(skip(self))]
    pub fn create_table(&mut self, table: &str, exists_ok: bool) -> DatabaseResult<()> {
        let table = self.table(table)?;
        self.conn
            .transaction(|conn| create_statements(conn, table, exists_ok))
    }

    /// Drop one table, cascading to dependents.
    ///
    /// # Errors
    ///
    /// Fails when the table is not registered or the driver fails.
    #[instrument(skip(self))]
    pub fn drop_table(&mut self, table: &str) -> DatabaseResult<()> {
        let table = self.table(table)?;
        drop_statement(&mut self.conn, table)
    }

    /// Create every registered table in registration order, in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// The first failing table aborts and rolls back the whole operation;
    /// the error names that table.
    #[instrument(skip(self), fields(tables = self.registry.len()))]
    pub fn create_all(&mut self, exists_ok: bool) -> DatabaseResult<()> {
        let registry = self.registry;
        self.conn.transaction(|conn| {
            registry
                .tables()
                .iter()
                .try_for_each(|table| create_statements(conn, table, exists_ok))
        })?;
        info!("Created all tables");
        Ok(())
    }

    /// Drop every registered table in reverse registration order, in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// The first failing table aborts and rolls back the whole operation;
    /// the error names that table.
    #[instrument(skip(self), fields(tables = self.registry.len()))]
    pub fn drop_all(&mut self) -> DatabaseResult<()> {
        let registry = self.registry;
        self.conn.transaction(|conn| {
            registry
                .tables()
                .iter()
                .rev()
                .try_for_each(|table| drop_statement(conn, table))
        })?;
        info!("Dropped all tables");
        Ok(())
    }

    /// Drop and recreate every registered table in one transaction.
    ///
    /// # Errors
    ///
    /// See [`drop_all`](Self::drop_all) and [`create_all`](Self::create_all).
    #[instrument(skip(self))]
    pub fn reset(&mut self) -> DatabaseResult<()> {
        self.transaction(|session| {
            session.drop_all()?;
            session.create_all(false)
        })
    }

    /// Run `f` inside a transaction on this session's connection.
    ///
    /// The transaction commits when `f` returns `Ok` and rolls back on `Err`
    /// or panic. Nested calls use savepoints.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, or a driver error from BEGIN/COMMIT.
    pub fn transaction<T, F>(&mut self, f: F) -> DatabaseResult<T>
    where
        F: FnOnce(&mut Session<'_>) -> DatabaseResult<T>,
    {
        let registry = self.registry;
        self.conn.transaction(|conn| {
            let mut inner = Session::new(MaybeAcquire::Borrowed(conn), registry);
            f(&mut inner)
        })
    }
}
