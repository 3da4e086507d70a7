//! Async entry point over the pool and registry.

use crate::{
    Assignment, DatabaseConfig, DatabaseError, DatabaseErrorKind, DatabaseResult, Fields,
    ListOptions, MaybeAcquire, PgPool, Row, SchemaRegistry, Session,
};
use diesel::pg::PgConnection;
use std::sync::Arc;
use tracing::{info, instrument};

/// Pool plus the read-only schema registry, cheap to clone.
///
/// Async methods run their blocking work on tokio's blocking pool, one
/// pooled connection per call. Dropping the returned future does not stop
/// the blocking work, but its connection is still returned to the pool when
/// that work finishes.
///
/// # Examples
///
/// ```rust,ignore
/// use guildkeeper_database::{catalog, Database, DatabaseConfig, Fields};
///
/// let db = Database::connect(DatabaseConfig::from_env()?, catalog()?).await?;
/// db.create_all(true).await?;
/// db.insert("users", Fields::new().with("user_id", 42_i64)).await?;
/// let user = db.get("users", Fields::new().with("user_id", 42_i64)).await?;
/// ```
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    registry: Arc<SchemaRegistry>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.pool.state();
        f.debug_struct("Database")
            .field("connections", &state.connections)
            .field("idle_connections", &state.idle_connections)
            .field("tables", &self.registry.len())
            .finish()
    }
}

fn task_error(err: tokio::task::JoinError) -> DatabaseError {
    DatabaseError::new(DatabaseErrorKind::Task(err.to_string()))
}

impl Database {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool, registry: SchemaRegistry) -> Self {
        Self {
            pool,
            registry: Arc::new(registry),
        }
    }

    /// Build the pool from `config` and wrap it.
    ///
    /// # Errors
    ///
    /// Fails when the pool cannot open a connection.
    #[instrument(skip_all, fields(tables = registry.len()))]
    pub async fn connect(config: DatabaseConfig, registry: SchemaRegistry) -> DatabaseResult<Self> {
        let pool = tokio::task::spawn_blocking(move || config.create_pool())
            .await
            .map_err(task_error)??;
        info!("Database ready");
        Ok(Self::new(pool, registry))
    }

    /// Connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Schema registry.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Blocking session on `connection`, or on a pooled connection when
    /// `None`.
    ///
    /// # Errors
    ///
    /// Fails when no pooled connection is available in time.
    pub fn session<'a>(&'a self, connection: Option<&'a mut PgConnection>) -> DatabaseResult<Session<'a>> {
        let conn = MaybeAcquire::acquire(connection, &self.pool)?;
        Ok(Session::new(conn, &self.registry))
    }

    /// Run `f` with a session on one pooled connection, off the async runtime.
    ///
    /// # Errors
    ///
    /// Returns the error from `f`, a checkout failure, or
    /// [`DatabaseErrorKind::Task`] when the blocking worker panics.
    pub async fn with_session<T, F>(&self, f: F) -> DatabaseResult<T>
    where
        F: FnOnce(&mut Session<'_>) -> DatabaseResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut session = db.session(None)?;
            f(&mut session)
        })
        .await
        .map_err(task_error)?
    }

    /// Run `f` inside one transaction on one pooled connection.
    ///
    /// # Errors
    ///
    /// See [`with_session`](Self::with_session); the transaction rolls back
    /// on any error.
    pub async fn transaction<T, F>(&self, f: F) -> DatabaseResult<T>
    where
        F: FnOnce(&mut Session<'_>) -> DatabaseResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.with_session(move |session| session.transaction(f)).await
    }

    /// Async [`Session::insert`].
    ///
    /// # Errors
    ///
    /// See [`Session::insert`].
    pub async fn insert(&self, table: &str, fields: Fields) -> DatabaseResult<()> {
        let table = table.to_string();
        self.with_session(move |s| s.insert(&table, &fields)).await
    }

    /// Async [`Session::insert_returning`].
    ///
    /// # Errors
    ///
    /// See [`Session::insert_returning`].
    pub async fn insert_returning(&self, table: &str, fields: Fields) -> DatabaseResult<Row> {
        let table = table.to_string();
        self.with_session(move |s| s.insert_returning(&table, &fields))
            .await
    }

    /// Async [`Session::get`].
    ///
    /// # Errors
    ///
    /// See [`Session::get`].
    pub async fn get(&self, table: &str, filter: Fields) -> DatabaseResult<Option<Row>> {
        let table = table.to_string();
        self.with_session(move |s| s.get(&table, &filter)).await
    }

    /// Async [`Session::get_many`].
    ///
    /// # Errors
    ///
    /// See [`Session::get_many`].
    pub async fn get_many(
        &self,
        table: &str,
        filter: Fields,
        options: ListOptions,
    ) -> DatabaseResult<Vec<Row>> {
        let table = table.to_string();
        self.with_session(move |s| s.get_many(&table, &filter, &options))
            .await
    }

    /// Async [`Session::update`].
    ///
    /// # Errors
    ///
    /// See [`Session::update`].
    pub async fn update(
        &self,
        table: &str,
        filter: Fields,
        assignments: Vec<Assignment>,
    ) -> DatabaseResult<usize> {
        let table = table.to_string();
        self.with_session(move |s| s.update(&table, &filter, &assignments))
            .await
    }

    /// Async [`Session::delete`].
    ///
    /// # Errors
    ///
    /// See [`Session::delete`].
    pub async fn delete(&self, table: &str, filter: Fields) -> DatabaseResult<usize> {
        let table = table.to_string();
        self.with_session(move |s| s.delete(&table, &filter)).await
    }

    /// Async [`Session::create_all`].
    ///
    /// # Errors
    ///
    /// See [`Session::create_all`].
    pub async fn create_all(&self, exists_ok: bool) -> DatabaseResult<()> {
        self.with_session(move |s| s.create_all(exists_ok)).await
    }

    /// Async [`Session::drop_all`].
    ///
    /// # Errors
    ///
    /// See [`Session::drop_all`].
    pub async fn drop_all(&self) -> DatabaseResult<()> {
        self.with_session(|s| s.drop_all()).await
    }

    /// Async [`Session::reset`].
    ///
    /// # Errors
    ///
    /// See [`Session::reset`].
    pub async fn reset(&self) -> DatabaseResult<()> {
        self.with_session(|s| s.reset()).await
    }
}
