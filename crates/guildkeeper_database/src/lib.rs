//! Schema-driven PostgreSQL persistence for Guildkeeper.
//!
//! Tables are declared at runtime as [`Table`] values made of typed
//! [`Column`]s and collected in a [`SchemaRegistry`]. A [`Database`] pairs a
//! connection pool with a registry and offers create, read, update and
//! delete operations addressed by table name, with every value checked
//! against the declared column type before any SQL is sent.
//!
//! # Features
//!
//! - Portable column types rendered to PostgreSQL DDL
//! - Foreign keys with join-through lookups
//! - Scoped connections: borrow a caller's connection or check one out
//! - Atomic create and drop of the whole schema
//! - Schema snapshots and diffs
//! - The community entity catalog with a typed repository
//!
//! # Example
//!
//! ```rust,ignore
//! use guildkeeper_database::{catalog, Database, DatabaseConfig, Fields, USERS};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect(DatabaseConfig::from_env()?, catalog()?).await?;
//! db.create_all(true).await?;
//! db.insert(USERS, Fields::new().with("user_id", 42_i64)).await?;
//! let user = db.get(USERS, Fields::new().with("user_id", 42_i64)).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod column;
mod community;
mod connection;
mod database;
mod models;
mod registry;
mod row;
mod session;
mod snapshot;
mod sql_type;
mod table;
mod value;

/// SQL statement rendering, usable without a connection.
pub mod query;

pub use column::{Column, ColumnBuilder, ColumnDefault};
pub use community::{
    CommunityRepository, GuildSeed, MemberSeed, NewInvite, VOICE_COIN_CAP_MINUTES, VoiceOutcome,
};
pub use connection::{DatabaseConfig, MaybeAcquire, PgPool, PooledPgConnection};
pub use database::Database;
pub use models::{
    CHANNELS, ChannelRow, GUILDS, GuildRow, INVITES, InviteRow, PERMISSIONS, PermissionRow,
    ProfileRow, ROLES, RoleRow, USER_COUNT_NAMES, USER_PROFILES, USER_ROLES, USERS,
    UserCountNameRow, UserRoleRow, UserRow, catalog, channels_table, guilds_table, invites_table,
    permissions_table, roles_table, user_count_names_table, user_profiles_table, user_roles_table,
    users_table,
};
pub use query::Statement;
pub use registry::SchemaRegistry;
pub use row::Row;
pub use session::Session;
pub use snapshot::{SNAPSHOT_VERSION, SchemaChange, SchemaSnapshot, diff_tables};
pub use sql_type::{
    ArrayType, ForeignKey, Integer, IntegerWidth, IntervalField, Numeric, ReferentialAction,
    SqlType, StringType,
};
pub use table::{Table, TableBuilder, validate_identifier};
pub use value::{AssignOp, Assignment, Fields, ListOptions, SortOrder, SqlValue};

pub use guildkeeper_error::{
    DatabaseError, DatabaseErrorKind, SchemaError, SchemaErrorKind, SchemaResult,
};

/// Result type for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;
