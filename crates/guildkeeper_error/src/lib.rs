//! Error types for the Guildkeeper workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All constructors use `#[track_caller]` for automatic location capture
//!
//! Schema errors are raised while entity definitions are being built.
//! Database errors are raised by calls against a live pool.
//!
//! # Examples
//!
//! ```
//! use guildkeeper_error::{GuildkeeperResult, SchemaError, SchemaErrorKind};
//!
//! fn define() -> GuildkeeperResult<()> {
//!     Err(SchemaError::new(SchemaErrorKind::FixedWithoutLength))?
//! }
//!
//! assert!(define().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
#[cfg(feature = "database")]
mod database;
mod error;
mod retry;
mod schema;

pub use config::ConfigError;
#[cfg(feature = "database")]
pub use database::{DatabaseError, DatabaseErrorKind};
pub use error::{GuildkeeperError, GuildkeeperErrorKind, GuildkeeperResult};
pub use retry::RetryableError;
pub use schema::{SchemaError, SchemaErrorKind, SchemaResult};
