//! Migration engine errors and store-error classification
//!
//! # Examples
//!
//! ```rust
//! use tidecms::errors::{classify_ddl_error, DdlErrorClass};
//! use sea_orm::DbErr;
//!
//! let err = DbErr::Custom("table \"sites\" already exists".to_string());
//! assert_eq!(classify_ddl_error(&err), DdlErrorClass::AlreadyExists);
//! ```

use sea_orm::DbErr;
use thiserror::Error;

/// Errors produced by the migration orchestrator and drift resolver
#[derive(Error, Debug)]
pub enum MigrationError {
    /// Database unreachable with the configured connection string
    #[error("Cannot reach the database: {0}")]
    Connection(String),

    /// Database does not exist and automatic creation failed or is unsupported
    #[error("Database does not exist and could not be created: {0}")]
    DatabaseCreation(String),

    /// Schema drift was detected but none of the pending migrations could be
    /// reconciled against the live table inventory
    #[error("Schema drift could not be reconciled: {0}")]
    UnresolvedDrift(#[source] DbErr),

    /// A migration referenced database objects that do not exist
    #[error("Database is missing baseline objects: {0}")]
    MissingBaseline(#[source] DbErr),

    /// Failed to serialise concurrent migration runs
    #[error("Could not acquire the migration lock: {0}")]
    Lock(#[source] DbErr),

    /// Any other database error
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Classification of a DDL failure reported by the store.
///
/// The underlying drivers surface schema errors as message text rather than
/// typed variants, so classification matches the wording each backend uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlErrorClass {
    /// "object already exists" class: the DDL this migration would emit has
    /// already executed outside the normal migration path
    AlreadyExists,
    /// "object not found" class: the migration assumes baseline objects that
    /// are not present
    MissingObject,
    /// Anything else
    Other,
}

// SQLite: `table "x" already exists`, `index x already exists`
// Postgres: `relation "x" already exists` (SQLSTATE 42P07)
// MySQL: `Table 'x' already exists`, `Duplicate column name`
const ALREADY_EXISTS_MARKERS: &[&str] = &[
    "already exists",
    "duplicate table",
    "duplicate column",
    "duplicate key name",
    "42p07",
];

// SQLite: `no such table: x`, `no such column: x`
// Postgres: `relation "x" does not exist` (SQLSTATE 42P01)
// MySQL: `Table 'db.x' doesn't exist`, `Unknown table`
const MISSING_OBJECT_MARKERS: &[&str] = &[
    "no such table",
    "no such column",
    "no such index",
    "does not exist",
    "doesn't exist",
    "unknown table",
    "invalid object name",
    "42p01",
];

/// Classify a store error into the classes the orchestrator branches on.
pub fn classify_ddl_error(err: &DbErr) -> DdlErrorClass {
    let message = err.to_string().to_lowercase();

    if ALREADY_EXISTS_MARKERS.iter().any(|m| message.contains(m)) {
        DdlErrorClass::AlreadyExists
    } else if MISSING_OBJECT_MARKERS.iter().any(|m| message.contains(m)) {
        DdlErrorClass::MissingObject
    } else {
        DdlErrorClass::Other
    }
}
