//! Error types for the migration recovery engine
//!
//! The engine reports its primary outcome through result records
//! ([`crate::database::outcome`]); the types here describe *why* a run
//! failed and classify raw store errors into the classes the orchestrator
//! branches on.

pub mod migration;

pub use migration::{classify_ddl_error, DdlErrorClass, MigrationError};
