pub mod connection;
pub mod entities;
pub mod history;
pub mod lock;
pub mod migrations;
pub mod outcome;
pub mod recovery;
pub mod schema;

#[cfg(test)]
pub mod test_utils;

pub use outcome::{MigrationResult, ValidationResult};

/// Tables holding accounts and role assignments. Their absence blocks
/// application startup: identity seeding and sign-in run directly after
/// validation and assume these exist.
pub const IDENTITY_TABLES: &[&str] = &["users", "roles", "user_roles"];

/// Core CMS tables every request path touches.
pub const CORE_TABLES: &[&str] = &["sites", "modules", "pages"];
