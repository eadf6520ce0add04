//! Startup validator
//!
//! Read-only check run once at process start, after migration: confirms the
//! critical identity and CMS tables actually exist before user seeding and
//! request handling are allowed to assume them. The validator never repairs
//! anything (that is the orchestrator's job, which ran earlier) and never
//! returns `Err`: the host inspects the [`ValidationResult`] and decides
//! whether to abort startup or continue degraded (e.g. under an in-memory
//! test configuration).

use sea_orm::DatabaseConnection;
use tracing::{debug, error};

use crate::database::connection::establish_connection;
use crate::database::outcome::ValidationResult;
use crate::database::{schema, CORE_TABLES, IDENTITY_TABLES};

pub struct StartupValidator {
    db: DatabaseConnection,
}

impl StartupValidator {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Connect and validate in one step, folding connection failures into
    /// the result the same way every other failure is.
    pub async fn validate_at(database_url: &str) -> ValidationResult {
        match establish_connection(database_url).await {
            Ok(db) => Self::new(db).validate_database().await,
            Err(err) => connection_failure(err),
        }
    }

    /// Verify the critical tables exist. Always returns a result; every
    /// failure mode (unreachable database, missing tables, unexpected query
    /// errors) is reported, never raised.
    pub async fn validate_database(&self) -> ValidationResult {
        if let Err(err) = self.db.ping().await {
            return connection_failure(err);
        }

        if let Some(result) = self.check_tables("identity", IDENTITY_TABLES).await {
            return result;
        }
        if let Some(result) = self.check_tables("core CMS", CORE_TABLES).await {
            return result;
        }

        debug!("All critical tables present");
        ValidationResult::valid()
    }

    async fn check_tables(&self, kind: &str, tables: &[&str]) -> Option<ValidationResult> {
        let mut missing = Vec::new();
        for table in tables {
            if !schema::table_exists(&self.db, table).await {
                missing.push(*table);
            }
        }

        if missing.is_empty() {
            return None;
        }

        error!(tables = ?missing, "Missing {} tables", kind);
        Some(ValidationResult::invalid(
            format!(
                "The {} tables are missing: {}. The database schema has not been migrated, \
                 or the connection string points at the wrong database.",
                kind,
                missing.join(", ")
            ),
            remediation_commands(),
        ))
    }
}

fn connection_failure(err: impl std::fmt::Display) -> ValidationResult {
    ValidationResult::invalid(
        format!("Cannot reach the database: {err}"),
        "Check the configured connection string (--database flag or TIDECMS_DATABASE) \
         and that the database file or server is accessible.",
    )
}

/// Operator remediation steps, ready to paste into a shell.
pub fn remediation_commands() -> String {
    "Apply the database migrations, then restart the application:\n\
     \n\
     \x20 tidecms db migrate --database <path-to-database>\n\
     \n\
     or with the standard migration tool:\n\
     \n\
     \x20 sea-orm-cli migrate up -u 'sqlite://<path-to-database>?mode=rwc'"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remediation_commands_are_copy_pasteable() {
        let commands = remediation_commands();
        assert!(commands.contains("tidecms db migrate"));
        assert!(commands.contains("sea-orm-cli migrate up"));
    }
}
