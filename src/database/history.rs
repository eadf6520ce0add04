//! Migration history ledger
//!
//! Thin wrapper over the `seaql_migrations` table the native runner keeps.
//! The drift resolver writes synthetic "already applied" rows here so the
//! runner skips DDL that already executed out of band. Rows are only ever
//! inserted; rollback and deletion are out of scope.

use std::collections::HashSet;

use chrono::Utc;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement};
use tracing::{debug, warn};

/// Migration identifiers recorded as applied.
///
/// An empty set is the expected state before the very first migration, when
/// the ledger table itself does not exist yet; read failures therefore
/// degrade to empty rather than erroring.
pub async fn list_applied(db: &DatabaseConnection) -> HashSet<String> {
    let backend = db.get_database_backend();
    let stmt = Statement::from_string(
        backend,
        "SELECT version FROM seaql_migrations".to_owned(),
    );

    match db.query_all(stmt).await {
        Ok(rows) => rows
            .iter()
            .filter_map(|row| row.try_get::<String>("", "version").ok())
            .collect(),
        Err(err) => {
            debug!("Migration ledger not readable (expected before first migration): {err}");
            HashSet::new()
        }
    }
}

/// Record a migration as applied without running its DDL.
///
/// Idempotent: a row that already exists is left untouched, so re-running a
/// crashed reconciliation is safe. Failures are logged and swallowed; this
/// is a best-effort write on a recovery path, not a primary-path insert.
pub async fn record_applied(db: &DatabaseConnection, version: &str) {
    let backend = db.get_database_backend();
    let sql = match backend {
        DbBackend::Sqlite => {
            "INSERT OR IGNORE INTO seaql_migrations (version, applied_at) VALUES (?, ?)"
        }
        DbBackend::Postgres => {
            "INSERT INTO seaql_migrations (version, applied_at) VALUES ($1, $2) \
             ON CONFLICT (version) DO NOTHING"
        }
        DbBackend::MySql => {
            "INSERT IGNORE INTO seaql_migrations (version, applied_at) VALUES (?, ?)"
        }
    };

    let stmt = Statement::from_sql_and_values(
        backend,
        sql,
        [version.into(), Utc::now().timestamp().into()],
    );

    match db.execute(stmt).await {
        Ok(result) if result.rows_affected() > 0 => {
            debug!(migration = version, "Recorded migration as already applied");
        }
        Ok(_) => {
            debug!(migration = version, "Ledger row already present");
        }
        Err(err) => {
            warn!(migration = version, "Failed to record migration in ledger: {err}");
        }
    }
}
