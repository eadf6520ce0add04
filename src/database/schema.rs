//! Schema inspector: read-only queries against the live catalog
//!
//! Both the drift resolver and the startup validator depend on this module.
//! Inspection is best-effort by contract: a failed catalog query degrades to
//! "no tables" / "table absent" with a logged warning, because every caller
//! sits on a diagnostic or recovery path where raising would mask the
//! original failure.

use std::collections::HashSet;

use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement};
use tracing::warn;

/// Ledger table owned by the native migration runner. Excluded from the
/// table inventory: it tracks schema state, it is not schema.
pub const MIGRATION_LEDGER_TABLE: &str = "seaql_migrations";

const MAX_IDENTIFIER_LEN: usize = 128;

/// Identifier guard for dynamically supplied table names.
///
/// Anything that is not plain `[A-Za-z0-9_]{1,128}` is rejected before a
/// query is built, closing off injection through dynamic identifiers.
pub fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn list_tables_sql(backend: DbBackend) -> &'static str {
    match backend {
        DbBackend::Sqlite => {
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'"
        }
        DbBackend::Postgres => {
            "SELECT table_name AS name FROM information_schema.tables \
             WHERE table_schema = 'public' AND table_type = 'BASE TABLE'"
        }
        DbBackend::MySql => {
            "SELECT table_name AS name FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE'"
        }
    }
}

fn table_exists_sql(backend: DbBackend) -> &'static str {
    match backend {
        DbBackend::Sqlite => "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
        DbBackend::Postgres => {
            "SELECT table_name AS name FROM information_schema.tables \
             WHERE table_schema = 'public' AND table_name = $1"
        }
        DbBackend::MySql => {
            "SELECT table_name AS name FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_name = ?"
        }
    }
}

/// List the base tables currently present in the database, excluding the
/// migration ledger. Returns an empty set (with a warning) on failure.
pub async fn list_existing_tables(db: &DatabaseConnection) -> HashSet<String> {
    let backend = db.get_database_backend();
    let stmt = Statement::from_string(backend, list_tables_sql(backend).to_owned());

    match db.query_all(stmt).await {
        Ok(rows) => rows
            .iter()
            .filter_map(|row| row.try_get::<String>("", "name").ok())
            .filter(|name| name != MIGRATION_LEDGER_TABLE)
            .collect(),
        Err(err) => {
            warn!("Failed to list database tables: {err}");
            HashSet::new()
        }
    }
}

/// Whether a single table exists. Unsafe identifiers and query failures both
/// map to `false` ("unknown = absent").
pub async fn table_exists(db: &DatabaseConnection, name: &str) -> bool {
    if !is_safe_identifier(name) {
        warn!(table = name, "Rejected unsafe table identifier");
        return false;
    }

    let backend = db.get_database_backend();
    let stmt = Statement::from_sql_and_values(backend, table_exists_sql(backend), [name.into()]);

    match db.query_one(stmt).await {
        Ok(row) => row.is_some(),
        Err(err) => {
            warn!(table = name, "Table existence check failed: {err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[test]
    fn test_safe_identifiers() {
        assert!(is_safe_identifier("users"));
        assert!(is_safe_identifier("user_roles"));
        assert!(is_safe_identifier("Table2"));
        assert!(is_safe_identifier(&"a".repeat(128)));
    }

    #[test]
    fn test_unsafe_identifiers() {
        assert!(!is_safe_identifier(""));
        assert!(!is_safe_identifier("users; DROP TABLE users"));
        assert!(!is_safe_identifier("users --"));
        assert!(!is_safe_identifier("user roles"));
        assert!(!is_safe_identifier("taßle"));
        assert!(!is_safe_identifier("名前"));
        assert!(!is_safe_identifier(&"a".repeat(129)));
    }

    #[tokio::test]
    async fn test_inventory_excludes_the_ledger_table() {
        let db = crate::database::test_utils::setup_test_db().await;

        let tables = list_existing_tables(&db).await;
        assert!(tables.contains("sites"));
        assert!(tables.contains("users"));
        assert!(!tables.contains(MIGRATION_LEDGER_TABLE));

        assert!(table_exists(&db, "user_roles").await);
        assert!(!table_exists(&db, "widgets").await);
    }

    #[tokio::test]
    async fn test_unsafe_identifier_issues_no_query() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        assert!(!table_exists(&db, "users; DROP TABLE users").await);
        assert!(!table_exists(&db, "users --").await);
        assert!(!table_exists(&db, "名前").await);

        // Nothing reached the connection
        assert!(db.into_transaction_log().is_empty());
    }
}
