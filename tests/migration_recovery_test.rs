use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use tempfile::TempDir;

use tidecms::database::connection::{establish_connection, get_database_url};
use tidecms::database::{history, migrations};
use tidecms::services::MigrationService;

const INITIAL: &str = "m20250110_000001_create_initial_schema";
const IDENTITY: &str = "m20250118_000002_create_identity_tables";
const SUBSCRIPTIONS: &str = "m20250205_000003_create_subscription_entities";
const BRANDING: &str = "m20250301_000004_add_site_branding";

fn file_url(dir: &TempDir) -> String {
    get_database_url(Some(dir.path().join("cms.db").to_str().unwrap()))
}

async fn open(url: &str) -> DatabaseConnection {
    establish_connection(url).await.unwrap()
}

async fn exec(db: &DatabaseConnection, sql: &str) {
    db.execute(Statement::from_string(
        db.get_database_backend(),
        sql.to_owned(),
    ))
    .await
    .unwrap();
}

async fn ledger_rows(db: &DatabaseConnection) -> Vec<(String, i64)> {
    let stmt = Statement::from_string(
        db.get_database_backend(),
        "SELECT version, applied_at FROM seaql_migrations ORDER BY version".to_owned(),
    );
    db.query_all(stmt)
        .await
        .unwrap()
        .iter()
        .map(|row| {
            (
                row.try_get::<String>("", "version").unwrap(),
                row.try_get::<i64>("", "applied_at").unwrap(),
            )
        })
        .collect()
}

#[tokio::test]
async fn test_clean_database_applies_all_migrations() {
    let dir = TempDir::new().unwrap();
    let url = file_url(&dir);

    let result = MigrationService::new(&url).migrate_database().await;

    assert!(result.success, "{}", result.error_message);
    // The file did not exist, so the run had to create the database
    assert!(result.requires_database_creation);
    // Migrations were actually applied; this is not the up-to-date path
    assert!(result.message.contains("Applied 4 migration(s)"));

    let db = open(&url).await;
    let applied = history::list_applied(&db).await;
    for name in [INITIAL, IDENTITY, SUBSCRIPTIONS, BRANDING] {
        assert!(applied.contains(name), "missing ledger row for {name}");
    }

    let tables = tidecms::database::schema::list_existing_tables(&db).await;
    for table in [
        "sites",
        "modules",
        "pages",
        "users",
        "roles",
        "user_roles",
        "customers",
        "subscriptions",
    ] {
        assert!(tables.contains(table), "missing table {table}");
    }
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let url = file_url(&dir);

    let first = MigrationService::new(&url).migrate_database().await;
    assert!(first.success);

    let db = open(&url).await;
    let rows_before = ledger_rows(&db).await;

    let second = MigrationService::new(&url).migrate_database().await;
    assert!(second.success);
    assert!(!second.requires_database_creation);
    assert!(second.message.contains("up to date"));

    // Zero ledger writes on the second run: rows are byte-identical
    let rows_after = ledger_rows(&db).await;
    assert_eq!(rows_before, rows_after);
}

#[tokio::test]
async fn test_fully_preexisting_schema_is_reconciled() {
    let dir = TempDir::new().unwrap();
    let url = file_url(&dir);

    // Schema created out of band (manual script / restored backup), ledger
    // never written
    let db = open(&url).await;
    for table in [
        "sites",
        "modules",
        "pages",
        "users",
        "roles",
        "user_roles",
        "customers",
        "subscriptions",
    ] {
        exec(&db, &format!("CREATE TABLE {} (id integer primary key)", table)).await;
    }
    drop(db);

    let result = MigrationService::new(&url).migrate_database().await;

    assert!(result.success, "{}", result.error_message);
    assert!(result.message.contains("Reconciled 3 migration(s)"));

    let db = open(&url).await;
    let applied = history::list_applied(&db).await;
    for name in [INITIAL, IDENTITY, SUBSCRIPTIONS, BRANDING] {
        assert!(applied.contains(name), "missing ledger row for {name}");
    }
    assert!(migrations::pending_migrations(&applied).is_empty());
}

#[tokio::test]
async fn test_partial_drift_reconciles_then_applies_the_rest() {
    let dir = TempDir::new().unwrap();
    let url = file_url(&dir);

    // Only the initial-schema tables exist out of band
    let db = open(&url).await;
    for table in ["sites", "modules", "pages"] {
        exec(&db, &format!("CREATE TABLE {} (id integer primary key)", table)).await;
    }
    drop(db);

    let result = MigrationService::new(&url).migrate_database().await;

    assert!(result.success, "{}", result.error_message);
    assert!(result.message.contains("Reconciled 1 migration(s)"));
    assert!(result.message.contains("3 remaining migration(s)"));

    // The identity and subscription tables were genuinely created this run
    let db = open(&url).await;
    let tables = tidecms::database::schema::list_existing_tables(&db).await;
    for table in ["users", "roles", "user_roles", "customers", "subscriptions"] {
        assert!(tables.contains(table), "missing table {table}");
    }
}

#[tokio::test]
async fn test_reconciliation_with_nothing_left_to_apply() {
    let dir = TempDir::new().unwrap();
    let url = file_url(&dir);

    // Fully migrated database whose ledger lost the creating migrations
    // (e.g. restored from a pre-migration backup of the ledger only)
    let first = MigrationService::new(&url).migrate_database().await;
    assert!(first.success);

    let db = open(&url).await;
    for name in [INITIAL, IDENTITY, SUBSCRIPTIONS] {
        exec(
            &db,
            &format!("DELETE FROM seaql_migrations WHERE version = '{}'", name),
        )
        .await;
    }
    drop(db);

    let result = MigrationService::new(&url).migrate_database().await;

    assert!(result.success, "{}", result.error_message);
    assert!(result.message.contains("Reconciled 3 migration(s)"));
    assert!(result.message.contains("nothing left to apply"));
}

#[tokio::test]
async fn test_unexplainable_drift_is_fatal() {
    let dir = TempDir::new().unwrap();
    let url = file_url(&dir);

    // A conflicting users table exists, but roles/user_roles do not: the
    // identity migration cannot be classified as applied
    let db = open(&url).await;
    exec(&db, "CREATE TABLE users (id integer primary key)").await;
    drop(db);

    let result = MigrationService::new(&url).migrate_database().await;

    assert!(!result.success);
    assert!(result.error_message.contains("manual intervention"));
    assert!(result.source.is_some());

    // The initial schema applied before the conflict and stays recorded;
    // nothing was backfilled for the rest
    let db = open(&url).await;
    let applied = history::list_applied(&db).await;
    assert!(applied.contains(INITIAL));
    assert!(!applied.contains(IDENTITY));
    assert!(!applied.contains(SUBSCRIPTIONS));
}

#[tokio::test]
async fn test_missing_baseline_is_fatal_without_retry() {
    let dir = TempDir::new().unwrap();
    let url = file_url(&dir);

    let first = MigrationService::new(&url).migrate_database().await;
    assert!(first.success);

    // Drop a table the branding migration alters, and forget that the
    // migration ran: the re-run now references a missing object
    let db = open(&url).await;
    exec(&db, "DELETE FROM seaql_migrations WHERE version = 'm20250301_000004_add_site_branding'").await;
    exec(&db, "DROP TABLE modules").await;
    exec(&db, "DROP TABLE pages").await;
    exec(&db, "DROP TABLE sites").await;
    drop(db);

    let result = MigrationService::new(&url).migrate_database().await;

    assert!(!result.success);
    assert!(result.error_message.contains("baseline"));

    // No synthetic ledger row appeared for the failed migration
    let db = open(&url).await;
    assert!(!history::list_applied(&db).await.contains(BRANDING));
}

#[tokio::test]
async fn test_database_creation_failure_is_fatal() {
    // Parent directory does not exist and SQLite will not create it
    let url = get_database_url(Some("/nonexistent-tidecms-dir/deep/cms.db"));

    let result = MigrationService::new(&url).migrate_database().await;

    assert!(!result.success);
    assert!(result.requires_database_creation);
    assert!(result.error_message.contains("create"));
}

#[tokio::test]
async fn test_server_backends_are_not_auto_created() {
    let result = MigrationService::new("postgres://localhost:5432/tidecms")
        .migrate_database()
        .await;

    assert!(!result.success);
    assert!(result.requires_database_creation);
    assert!(result.error_message.contains("create it manually"));
}
