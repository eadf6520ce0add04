//! Migration orchestrator
//!
//! Drives one migration run end to end: make sure the database exists, list
//! what is pending, apply it through the native runner, and recover from
//! schema drift when the runner trips over objects that already exist.
//!
//! The public contract never returns `Err`: every outcome, including every
//! failure, is a [`MigrationResult`] the host logs and acts on. Failures are
//! classified per the store error ("already exists" is recoverable via the
//! drift resolver with at most one retry; "object not found" and everything
//! else are fatal).

use sea_orm::{DatabaseConnection, DbErr, EntityTrait, PaginatorTrait};
use sea_orm_migration::MigratorTrait;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::database::connection::{
    establish_connection, probe_database_url, supports_database_creation,
};
use crate::database::lock::MigrationLock;
use crate::database::migrations::Migrator;
use crate::database::outcome::MigrationResult;
use crate::database::{
    entities, history, migrations, recovery, schema, CORE_TABLES, IDENTITY_TABLES,
};
use crate::errors::{classify_ddl_error, DdlErrorClass, MigrationError};

pub struct MigrationService {
    database_url: String,
}

impl MigrationService {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    /// Bring the database schema up to date, creating the database if it
    /// does not exist and reconciling schema drift along the way.
    ///
    /// Each run carries a correlation id; every record the engine emits
    /// during the run is tagged with it.
    pub async fn migrate_database(&self) -> MigrationResult {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("migration_run", run_id = %run_id);
        self.run().instrument(span).await
    }

    async fn run(&self) -> MigrationResult {
        let (db, created) = match self.connect_or_create().await {
            Ok(connected) => connected,
            Err(failure) => return failure,
        };

        let result = self.migrate_connected(&db).await;
        if created {
            result.with_database_creation()
        } else {
            result
        }
    }

    /// Probe with a non-creating URL first so "database missing" is
    /// distinguishable from "database present"; only then connect with the
    /// creating URL. Creation failure is immediately fatal.
    async fn connect_or_create(&self) -> Result<(DatabaseConnection, bool), MigrationResult> {
        let probe_url = probe_database_url(&self.database_url);
        let probe_err = match try_connect(&probe_url).await {
            Ok(db) => return Ok((db, false)),
            Err(err) => err,
        };

        info!("Database unreachable, attempting to create it: {probe_err}");

        if !supports_database_creation(&self.database_url) {
            return Err(MigrationResult::failed(
                format!(
                    "The database is unreachable and cannot be created automatically for \
                     this backend; create it manually and check the connection string \
                     ({probe_err})"
                ),
                MigrationError::DatabaseCreation(probe_err.to_string()),
            )
            .with_database_creation());
        }

        match try_connect(&self.database_url).await {
            Ok(db) => {
                info!("Created database");
                Ok((db, true))
            }
            Err(create_err) => Err(MigrationResult::failed(
                format!("Failed to create the database: {create_err}"),
                MigrationError::DatabaseCreation(create_err.to_string()),
            )
            .with_database_creation()),
        }
    }

    async fn migrate_connected(&self, db: &DatabaseConnection) -> MigrationResult {
        let applied = history::list_applied(db).await;
        let pending = migrations::pending_migrations(&applied);

        if pending.is_empty() {
            debug!("No pending migrations");
            self.verify_critical_tables(db).await;
            return MigrationResult::ok("Database schema is up to date");
        }

        info!(count = pending.len(), "Applying pending migrations");

        let lock = match MigrationLock::acquire(db).await {
            Ok(lock) => lock,
            Err(err) => {
                return MigrationResult::failed(
                    "Could not acquire the migration lock; another instance may be migrating",
                    MigrationError::Lock(err),
                )
            }
        };

        let result = self.apply_with_recovery(db, &pending).await;
        lock.release(db).await;

        if result.success {
            self.check_table_integrity(db).await;
        }
        result
    }

    async fn apply_with_recovery(
        &self,
        db: &DatabaseConnection,
        pending: &[String],
    ) -> MigrationResult {
        let err = match Migrator::up(db, None).await {
            Ok(()) => {
                return MigrationResult::ok(format!("Applied {} migration(s)", pending.len()))
            }
            Err(err) => err,
        };

        match classify_ddl_error(&err) {
            DdlErrorClass::AlreadyExists => self.recover_from_drift(db, err).await,
            DdlErrorClass::MissingObject => MigrationResult::failed(
                format!(
                    "A migration referenced database objects that do not exist ({err}). \
                     The database is missing baseline objects; apply migrations against a \
                     clean database, or re-run the baseline migrations first"
                ),
                MigrationError::MissingBaseline(err),
            ),
            DdlErrorClass::Other => MigrationResult::failed(
                format!("Migration failed: {err}"),
                MigrationError::Database(err),
            ),
        }
    }

    /// The drift path: reconcile the ledger against the live schema, then
    /// retry the apply step once. Reconciliation strictly shrinks the
    /// pending set, so a second drift error is fatal rather than retried.
    async fn recover_from_drift(&self, db: &DatabaseConnection, cause: DbErr) -> MigrationResult {
        warn!("A database object already exists; attempting schema-drift recovery: {cause}");

        // Migrations the failed run got through are already in the ledger;
        // reconcile only what is still pending.
        let still_pending = migrations::pending_migrations(&history::list_applied(db).await);
        let resolution = recovery::resolve_schema_drift(db, &still_pending, cause).await;
        if !resolution.result.success {
            return resolution.result;
        }

        let reconciled = still_pending.len() - resolution.remaining.len();
        if resolution.remaining.is_empty() {
            return MigrationResult::ok(format!(
                "Reconciled {reconciled} migration(s) already present in the schema; \
                 nothing left to apply"
            ));
        }

        info!(
            remaining = resolution.remaining.len(),
            "Retrying migration after drift reconciliation"
        );
        match Migrator::up(db, None).await {
            Ok(()) => MigrationResult::ok(format!(
                "Reconciled {reconciled} migration(s) and applied {} remaining migration(s)",
                resolution.remaining.len()
            )),
            Err(retry_err) => match classify_ddl_error(&retry_err) {
                DdlErrorClass::MissingObject => MigrationResult::failed(
                    format!(
                        "A migration referenced database objects that do not exist after \
                         drift reconciliation ({retry_err}); re-run the baseline migrations \
                         against a clean database"
                    ),
                    MigrationError::MissingBaseline(retry_err),
                ),
                _ => MigrationResult::failed(
                    format!("Migration failed after drift reconciliation: {retry_err}"),
                    MigrationError::Database(retry_err),
                ),
            },
        }
    }

    /// Existence check on the up-to-date path. Logging only: an up-to-date
    /// ledger with missing tables means out-of-band damage the validator
    /// will report properly.
    async fn verify_critical_tables(&self, db: &DatabaseConnection) {
        for table in IDENTITY_TABLES.iter().chain(CORE_TABLES.iter()) {
            if !schema::table_exists(db, table).await {
                warn!(table, "Critical table is missing despite an up-to-date ledger");
            }
        }
    }

    /// Best-effort read of row counts from each domain table after a
    /// successful run. A fresh database holds zero rows everywhere, so only
    /// read *failures* are worth a warning, and none of them fail the run.
    async fn check_table_integrity(&self, db: &DatabaseConnection) {
        log_row_count("sites", entities::sites::Entity::find().count(db).await);
        log_row_count("modules", entities::modules::Entity::find().count(db).await);
        log_row_count("pages", entities::pages::Entity::find().count(db).await);
        log_row_count("users", entities::users::Entity::find().count(db).await);
        log_row_count("roles", entities::roles::Entity::find().count(db).await);
        log_row_count(
            "user_roles",
            entities::user_roles::Entity::find().count(db).await,
        );
        log_row_count(
            "customers",
            entities::customers::Entity::find().count(db).await,
        );
        log_row_count(
            "subscriptions",
            entities::subscriptions::Entity::find().count(db).await,
        );
    }
}

async fn try_connect(url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = establish_connection(url).await?;
    // Pool creation is lazy; ping to find out whether the database is there
    db.ping().await?;
    Ok(db)
}

fn log_row_count(table: &str, result: Result<u64, DbErr>) {
    match result {
        Ok(count) => debug!(table, count, "Table readable"),
        Err(err) => warn!(table, "Could not read row count: {err}"),
    }
}
