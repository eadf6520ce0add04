//! Advisory lock serialising concurrent migration runs
//!
//! Horizontally scaled deployments start several instances against the same
//! database at once; the lock makes sure only one of them mutates schema at
//! a time. Postgres uses a session advisory lock, MySQL a named lock.
//! SQLite needs neither: the file lock already serialises writers.
//!
//! The lock is session-scoped, so a crashed holder releases it when its
//! connection dies.

use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, DbErr, Statement};
use tracing::{debug, warn};

/// Key identifying the migration lock across instances (Postgres advisory
/// locks are keyed by integer).
const LOCK_KEY: i64 = 0x7464_6373_6d69_6772;

/// Named lock for MySQL, with a bounded wait.
const MYSQL_LOCK_NAME: &str = "tidecms_migration";
const MYSQL_LOCK_TIMEOUT_SECS: i32 = 60;

#[derive(Debug)]
pub struct MigrationLock {
    backend: DbBackend,
}

impl MigrationLock {
    /// Block until this instance holds the migration lock.
    pub async fn acquire(db: &DatabaseConnection) -> Result<Self, DbErr> {
        let backend = db.get_database_backend();
        match backend {
            DbBackend::Sqlite => {
                debug!("SQLite backend: migration lock is a no-op");
            }
            DbBackend::Postgres => {
                let sql = format!("SELECT pg_advisory_lock({LOCK_KEY})");
                db.execute(Statement::from_string(backend, sql)).await?;
                debug!("Acquired Postgres advisory migration lock");
            }
            DbBackend::MySql => {
                let sql = format!(
                    "SELECT GET_LOCK('{MYSQL_LOCK_NAME}', {MYSQL_LOCK_TIMEOUT_SECS})"
                );
                let row = db
                    .query_one(Statement::from_string(backend, sql))
                    .await?
                    .ok_or_else(|| DbErr::Custom("GET_LOCK returned no row".to_string()))?;
                let acquired: i64 = row.try_get_by_index(0)?;
                if acquired != 1 {
                    return Err(DbErr::Custom(format!(
                        "Timed out after {MYSQL_LOCK_TIMEOUT_SECS}s waiting for the migration lock; \
                         another instance is migrating"
                    )));
                }
                debug!("Acquired MySQL named migration lock");
            }
        }
        Ok(Self { backend })
    }

    /// Release the lock. Failures are logged only: the lock is
    /// session-scoped and the session is torn down right after migration.
    pub async fn release(self, db: &DatabaseConnection) {
        let result = match self.backend {
            DbBackend::Sqlite => Ok(()),
            DbBackend::Postgres => {
                let sql = format!("SELECT pg_advisory_unlock({LOCK_KEY})");
                db.execute(Statement::from_string(self.backend, sql))
                    .await
                    .map(|_| ())
            }
            DbBackend::MySql => {
                let sql = format!("SELECT RELEASE_LOCK('{MYSQL_LOCK_NAME}')");
                db.execute(Statement::from_string(self.backend, sql))
                    .await
                    .map(|_| ())
            }
        };

        if let Err(err) = result {
            warn!("Failed to release migration lock: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Database;

    #[tokio::test]
    async fn test_sqlite_lock_is_a_noop() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let lock = MigrationLock::acquire(&db).await.unwrap();
        lock.release(&db).await;
    }

    #[tokio::test]
    async fn test_sqlite_lock_is_reentrant_across_runs() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let first = MigrationLock::acquire(&db).await.unwrap();
        first.release(&db).await;
        let second = MigrationLock::acquire(&db).await.unwrap();
        second.release(&db).await;
    }
}
