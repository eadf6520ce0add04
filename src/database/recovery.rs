//! Schema-drift resolver
//!
//! Called when applying migrations fails with an "object already exists"
//! error: somewhere outside the normal migration path (manual script,
//! partial prior run, restored backup) DDL has already executed that the
//! ledger knows nothing about. The resolver compares each pending
//! migration's registered expected tables against the live inventory and
//! backfills ledger rows for migrations whose whole table set is present,
//! so the runner stops trying to recreate existing objects.
//!
//! This is an error-recovery path: nothing in here may fail louder than the
//! failure it is recovering from. Every internal error degrades to "no
//! reconciliation" and the original error is what surfaces.

use sea_orm::{DatabaseConnection, DbErr};
use tracing::{info, warn};

use crate::database::outcome::MigrationResult;
use crate::database::{history, migrations, schema};
use crate::errors::MigrationError;

/// What the resolver decided, plus the pending list recomputed after
/// reconciliation.
#[derive(Debug)]
pub struct DriftResolution {
    pub result: MigrationResult,
    /// Pending migrations still unaccounted for, in application order
    pub remaining: Vec<String>,
}

/// Reconcile pending migrations against the live table inventory.
///
/// A pending migration is redundant when it registered a non-empty expected
/// table set and every one of those tables already exists. Migrations with
/// no registered expectations (unknown, or ALTER-only) are never classified.
pub async fn resolve_schema_drift(
    db: &DatabaseConnection,
    pending: &[String],
    cause: DbErr,
) -> DriftResolution {
    let inventory = schema::list_existing_tables(db).await;
    info!(
        tables = inventory.len(),
        pending = pending.len(),
        "Reconciling pending migrations against live schema"
    );

    let mut reconciled = Vec::new();
    for name in pending {
        let Some(expected) = migrations::expected_tables(name) else {
            warn!(migration = %name, "No expected-table registration; skipping");
            continue;
        };
        if expected.is_empty() {
            continue;
        }

        if expected.iter().all(|table| inventory.contains(*table)) {
            info!(
                migration = %name,
                tables = ?expected,
                "Expected tables already present; recording migration as applied"
            );
            history::record_applied(db, name).await;
            reconciled.push(name.clone());
        }
    }

    if reconciled.is_empty() {
        warn!("Schema drift detected but no pending migration matches the live schema");
        return DriftResolution {
            result: MigrationResult::failed(
                "Schema drift detected, but none of the pending migrations could be matched \
                 to the existing tables; manual intervention is required",
                MigrationError::UnresolvedDrift(cause),
            ),
            remaining: pending.to_vec(),
        };
    }

    let remaining: Vec<String> = pending
        .iter()
        .filter(|name| !reconciled.contains(name))
        .cloned()
        .collect();

    DriftResolution {
        result: MigrationResult::ok(format!(
            "Reconciled {} migration(s) whose tables already existed",
            reconciled.len()
        )),
        remaining,
    }
}
