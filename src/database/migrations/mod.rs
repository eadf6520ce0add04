pub use sea_orm_migration::prelude::*;

use std::collections::HashSet;

mod m20250110_000001_create_initial_schema;
mod m20250118_000002_create_identity_tables;
mod m20250205_000003_create_subscription_entities;
mod m20250301_000004_add_site_branding;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250110_000001_create_initial_schema::Migration),
            Box::new(m20250118_000002_create_identity_tables::Migration),
            Box::new(m20250205_000003_create_subscription_entities::Migration),
            Box::new(m20250301_000004_add_site_branding::Migration),
        ]
    }
}

/// Expected-table manifest, in migration order.
///
/// Each migration registers the tables its DDL creates next to the DDL
/// itself (`CREATES`); the drift resolver consults this instead of parsing
/// migration names. A migration that creates no tables registers an empty
/// slice and can never be classified as already applied.
pub fn schema_manifest() -> Vec<(String, &'static [&'static str])> {
    vec![
        (
            m20250110_000001_create_initial_schema::Migration.name().to_string(),
            m20250110_000001_create_initial_schema::CREATES,
        ),
        (
            m20250118_000002_create_identity_tables::Migration.name().to_string(),
            m20250118_000002_create_identity_tables::CREATES,
        ),
        (
            m20250205_000003_create_subscription_entities::Migration.name().to_string(),
            m20250205_000003_create_subscription_entities::CREATES,
        ),
        (
            m20250301_000004_add_site_branding::Migration.name().to_string(),
            m20250301_000004_add_site_branding::CREATES,
        ),
    ]
}

/// Tables a named migration is expected to create, if it is known.
pub fn expected_tables(migration_name: &str) -> Option<&'static [&'static str]> {
    schema_manifest()
        .into_iter()
        .find(|(name, _)| name == migration_name)
        .map(|(_, tables)| tables)
}

/// Migrations not yet recorded in the ledger, in application order.
pub fn pending_migrations(applied: &HashSet<String>) -> Vec<String> {
    Migrator::migrations()
        .iter()
        .map(|migration| migration.name().to_string())
        .filter(|name| !applied.contains(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_covers_every_migration() {
        let manifest = schema_manifest();
        let migrations = Migrator::migrations();
        assert_eq!(manifest.len(), migrations.len());

        for migration in &migrations {
            assert!(
                expected_tables(migration.name()).is_some(),
                "{} is missing a manifest entry",
                migration.name()
            );
        }
    }

    #[test]
    fn test_creating_migrations_register_tables() {
        assert_eq!(
            expected_tables("m20250110_000001_create_initial_schema"),
            Some(&["sites", "modules", "pages"][..])
        );
        assert_eq!(
            expected_tables("m20250118_000002_create_identity_tables"),
            Some(&["users", "roles", "user_roles"][..])
        );
        assert_eq!(
            expected_tables("m20250205_000003_create_subscription_entities"),
            Some(&["customers", "subscriptions"][..])
        );
    }

    #[test]
    fn test_alter_only_migration_registers_nothing() {
        assert_eq!(
            expected_tables("m20250301_000004_add_site_branding"),
            Some(&[][..])
        );
    }

    #[test]
    fn test_unknown_migration_has_no_expectations() {
        assert_eq!(expected_tables("m20990101_000099_unknown"), None);
    }

    #[test]
    fn test_pending_respects_order_and_applied_set() {
        let applied: HashSet<String> =
            ["m20250110_000001_create_initial_schema".to_string()].into();
        let pending = pending_migrations(&applied);

        assert_eq!(
            pending,
            vec![
                "m20250118_000002_create_identity_tables",
                "m20250205_000003_create_subscription_entities",
                "m20250301_000004_add_site_branding",
            ]
        );
    }
}
