use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::time::Duration;

pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url);

    // Pool settings sized for SQLite: write serialisation means connection
    // counts beyond ~20 buy nothing
    let max_connections = if database_url.contains(":memory:") {
        // A pooled in-memory SQLite database is one database per connection
        1
    } else {
        20
    };

    opt.max_connections(max_connections)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(5))
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(3600))
        .sqlx_logging(true)
        .sqlx_logging_level(tracing::log::LevelFilter::Debug);

    Database::connect(opt).await
}

/// Connection URL for a SQLite database file, creating it if absent.
pub fn get_database_url(database_path: Option<&str>) -> String {
    match database_path {
        Some(path) if path == ":memory:" => "sqlite::memory:".to_string(),
        Some(path) => format!("sqlite://{}?mode=rwc", path),
        None => "sqlite://tidecms.db?mode=rwc".to_string(),
    }
}

/// Non-creating variant of a connection URL, used to probe whether the
/// database exists before deciding to create it. For SQLite this swaps the
/// create flag for plain read-write; other backends probe with the URL as-is.
pub fn probe_database_url(database_url: &str) -> String {
    if database_url.starts_with("sqlite:") {
        database_url.replace("mode=rwc", "mode=rw")
    } else {
        database_url.to_string()
    }
}

/// Whether the engine can create this database itself when it is missing.
/// Only file-backed SQLite databases qualify; server backends need the
/// database provisioned out of band.
pub fn supports_database_creation(database_url: &str) -> bool {
    database_url.starts_with("sqlite:") && !database_url.contains(":memory:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url_shapes() {
        assert_eq!(get_database_url(Some(":memory:")), "sqlite::memory:");
        assert_eq!(
            get_database_url(Some("/var/lib/tidecms/cms.db")),
            "sqlite:///var/lib/tidecms/cms.db?mode=rwc"
        );
        assert_eq!(get_database_url(None), "sqlite://tidecms.db?mode=rwc");
    }

    #[test]
    fn test_probe_url_does_not_create() {
        assert_eq!(
            probe_database_url("sqlite:///data/cms.db?mode=rwc"),
            "sqlite:///data/cms.db?mode=rw"
        );
        // Non-SQLite URLs probe unchanged
        assert_eq!(
            probe_database_url("postgres://cms:secret@db/tidecms"),
            "postgres://cms:secret@db/tidecms"
        );
    }

    #[test]
    fn test_creation_support() {
        assert!(supports_database_creation("sqlite:///data/cms.db?mode=rwc"));
        assert!(!supports_database_creation("sqlite::memory:"));
        assert!(!supports_database_creation("postgres://db/tidecms"));
    }
}
