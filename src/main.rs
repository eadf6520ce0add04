use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use tidecms::database::connection::{establish_connection, get_database_url, probe_database_url};
use tidecms::database::{history, migrations};
use tidecms::services::{MigrationService, StartupValidator};

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database maintenance commands
    Db {
        #[clap(subcommand)]
        command: DbCommands,
    },
    /// Verify the critical tables exist; exits non-zero when the schema is
    /// not ready for startup
    Validate {
        #[clap(short, long, default_value = "tidecms.db", env = "TIDECMS_DATABASE")]
        database: String,
    },
}

#[derive(Subcommand, Debug)]
enum DbCommands {
    /// Apply pending migrations, creating the database and reconciling
    /// schema drift as needed
    Migrate {
        #[clap(short, long, default_value = "tidecms.db", env = "TIDECMS_DATABASE")]
        database: String,
    },
    /// Show applied and pending migrations
    Status {
        #[clap(short, long, default_value = "tidecms.db", env = "TIDECMS_DATABASE")]
        database: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    match args.command {
        Commands::Db { command } => match command {
            DbCommands::Migrate { database } => {
                info!("Migrating database: {}", database);
                migrate(&database).await?;
            }
            DbCommands::Status { database } => {
                status(&database).await?;
            }
        },
        Commands::Validate { database } => {
            validate(&database).await?;
        }
    }

    Ok(())
}

async fn migrate(database: &str) -> Result<()> {
    let service = MigrationService::new(get_database_url(Some(database)));
    let result = service.migrate_database().await;

    if result.requires_database_creation {
        info!("Database did not exist; created a new one");
    }

    if result.success {
        info!("{}", result.message);
        Ok(())
    } else {
        error!("{}", result.error_message);
        bail!("database migration failed: {}", result.error_message);
    }
}

async fn validate(database: &str) -> Result<()> {
    let url = probe_database_url(&get_database_url(Some(database)));
    let result = StartupValidator::validate_at(&url).await;

    if result.is_valid {
        info!("Database schema is valid");
        return Ok(());
    }

    // In-memory databases are a recognised testing configuration: report
    // and continue instead of failing the process
    if database == ":memory:" {
        warn!("{}", result.error_message);
        return Ok(());
    }

    error!("{}", result.error_message);
    eprintln!("\n{}\n", result.action_required);
    bail!("database validation failed");
}

async fn status(database: &str) -> Result<()> {
    let url = probe_database_url(&get_database_url(Some(database)));
    let db = establish_connection(&url).await?;

    let applied = history::list_applied(&db).await;
    let pending = migrations::pending_migrations(&applied);

    let mut applied: Vec<String> = applied.into_iter().collect();
    applied.sort();

    info!("Applied migrations: {}", applied.len());
    for name in &applied {
        info!("  [x] {}", name);
    }
    info!("Pending migrations: {}", pending.len());
    for name in &pending {
        info!("  [ ] {}", name);
    }

    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("sqlx=warn,{}", log_level)))
        .without_time()
        .init();
}
