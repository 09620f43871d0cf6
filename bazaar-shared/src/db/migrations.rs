/// Database migration runner
///
/// Migrations are embedded at compile time from `bazaar-shared/migrations/`.
/// Each migration is a reversible pair:
/// - `{timestamp}_{name}.up.sql`
/// - `{timestamp}_{name}.down.sql`

use sqlx::{migrate::MigrateDatabase, postgres::PgPool, Postgres};
use tracing::{debug, info, warn};

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Number of migrations that have been applied
    pub applied_migrations: usize,

    /// Latest applied migration version (timestamp)
    pub latest_version: Option<i64>,

    /// Number of embedded migrations not yet applied
    pub pending_migrations: usize,
}

impl MigrationStatus {
    pub fn is_up_to_date(&self) -> bool {
        self.pending_migrations == 0
    }
}

/// Runs all pending migrations
///
/// # Errors
///
/// Returns an error if a migration fails or the database connection drops.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Starting database migrations");

    match sqlx::migrate!("./migrations").run(pool).await {
        Ok(()) => {
            info!("Database migrations completed");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Migration failed");
            Err(e)
        }
    }
}

/// Reports applied versus embedded migrations
pub async fn get_migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    let embedded = sqlx::migrate!("./migrations")
        .iter()
        .filter(|m| !m.migration_type.is_down_migration())
        .count();

    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = 'public'
            AND table_name = '_sqlx_migrations'
        )",
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        debug!("Migrations table does not exist yet");
        return Ok(MigrationStatus {
            applied_migrations: 0,
            latest_version: None,
            pending_migrations: embedded,
        });
    }

    let (count, latest_version): (i64, Option<i64>) = sqlx::query_as(
        "SELECT COUNT(*), MAX(version) FROM _sqlx_migrations WHERE success = true",
    )
    .fetch_one(pool)
    .await?;

    let applied = count.max(0) as usize;

    Ok(MigrationStatus {
        applied_migrations: applied,
        latest_version,
        pending_migrations: embedded.saturating_sub(applied),
    })
}

/// Creates the database if it does not exist (development and tests)
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if !Postgres::database_exists(database_url).await? {
        info!("Database does not exist, creating it");
        Postgres::create_database(database_url).await?;
    }

    Ok(())
}
