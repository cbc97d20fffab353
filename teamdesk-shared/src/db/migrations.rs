/// Schema migrations
///
/// Migrations live in `migrations/` at the workspace root as reversible
/// `{timestamp}_{name}.up.sql` / `.down.sql` pairs and are embedded at
/// compile time. Development mode applies them at startup.
///
/// # Example
///
/// ```no_run
/// use teamdesk_shared::db::migrations::{ensure_database_exists, run_migrations};
/// use teamdesk_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let url = std::env::var("DATABASE_URL")?;
/// ensure_database_exists(&url).await?;
///
/// let pool = create_pool(DatabaseConfig { url, ..Default::default() }).await?;
/// run_migrations(&pool).await?;
/// # Ok(())
/// # }
/// ```

use sqlx::{migrate::MigrateDatabase, migrate::Migrator, postgres::PgPool, Postgres};
use tracing::{debug, info, warn};

/// Embedded workspace migrations
pub static MIGRATOR: Migrator = sqlx::migrate!("../migrations");

/// Applies all pending migrations
///
/// # Errors
///
/// Returns an error if a migration fails; sqlx rolls back the failing
/// migration's transaction.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Starting database migrations");

    match MIGRATOR.run(pool).await {
        Ok(()) => {
            info!("All database migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            warn!("Migration failed: {}", e);
            Err(e)
        }
    }
}

/// Creates the database named in `database_url` if it is missing
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if !Postgres::database_exists(database_url).await? {
        info!("Database does not exist, creating it");
        Postgres::create_database(database_url).await?;
    } else {
        debug!("Database already exists");
    }

    Ok(())
}
