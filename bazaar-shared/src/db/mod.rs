/// Database layer for Bazaar
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool management with health checks
/// - `migrations`: Embedded migration runner
///
/// Queries live with the store that owns them ([`crate::store::postgres`]).
///
/// # Example
///
/// ```no_run
/// use bazaar_shared::db::pool::{create_pool, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig {
///         url: std::env::var("DATABASE_URL")?,
///         ..Default::default()
///     };
///
///     let pool = create_pool(config).await?;
///     bazaar_shared::db::migrations::run_migrations(&pool).await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;
