//! # Bazaar API Server
//!
//! Credential and session service for the Bazaar marketplace. Users and shops
//! register, activate with an emailed code, log in, refresh and log out.
//!
//! ## Backends
//!
//! - PostgreSQL principal stores when `DATABASE_URL` is set, in-memory otherwise
//! - Redis session cache when `REDIS_URL` is set, in-memory otherwise
//! - Avatars written below `ASSET_ROOT`
//! - Activation codes delivered through the log
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p bazaar-api
//! ```

use bazaar_api::app::{build_router, AppState, Backends};
use bazaar_api::config::Config;
use bazaar_shared::assets::LocalAssetStore;
use bazaar_shared::auth::password::PasswordHasher;
use bazaar_shared::db::{migrations, pool};
use bazaar_shared::models::PrincipalKind;
use bazaar_shared::notify::TracingNotifier;
use bazaar_shared::session::redis::sanitize_url;
use bazaar_shared::session::{MemorySessionCache, RedisSessionCache, SessionCache};
use bazaar_shared::store::{MemoryPrincipalStore, PgPrincipalStore, PrincipalStore};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "bazaar_api=debug,bazaar_shared=info,tower_http=debug";

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn principal_stores(
    config: &Config,
) -> anyhow::Result<(Arc<dyn PrincipalStore>, Arc<dyn PrincipalStore>)> {
    let Some(database) = config.database.clone() else {
        tracing::warn!("DATABASE_URL not set, principals are kept in memory and lost on restart");
        return Ok((
            Arc::new(MemoryPrincipalStore::new(PrincipalKind::User)),
            Arc::new(MemoryPrincipalStore::new(PrincipalKind::Shop)),
        ));
    };

    migrations::ensure_database_exists(&database.url).await?;
    let db = pool::create_pool(database).await?;
    migrations::run_migrations(&db).await?;

    let status = migrations::get_migration_status(&db).await?;
    tracing::info!(
        applied = status.applied_migrations,
        latest = ?status.latest_version,
        "Database ready"
    );

    Ok((
        Arc::new(PgPrincipalStore::new(db.clone(), PrincipalKind::User)),
        Arc::new(PgPrincipalStore::new(db, PrincipalKind::Shop)),
    ))
}

async fn session_cache(config: &Config) -> anyhow::Result<Arc<dyn SessionCache>> {
    match config.redis.clone() {
        Some(redis) => {
            let url = sanitize_url(&redis.url);
            let cache = RedisSessionCache::connect(redis).await?;
            tracing::info!(url = %url, "Session cache connected");
            Ok(Arc::new(cache))
        }
        None => {
            tracing::warn!("REDIS_URL not set, sessions are kept in memory and lost on restart");
            Ok(Arc::new(MemorySessionCache::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received, draining connections...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.api.production);

    tracing::info!(
        "Bazaar API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let (users, shops) = principal_stores(&config).await?;
    let sessions = session_cache(&config).await?;

    let backends = Backends {
        users,
        shops,
        sessions,
        notifier: Arc::new(TracingNotifier),
        assets: Arc::new(LocalAssetStore::new(
            config.assets.root.clone(),
            config.assets.public_url.clone(),
        )),
    };

    let bind_address = config.bind_address();
    let state = AppState::new(config, backends, PasswordHasher::new())?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
