/// Redis-backed session cache
///
/// Records are stored as JSON strings with a native Redis TTL:
///
/// ```text
/// SET session:{id} <json> EX <ttl>        -- put
/// SET session:{id} <json> EX <ttl> XX     -- replace (only if present)
/// GET session:{id}
/// DEL session:{id}
/// ```
///
/// The connection is a `redis::aio::ConnectionManager`, which reconnects on
/// its own; every command is bounded by the configured command timeout.
///
/// # Example
///
/// ```no_run
/// use bazaar_shared::session::{RedisConfig, RedisSessionCache, SessionCache};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = RedisConfig::from_env()?;
/// let cache = RedisSessionCache::connect(config).await?;
///
/// cache.ping().await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use std::env;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use super::{session_key, CacheError, SessionCache, SessionRecord};

impl From<RedisError> for CacheError {
    fn from(err: RedisError) -> Self {
        match err.kind() {
            redis::ErrorKind::IoError => CacheError::Backend(format!("IO error: {}", err)),
            redis::ErrorKind::ResponseError => {
                CacheError::Backend(format!("Response error: {}", err))
            }
            _ => CacheError::Backend(err.to_string()),
        }
    }
}

/// Redis configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL
    ///
    /// Format: redis://[username:password@]host:port[/db]
    pub url: String,

    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,

    /// Command timeout in seconds
    pub command_timeout_secs: u64,
}

impl RedisConfig {
    /// Configuration for the given URL with default timeouts
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connection_timeout_secs: 5,
            command_timeout_secs: 5,
        }
    }

    /// Loads configuration from environment variables
    ///
    /// # Environment Variables
    ///
    /// - `REDIS_URL`: Redis connection URL (required)
    /// - `REDIS_CONNECTION_TIMEOUT_SECS`: Connection timeout (default: 5)
    /// - `REDIS_COMMAND_TIMEOUT_SECS`: Command timeout (default: 5)
    pub fn from_env() -> Result<Self, CacheError> {
        dotenvy::dotenv().ok();

        let url = env::var("REDIS_URL").map_err(|_| {
            CacheError::Config("REDIS_URL environment variable is required".to_string())
        })?;

        let mut config = Self::new(url);

        if let Some(secs) = env::var("REDIS_CONNECTION_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.connection_timeout_secs = secs;
        }

        if let Some(secs) = env::var("REDIS_COMMAND_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.command_timeout_secs = secs;
        }

        Ok(config)
    }
}

/// Session cache backed by Redis
#[derive(Clone)]
pub struct RedisSessionCache {
    manager: ConnectionManager,
    command_timeout: Duration,
}

impl RedisSessionCache {
    /// Connects to Redis
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the initial connection fails
    /// within the connection timeout.
    pub async fn connect(config: RedisConfig) -> Result<Self, CacheError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| CacheError::Config(format!("Invalid Redis URL: {}", e)))?;

        let manager = tokio::time::timeout(
            Duration::from_secs(config.connection_timeout_secs),
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| CacheError::Backend("Redis connection timed out".to_string()))?
        .map_err(|e| CacheError::Backend(format!("Failed to connect to Redis: {}", e)))?;

        tracing::info!(url = %sanitize_url(&config.url), "Redis session cache connected");

        Ok(Self {
            manager,
            command_timeout: Duration::from_secs(config.command_timeout_secs),
        })
    }

    async fn run<T, F>(&self, command: &'static str, fut: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, RedisError>>,
    {
        tokio::time::timeout(self.command_timeout, fut)
            .await
            .map_err(|_| CacheError::Backend(format!("{} command timed out", command)))?
            .map_err(CacheError::from)
    }
}

fn ttl_secs(ttl: Duration) -> u64 {
    // EX rejects zero
    ttl.as_secs().max(1)
}

#[async_trait]
impl SessionCache for RedisSessionCache {
    async fn put(&self, id: Uuid, record: &SessionRecord, ttl: Duration) -> Result<(), CacheError> {
        let payload = serde_json::to_string(record)?;
        let mut conn = self.manager.clone();

        let _: () = self
            .run(
                "SET",
                redis::cmd("SET")
                    .arg(session_key(id))
                    .arg(payload)
                    .arg("EX")
                    .arg(ttl_secs(ttl))
                    .query_async(&mut conn),
            )
            .await?;

        tracing::debug!(principal_id = %id, ttl_secs = ttl.as_secs(), "Session stored");
        Ok(())
    }

    async fn replace(
        &self,
        id: Uuid,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let payload = serde_json::to_string(record)?;
        let mut conn = self.manager.clone();

        // Nil reply means the key was absent and nothing was written
        let reply: Option<String> = self
            .run(
                "SET XX",
                redis::cmd("SET")
                    .arg(session_key(id))
                    .arg(payload)
                    .arg("EX")
                    .arg(ttl_secs(ttl))
                    .arg("XX")
                    .query_async(&mut conn),
            )
            .await?;

        Ok(reply.is_some())
    }

    async fn get(&self, id: Uuid) -> Result<Option<SessionRecord>, CacheError> {
        let mut conn = self.manager.clone();

        let raw: Option<String> = self
            .run(
                "GET",
                redis::cmd("GET").arg(session_key(id)).query_async(&mut conn),
            )
            .await?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();

        let removed: i64 = self
            .run(
                "DEL",
                redis::cmd("DEL").arg(session_key(id)).query_async(&mut conn),
            )
            .await?;

        tracing::debug!(principal_id = %id, removed, "Session deleted");
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.manager.clone();

        let pong: String = self
            .run("PING", redis::cmd("PING").query_async(&mut conn))
            .await?;

        if pong == "PONG" {
            Ok(())
        } else {
            tracing::warn!(response = %pong, "Redis health check: unexpected response");
            Err(CacheError::Backend(format!("unexpected PING reply: {}", pong)))
        }
    }
}

/// Sanitizes a Redis URL by removing credentials
///
/// Replaces username:password with ***:*** for logging.
pub fn sanitize_url(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(scheme_end) = url.find("://") {
            let scheme = &url[..scheme_end + 3];
            let host = &url[at_pos + 1..];
            return format!("{}***:***@{}", scheme, host);
        }
    }
    url.to_string()
}
