/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `PRODUCTION`: Enables secure cookies and HSTS (default: false)
/// - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: *)
/// - `DATABASE_URL`: PostgreSQL connection string (in-memory store if unset)
/// - `REDIS_URL`: Redis connection string (in-memory session cache if unset)
/// - `ACTIVATION_SECRET`, `ACCESS_TOKEN_SECRET`, `REFRESH_TOKEN_SECRET`:
///   Token keys, at least 32 bytes each and pairwise distinct (required)
/// - `ACCESS_TOKEN_TTL_SECS` (default: 300)
/// - `REFRESH_TOKEN_TTL_SECS` (default: 259200)
/// - `ACTIVATION_TOKEN_TTL_SECS` (default: 300)
/// - `AUTH_IO_TIMEOUT_MS`: Bound on store, cache and notifier calls (default: 5000)
/// - `ASSET_ROOT`: Directory avatars are written to (default: ./assets)
/// - `ASSET_PUBLIC_URL`: URL prefix avatars are served from (default: /assets)
/// - `RUST_LOG`: Log filter
///
/// # Example
///
/// ```no_run
/// use bazaar_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use bazaar_shared::auth::credentials::CredentialSettings;
use bazaar_shared::auth::jwt::{TokenKeys, MIN_SECRET_LEN};
use bazaar_shared::db::pool::DatabaseConfig;
use bazaar_shared::session::RedisConfig;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// PostgreSQL settings; `None` selects the in-memory store
    pub database: Option<DatabaseConfig>,

    /// Redis settings; `None` selects the in-memory session cache
    pub redis: Option<RedisConfig>,

    /// Token keys and lifetimes
    pub auth: AuthConfig,

    /// Avatar storage
    pub assets: AssetConfig,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Production mode: secure cookies and HSTS
    pub production: bool,

    /// Allowed CORS origins (`*` allows any)
    pub cors_origins: Vec<String>,
}

/// Token and credential configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Signing keys, one per token class
    pub keys: TokenKeys,

    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    pub activation_ttl_secs: u64,
    pub io_timeout_ms: u64,
}

/// Avatar storage configuration
#[derive(Debug, Clone)]
pub struct AssetConfig {
    pub root: String,
    pub public_url: String,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A token secret is missing, shorter than 32 bytes, or shared
    /// - A numeric variable does not parse
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an explicit variable map
    pub fn from_vars(vars: &HashMap<String, String>) -> anyhow::Result<Self> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api = ApiConfig {
            host: get("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&get, "API_PORT", 8080)?,
            production: parse_or(&get, "PRODUCTION", false)?,
            cors_origins: get("CORS_ORIGINS")
                .unwrap_or_else(|| "*".to_string())
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
        };

        let database = get("DATABASE_URL").map(|url| {
            let mut config = DatabaseConfig::new(url);
            if let Some(max) = get("DATABASE_MAX_CONNECTIONS").and_then(|s| s.parse().ok()) {
                config.max_connections = max;
            }
            config
        });

        let redis = get("REDIS_URL").map(RedisConfig::new);

        let keys = TokenKeys {
            activation: required_secret(&get, "ACTIVATION_SECRET")?,
            access: required_secret(&get, "ACCESS_TOKEN_SECRET")?,
            refresh: required_secret(&get, "REFRESH_TOKEN_SECRET")?,
        };

        if keys.activation == keys.access
            || keys.activation == keys.refresh
            || keys.access == keys.refresh
        {
            anyhow::bail!("Token secrets must be distinct per token class");
        }

        let auth = AuthConfig {
            keys,
            access_ttl_secs: parse_or(&get, "ACCESS_TOKEN_TTL_SECS", 300)?,
            refresh_ttl_secs: parse_or(&get, "REFRESH_TOKEN_TTL_SECS", 259_200)?,
            activation_ttl_secs: parse_or(&get, "ACTIVATION_TOKEN_TTL_SECS", 300)?,
            io_timeout_ms: parse_or(&get, "AUTH_IO_TIMEOUT_MS", 5000)?,
        };

        let assets = AssetConfig {
            root: get("ASSET_ROOT").unwrap_or_else(|| "./assets".to_string()),
            public_url: get("ASSET_PUBLIC_URL").unwrap_or_else(|| "/assets".to_string()),
        };

        Ok(Self {
            api,
            database,
            redis,
            auth,
            assets,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Lifetimes and timeouts for the credential services
    pub fn credential_settings(&self) -> CredentialSettings {
        CredentialSettings {
            access_ttl: Duration::from_secs(self.auth.access_ttl_secs),
            refresh_ttl: Duration::from_secs(self.auth.refresh_ttl_secs),
            activation_ttl: Duration::from_secs(self.auth.activation_ttl_secs),
            io_timeout: Duration::from_millis(self.auth.io_timeout_ms),
        }
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value: {}", key, e)),
        None => Ok(default),
    }
}

fn required_secret<G>(get: &G, key: &str) -> anyhow::Result<String>
where
    G: Fn(&str) -> Option<String>,
{
    let secret = get(key).ok_or_else(|| anyhow::anyhow!("{} environment variable is required", key))?;

    if secret.len() < MIN_SECRET_LEN {
        anyhow::bail!("{} must be at least {} characters long", key, MIN_SECRET_LEN);
    }

    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        [
            ("ACTIVATION_SECRET", "activation-secret-at-least-32-bytes-long"),
            ("ACCESS_TOKEN_SECRET", "access-secret-at-least-32-bytes-long-x"),
            ("REFRESH_TOKEN_SECRET", "refresh-secret-at-least-32-bytes-long"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(&base_vars()).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(!config.api.production);
        assert_eq!(config.api.cors_origins, vec!["*".to_string()]);
        assert!(config.database.is_none());
        assert!(config.redis.is_none());

        let settings = config.credential_settings();
        assert_eq!(settings.access_ttl, Duration::from_secs(300));
        assert_eq!(settings.refresh_ttl, Duration::from_secs(3 * 24 * 60 * 60));
        assert_eq!(settings.activation_ttl, Duration::from_secs(300));
        assert_eq!(settings.io_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn test_overrides() {
        let mut vars = base_vars();
        vars.insert("API_PORT".to_string(), "9000".to_string());
        vars.insert("PRODUCTION".to_string(), "true".to_string());
        vars.insert(
            "CORS_ORIGINS".to_string(),
            "https://a.example, https://b.example".to_string(),
        );
        vars.insert("REDIS_URL".to_string(), "redis://localhost:6379".to_string());
        vars.insert("AUTH_IO_TIMEOUT_MS".to_string(), "250".to_string());

        let config = Config::from_vars(&vars).unwrap();

        assert_eq!(config.api.port, 9000);
        assert!(config.api.production);
        assert_eq!(config.api.cors_origins.len(), 2);
        assert_eq!(config.redis.as_ref().unwrap().url, "redis://localhost:6379");
        assert_eq!(
            config.credential_settings().io_timeout,
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_missing_secret() {
        let mut vars = base_vars();
        vars.remove("REFRESH_TOKEN_SECRET");

        let err = Config::from_vars(&vars).unwrap_err();
        assert!(err.to_string().contains("REFRESH_TOKEN_SECRET"));
    }

    #[test]
    fn test_short_or_shared_secret_rejected() {
        let mut vars = base_vars();
        vars.insert("ACCESS_TOKEN_SECRET".to_string(), "short".to_string());
        assert!(Config::from_vars(&vars).is_err());

        let mut vars = base_vars();
        let refresh = vars["REFRESH_TOKEN_SECRET"].clone();
        vars.insert("ACCESS_TOKEN_SECRET".to_string(), refresh);
        assert!(Config::from_vars(&vars).is_err());
    }

    #[test]
    fn test_invalid_number() {
        let mut vars = base_vars();
        vars.insert("API_PORT".to_string(), "eighty".to_string());

        let err = Config::from_vars(&vars).unwrap_err();
        assert!(err.to_string().contains("API_PORT"));
    }
}
