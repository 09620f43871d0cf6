/// Session cache
///
/// A session is the cached [`Profile`] of a logged-in principal, stored under
/// `session:{principal_id}` with a TTL equal to the refresh-token lifetime.
/// Presence of the record is the sole authority for whether an access token is
/// still honoured: logging out deletes it, and every request re-reads it.
///
/// # Adapters
///
/// - [`RedisSessionCache`]: production, shared across API instances
/// - [`MemorySessionCache`]: single process (tests, local development)
///
/// # Write Semantics
///
/// - `put` creates or overwrites (login)
/// - `replace` writes only if a record is present (refresh and profile
///   mutations), so a concurrent logout is never undone
/// - `delete` is idempotent

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::models::Profile;

pub mod memory;
pub mod redis;

pub use memory::MemorySessionCache;
pub use self::redis::{RedisConfig, RedisSessionCache};

/// Session cache errors
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Backend unreachable or command failed
    #[error("Session cache error: {0}")]
    Backend(String),

    /// Stored record could not be (de)serialized
    #[error("Session record is corrupt: {0}")]
    Corrupt(String),

    /// Misconfigured adapter
    #[error("Session cache configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Corrupt(err.to_string())
    }
}

/// Cached identity of a logged-in principal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub principal: Profile,

    /// When the session was first established by login
    pub established_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(principal: Profile) -> Self {
        Self {
            principal,
            established_at: Utc::now(),
        }
    }

    /// Same session, updated principal snapshot
    pub fn with_principal(&self, principal: Profile) -> Self {
        Self {
            principal,
            established_at: self.established_at,
        }
    }
}

/// Cache key for a principal's session
pub fn session_key(principal_id: Uuid) -> String {
    format!("session:{}", principal_id)
}

/// Key-value store for session records
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Creates or overwrites the session with a fresh TTL
    async fn put(&self, id: Uuid, record: &SessionRecord, ttl: Duration) -> Result<(), CacheError>;

    /// Overwrites the session only if one exists
    ///
    /// Returns `false` when there was nothing to replace.
    async fn replace(
        &self,
        id: Uuid,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<bool, CacheError>;

    /// Reads the session, `None` if absent or expired
    async fn get(&self, id: Uuid) -> Result<Option<SessionRecord>, CacheError>;

    /// Removes the session; absent sessions are not an error
    async fn delete(&self, id: Uuid) -> Result<(), CacheError>;

    /// Health check
    async fn ping(&self) -> Result<(), CacheError>;
}
