/// In-process session cache
///
/// Records live in a `HashMap` behind a tokio `RwLock`, each with a deadline
/// measured on the tokio clock so tests can advance time with
/// `tokio::time::pause`. Expired records are dropped lazily on access.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use super::{CacheError, SessionCache, SessionRecord};

#[derive(Debug)]
struct Entry {
    record: SessionRecord,
    deadline: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.deadline
    }
}

/// Session cache backed by process memory
#[derive(Debug, Default)]
pub struct MemorySessionCache {
    entries: RwLock<HashMap<Uuid, Entry>>,
}

impl MemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionCache for MemorySessionCache {
    async fn put(&self, id: Uuid, record: &SessionRecord, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            record: record.clone(),
            deadline: Instant::now() + ttl,
        };
        self.entries.write().await.insert(id, entry);
        Ok(())
    }

    async fn replace(
        &self,
        id: Uuid,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        match entries.get_mut(&id) {
            Some(entry) if entry.is_live(now) => {
                entry.record = record.clone();
                entry.deadline = now + ttl;
                Ok(true)
            }
            Some(_) => {
                entries.remove(&id);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<SessionRecord>, CacheError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(&id) {
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.record.clone())),
                None => return Ok(None),
                Some(_) => {}
            }
        }

        // Expired: evict
        self.entries.write().await.remove(&id);
        Ok(None)
    }

    async fn delete(&self, id: Uuid) -> Result<(), CacheError> {
        self.entries.write().await.remove(&id);
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
