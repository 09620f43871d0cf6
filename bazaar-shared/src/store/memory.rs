/// In-memory principal store
///
/// All mutations take the single write lock, which makes `create` an atomic
/// check-and-insert on the email.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{PrincipalStore, StoreError};
use crate::models::{NewPrincipal, Principal, PrincipalKind, PrincipalPatch};

#[derive(Debug)]
pub struct MemoryPrincipalStore {
    kind: PrincipalKind,
    records: RwLock<HashMap<Uuid, Principal>>,
}

impl MemoryPrincipalStore {
    pub fn new(kind: PrincipalKind) -> Self {
        Self {
            kind,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored principals
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl PrincipalStore for MemoryPrincipalStore {
    fn kind(&self) -> PrincipalKind {
        self.kind
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError> {
        let records = self.records.read().await;
        Ok(records.values().find(|p| p.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn create(&self, new: NewPrincipal) -> Result<Principal, StoreError> {
        let mut records = self.records.write().await;

        if records.values().any(|p| p.email == new.email) {
            return Err(StoreError::DuplicateEmail);
        }

        let now = Utc::now();
        let principal = Principal {
            id: Uuid::new_v4(),
            kind: self.kind,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            name: new.name,
            phone_number: new.phone_number,
            addresses: new.addresses,
            avatar: None,
            verified: new.verified,
            created_at: now,
            updated_at: now,
        };

        records.insert(principal.id, principal.clone());
        Ok(principal)
    }

    async fn update(&self, id: Uuid, patch: PrincipalPatch) -> Result<Principal, StoreError> {
        let mut records = self.records.write().await;
        let principal = records.get_mut(&id).ok_or(StoreError::NotFound)?;

        patch.apply(principal, Utc::now());
        Ok(principal.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(&id).is_some())
    }

    async fn list(&self) -> Result<Vec<Principal>, StoreError> {
        let mut all: Vec<Principal> = self.records.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
