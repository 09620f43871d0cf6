/// Principal persistence
///
/// [`PrincipalStore`] is the narrow contract the credential service needs from
/// a record store. One store instance serves one [`PrincipalKind`], so users
/// and shops never see each other's records even though they share a table.
///
/// # Adapters
///
/// - [`PgPrincipalStore`]: PostgreSQL via sqlx
/// - [`MemoryPrincipalStore`]: process memory (tests, local development)
///
/// Email uniqueness is settled by the store itself (a unique index, or a
/// single write lock), so two concurrent `create` calls for one email yield
/// exactly one success and one `StoreError::DuplicateEmail`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{NewPrincipal, Principal, PrincipalKind, PrincipalPatch};

pub mod memory;
pub mod postgres;

pub use memory::MemoryPrincipalStore;
pub use postgres::PgPrincipalStore;

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Email already taken for this kind
    #[error("Email already exists")]
    DuplicateEmail,

    /// No record with that id
    #[error("Record not found")]
    NotFound,

    /// Backend failure
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence contract for principals of a single kind
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Kind of principal this store holds
    fn kind(&self) -> PrincipalKind;

    /// Looks up by normalized email
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, StoreError>;

    /// Inserts a principal, failing with `DuplicateEmail` on conflict
    async fn create(&self, new: NewPrincipal) -> Result<Principal, StoreError>;

    /// Applies a patch and returns the updated record
    ///
    /// Fails with `NotFound` if the id does not exist.
    async fn update(&self, id: Uuid, patch: PrincipalPatch) -> Result<Principal, StoreError>;

    /// Deletes by id, returning whether a record was removed
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    /// All principals, newest first
    async fn list(&self) -> Result<Vec<Principal>, StoreError>;

    /// Health check
    async fn ping(&self) -> Result<(), StoreError>;
}
