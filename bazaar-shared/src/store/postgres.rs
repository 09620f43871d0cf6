/// PostgreSQL principal store
///
/// Users and shops share the `principals` table, discriminated by `kind`. The
/// `(kind, email)` unique constraint is the authority on email uniqueness; a
/// violation surfaces as `StoreError::DuplicateEmail`.
///
/// Addresses are a JSONB array and the avatar is split across two nullable
/// columns.
///
/// # Example
///
/// ```no_run
/// use bazaar_shared::models::PrincipalKind;
/// use bazaar_shared::store::{PgPrincipalStore, PrincipalStore};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let shops = PgPrincipalStore::new(pool, PrincipalKind::Shop);
///
/// if let Some(shop) = shops.find_by_email("shop@example.com").await? {
///     println!("Found shop: {}", shop.id);
/// }
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{PrincipalStore, StoreError};
use crate::models::{
    Address, Avatar, NewPrincipal, Principal, PrincipalKind, PrincipalPatch, Role,
};

const COLUMNS: &str = "id, kind, email, password_hash, role, name, phone_number, addresses, \
                       avatar_asset_id, avatar_url, verified, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct PrincipalRow {
    id: Uuid,
    kind: PrincipalKind,
    email: String,
    password_hash: String,
    role: Role,
    name: String,
    phone_number: Option<String>,
    addresses: Json<Vec<Address>>,
    avatar_asset_id: Option<String>,
    avatar_url: Option<String>,
    verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PrincipalRow> for Principal {
    fn from(row: PrincipalRow) -> Self {
        let avatar = match (row.avatar_asset_id, row.avatar_url) {
            (Some(asset_id), Some(url)) => Some(Avatar { asset_id, url }),
            _ => None,
        };

        Principal {
            id: row.id,
            kind: row.kind,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role,
            name: row.name,
            phone_number: row.phone_number,
            addresses: row.addresses.0,
            avatar,
            verified: row.verified,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
        sqlx::Error::RowNotFound => StoreError::NotFound,
        _ => {
            tracing::error!(error = %err, "Principal store query failed");
            StoreError::Unavailable(err.to_string())
        }
    }
}

/// Principal store backed by PostgreSQL
#[derive(Debug, Clone)]
pub struct PgPrincipalStore {
    pool: PgPool,
    kind: PrincipalKind,
}

impl PgPrincipalStore {
    pub fn new(pool: PgPool, kind: PrincipalKind) -> Self {
        Self { pool, kind }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PrincipalStore for PgPrincipalStore {
    fn kind(&self) -> PrincipalKind {
        self.kind
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError> {
        let row = sqlx::query_as::<_, PrincipalRow>(&format!(
            "SELECT {} FROM principals WHERE kind = $1 AND email = $2",
            COLUMNS
        ))
        .bind(self.kind)
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Principal::from))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, StoreError> {
        let row = sqlx::query_as::<_, PrincipalRow>(&format!(
            "SELECT {} FROM principals WHERE kind = $1 AND id = $2",
            COLUMNS
        ))
        .bind(self.kind)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Principal::from))
    }

    async fn create(&self, new: NewPrincipal) -> Result<Principal, StoreError> {
        let row = sqlx::query_as::<_, PrincipalRow>(&format!(
            r#"
            INSERT INTO principals
                (id, kind, email, password_hash, role, name, phone_number, addresses, verified)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(self.kind)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.role)
        .bind(new.name)
        .bind(new.phone_number)
        .bind(Json(new.addresses))
        .bind(new.verified)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        tracing::info!(principal_id = %row.id, kind = %self.kind, "Principal created");
        Ok(row.into())
    }

    async fn update(&self, id: Uuid, patch: PrincipalPatch) -> Result<Principal, StoreError> {
        // Build the SET list from the fields present, binding in the same order
        let mut query = String::from("UPDATE principals SET updated_at = NOW()");
        let mut bind_count = 2;

        let mut push = |column: &str| {
            bind_count += 1;
            query.push_str(&format!(", {} = ${}", column, bind_count));
        };

        if patch.name.is_some() {
            push("name");
        }
        if patch.phone_number.is_some() {
            push("phone_number");
        }
        if patch.password_hash.is_some() {
            push("password_hash");
        }
        if patch.role.is_some() {
            push("role");
        }
        if patch.addresses.is_some() {
            push("addresses");
        }
        if patch.avatar.is_some() {
            push("avatar_asset_id");
            push("avatar_url");
        }

        query.push_str(&format!(" WHERE kind = $1 AND id = $2 RETURNING {}", COLUMNS));

        let mut q = sqlx::query_as::<_, PrincipalRow>(&query)
            .bind(self.kind)
            .bind(id);

        if let Some(name) = patch.name {
            q = q.bind(name);
        }
        if let Some(phone_number) = patch.phone_number {
            q = q.bind(phone_number);
        }
        if let Some(password_hash) = patch.password_hash {
            q = q.bind(password_hash);
        }
        if let Some(role) = patch.role {
            q = q.bind(role);
        }
        if let Some(addresses) = patch.addresses {
            q = q.bind(Json(addresses));
        }
        if let Some(avatar) = patch.avatar {
            let (asset_id, url) = match avatar {
                Some(a) => (Some(a.asset_id), Some(a.url)),
                None => (None, None),
            };
            q = q.bind(asset_id).bind(url);
        }

        let row = q
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or(StoreError::NotFound)?;

        Ok(row.into())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM principals WHERE kind = $1 AND id = $2")
            .bind(self.kind)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<Principal>, StoreError> {
        let rows = sqlx::query_as::<_, PrincipalRow>(&format!(
            "SELECT {} FROM principals WHERE kind = $1 ORDER BY created_at DESC",
            COLUMNS
        ))
        .bind(self.kind)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Principal::from).collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        crate::db::pool::health_check(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}
