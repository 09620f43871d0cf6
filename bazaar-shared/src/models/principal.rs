/// Principal model: marketplace users and shops
///
/// A principal is anything that can log in. Users (buyers) and shops (sellers)
/// share the same credential lifecycle and the same shape; they differ in their
/// [`PrincipalKind`], their default [`Role`] and the fields required at
/// registration.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE principals (
///     id UUID PRIMARY KEY,
///     kind principal_kind NOT NULL,
///     email VARCHAR(320) NOT NULL,
///     password_hash VARCHAR(255) NOT NULL,
///     role principal_role NOT NULL,
///     name VARCHAR(100) NOT NULL,
///     phone_number VARCHAR(32),
///     addresses JSONB NOT NULL DEFAULT '[]',
///     avatar_asset_id VARCHAR(255),
///     avatar_url VARCHAR(1024),
///     verified BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (kind, email)
/// );
/// ```
///
/// # Outward Representation
///
/// The password hash never leaves the core: [`Principal`] skips it when
/// serialized and [`Profile`], the view handed to sessions and HTTP clients,
/// has no such field at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Address type under which a shop's registration address is stored
pub const BUSINESS_ADDRESS_TYPE: &str = "business";

/// Which portal a principal belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "principal_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    /// Buyer account
    User,

    /// Seller storefront
    Shop,
}

impl PrincipalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalKind::User => "user",
            PrincipalKind::Shop => "shop",
        }
    }

    /// Role granted on activation
    pub fn default_role(&self) -> Role {
        match self {
            PrincipalKind::User => Role::User,
            PrincipalKind::Shop => Role::Seller,
        }
    }
}

impl std::fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authorization role
///
/// Roles are flat: `Admin` does not implicitly include `Seller`. Routes list
/// every role they accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "principal_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Seller,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Seller => "seller",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Postal address
///
/// A user keeps at most one address per `address_type` ("home", "office", ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: Uuid,
    pub address_type: String,
    pub country: String,
    pub city: String,
    pub address1: String,
    pub address2: Option<String>,
    pub zip_code: Option<String>,
}

/// Address as supplied by a client
///
/// `id` is present when editing an existing entry and absent when adding one.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddressInput {
    #[serde(default)]
    pub id: Option<Uuid>,

    #[validate(length(min = 1, max = 32, message = "Address type is required"))]
    pub address_type: String,

    #[validate(length(min = 1, max = 64, message = "Country is required"))]
    pub country: String,

    #[validate(length(min = 1, max = 64, message = "City is required"))]
    pub city: String,

    #[validate(length(min = 1, max = 256, message = "Address is required"))]
    pub address1: String,

    #[serde(default)]
    #[validate(length(max = 256))]
    pub address2: Option<String>,

    #[serde(default)]
    #[validate(length(max = 16))]
    pub zip_code: Option<String>,
}

impl AddressInput {
    /// Materializes the input, minting an id for new entries
    pub fn into_address(self) -> Address {
        Address {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            address_type: self.address_type.trim().to_lowercase(),
            country: self.country,
            city: self.city,
            address1: self.address1,
            address2: self.address2,
            zip_code: self.zip_code,
        }
    }
}

/// Uploaded profile picture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Avatar {
    /// Identifier understood by the asset store
    pub asset_id: String,

    /// Public URL of the image
    pub url: String,
}

/// Stored principal, including its credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// Unique principal ID (UUID v4)
    pub id: Uuid,

    pub kind: PrincipalKind,

    /// Email address, trimmed and lowercased
    ///
    /// Unique per kind: the same address may own a user and a shop.
    pub email: String,

    /// Argon2id PHC string
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub role: Role,

    /// Display name (user name or shop name)
    pub name: String,

    pub phone_number: Option<String>,

    pub addresses: Vec<Address>,

    pub avatar: Option<Avatar>,

    /// Set once the activation code has been confirmed
    pub verified: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Principal {
    /// Outward-facing view without the credential
    pub fn profile(&self) -> Profile {
        Profile {
            id: self.id,
            kind: self.kind,
            email: self.email.clone(),
            role: self.role,
            name: self.name.clone(),
            phone_number: self.phone_number.clone(),
            addresses: self.addresses.clone(),
            avatar: self.avatar.clone(),
            verified: self.verified,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Principal snapshot cached in sessions and returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub kind: PrincipalKind,
    pub email: String,
    pub role: Role,
    pub name: String,
    pub phone_number: Option<String>,
    pub addresses: Vec<Address>,
    pub avatar: Option<Avatar>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Would-be principal carried inside a pending activation token
///
/// The secret is already hashed when this is built; nothing here is persisted
/// until the activation code is confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPrincipal {
    pub kind: PrincipalKind,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone_number: Option<String>,
    pub address: Option<Address>,
}

/// Input for creating a principal
#[derive(Debug, Clone)]
pub struct NewPrincipal {
    pub kind: PrincipalKind,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub name: String,
    pub phone_number: Option<String>,
    pub addresses: Vec<Address>,
    pub verified: bool,
}

impl NewPrincipal {
    /// Activated principal built from a confirmed registration
    pub fn activated(pending: PendingPrincipal) -> Self {
        Self {
            kind: pending.kind,
            role: pending.kind.default_role(),
            email: pending.email,
            password_hash: pending.password_hash,
            name: pending.name,
            phone_number: pending.phone_number,
            addresses: pending.address.into_iter().collect(),
            verified: true,
        }
    }
}

/// Partial update of a principal
///
/// Only `Some` fields are written. Nested options clear the column when set to
/// `Some(None)`.
#[derive(Debug, Clone, Default)]
pub struct PrincipalPatch {
    pub name: Option<String>,
    pub phone_number: Option<Option<String>>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub addresses: Option<Vec<Address>>,
    pub avatar: Option<Option<Avatar>>,
}

impl PrincipalPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone_number.is_none()
            && self.password_hash.is_none()
            && self.role.is_none()
            && self.addresses.is_none()
            && self.avatar.is_none()
    }

    /// Applies the patch in place and bumps `updated_at`
    pub fn apply(self, principal: &mut Principal, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            principal.name = name;
        }
        if let Some(phone_number) = self.phone_number {
            principal.phone_number = phone_number;
        }
        if let Some(password_hash) = self.password_hash {
            principal.password_hash = password_hash;
        }
        if let Some(role) = self.role {
            principal.role = role;
        }
        if let Some(addresses) = self.addresses {
            principal.addresses = addresses;
        }
        if let Some(avatar) = self.avatar {
            principal.avatar = avatar;
        }
        principal.updated_at = now;
    }
}

/// Canonical form of an email address used for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
