/// Credential service: registration, activation, login and session lifecycle
///
/// One service instance serves one [`PrincipalKind`]. Users and shops run
/// identical flows against their own store.
///
/// # Lifecycle
///
/// ```text
/// register ──► PendingActivation ──activate(code)──► Activated
///                     │
///                     └── (token expiry) ──► Expired
///
/// login ──► TokenPair + session:{id} in cache
/// refresh ──► new TokenPair, session TTL slides (only if session still exists)
/// logout ──► session removed, outstanding tokens stop working
/// ```
///
/// # Failure Semantics
///
/// Every store, cache, notifier and asset call is bounded by
/// [`CredentialSettings::io_timeout`]. Timeouts and collaborator failures are
/// reported as `ServiceUnavailable`; nothing is retried.
///
/// # Example
///
/// ```no_run
/// use bazaar_shared::auth::credentials::{CredentialService, Registration};
///
/// # async fn example(users: CredentialService) -> Result<(), Box<dyn std::error::Error>> {
/// let pending = users
///     .register(Registration {
///         name: "A".to_string(),
///         email: "a@x.io".to_string(),
///         password: "Secret123".to_string(),
///         phone_number: None,
///         address: None,
///     })
///     .await?;
///
/// // The code arrives through the notifier
/// let profile = users.activate(&pending.activation_token, "4821").await?;
///
/// let session = users.login("a@x.io", "Secret123").await?;
/// let renewed = users.refresh(&session.tokens.refresh_token).await?;
/// users.logout(profile.id).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use super::activation::{code_matches, decode_pending, encode_pending};
use super::jwt::{KeyClass, TokenSigner};
use super::password::{validate_password_strength, PasswordHasher};
use crate::assets::AssetStore;
use crate::error::{AuthError, AuthResult};
use crate::models::principal::{normalize_email, BUSINESS_ADDRESS_TYPE};
use crate::models::{
    AddressInput, Avatar, NewPrincipal, PendingPrincipal, Principal, PrincipalKind,
    PrincipalPatch, Profile, Role,
};
use crate::notify::{activation_message, Notifier};
use crate::session::{SessionCache, SessionRecord};
use crate::store::PrincipalStore;

/// Asset folder avatars are uploaded into
pub const AVATAR_FOLDER: &str = "avatars";

/// Timing and lifetime settings
#[derive(Debug, Clone, Copy)]
pub struct CredentialSettings {
    /// Access token lifetime (default: 5 minutes)
    pub access_ttl: Duration,

    /// Refresh token and session lifetime (default: 3 days)
    pub refresh_ttl: Duration,

    /// Pending activation lifetime (default: 5 minutes)
    pub activation_ttl: Duration,

    /// Bound on every collaborator call (default: 5 seconds)
    pub io_timeout: Duration,
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            access_ttl: Duration::from_secs(5 * 60),
            refresh_ttl: Duration::from_secs(3 * 24 * 60 * 60),
            activation_ttl: Duration::from_secs(5 * 60),
            io_timeout: Duration::from_secs(5),
        }
    }
}

fn chrono_ttl(ttl: Duration) -> AuthResult<chrono::Duration> {
    chrono::Duration::from_std(ttl)
        .map_err(|e| AuthError::unavailable(format!("token lifetime out of range: {}", e)))
}

/// Payload of access and refresh tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSubject {
    /// Principal id
    pub sub: Uuid,

    pub kind: PrincipalKind,
}

/// Access/refresh token pair
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Result of a login or refresh
#[derive(Debug, Clone, Serialize)]
pub struct SessionGrant {
    pub tokens: TokenPair,
    pub principal: Profile,
}

/// Result of a registration
#[derive(Debug, Clone, Serialize)]
pub struct PendingActivation {
    /// Token to present, together with the emailed code, to `activate`
    pub activation_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Registration input
#[derive(Clone, Deserialize, Validate)]
pub struct Registration {
    #[validate(length(min = 1, max = 100, message = "Name is required (at most 100 characters)"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,

    #[serde(default)]
    #[validate(length(min = 7, max = 32, message = "Invalid phone number"))]
    pub phone_number: Option<String>,

    #[serde(default)]
    pub address: Option<AddressInput>,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("phone_number", &self.phone_number)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Editable profile fields
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: Option<String>,

    #[serde(default)]
    #[validate(length(min = 7, max = 32, message = "Invalid phone number"))]
    pub phone_number: Option<String>,
}

/// Collaborators a credential service is wired to
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn PrincipalStore>,
    pub sessions: Arc<dyn SessionCache>,
    pub signer: Arc<TokenSigner>,
    pub notifier: Arc<dyn Notifier>,
    pub assets: Arc<dyn AssetStore>,
}

/// Credential and session lifecycle for one principal kind
pub struct CredentialService {
    kind: PrincipalKind,
    store: Arc<dyn PrincipalStore>,
    sessions: Arc<dyn SessionCache>,
    signer: Arc<TokenSigner>,
    notifier: Arc<dyn Notifier>,
    assets: Arc<dyn AssetStore>,
    hasher: PasswordHasher,
    settings: CredentialSettings,
    dummy_hash: String,
}

impl CredentialService {
    /// Wires a service to its collaborators
    ///
    /// The principal kind is taken from the store.
    ///
    /// # Errors
    ///
    /// Returns `ServiceUnavailable` if a token lifetime is out of range or the
    /// hasher cannot produce the reference hash used for unknown-email logins.
    pub fn new(
        deps: Collaborators,
        hasher: PasswordHasher,
        settings: CredentialSettings,
    ) -> AuthResult<Self> {
        for ttl in [settings.access_ttl, settings.refresh_ttl, settings.activation_ttl] {
            chrono_ttl(ttl)?;
        }
        let dummy_hash = hasher.hash(&Uuid::new_v4().to_string())?;

        Ok(Self {
            kind: deps.store.kind(),
            store: deps.store,
            sessions: deps.sessions,
            signer: deps.signer,
            notifier: deps.notifier,
            assets: deps.assets,
            hasher,
            settings,
            dummy_hash,
        })
    }

    pub fn kind(&self) -> PrincipalKind {
        self.kind
    }

    pub fn settings(&self) -> &CredentialSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn PrincipalStore> {
        &self.store
    }

    pub fn sessions(&self) -> &Arc<dyn SessionCache> {
        &self.sessions
    }

    pub fn signer(&self) -> &Arc<TokenSigner> {
        &self.signer
    }

    /// Runs a collaborator call under the I/O timeout
    async fn io<T, E, F>(&self, operation: &'static str, fut: F) -> AuthResult<T>
    where
        F: Future<Output = Result<T, E>>,
        AuthError: From<E>,
    {
        match tokio::time::timeout(self.settings.io_timeout, fut).await {
            Ok(result) => result.map_err(AuthError::from),
            Err(_) => {
                warn!(operation, kind = %self.kind, "Collaborator call timed out");
                Err(AuthError::ServiceUnavailable(format!("{} timed out", operation)))
            }
        }
    }

    async fn hash_secret(&self, secret: String) -> AuthResult<String> {
        let hasher = self.hasher;
        tokio::task::spawn_blocking(move || hasher.hash(&secret))
            .await
            .map_err(AuthError::unavailable)?
            .map_err(AuthError::from)
    }

    async fn verify_secret(&self, secret: String, hash: String) -> AuthResult<bool> {
        let hasher = self.hasher;
        tokio::task::spawn_blocking(move || hasher.verify(&secret, &hash))
            .await
            .map_err(AuthError::unavailable)?
            .map_err(AuthError::from)
    }

    async fn load(&self, id: Uuid) -> AuthResult<Principal> {
        self.io("find_by_id", self.store.find_by_id(id))
            .await?
            .ok_or_else(|| AuthError::NotFound(self.kind_label().to_string()))
    }

    fn kind_label(&self) -> &'static str {
        match self.kind {
            PrincipalKind::User => "User",
            PrincipalKind::Shop => "Shop",
        }
    }

    fn issue_pair(&self, id: Uuid) -> AuthResult<TokenPair> {
        let subject = TokenSubject {
            sub: id,
            kind: self.kind,
        };

        let access = self.signer.issue(
            &subject,
            KeyClass::Access,
            chrono_ttl(self.settings.access_ttl)?,
        )?;
        let refresh = self.signer.issue(
            &subject,
            KeyClass::Refresh,
            chrono_ttl(self.settings.refresh_ttl)?,
        )?;

        Ok(TokenPair {
            access_token: access.token,
            access_expires_at: access.expires_at,
            refresh_token: refresh.token,
            refresh_expires_at: refresh.expires_at,
        })
    }

    /// Rewrites the cached snapshot if the principal has a live session
    async fn sync_session(&self, profile: &Profile) -> AuthResult<()> {
        let Some(existing) = self.io("session get", self.sessions.get(profile.id)).await? else {
            return Ok(());
        };

        let record = existing.with_principal(profile.clone());
        let replaced = self
            .io(
                "session replace",
                self.sessions
                    .replace(profile.id, &record, self.settings.refresh_ttl),
            )
            .await?;

        debug!(principal_id = %profile.id, replaced, "Session snapshot refreshed");
        Ok(())
    }

    async fn persist(&self, id: Uuid, patch: PrincipalPatch) -> AuthResult<Profile> {
        let updated = self.io("update", self.store.update(id, patch)).await?;
        let profile = updated.profile();
        self.sync_session(&profile).await?;
        Ok(profile)
    }

    /// Starts a registration
    ///
    /// Nothing is persisted. The returned token and the code delivered to the
    /// registrant's email together complete it through [`Self::activate`].
    ///
    /// # Errors
    ///
    /// - `Validation` for malformed fields or a weak password (shops must also
    ///   supply a phone number and a business address)
    /// - `DuplicateEmail` if the email is already registered for this kind
    /// - `ServiceUnavailable` if the store or notifier fails
    pub async fn register(&self, mut registration: Registration) -> AuthResult<PendingActivation> {
        registration.email = normalize_email(&registration.email);
        registration.validate()?;
        validate_password_strength(&registration.password).map_err(AuthError::Validation)?;

        let address = match registration.address {
            Some(input) => {
                input.validate()?;
                let mut address = input.into_address();
                if self.kind == PrincipalKind::Shop {
                    address.address_type = BUSINESS_ADDRESS_TYPE.to_string();
                }
                Some(address)
            }
            None => None,
        };

        if self.kind == PrincipalKind::Shop {
            if registration.phone_number.is_none() {
                return Err(AuthError::Validation(
                    "Phone number is required for shops".to_string(),
                ));
            }
            if address.is_none() {
                return Err(AuthError::Validation(
                    "Address is required for shops".to_string(),
                ));
            }
        }

        let email = registration.email;

        if self
            .io("find_by_email", self.store.find_by_email(&email))
            .await?
            .is_some()
        {
            return Err(AuthError::DuplicateEmail);
        }

        let password_hash = self.hash_secret(registration.password).await?;

        let fields = PendingPrincipal {
            kind: self.kind,
            name: registration.name.trim().to_string(),
            email,
            password_hash,
            phone_number: registration.phone_number,
            address,
        };

        let issued = encode_pending(
            &self.signer,
            &fields,
            chrono_ttl(self.settings.activation_ttl)?,
        )?;

        let (subject, body) = activation_message(
            &fields.name,
            &issued.code,
            (self.settings.activation_ttl.as_secs() / 60) as i64,
        );
        self.io(
            "notify",
            self.notifier.send(&fields.email, &subject, &body),
        )
        .await?;

        info!(kind = %self.kind, expires_at = %issued.expires_at, "Registration pending activation");

        Ok(PendingActivation {
            activation_token: issued.token,
            expires_at: issued.expires_at,
        })
    }

    /// Completes a registration
    ///
    /// A wrong code writes nothing and may be retried until the token
    /// expires. Activation does not log the principal in.
    ///
    /// # Errors
    ///
    /// - `InvalidOrExpiredToken` if the token does not verify, has expired or
    ///   belongs to the other portal
    /// - `CodeMismatch` if the code is wrong
    /// - `DuplicateEmail` if the email was taken since registration
    pub async fn activate(&self, activation_token: &str, code: &str) -> AuthResult<Profile> {
        let pending = decode_pending(&self.signer, activation_token).map_err(|e| {
            debug!(error = %e, "Activation token rejected");
            AuthError::InvalidOrExpiredToken
        })?;

        if pending.fields.kind != self.kind {
            return Err(AuthError::InvalidOrExpiredToken);
        }

        if !code_matches(&self.signer, &pending, code) {
            return Err(AuthError::CodeMismatch);
        }

        if self
            .io("find_by_email", self.store.find_by_email(&pending.fields.email))
            .await?
            .is_some()
        {
            return Err(AuthError::DuplicateEmail);
        }

        let principal = self
            .io(
                "create",
                self.store.create(NewPrincipal::activated(pending.fields)),
            )
            .await?;

        info!(principal_id = %principal.id, kind = %self.kind, role = %principal.role, "Principal activated");

        Ok(principal.profile())
    }

    /// Authenticates with email and secret and opens a session
    ///
    /// The session is committed to the cache before the tokens are returned.
    ///
    /// # Errors
    ///
    /// - `InvalidCredentials` for an unknown email or a wrong secret alike
    /// - `ServiceUnavailable` if the store or cache fails
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<SessionGrant> {
        let email = normalize_email(email);

        let found = self
            .io("find_by_email", self.store.find_by_email(&email))
            .await?;

        let principal = match found {
            Some(principal) => {
                let ok = self
                    .verify_secret(password.to_string(), principal.password_hash.clone())
                    .await?;
                if !ok {
                    debug!(principal_id = %principal.id, "Login rejected: wrong secret");
                    return Err(AuthError::InvalidCredentials);
                }
                principal
            }
            None => {
                // Same work as a real verification
                let _ = self
                    .verify_secret(password.to_string(), self.dummy_hash.clone())
                    .await?;
                return Err(AuthError::InvalidCredentials);
            }
        };

        let tokens = self.issue_pair(principal.id)?;
        let profile = principal.profile();

        self.io(
            "session put",
            self.sessions.put(
                principal.id,
                &SessionRecord::new(profile.clone()),
                self.settings.refresh_ttl,
            ),
        )
        .await?;

        info!(principal_id = %principal.id, kind = %self.kind, "Login succeeded");

        Ok(SessionGrant {
            tokens,
            principal: profile,
        })
    }

    /// Exchanges a refresh token for a new pair and slides the session TTL
    ///
    /// # Errors
    ///
    /// - `InvalidRefreshToken` if the token does not verify or has expired
    /// - `SessionExpiredOrRevoked` if the session is gone (logout, expiry or a
    ///   logout racing this call)
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<SessionGrant> {
        let claims = self
            .signer
            .verify::<TokenSubject>(refresh_token, KeyClass::Refresh)
            .map_err(|e| {
                debug!(error = %e, "Refresh token rejected");
                AuthError::InvalidRefreshToken
            })?;

        let subject = claims.payload;
        if subject.kind != self.kind {
            return Err(AuthError::InvalidRefreshToken);
        }

        let record = self
            .io("session get", self.sessions.get(subject.sub))
            .await?
            .ok_or(AuthError::SessionExpiredOrRevoked)?;

        let tokens = self.issue_pair(subject.sub)?;

        let still_live = self
            .io(
                "session replace",
                self.sessions
                    .replace(subject.sub, &record, self.settings.refresh_ttl),
            )
            .await?;

        if !still_live {
            return Err(AuthError::SessionExpiredOrRevoked);
        }

        debug!(principal_id = %subject.sub, "Session refreshed");

        Ok(SessionGrant {
            tokens,
            principal: record.principal,
        })
    }

    /// Ends the principal's session; already-ended sessions are fine
    pub async fn logout(&self, principal_id: Uuid) -> AuthResult<()> {
        self.io("session delete", self.sessions.delete(principal_id))
            .await?;

        info!(principal_id = %principal_id, kind = %self.kind, "Logged out");
        Ok(())
    }

    /// Changes the secret after verifying the current one
    ///
    /// # Errors
    ///
    /// - `Validation` if the new secret is too weak
    /// - `InvalidOldSecret` if `old` does not verify
    pub async fn update_secret(&self, principal_id: Uuid, old: &str, new: &str) -> AuthResult<()> {
        validate_password_strength(new).map_err(AuthError::Validation)?;

        let principal = self.load(principal_id).await?;

        if !self
            .verify_secret(old.to_string(), principal.password_hash.clone())
            .await?
        {
            return Err(AuthError::InvalidOldSecret);
        }

        let password_hash = self.hash_secret(new.to_string()).await?;

        self.persist(
            principal_id,
            PrincipalPatch {
                password_hash: Some(password_hash),
                ..Default::default()
            },
        )
        .await?;

        info!(principal_id = %principal_id, "Secret updated");
        Ok(())
    }

    /// Current snapshot of the principal
    ///
    /// Served from the session cache; falls back to the store when there is
    /// no session.
    pub async fn profile(&self, principal_id: Uuid) -> AuthResult<Profile> {
        if let Some(record) = self.io("session get", self.sessions.get(principal_id)).await? {
            return Ok(record.principal);
        }

        Ok(self.load(principal_id).await?.profile())
    }

    pub async fn update_profile(
        &self,
        principal_id: Uuid,
        update: ProfileUpdate,
    ) -> AuthResult<Profile> {
        update.validate()?;

        let patch = PrincipalPatch {
            name: update.name.map(|n| n.trim().to_string()),
            phone_number: update.phone_number.map(Some),
            ..Default::default()
        };

        if patch.is_empty() {
            return self.profile(principal_id).await;
        }

        self.persist(principal_id, patch).await
    }

    /// Replaces the avatar image
    ///
    /// The new image is uploaded before the record changes; the previous image
    /// is removed afterwards on a best-effort basis.
    pub async fn update_avatar(&self, principal_id: Uuid, image: Vec<u8>) -> AuthResult<Profile> {
        let principal = self.load(principal_id).await?;

        let uploaded = self
            .io("asset upload", self.assets.upload(image, AVATAR_FOLDER))
            .await?;

        let patch = PrincipalPatch {
            avatar: Some(Some(Avatar {
                asset_id: uploaded.asset_id.clone(),
                url: uploaded.url,
            })),
            ..Default::default()
        };

        let profile = match self.persist(principal_id, patch).await {
            Ok(profile) => profile,
            Err(e) => {
                self.discard_asset(&uploaded.asset_id).await;
                return Err(e);
            }
        };

        if let Some(previous) = principal.avatar {
            self.discard_asset(&previous.asset_id).await;
        }

        Ok(profile)
    }

    async fn discard_asset(&self, asset_id: &str) {
        if let Err(e) = self.io("asset delete", self.assets.delete(asset_id)).await {
            warn!(asset_id, error = %e, "Failed to delete asset");
        }
    }

    /// Adds an address or edits an existing one
    ///
    /// At most one address per type: adding a second "home" address is
    /// rejected, editing the existing one is not.
    pub async fn upsert_address(
        &self,
        principal_id: Uuid,
        input: AddressInput,
    ) -> AuthResult<Profile> {
        input.validate()?;

        let principal = self.load(principal_id).await?;
        let editing = input.id;
        let address = input.into_address();

        if principal
            .addresses
            .iter()
            .any(|a| a.address_type == address.address_type && a.id != address.id)
        {
            return Err(AuthError::Validation(format!(
                "{} address already exists",
                address.address_type
            )));
        }

        let mut addresses = principal.addresses;
        match addresses.iter_mut().find(|a| a.id == address.id) {
            Some(existing) => *existing = address,
            None if editing.is_some() => return Err(AuthError::NotFound("Address".to_string())),
            None => addresses.push(address),
        }

        self.persist(
            principal_id,
            PrincipalPatch {
                addresses: Some(addresses),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn delete_address(&self, principal_id: Uuid, address_id: Uuid) -> AuthResult<Profile> {
        let principal = self.load(principal_id).await?;

        let before = principal.addresses.len();
        let addresses: Vec<_> = principal
            .addresses
            .into_iter()
            .filter(|a| a.id != address_id)
            .collect();

        if addresses.len() == before {
            return Err(AuthError::NotFound("Address".to_string()));
        }

        self.persist(
            principal_id,
            PrincipalPatch {
                addresses: Some(addresses),
                ..Default::default()
            },
        )
        .await
    }

    /// All principals of this kind, newest first
    pub async fn list(&self) -> AuthResult<Vec<Profile>> {
        let all = self.io("list", self.store.list()).await?;
        Ok(all.iter().map(Principal::profile).collect())
    }

    /// Changes a principal's role; a live session picks it up immediately
    pub async fn update_role(&self, principal_id: Uuid, role: Role) -> AuthResult<Profile> {
        self.load(principal_id).await?;

        let profile = self
            .persist(
                principal_id,
                PrincipalPatch {
                    role: Some(role),
                    ..Default::default()
                },
            )
            .await?;

        info!(principal_id = %principal_id, role = %role, "Role updated");
        Ok(profile)
    }

    /// Deletes a principal, revokes its session and removes its avatar
    pub async fn delete(&self, principal_id: Uuid) -> AuthResult<()> {
        let principal = self.load(principal_id).await?;

        if !self.io("delete", self.store.delete(principal_id)).await? {
            return Err(AuthError::NotFound(self.kind_label().to_string()));
        }

        self.io("session delete", self.sessions.delete(principal_id))
            .await?;

        if let Some(avatar) = principal.avatar {
            self.discard_asset(&avatar.asset_id).await;
        }

        info!(principal_id = %principal_id, kind = %self.kind, "Principal deleted");
        Ok(())
    }
}
