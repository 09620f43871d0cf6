/// Request authentication for Axum
///
/// An access token alone is not enough: after the signature and expiry check,
/// the principal's session must still be present in the session cache. This
/// makes logout and admin revocation effective immediately, even for access
/// tokens that have not expired yet.
///
/// # Resolution
///
/// 1. No token → `Unauthenticated`
/// 2. Token fails verification with the access key → `Unauthenticated`
/// 3. No session for the token's subject → `Unauthenticated`
/// 4. Otherwise an [`AuthContext`] carrying the cached [`Profile`]
///
/// A failing cache is reported as `ServiceUnavailable`, never as a valid
/// identity.
///
/// # Request Extensions
///
/// The HTTP layer inserts the resolved `AuthContext` into request extensions;
/// handlers take it as an extractor argument.
///
/// # Example
///
/// ```no_run
/// use bazaar_shared::auth::middleware::AuthContext;
///
/// async fn me(auth: AuthContext) -> String {
///     format!("Hello, {}!", auth.principal.name)
/// }
/// ```

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::credentials::{CredentialService, TokenSubject};
use super::jwt::{KeyClass, TokenSigner};
use crate::error::{AuthError, AuthResult, ErrorClass};
use crate::models::{PrincipalKind, Profile, Role};
use crate::session::SessionCache;

/// Names of the cookies carrying one portal's tokens
///
/// Each portal has its own pair so a browser holding a user session and a
/// shop session keeps both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieNames {
    pub access: &'static str,
    pub refresh: &'static str,
}

impl CookieNames {
    pub const fn for_kind(kind: PrincipalKind) -> Self {
        match kind {
            PrincipalKind::User => Self {
                access: "access_token",
                refresh: "refresh_token",
            },
            PrincipalKind::Shop => Self {
                access: "seller_access_token",
                refresh: "seller_refresh_token",
            },
        }
    }
}

/// Identity of the caller, resolved from the session cache
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Cached principal snapshot
    pub principal: Profile,
}

impl AuthContext {
    pub fn principal_id(&self) -> Uuid {
        self.principal.id
    }

    pub fn role(&self) -> Role {
        self.principal.role
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthError::Unauthenticated)
    }
}

/// Resolves access tokens into [`AuthContext`]s for one portal
#[derive(Clone)]
pub struct Authenticator {
    signer: Arc<TokenSigner>,
    sessions: Arc<dyn SessionCache>,
    kind: PrincipalKind,
    io_timeout: Duration,
}

impl Authenticator {
    pub fn new(
        signer: Arc<TokenSigner>,
        sessions: Arc<dyn SessionCache>,
        kind: PrincipalKind,
        io_timeout: Duration,
    ) -> Self {
        Self {
            signer,
            sessions,
            kind,
            io_timeout,
        }
    }

    /// Authenticator sharing a credential service's keys and cache
    pub fn for_service(service: &CredentialService) -> Self {
        Self::new(
            service.signer().clone(),
            service.sessions().clone(),
            service.kind(),
            service.settings().io_timeout,
        )
    }

    pub fn kind(&self) -> PrincipalKind {
        self.kind
    }

    /// Resolves an access token
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` if the token is absent, invalid, expired, issued
    ///   for another portal or has no live session
    /// - `ServiceUnavailable` if the session cache fails or times out
    pub async fn authenticate(&self, token: Option<&str>) -> AuthResult<AuthContext> {
        self.authenticate_at(token, Utc::now()).await
    }

    /// [`Self::authenticate`] with an explicit clock reading for the token check
    pub async fn authenticate_at(
        &self,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> AuthResult<AuthContext> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Unauthenticated)?;

        let claims = self
            .signer
            .verify_at::<TokenSubject>(token, KeyClass::Access, now)
            .map_err(|e| {
                tracing::debug!(error = %e, "Access token rejected");
                AuthError::Unauthenticated
            })?;

        let subject = claims.payload;
        if subject.kind != self.kind {
            return Err(AuthError::Unauthenticated);
        }

        let record = tokio::time::timeout(self.io_timeout, self.sessions.get(subject.sub))
            .await
            .map_err(|_| AuthError::ServiceUnavailable("session get timed out".to_string()))??
            .ok_or(AuthError::Unauthenticated)?;

        Ok(AuthContext {
            principal: record.principal,
        })
    }
}

/// Extracts a token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// HTTP status for an error class
pub fn status_for(class: ErrorClass) -> StatusCode {
    match class {
        ErrorClass::BadRequest => StatusCode::BAD_REQUEST,
        ErrorClass::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorClass::Forbidden => StatusCode::FORBIDDEN,
        ErrorClass::NotFound => StatusCode::NOT_FOUND,
        ErrorClass::Conflict => StatusCode::CONFLICT,
        ErrorClass::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Failure envelope: `{"success": false, "error": <code>, "message": <text>}`
pub fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    let body = json!({
        "success": false,
        "error": code,
        "message": message,
    });
    (status, Json(body)).into_response()
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let class = self.class();

        // Downstream details stay in the log
        let message = if class.is_client_error() {
            self.to_string()
        } else {
            tracing::error!(error = %self, "Request failed on a downstream dependency");
            "Service temporarily unavailable".to_string()
        };

        error_response(status_for(class), self.code(), &message)
    }
}
