/// Error taxonomy for the credential and session core
///
/// Every operation of the credential service and the authorization middleware
/// fails with exactly one [`AuthError`] kind. Each kind carries a transport-free
/// [`ErrorClass`] and a stable snake_case code; the HTTP layer maps the class to
/// a status code and never inspects messages.
///
/// # Example
///
/// ```
/// use bazaar_shared::error::{AuthError, ErrorClass};
///
/// let err = AuthError::DuplicateEmail;
/// assert_eq!(err.class(), ErrorClass::Conflict);
/// assert_eq!(err.code(), "duplicate_email");
/// ```

use crate::assets::AssetError;
use crate::auth::jwt::TokenError;
use crate::auth::password::PasswordError;
use crate::notify::NotifyError;
use crate::session::CacheError;
use crate::store::StoreError;

/// Result alias used across the core
pub type AuthResult<T> = Result<T, AuthError>;

/// Transport-independent error class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed input or a failed business check (400)
    BadRequest,

    /// Caller could not be authenticated (401)
    Unauthorized,

    /// Caller is authenticated but not allowed (403)
    Forbidden,

    /// Referenced principal or record does not exist (404)
    NotFound,

    /// Uniqueness conflict (409)
    Conflict,

    /// A downstream store, cache or notifier failed (503)
    Unavailable,
}

impl ErrorClass {
    /// Whether the failure is the caller's fault
    pub fn is_client_error(&self) -> bool {
        !matches!(self, ErrorClass::Unavailable)
    }
}

/// Closed set of failures surfaced by the credential core
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Malformed or out-of-policy input
    #[error("{0}")]
    Validation(String),

    /// Email already registered for this principal kind
    #[error("Email already exists")]
    DuplicateEmail,

    /// Unknown email or wrong secret (deliberately indistinguishable)
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Supplied confirmation code does not match the pending token
    #[error("Invalid activation code")]
    CodeMismatch,

    /// Pending activation token failed verification or has expired
    #[error("Activation token is invalid or has expired")]
    InvalidOrExpiredToken,

    /// Refresh token failed verification or has expired
    #[error("Could not refresh token")]
    InvalidRefreshToken,

    /// Refresh token is valid but the session was logged out or revoked
    #[error("Session has expired or was revoked, please login again")]
    SessionExpiredOrRevoked,

    /// No valid access token / session for a protected resource
    #[error("Please login to access this resource")]
    Unauthenticated,

    /// Authenticated principal lacks the required role
    #[error("You are not allowed to access this resource")]
    Forbidden,

    /// Old secret did not verify during a password change
    #[error("Old password is incorrect")]
    InvalidOldSecret,

    /// Principal or sub-record does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Downstream failure or timeout
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    /// Transport-free class of this error
    pub fn class(&self) -> ErrorClass {
        match self {
            AuthError::Validation(_)
            | AuthError::InvalidCredentials
            | AuthError::CodeMismatch
            | AuthError::InvalidOrExpiredToken
            | AuthError::InvalidOldSecret => ErrorClass::BadRequest,
            AuthError::InvalidRefreshToken
            | AuthError::SessionExpiredOrRevoked
            | AuthError::Unauthenticated => ErrorClass::Unauthorized,
            AuthError::Forbidden => ErrorClass::Forbidden,
            AuthError::NotFound(_) => ErrorClass::NotFound,
            AuthError::DuplicateEmail => ErrorClass::Conflict,
            AuthError::ServiceUnavailable(_) => ErrorClass::Unavailable,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "validation_error",
            AuthError::DuplicateEmail => "duplicate_email",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::CodeMismatch => "code_mismatch",
            AuthError::InvalidOrExpiredToken => "invalid_or_expired_token",
            AuthError::InvalidRefreshToken => "invalid_refresh_token",
            AuthError::SessionExpiredOrRevoked => "session_expired_or_revoked",
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::Forbidden => "forbidden",
            AuthError::InvalidOldSecret => "invalid_old_secret",
            AuthError::NotFound(_) => "not_found",
            AuthError::ServiceUnavailable(_) => "service_unavailable",
        }
    }

    pub(crate) fn unavailable(what: impl std::fmt::Display) -> Self {
        AuthError::ServiceUnavailable(what.to_string())
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field))
                })
            })
            .collect();
        messages.sort();

        AuthError::Validation(messages.join("; "))
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AuthError::DuplicateEmail,
            StoreError::NotFound => AuthError::NotFound("Principal".to_string()),
            StoreError::Unavailable(msg) => AuthError::ServiceUnavailable(msg),
        }
    }
}

impl From<CacheError> for AuthError {
    fn from(err: CacheError) -> Self {
        AuthError::unavailable(err)
    }
}

impl From<NotifyError> for AuthError {
    fn from(err: NotifyError) -> Self {
        AuthError::unavailable(err)
    }
}

impl From<AssetError> for AuthError {
    fn from(err: AssetError) -> Self {
        match err {
            AssetError::Rejected(msg) => AuthError::Validation(msg),
            other => AuthError::unavailable(other),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::unavailable(err)
    }
}

impl From<TokenError> for AuthError {
    // Only token *creation* failures reach this conversion; verification
    // failures are mapped per call site to the matching client error.
    fn from(err: TokenError) -> Self {
        AuthError::unavailable(err)
    }
}
