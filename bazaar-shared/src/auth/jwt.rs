/// JWT token signing and verification
///
/// Every token Bazaar hands out is an HS256 JWT whose claims wrap an arbitrary
/// payload:
///
/// ```text
/// { iss: "bazaar", aud: <key class>, iat, exp, jti, payload: { ... } }
/// ```
///
/// # Key Classes
///
/// - **Activation**: pending-registration tokens (minutes)
/// - **Access**: per-request credentials (minutes)
/// - **Refresh**: session renewal credentials (days)
///
/// Each class is signed with its own secret and stamped with its own audience,
/// so a token of one class never verifies as another, and rotating one secret
/// leaves the other classes untouched.
///
/// # Example
///
/// ```
/// use bazaar_shared::auth::jwt::{KeyClass, TokenKeys, TokenSigner};
/// use chrono::Duration;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct Payload { n: u32 }
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let signer = TokenSigner::new(TokenKeys {
///     activation: "activation-secret-at-least-32-bytes!".into(),
///     access: "access-secret-at-least-32-bytes-long!".into(),
///     refresh: "refresh-secret-at-least-32-bytes-long".into(),
/// })?;
///
/// let issued = signer.issue(&Payload { n: 7 }, KeyClass::Access, Duration::minutes(5))?;
/// let verified = signer.verify::<Payload>(&issued.token, KeyClass::Access)?;
/// assert_eq!(verified.payload, Payload { n: 7 });
///
/// // Wrong class is rejected
/// assert!(signer.verify::<Payload>(&issued.token, KeyClass::Refresh).is_err());
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

/// Issuer stamped into every token
pub const ISSUER: &str = "bazaar";

/// Minimum secret length per key class (256 bits)
pub const MIN_SECRET_LEN: usize = 32;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Signature, issuer or audience did not match the requested key class
    #[error("Token signature is invalid")]
    BadSignature,

    /// Not a well-formed token
    #[error("Invalid token format: {0}")]
    Malformed(String),

    /// Signing keys are unusable
    #[error("Invalid signing key configuration: {0}")]
    KeyConfig(String),
}

/// Token class, each bound to an independent signing key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyClass {
    /// Pending-registration tokens
    Activation,

    /// Short-lived request credentials
    Access,

    /// Long-lived session renewal credentials
    Refresh,
}

impl KeyClass {
    /// Gets key class as string (also used as the `aud` claim)
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyClass::Activation => "activation",
            KeyClass::Access => "access",
            KeyClass::Refresh => "refresh",
        }
    }
}

/// Raw secrets, one per key class
#[derive(Clone)]
pub struct TokenKeys {
    pub activation: String,
    pub access: String,
    pub refresh: String,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys").finish_non_exhaustive()
    }
}

/// Signed claims envelope
///
/// `payload` carries the caller's data; the remaining fields are standard JWT
/// claims. `jti` makes two tokens issued in the same second distinct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims<T> {
    /// Issuer - always "bazaar"
    pub iss: String,

    /// Audience - the key class name
    pub aud: String,

    /// Issued at (Unix timestamp, seconds)
    pub iat: i64,

    /// Expiration time (Unix timestamp, seconds)
    pub exp: i64,

    /// Unique token id
    pub jti: Uuid,

    /// Caller payload
    pub payload: T,
}

impl<T> Claims<T> {
    /// Issue time as a timestamp
    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or_default()
    }

    /// Expiry as a timestamp
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_default()
    }

    /// Whether the token is past its expiry at `now`
    ///
    /// A token is still valid *at* `exp`; it expires strictly after it.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }
}

/// Freshly issued token together with its claims metadata
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Encoded JWT
    pub token: String,

    /// Token id
    pub jti: Uuid,

    /// Issue time
    pub issued_at: DateTime<Utc>,

    /// Expiry time
    pub expires_at: DateTime<Utc>,
}

struct ClassKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    secret: Vec<u8>,
}

impl ClassKeys {
    fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            secret: secret.as_bytes().to_vec(),
        }
    }
}

/// Issues and verifies tokens for all key classes
///
/// Keys are loaded once at startup and are read-only afterwards, so a single
/// signer is shared by all request handlers behind an `Arc`.
pub struct TokenSigner {
    activation: ClassKeys,
    access: ClassKeys,
    refresh: ClassKeys,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// Creates a signer from per-class secrets
    ///
    /// # Errors
    ///
    /// Returns `TokenError::KeyConfig` if any secret is shorter than
    /// [`MIN_SECRET_LEN`] bytes or if two classes share a secret.
    pub fn new(keys: TokenKeys) -> Result<Self, TokenError> {
        for (class, secret) in [
            (KeyClass::Activation, &keys.activation),
            (KeyClass::Access, &keys.access),
            (KeyClass::Refresh, &keys.refresh),
        ] {
            if secret.len() < MIN_SECRET_LEN {
                return Err(TokenError::KeyConfig(format!(
                    "{} secret must be at least {} bytes",
                    class.as_str(),
                    MIN_SECRET_LEN
                )));
            }
        }

        if keys.activation == keys.access
            || keys.activation == keys.refresh
            || keys.access == keys.refresh
        {
            return Err(TokenError::KeyConfig(
                "each token class needs its own secret".to_string(),
            ));
        }

        Ok(Self {
            activation: ClassKeys::new(&keys.activation),
            access: ClassKeys::new(&keys.access),
            refresh: ClassKeys::new(&keys.refresh),
        })
    }

    fn keys(&self, class: KeyClass) -> &ClassKeys {
        match class {
            KeyClass::Activation => &self.activation,
            KeyClass::Access => &self.access,
            KeyClass::Refresh => &self.refresh,
        }
    }

    /// Raw secret of a key class, for keyed digests bound to that class
    pub(crate) fn class_secret(&self, class: KeyClass) -> &[u8] {
        &self.keys(class).secret
    }

    /// Issues a token expiring `ttl` from now
    pub fn issue<T: Serialize>(
        &self,
        payload: &T,
        class: KeyClass,
        ttl: Duration,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_at(payload, class, ttl, Utc::now())
    }

    /// Issues a token as if the current time were `now`
    pub fn issue_at<T: Serialize>(
        &self,
        payload: &T,
        class: KeyClass,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let iat = now.timestamp();
        let claims = Claims {
            iss: ISSUER.to_string(),
            aud: class.as_str().to_string(),
            iat,
            exp: iat + ttl.num_seconds(),
            jti: Uuid::new_v4(),
            payload,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.keys(class).encoding)
            .map_err(|e| TokenError::CreateError(format!("Token encoding failed: {}", e)))?;

        Ok(IssuedToken {
            token,
            jti: claims.jti,
            issued_at: claims.issued_at(),
            expires_at: claims.expires_at(),
        })
    }

    /// Verifies a token of the given class and returns its claims
    ///
    /// Verifies:
    /// - Signature against the class key
    /// - Issuer is "bazaar" and audience is the class name
    /// - Token has not expired
    ///
    /// # Errors
    ///
    /// - `TokenError::Expired` once the expiry has passed
    /// - `TokenError::BadSignature` for a foreign key, issuer or class
    /// - `TokenError::Malformed` for anything that is not a JWT of our shape
    pub fn verify<T: DeserializeOwned>(
        &self,
        token: &str,
        class: KeyClass,
    ) -> Result<Claims<T>, TokenError> {
        self.verify_at(token, class, Utc::now())
    }

    /// Verifies a token as if the current time were `now`
    pub fn verify_at<T: DeserializeOwned>(
        &self,
        token: &str,
        class: KeyClass,
        now: DateTime<Utc>,
    ) -> Result<Claims<T>, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_audience(&[class.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        // Expiry is checked below against `now` with millisecond precision
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = decode::<Claims<T>>(token, &self.keys(class).decoding, &validation).map_err(
            |e| {
                use jsonwebtoken::errors::ErrorKind;
                match e.kind() {
                    ErrorKind::InvalidSignature
                    | ErrorKind::InvalidIssuer
                    | ErrorKind::InvalidAudience
                    | ErrorKind::InvalidAlgorithm => TokenError::BadSignature,
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Malformed(e.to_string()),
                }
            },
        )?;

        if data.claims.is_expired_at(now) {
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Subject {
        sub: Uuid,
    }

    fn signer() -> TokenSigner {
        TokenSigner::new(TokenKeys {
            activation: "test-activation-secret-at-least-32-bytes".to_string(),
            access: "test-access-secret-at-least-32-bytes-long".to_string(),
            refresh: "test-refresh-secret-at-least-32-bytes-long".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_key_class_as_str() {
        assert_eq!(KeyClass::Activation.as_str(), "activation");
        assert_eq!(KeyClass::Access.as_str(), "access");
        assert_eq!(KeyClass::Refresh.as_str(), "refresh");
    }

    #[test]
    fn test_rejects_short_secret() {
        let result = TokenSigner::new(TokenKeys {
            activation: "short".to_string(),
            access: "test-access-secret-at-least-32-bytes-long".to_string(),
            refresh: "test-refresh-secret-at-least-32-bytes-long".to_string(),
        });
        assert!(matches!(result, Err(TokenError::KeyConfig(_))));
    }

    #[test]
    fn test_rejects_shared_secret() {
        let secret = "the-same-secret-for-every-class-oops!".to_string();
        let result = TokenSigner::new(TokenKeys {
            activation: "test-activation-secret-at-least-32-bytes".to_string(),
            access: secret.clone(),
            refresh: secret,
        });
        assert!(matches!(result, Err(TokenError::KeyConfig(_))));
    }

    #[test]
    fn test_issue_and_verify() {
        let signer = signer();
        let subject = Subject { sub: Uuid::new_v4() };

        let issued = signer
            .issue(&subject, KeyClass::Access, Duration::minutes(5))
            .expect("Should create token");

        let claims = signer
            .verify::<Subject>(&issued.token, KeyClass::Access)
            .expect("Should validate token");

        assert_eq!(claims.payload, subject);
        assert_eq!(claims.iss, ISSUER);
        assert_eq!(claims.aud, "access");
        assert_eq!(claims.jti, issued.jti);
        assert_eq!(claims.exp - claims.iat, 300);
    }

    #[test]
    fn test_classes_are_not_interchangeable() {
        let signer = signer();
        let subject = Subject { sub: Uuid::new_v4() };

        let refresh = signer
            .issue(&subject, KeyClass::Refresh, Duration::days(3))
            .unwrap();
        let access = signer
            .issue(&subject, KeyClass::Access, Duration::minutes(5))
            .unwrap();

        assert!(matches!(
            signer.verify::<Subject>(&refresh.token, KeyClass::Access),
            Err(TokenError::BadSignature)
        ));
        assert!(matches!(
            signer.verify::<Subject>(&access.token, KeyClass::Refresh),
            Err(TokenError::BadSignature)
        ));
        assert!(matches!(
            signer.verify::<Subject>(&access.token, KeyClass::Activation),
            Err(TokenError::BadSignature)
        ));
    }

    #[test]
    fn test_foreign_signer_rejected() {
        let ours = signer();
        let theirs = TokenSigner::new(TokenKeys {
            activation: "another-activation-secret-32-bytes-long".to_string(),
            access: "another-access-secret-at-least-32-bytes".to_string(),
            refresh: "another-refresh-secret-at-least-32-bytes".to_string(),
        })
        .unwrap();

        let forged = theirs
            .issue(&Subject { sub: Uuid::new_v4() }, KeyClass::Access, Duration::minutes(5))
            .unwrap();

        assert!(matches!(
            ours.verify::<Subject>(&forged.token, KeyClass::Access),
            Err(TokenError::BadSignature)
        ));
    }

    #[test]
    fn test_expiry_boundary() {
        let signer = signer();
        let now = Utc::now();
        let issued = signer
            .issue_at(&Subject { sub: Uuid::new_v4() }, KeyClass::Access, Duration::minutes(5), now)
            .unwrap();

        let just_before = issued.expires_at - Duration::milliseconds(1);
        let just_after = issued.expires_at + Duration::milliseconds(1);

        assert!(signer
            .verify_at::<Subject>(&issued.token, KeyClass::Access, just_before)
            .is_ok());
        assert!(signer
            .verify_at::<Subject>(&issued.token, KeyClass::Access, issued.expires_at)
            .is_ok());
        assert!(matches!(
            signer.verify_at::<Subject>(&issued.token, KeyClass::Access, just_after),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_already_expired_token() {
        let signer = signer();
        let issued = signer
            .issue(&Subject { sub: Uuid::new_v4() }, KeyClass::Refresh, Duration::seconds(-3600))
            .unwrap();

        assert!(matches!(
            signer.verify::<Subject>(&issued.token, KeyClass::Refresh),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let signer = signer();
        let issued = signer
            .issue(&Subject { sub: Uuid::new_v4() }, KeyClass::Access, Duration::minutes(5))
            .unwrap();

        let mut parts: Vec<&str> = issued.token.split('.').collect();
        let other = signer
            .issue(&Subject { sub: Uuid::new_v4() }, KeyClass::Access, Duration::minutes(5))
            .unwrap();
        let other_parts: Vec<&str> = other.token.split('.').collect();
        // Splice another token's payload under the original signature
        parts[1] = other_parts[1];
        let tampered = parts.join(".");

        assert!(matches!(
            signer.verify::<Subject>(&tampered, KeyClass::Access),
            Err(TokenError::BadSignature)
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let signer = signer();
        assert!(matches!(
            signer.verify::<Subject>("not-a-jwt", KeyClass::Access),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_same_second_tokens_differ() {
        let signer = signer();
        let subject = Subject { sub: Uuid::new_v4() };
        let now = Utc::now();

        let a = signer
            .issue_at(&subject, KeyClass::Access, Duration::minutes(5), now)
            .unwrap();
        let b = signer
            .issue_at(&subject, KeyClass::Access, Duration::minutes(5), now)
            .unwrap();

        assert_ne!(a.token, b.token);
    }
}
