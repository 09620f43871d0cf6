/// Pending-activation tokens
///
/// Registration persists nothing. Instead the would-be principal (with its
/// secret already hashed) is sealed into a short-lived activation-class token,
/// and a random 4-digit code is delivered out of band. Presenting both the
/// token and the code completes registration.
///
/// A JWT payload is readable by whoever holds the token, so the code is not
/// stored in it. The token carries an HMAC-SHA256 commitment instead:
///
/// ```text
/// code_digest = hex(HMAC-SHA256(activation_secret, nonce || ":" || code))
/// ```
///
/// # Example
///
/// ```no_run
/// use bazaar_shared::auth::activation::{code_matches, decode_pending, encode_pending};
/// # use bazaar_shared::auth::jwt::TokenSigner;
/// # use bazaar_shared::models::PendingPrincipal;
/// # fn example(signer: &TokenSigner, fields: PendingPrincipal) -> Result<(), Box<dyn std::error::Error>> {
/// let issued = encode_pending(signer, &fields, chrono::Duration::minutes(5))?;
///
/// let pending = decode_pending(signer, &issued.token)?;
/// assert_eq!(pending.fields, fields);
/// assert!(code_matches(signer, &pending, &issued.code));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use super::jwt::{KeyClass, TokenError, TokenSigner};
use crate::models::PendingPrincipal;

type HmacSha256 = Hmac<Sha256>;

/// Smallest confirmation code
pub const CODE_MIN: u16 = 1000;

/// Largest confirmation code
pub const CODE_MAX: u16 = 9999;

/// Payload of an activation-class token
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingClaims {
    fields: PendingPrincipal,
    nonce: Uuid,
    code_digest: String,
}

/// Freshly encoded registration
#[derive(Debug, Clone)]
pub struct PendingIssued {
    /// Activation token returned to the registrant
    pub token: String,

    /// Confirmation code, delivered through the notifier only
    pub code: String,

    pub expires_at: DateTime<Utc>,
}

/// Decoded registration awaiting its code
#[derive(Debug, Clone)]
pub struct PendingRegistration {
    pub fields: PendingPrincipal,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    nonce: Uuid,
    code_digest: String,
}

/// Generates a random code in `1000..=9999`
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(CODE_MIN..=CODE_MAX).to_string()
}

fn code_mac(signer: &TokenSigner, nonce: Uuid, code: &str) -> Result<HmacSha256, TokenError> {
    let mut mac = HmacSha256::new_from_slice(signer.class_secret(KeyClass::Activation))
        .map_err(|e| TokenError::KeyConfig(e.to_string()))?;
    mac.update(nonce.as_bytes());
    mac.update(b":");
    mac.update(code.as_bytes());
    Ok(mac)
}

/// Seals `fields` into an activation token and returns it with a fresh code
///
/// # Errors
///
/// Returns `TokenError::CreateError` if signing fails
pub fn encode_pending(
    signer: &TokenSigner,
    fields: &PendingPrincipal,
    ttl: Duration,
) -> Result<PendingIssued, TokenError> {
    encode_pending_at(signer, fields, ttl, Utc::now())
}

/// [`encode_pending`] with an explicit clock reading
pub fn encode_pending_at(
    signer: &TokenSigner,
    fields: &PendingPrincipal,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<PendingIssued, TokenError> {
    let code = generate_code();
    let nonce = Uuid::new_v4();

    let claims = PendingClaims {
        fields: fields.clone(),
        nonce,
        code_digest: hex::encode(code_mac(signer, nonce, &code)?.finalize().into_bytes()),
    };

    let issued = signer.issue_at(&claims, KeyClass::Activation, ttl, now)?;

    Ok(PendingIssued {
        token: issued.token,
        code,
        expires_at: issued.expires_at,
    })
}

/// Verifies an activation token and recovers the pending registration
///
/// # Errors
///
/// Any verification failure (`Expired`, `BadSignature`, `Malformed`) is
/// returned unchanged; callers report them uniformly.
pub fn decode_pending(signer: &TokenSigner, token: &str) -> Result<PendingRegistration, TokenError> {
    decode_pending_at(signer, token, Utc::now())
}

/// [`decode_pending`] with an explicit clock reading
pub fn decode_pending_at(
    signer: &TokenSigner,
    token: &str,
    now: DateTime<Utc>,
) -> Result<PendingRegistration, TokenError> {
    let claims = signer.verify_at::<PendingClaims>(token, KeyClass::Activation, now)?;

    Ok(PendingRegistration {
        issued_at: claims.issued_at(),
        expires_at: claims.expires_at(),
        fields: claims.payload.fields,
        nonce: claims.payload.nonce,
        code_digest: claims.payload.code_digest,
    })
}

/// Checks a supplied code against the registration's commitment
///
/// Comparison is constant-time. Surrounding whitespace is ignored.
pub fn code_matches(signer: &TokenSigner, pending: &PendingRegistration, supplied: &str) -> bool {
    let Ok(expected) = hex::decode(&pending.code_digest) else {
        return false;
    };

    match code_mac(signer, pending.nonce, supplied.trim()) {
        Ok(mac) => mac.verify_slice(&expected).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenKeys;
    use crate::models::PrincipalKind;

    fn signer() -> TokenSigner {
        TokenSigner::new(TokenKeys {
            activation: "test-activation-secret-at-least-32-bytes".to_string(),
            access: "test-access-secret-at-least-32-bytes-long".to_string(),
            refresh: "test-refresh-secret-at-least-32-bytes-long".to_string(),
        })
        .unwrap()
    }

    fn fields() -> PendingPrincipal {
        PendingPrincipal {
            kind: PrincipalKind::User,
            name: "A".to_string(),
            email: "a@x.io".to_string(),
            password_hash: "$argon2id$v=19$m=8192,t=1,p=1$salt$hash".to_string(),
            phone_number: None,
            address: None,
        }
    }

    #[test]
    fn test_generate_code_range() {
        for _ in 0..1000 {
            let code: u16 = generate_code().parse().unwrap();
            assert!((CODE_MIN..=CODE_MAX).contains(&code));
        }
    }

    #[test]
    fn test_round_trip() {
        let signer = signer();
        let issued = encode_pending(&signer, &fields(), Duration::minutes(5)).unwrap();

        assert_eq!(issued.code.len(), 4);

        let pending = decode_pending(&signer, &issued.token).unwrap();
        assert_eq!(pending.fields, fields());
        assert!(code_matches(&signer, &pending, &issued.code));
        assert_eq!((pending.expires_at - pending.issued_at).num_seconds(), 300);
    }

    #[test]
    fn test_only_the_issued_code_matches() {
        let signer = signer();
        let issued = encode_pending(&signer, &fields(), Duration::minutes(5)).unwrap();
        let pending = decode_pending(&signer, &issued.token).unwrap();

        let correct: u16 = issued.code.parse().unwrap();
        let wrong = if correct == CODE_MAX { CODE_MIN } else { correct + 1 };

        assert!(!code_matches(&signer, &pending, &wrong.to_string()));
        assert!(!code_matches(&signer, &pending, ""));
        assert!(code_matches(&signer, &pending, &format!(" {} ", issued.code)));
    }

    #[test]
    fn test_code_not_readable_from_token() {
        use base64::Engine;

        let signer = signer();
        let issued = encode_pending(&signer, &fields(), Duration::minutes(5)).unwrap();
        let segment = issued.token.split('.').nth(1).unwrap();
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(segment)
            .unwrap();
        let payload = String::from_utf8(payload).unwrap();

        assert!(payload.contains("code_digest"));
        assert!(!payload.contains(&format!("\"{}\"", issued.code)));
    }

    #[test]
    fn test_expired_pending_rejected() {
        let signer = signer();
        let now = Utc::now();
        let issued = encode_pending_at(&signer, &fields(), Duration::minutes(5), now).unwrap();

        let later = now + Duration::minutes(5) + Duration::seconds(1);
        assert!(matches!(
            decode_pending_at(&signer, &issued.token, later),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_access_token_is_not_a_pending_token() {
        let signer = signer();
        let access = signer
            .issue(&fields(), KeyClass::Access, Duration::minutes(5))
            .unwrap();

        assert!(decode_pending(&signer, &access.token).is_err());
    }
}
