/// Password hashing module using Argon2id
///
/// Secrets are hashed into PHC strings (`$argon2id$v=19$m=...`) that embed the
/// algorithm, parameters and salt, so verification never needs to know which
/// cost profile produced a hash.
///
/// # Cost Profiles
///
/// - [`PasswordHasher::new`]: 64 MB memory, 3 passes, 4 lanes (production)
/// - [`PasswordHasher::low_cost`]: minimal memory, 1 pass (tests, local dev)
///
/// # Example
///
/// ```
/// use bazaar_shared::auth::password::PasswordHasher;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hasher = PasswordHasher::low_cost();
/// let hash = hasher.hash("Secret123")?;
///
/// assert!(hasher.verify("Secret123", &hash)?);
/// assert!(!hasher.verify("wrong", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Argon2, ParamsBuilder, Version,
};

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Invalid password hash format
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

/// Minimum accepted secret length
pub const MIN_PASSWORD_LEN: usize = 8;

/// Maximum accepted secret length
pub const MAX_PASSWORD_LEN: usize = 128;

/// Argon2id hasher with a fixed cost profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordHasher {
    m_cost: u32,
    t_cost: u32,
    p_cost: u32,
}

impl PasswordHasher {
    /// Production profile: 64 MB, 3 iterations, 4 lanes, 32-byte output
    pub const fn new() -> Self {
        Self {
            m_cost: 65536,
            t_cost: 3,
            p_cost: 4,
        }
    }

    /// Cheap profile for tests and local development
    pub const fn low_cost() -> Self {
        Self {
            m_cost: 8 * 1024,
            t_cost: 1,
            p_cost: 1,
        }
    }

    /// Builds a hasher from explicit Argon2 costs
    ///
    /// # Arguments
    ///
    /// * `m_cost` - Memory in KiB
    /// * `t_cost` - Number of passes
    /// * `p_cost` - Parallel lanes
    ///
    /// # Errors
    ///
    /// Returns `PasswordError::HashError` if Argon2 rejects the combination
    pub fn with_costs(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, PasswordError> {
        let hasher = Self {
            m_cost,
            t_cost,
            p_cost,
        };
        hasher.argon2()?;
        Ok(hasher)
    }

    fn argon2(&self) -> Result<Argon2<'static>, PasswordError> {
        let params = ParamsBuilder::new()
            .m_cost(self.m_cost)
            .t_cost(self.t_cost)
            .p_cost(self.p_cost)
            .output_len(32)
            .build()
            .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

        Ok(Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Hashes a secret with a fresh random salt
    ///
    /// # Errors
    ///
    /// Returns `PasswordError::HashError` if hashing fails
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = self
            .argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

        Ok(password_hash.to_string())
    }

    /// Verifies a secret against a stored PHC hash
    ///
    /// Comparison is constant-time. A mismatch is `Ok(false)`; only an
    /// unparseable stored hash is an error.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

        // Parameters are read from the hash itself
        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
        }
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Validates password strength
///
/// Requirements:
/// - Between 8 and 128 characters
/// - At least one letter
/// - At least one digit
///
/// # Example
///
/// ```
/// use bazaar_shared::auth::password::validate_password_strength;
///
/// assert!(validate_password_strength("Secret123").is_ok());
/// assert!(validate_password_strength("short1").is_err());
/// assert!(validate_password_strength("NoDigitsHere").is_err());
/// ```
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    let len = password.chars().count();

    if len < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        ));
    }

    if len > MAX_PASSWORD_LEN {
        return Err(format!(
            "Password must be at most {} characters long",
            MAX_PASSWORD_LEN
        ));
    }

    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err("Password must contain at least one letter".to_string());
    }

    if !password.chars().any(|c| c.is_numeric()) {
        return Err("Password must contain at least one digit".to_string());
    }

    Ok(())
}
