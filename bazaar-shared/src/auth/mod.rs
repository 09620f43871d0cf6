/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id hashing and strength checks
/// - [`jwt`]: Token signing and verification with one key per token class
/// - [`activation`]: Pending-registration tokens and confirmation codes
/// - [`credentials`]: Registration, activation, login, refresh, logout and
///   profile mutations
/// - [`middleware`]: Access token + session resolution into `AuthContext`
/// - [`authorization`]: Role gate
///
/// # Security Features
///
/// - **Password Hashing**: Argon2id with 64 MB memory, 3 iterations
/// - **Tokens**: HS256, distinct keys and audiences for activation, access and
///   refresh tokens
/// - **Revocable Sessions**: access tokens are only honoured while the
///   session is cached
/// - **Constant-time Comparison**: secret and code checks
///
/// # Example
///
/// ```
/// use bazaar_shared::auth::password::PasswordHasher;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hasher = PasswordHasher::low_cost();
/// let hash = hasher.hash("Secret123")?;
/// assert!(hasher.verify("Secret123", &hash)?);
/// # Ok(())
/// # }
/// ```

pub mod activation;
pub mod authorization;
pub mod credentials;
pub mod jwt;
pub mod middleware;
pub mod password;
