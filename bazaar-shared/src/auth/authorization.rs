/// Role-based authorization
///
/// Authorization runs after authentication: the caller's role comes from the
/// session snapshot in [`AuthContext`], so a role change made by an admin
/// applies on the next request without a new login.
///
/// Roles are flat. A route lists every role it admits; `Admin` does not
/// implicitly satisfy `Seller`.
///
/// # Example
///
/// ```no_run
/// use bazaar_shared::auth::authorization::require_role;
/// use bazaar_shared::auth::middleware::AuthContext;
/// use bazaar_shared::error::AuthError;
/// use bazaar_shared::models::Role;
///
/// async fn list_all(auth: AuthContext) -> Result<&'static str, AuthError> {
///     require_role(&auth, &[Role::Admin])?;
///     Ok("everything")
/// }
/// ```

use super::middleware::AuthContext;
use crate::error::AuthError;
use crate::models::Role;

/// Whether `actual` is one of the `allowed` roles
///
/// An empty allow-list admits nobody.
pub fn role_allowed(allowed: &[Role], actual: Role) -> bool {
    allowed.contains(&actual)
}

/// Checks the caller's role
///
/// # Errors
///
/// Returns `AuthError::Forbidden` if the role is not allowed
pub fn require_role(auth: &AuthContext, allowed: &[Role]) -> Result<(), AuthError> {
    if role_allowed(allowed, auth.role()) {
        Ok(())
    } else {
        tracing::debug!(
            principal_id = %auth.principal_id(),
            role = %auth.role(),
            "Role not allowed"
        );
        Err(AuthError::Forbidden)
    }
}
