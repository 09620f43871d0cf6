/// Session middleware for the portal routers
///
/// `require_session` resolves the caller from the portal's access cookie, or
/// an `Authorization: Bearer` header when no cookie is present, and inserts
/// the resulting [`AuthContext`] into request extensions. `require_admin`
/// runs after it on admin routes.
///
/// ```text
/// request ─► require_session ─► [require_admin] ─► handler(AuthContext)
/// ```

use crate::{app::PortalState, error::ApiError};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use bazaar_shared::auth::authorization::require_role;
use bazaar_shared::auth::middleware::{bearer_token, AuthContext};
use bazaar_shared::models::Role;
use tower_cookies::Cookies;

/// Access token carried by the request, cookie first
fn access_token(portal: &PortalState, cookies: &Cookies, req: &Request) -> Option<String> {
    cookies
        .get(portal.cookies.access)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| bearer_token(req.headers()).map(str::to_string))
}

pub async fn require_session(
    State(portal): State<PortalState>,
    cookies: Cookies,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = access_token(&portal, &cookies, &req);

    let auth = portal.authenticator.authenticate(token.as_deref()).await?;

    tracing::debug!(
        principal_id = %auth.principal_id(),
        role = %auth.role(),
        "Request authenticated"
    );

    req.extensions_mut().insert(auth);
    Ok(next.run(req).await)
}

pub async fn require_admin(auth: AuthContext, req: Request, next: Next) -> Result<Response, ApiError> {
    require_role(&auth, &[Role::Admin])?;
    Ok(next.run(req).await)
}
