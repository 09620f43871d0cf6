/// Portal endpoints
///
/// Users and shops share these handlers; the portal's [`PortalState`] decides
/// which store they act on. Login and refresh set the portal's access and
/// refresh cookies (`access_token`/`refresh_token` for users,
/// `seller_access_token`/`seller_refresh_token` for shops) and also return
/// both tokens in the body for clients that send `Authorization: Bearer`.
///
/// # Endpoints
///
/// - `POST /register` - Start a registration, emails a confirmation code
/// - `POST /activate` - Complete it with the token and code
/// - `POST /login` - Open a session
/// - `POST /refresh` - Renew tokens from the refresh cookie or body
/// - `POST /logout` - End the session
/// - `GET /me`, `PUT /me` - Read or edit the profile
/// - `PUT /me/password` - Change the password
/// - `PUT /me/avatar` - Replace the avatar (base64 or data URL)
/// - `PUT /me/addresses`, `DELETE /me/addresses/:address_id` - Address book
/// - `GET /`, `PUT /:id/role`, `DELETE /:id` - Administration

use super::{success, JsonBody, PathParam};
use crate::{app::PortalState, error::ApiResult};
use axum::{extract::State, Json};
use base64::{engine::general_purpose::STANDARD, Engine};
use bazaar_shared::auth::credentials::{ProfileUpdate, Registration, SessionGrant};
use bazaar_shared::auth::middleware::AuthContext;
use bazaar_shared::error::AuthError;
use bazaar_shared::models::{AddressInput, Role};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_cookies::cookie::{time::Duration, SameSite};
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

/// Activation request
#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub activation_token: String,
    pub activation_code: String,
}

/// Login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Refresh request; the body is optional when the cookie is sent
#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Password change request
#[derive(Deserialize)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
}

/// Avatar upload: raw base64 or a `data:<mime>;base64,<data>` URL
#[derive(Deserialize)]
pub struct AvatarUpload {
    pub avatar: String,
}

/// Role change request
#[derive(Debug, Deserialize)]
pub struct RoleUpdate {
    pub role: Role,
}

fn auth_cookie(name: &'static str, value: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_http_only(true);
    cookie.set_secure(secure);
    cookie.set_same_site(SameSite::Strict);
    cookie.set_path("/");
    cookie.set_max_age(Duration::seconds(max_age_secs));
    cookie
}

fn set_session_cookies(cookies: &Cookies, portal: &PortalState, grant: &SessionGrant) {
    let settings = portal.service.settings();
    cookies.add(auth_cookie(
        portal.cookies.access,
        grant.tokens.access_token.clone(),
        settings.access_ttl.as_secs() as i64,
        portal.secure_cookies,
    ));
    cookies.add(auth_cookie(
        portal.cookies.refresh,
        grant.tokens.refresh_token.clone(),
        settings.refresh_ttl.as_secs() as i64,
        portal.secure_cookies,
    ));
}

fn clear_session_cookies(cookies: &Cookies, portal: &PortalState) {
    for name in [portal.cookies.access, portal.cookies.refresh] {
        cookies.remove(auth_cookie(name, String::new(), 0, portal.secure_cookies));
    }
}

/// Payload key for the portal's principal: "user" or "shop"
fn principal_key(portal: &PortalState) -> &'static str {
    portal.service.kind().as_str()
}

fn grant_payload(portal: &PortalState, grant: SessionGrant) -> Value {
    json!({
        principal_key(portal): grant.principal,
        "access_token": grant.tokens.access_token,
        "access_expires_at": grant.tokens.access_expires_at,
        "refresh_token": grant.tokens.refresh_token,
        "refresh_expires_at": grant.tokens.refresh_expires_at,
    })
}

/// Decodes an avatar given as raw base64 or as a data URL
pub fn decode_image(raw: &str) -> Result<Vec<u8>, AuthError> {
    let raw = raw.trim();
    let data = match raw.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(";base64,")
            .map(|(_, data)| data)
            .ok_or_else(|| AuthError::Validation("Avatar data URL must be base64".to_string()))?,
        None => raw,
    };

    STANDARD
        .decode(data)
        .map_err(|_| AuthError::Validation("Avatar must be base64 encoded".to_string()))
}

/// Starts a registration
///
/// # Response
///
/// ```json
/// {
///   "success": true,
///   "message": "Please check your email: a@x.io to activate your account",
///   "activation_token": "eyJ...",
///   "expires_at": "2026-01-01T00:05:00Z"
/// }
/// ```
pub async fn register(
    State(portal): State<PortalState>,
    JsonBody(registration): JsonBody<Registration>,
) -> ApiResult<Json<Value>> {
    let email = registration.email.trim().to_lowercase();
    let pending = portal.service.register(registration).await?;

    success(json!({
        "message": format!("Please check your email: {} to activate your account", email),
        "activation_token": pending.activation_token,
        "expires_at": pending.expires_at,
    }))
}

pub async fn activate(
    State(portal): State<PortalState>,
    JsonBody(req): JsonBody<ActivateRequest>,
) -> ApiResult<Json<Value>> {
    let profile = portal
        .service
        .activate(&req.activation_token, &req.activation_code)
        .await?;

    success(json!({ principal_key(&portal): profile }))
}

pub async fn login(
    State(portal): State<PortalState>,
    cookies: Cookies,
    JsonBody(req): JsonBody<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let grant = portal.service.login(&req.email, &req.password).await?;
    set_session_cookies(&cookies, &portal, &grant);

    success(grant_payload(&portal, grant))
}

/// Renews the token pair
///
/// The portal's refresh cookie takes precedence over a token in the body.
pub async fn refresh(
    State(portal): State<PortalState>,
    cookies: Cookies,
    body: Option<JsonBody<RefreshRequest>>,
) -> ApiResult<Json<Value>> {
    let token = cookies
        .get(portal.cookies.refresh)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| body.and_then(|JsonBody(req)| req.refresh_token))
        .ok_or(AuthError::InvalidRefreshToken)?;

    let grant = portal.service.refresh(&token).await?;
    set_session_cookies(&cookies, &portal, &grant);

    success(grant_payload(&portal, grant))
}

pub async fn logout(
    State(portal): State<PortalState>,
    cookies: Cookies,
    auth: AuthContext,
) -> ApiResult<Json<Value>> {
    portal.service.logout(auth.principal_id()).await?;
    clear_session_cookies(&cookies, &portal);

    success(json!({ "message": "Logged out successfully" }))
}

pub async fn me(State(portal): State<PortalState>, auth: AuthContext) -> ApiResult<Json<Value>> {
    let profile = portal.service.profile(auth.principal_id()).await?;
    success(json!({ principal_key(&portal): profile }))
}

pub async fn update_me(
    State(portal): State<PortalState>,
    auth: AuthContext,
    JsonBody(update): JsonBody<ProfileUpdate>,
) -> ApiResult<Json<Value>> {
    let profile = portal
        .service
        .update_profile(auth.principal_id(), update)
        .await?;
    success(json!({ principal_key(&portal): profile }))
}

pub async fn update_password(
    State(portal): State<PortalState>,
    auth: AuthContext,
    JsonBody(req): JsonBody<PasswordChange>,
) -> ApiResult<Json<Value>> {
    portal
        .service
        .update_secret(auth.principal_id(), &req.old_password, &req.new_password)
        .await?;

    success(json!({ "message": "Password updated successfully" }))
}

pub async fn update_avatar(
    State(portal): State<PortalState>,
    auth: AuthContext,
    JsonBody(req): JsonBody<AvatarUpload>,
) -> ApiResult<Json<Value>> {
    let image = decode_image(&req.avatar)?;
    let profile = portal
        .service
        .update_avatar(auth.principal_id(), image)
        .await?;
    success(json!({ principal_key(&portal): profile }))
}

pub async fn upsert_address(
    State(portal): State<PortalState>,
    auth: AuthContext,
    JsonBody(address): JsonBody<AddressInput>,
) -> ApiResult<Json<Value>> {
    let profile = portal
        .service
        .upsert_address(auth.principal_id(), address)
        .await?;
    success(json!({ principal_key(&portal): profile }))
}

pub async fn delete_address(
    State(portal): State<PortalState>,
    auth: AuthContext,
    PathParam(address_id): PathParam<Uuid>,
) -> ApiResult<Json<Value>> {
    let profile = portal
        .service
        .delete_address(auth.principal_id(), address_id)
        .await?;
    success(json!({ principal_key(&portal): profile }))
}

pub async fn list(State(portal): State<PortalState>) -> ApiResult<Json<Value>> {
    let all = portal.service.list().await?;
    let key = format!("{}s", principal_key(&portal));
    success(json!({ key: all }))
}

pub async fn update_role(
    State(portal): State<PortalState>,
    auth: AuthContext,
    PathParam(id): PathParam<Uuid>,
    JsonBody(req): JsonBody<RoleUpdate>,
) -> ApiResult<Json<Value>> {
    let profile = portal.service.update_role(id, req.role).await?;

    tracing::info!(
        admin_id = %auth.principal_id(),
        principal_id = %id,
        role = %req.role,
        "Role changed by admin"
    );

    success(json!({ principal_key(&portal): profile }))
}

pub async fn delete(
    State(portal): State<PortalState>,
    auth: AuthContext,
    PathParam(id): PathParam<Uuid>,
) -> ApiResult<Json<Value>> {
    portal.service.delete(id).await?;

    tracing::info!(admin_id = %auth.principal_id(), principal_id = %id, "Principal deleted by admin");

    success(json!({ "message": format!("{} deleted successfully", principal_key(&portal)) }))
}
