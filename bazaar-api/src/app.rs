/// Application state and router builder
///
/// The API serves two portals with identical flows: `/v1/users` and
/// `/v1/shops`. Each portal owns a [`CredentialService`] bound to its own
/// principal store; both share the session cache, token keys, notifier and
/// asset store.
///
/// # Example
///
/// ```no_run
/// use bazaar_api::app::{build_router, AppState, Backends};
/// use bazaar_api::config::Config;
/// use bazaar_shared::auth::password::PasswordHasher;
///
/// # async fn example(backends: Backends) -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let state = AppState::new(config, backends, PasswordHasher::new())?;
/// let app = build_router(state);
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::{
        auth::{require_admin, require_session},
        security::SecurityHeadersLayer,
    },
    routes,
};
use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};
use bazaar_shared::assets::AssetStore;
use bazaar_shared::auth::credentials::{Collaborators, CredentialService};
use bazaar_shared::auth::jwt::TokenSigner;
use bazaar_shared::auth::middleware::{Authenticator, CookieNames};
use bazaar_shared::auth::password::PasswordHasher;
use bazaar_shared::notify::Notifier;
use bazaar_shared::session::SessionCache;
use bazaar_shared::store::PrincipalStore;
use std::sync::Arc;
use tower_cookies::CookieManagerLayer;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Adapters the services run against
#[derive(Clone)]
pub struct Backends {
    pub users: Arc<dyn PrincipalStore>,
    pub shops: Arc<dyn PrincipalStore>,
    pub sessions: Arc<dyn SessionCache>,
    pub notifier: Arc<dyn Notifier>,
    pub assets: Arc<dyn AssetStore>,
}

/// State of one portal's router
#[derive(Clone)]
pub struct PortalState {
    pub service: Arc<CredentialService>,
    pub authenticator: Authenticator,

    /// Cookies carrying this portal's tokens
    pub cookies: CookieNames,

    /// Set the `Secure` attribute on auth cookies
    pub secure_cookies: bool,
}

impl PortalState {
    fn new(service: CredentialService, secure_cookies: bool) -> Self {
        let authenticator = Authenticator::for_service(&service);
        Self {
            cookies: CookieNames::for_kind(service.kind()),
            service: Arc::new(service),
            authenticator,
            secure_cookies,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: PortalState,
    pub shops: PortalState,
}

impl AppState {
    /// Wires both portals to the given backends
    ///
    /// # Errors
    ///
    /// Fails if the token keys are unusable or the hasher cannot run.
    pub fn new(config: Config, backends: Backends, hasher: PasswordHasher) -> anyhow::Result<Self> {
        let signer = Arc::new(TokenSigner::new(config.auth.keys.clone())?);
        let settings = config.credential_settings();
        let secure = config.api.production;

        let portal = |store: Arc<dyn PrincipalStore>| -> anyhow::Result<PortalState> {
            let service = CredentialService::new(
                Collaborators {
                    store,
                    sessions: backends.sessions.clone(),
                    signer: signer.clone(),
                    notifier: backends.notifier.clone(),
                    assets: backends.assets.clone(),
                },
                hasher,
                settings,
            )?;
            Ok(PortalState::new(service, secure))
        };

        let users = portal(backends.users.clone())?;
        let shops = portal(backends.shops.clone())?;

        Ok(Self {
            config: Arc::new(config),
            users,
            shops,
        })
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /health
/// └── /v1/
///     ├── /users/        # portal routes, with address book
///     └── /shops/        # portal routes
///
/// portal routes:
///   POST   /register, /activate, /login, /refresh     (public)
///   POST   /logout                                    (session)
///   GET    /me    PUT /me                             (session)
///   PUT    /me/password, /me/avatar                   (session)
///   PUT    /me/addresses                              (session, users)
///   DELETE /me/addresses/:address_id                  (session, users)
///   GET    /      PUT /:id/role    DELETE /:id        (admin)
/// ```
///
/// Administration of both portals is done by user accounts with the `admin`
/// role, so the admin routes under `/shops` authenticate against the users
/// portal.
///
/// # Middleware Stack
///
/// Applied in order (outermost first):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Cookie jar (tower-cookies)
/// 5. Session / admin checks (per-route basis)
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .with_state(state.clone());

    let v1_routes = Router::new()
        .nest("/users", portal_router(state.users.clone(), &state.users, true))
        .nest("/shops", portal_router(state.shops.clone(), &state.users, false));

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(CookieManagerLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
}

/// Routes of one portal; `admins` resolves the callers of the admin routes
fn portal_router(portal: PortalState, admins: &PortalState, with_addresses: bool) -> Router {
    use crate::routes::accounts;

    let public_routes = Router::new()
        .route("/register", post(accounts::register))
        .route("/activate", post(accounts::activate))
        .route("/login", post(accounts::login))
        .route("/refresh", post(accounts::refresh));

    let mut session_routes = Router::new()
        .route("/logout", post(accounts::logout))
        .route("/me", get(accounts::me).put(accounts::update_me))
        .route("/me/password", put(accounts::update_password))
        .route("/me/avatar", put(accounts::update_avatar));

    if with_addresses {
        session_routes = session_routes
            .route("/me/addresses", put(accounts::upsert_address))
            .route("/me/addresses/:address_id", delete(accounts::delete_address));
    }

    let session_routes =
        session_routes.route_layer(from_fn_with_state(portal.clone(), require_session));

    // Layers run bottom to top: session first, then the admin gate
    let admin_routes = Router::new()
        .route("/", get(accounts::list))
        .route("/:id/role", put(accounts::update_role))
        .route("/:id", delete(accounts::delete))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(admins.clone(), require_session));

    Router::new()
        .merge(public_routes)
        .merge(session_routes)
        .merge(admin_routes)
        .with_state(portal)
}
