#![allow(dead_code)]

/// Common test utilities for integration tests
///
/// Builds the full router over in-memory backends, so the HTTP flow runs
/// without PostgreSQL or Redis:
/// - Test application and state
/// - Request helpers returning status, headers and JSON body
/// - Account helpers (register + activate + login)

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use bazaar_api::app::{build_router, AppState, Backends};
use bazaar_api::config::Config;
use bazaar_shared::assets::MemoryAssetStore;
use bazaar_shared::auth::password::PasswordHasher;
use bazaar_shared::models::{PrincipalKind, Role};
use bazaar_shared::notify::{extract_code, MemoryNotifier};
use bazaar_shared::session::MemorySessionCache;
use bazaar_shared::store::MemoryPrincipalStore;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

/// Test context containing the app and handles on its backends
pub struct TestContext {
    pub app: Router,
    pub state: AppState,
    pub notifier: Arc<MemoryNotifier>,
    pub sessions: Arc<MemorySessionCache>,
    pub assets: Arc<MemoryAssetStore>,
}

/// Response captured for assertions
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// Value of a cookie set by the response
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .filter_map(|pair| pair.split_once('='))
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.to_string())
    }
}

/// Logged-in account
pub struct Session {
    pub id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
}

pub fn test_config() -> Config {
    let vars: HashMap<String, String> = [
        ("ACTIVATION_SECRET", "api-activation-secret-at-least-32-bytes"),
        ("ACCESS_TOKEN_SECRET", "api-access-secret-at-least-32-bytes-long"),
        ("REFRESH_TOKEN_SECRET", "api-refresh-secret-at-least-32-bytes-long"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    Config::from_vars(&vars).expect("test config")
}

impl TestContext {
    pub fn new() -> Self {
        let notifier = Arc::new(MemoryNotifier::new());
        let sessions = Arc::new(MemorySessionCache::new());
        let assets = Arc::new(MemoryAssetStore::new());

        let backends = Backends {
            users: Arc::new(MemoryPrincipalStore::new(PrincipalKind::User)),
            shops: Arc::new(MemoryPrincipalStore::new(PrincipalKind::Shop)),
            sessions: sessions.clone(),
            notifier: notifier.clone(),
            assets: assets.clone(),
        };

        let state = AppState::new(test_config(), backends, PasswordHasher::low_cost())
            .expect("app state");
        let app = build_router(state.clone());

        Self {
            app,
            state,
            notifier,
            sessions,
            assets,
        }
    }

    /// Sends a request; `token` goes into `Authorization: Bearer`
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        self.dispatch(request).await
    }

    /// Sends a request carrying a raw `Cookie` header
    pub async fn send_with_cookie(&self, method: Method, uri: &str, cookie: &str) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();

        self.dispatch(request).await
    }

    async fn dispatch(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).to_string())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Confirmation code most recently sent to `email`
    pub async fn code_for(&self, email: &str) -> String {
        let message = self.notifier.last_to(email).await.expect("code was sent");
        extract_code(&message.body).expect("message carries a code")
    }

    /// Registers and activates a user, returning its id
    pub async fn activated_user(&self, email: &str, password: &str) -> Uuid {
        let register = self
            .send(
                Method::POST,
                "/v1/users/register",
                None,
                Some(serde_json::json!({
                    "name": "Test User",
                    "email": email,
                    "password": password,
                })),
            )
            .await;
        assert_eq!(register.status, StatusCode::OK, "{}", register.body);

        let code = self.code_for(email).await;
        let activate = self
            .send(
                Method::POST,
                "/v1/users/activate",
                None,
                Some(serde_json::json!({
                    "activation_token": register.body["activation_token"],
                    "activation_code": code,
                })),
            )
            .await;
        assert_eq!(activate.status, StatusCode::OK, "{}", activate.body);

        activate.body["user"]["id"]
            .as_str()
            .and_then(|id| id.parse().ok())
            .expect("activated user id")
    }

    pub async fn login(&self, email: &str, password: &str) -> Session {
        let login = self
            .send(
                Method::POST,
                "/v1/users/login",
                None,
                Some(serde_json::json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(login.status, StatusCode::OK, "{}", login.body);

        Session {
            id: login.body["user"]["id"]
                .as_str()
                .and_then(|id| id.parse().ok())
                .expect("user id"),
            access_token: login.body["access_token"].as_str().unwrap().to_string(),
            refresh_token: login.body["refresh_token"].as_str().unwrap().to_string(),
        }
    }

    /// Registers and activates a shop, returning its id
    pub async fn activated_shop(&self, email: &str, password: &str) -> Uuid {
        let register = self
            .send(
                Method::POST,
                "/v1/shops/register",
                None,
                Some(serde_json::json!({
                    "name": "Test Shop",
                    "email": email,
                    "password": password,
                    "phone_number": "+15550100",
                    "address": {
                        "address_type": "business",
                        "country": "US",
                        "city": "Austin",
                        "address1": "2 Main St",
                    },
                })),
            )
            .await;
        assert_eq!(register.status, StatusCode::OK, "{}", register.body);

        let code = self.code_for(email).await;
        let activate = self
            .send(
                Method::POST,
                "/v1/shops/activate",
                None,
                Some(serde_json::json!({
                    "activation_token": register.body["activation_token"],
                    "activation_code": code,
                })),
            )
            .await;
        assert_eq!(activate.status, StatusCode::OK, "{}", activate.body);

        activate.body["shop"]["id"]
            .as_str()
            .and_then(|id| id.parse().ok())
            .expect("activated shop id")
    }

    /// Shop login; the full response is kept for its cookies
    pub async fn shop_login(&self, email: &str, password: &str) -> TestResponse {
        let login = self
            .send(
                Method::POST,
                "/v1/shops/login",
                None,
                Some(serde_json::json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(login.status, StatusCode::OK, "{}", login.body);
        login
    }

    /// Activated, logged-in admin
    pub async fn admin(&self) -> Session {
        let id = self.activated_user("admin@bazaar.test", "Admin12345").await;
        self.state
            .users
            .service
            .update_role(id, Role::Admin)
            .await
            .unwrap();
        self.login("admin@bazaar.test", "Admin12345").await
    }
}
