/// Health check endpoint
///
/// Verifies that both principal stores and the session cache answer within
/// the configured I/O timeout.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "success": true,
///   "status": "healthy",
///   "version": "0.1.0",
///   "store": "connected",
///   "cache": "connected"
/// }
/// ```
///
/// Returns `503 Service Unavailable` with `"status": "degraded"` when a
/// dependency does not answer.

use crate::app::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub success: bool,

    /// "healthy" or "degraded"
    pub status: String,

    /// Application version
    pub version: String,

    /// Principal store status
    pub store: String,

    /// Session cache status
    pub cache: String,
}

async fn check_dependency<E, F>(dependency: &'static str, timeout: Duration, check: F) -> bool
where
    F: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(timeout, check).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(dependency, error = %e, "Health check failed");
            false
        }
        Err(_) => {
            tracing::warn!(dependency, "Health check timed out");
            false
        }
    }
}

fn label(up: bool) -> String {
    if up { "connected" } else { "disconnected" }.to_string()
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let timeout = state.config.credential_settings().io_timeout;

    let users = check_dependency("user store", timeout, state.users.service.store().ping()).await;
    let shops = check_dependency("shop store", timeout, state.shops.service.store().ping()).await;
    let cache = check_dependency("session cache", timeout, state.users.service.sessions().ping()).await;

    let healthy = users && shops && cache;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            success: healthy,
            status: if healthy { "healthy" } else { "degraded" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            store: label(users && shops),
            cache: label(cache),
        }),
    )
}
