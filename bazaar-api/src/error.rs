/// Error handling for the API server
///
/// Handlers return `ApiResult<T>`. Domain failures arrive as [`AuthError`] and
/// keep their status and code; the remaining variants cover request shapes
/// the domain never sees.
///
/// Every failure is rendered with the same envelope:
///
/// ```json
/// { "success": false, "error": "duplicate_email", "message": "Email already exists" }
/// ```

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bazaar_shared::auth::middleware::error_response;
use bazaar_shared::error::AuthError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Body or path could not be parsed (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unexpected failure inside the API layer (500)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Auth(err) => err.into_response(),
            ApiError::BadRequest(msg) => {
                error_response(StatusCode::BAD_REQUEST, "bad_request", &msg)
            }
            ApiError::Internal(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!(error = %msg, "Internal error");
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred",
                )
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_auth_error_keeps_its_code() {
        let response = ApiError::from(AuthError::CodeMismatch).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "code_mismatch");
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let response = ApiError::Internal("join failed: panic".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "internal_error");
        assert!(!body["message"].as_str().unwrap().contains("panic"));
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");
    }
}
