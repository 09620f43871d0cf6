/// API route handlers
///
/// - `health`: Health check endpoint
/// - `accounts`: Portal endpoints shared by users and shops
///
/// Successful responses use the envelope `{"success": true, ...payload}`.

pub mod accounts;
pub mod health;

use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{FromRequest, FromRequestParts},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};

/// JSON body whose rejections use the API error envelope
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// Path parameters whose rejections use the API error envelope
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct PathParam<T>(pub T);

/// Wraps a payload object in the success envelope
pub fn success<T: Serialize>(payload: T) -> ApiResult<Json<Value>> {
    let value = serde_json::to_value(payload).map_err(|e| ApiError::Internal(e.to_string()))?;

    let mut body = Map::new();
    body.insert("success".to_string(), Value::Bool(true));
    match value {
        Value::Object(fields) => body.extend(fields),
        Value::Null => {}
        other => {
            body.insert("data".to_string(), other);
        }
    }

    Ok(Json(Value::Object(body)))
}
