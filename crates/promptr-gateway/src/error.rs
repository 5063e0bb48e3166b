//! HTTP error mapping. Every failure leaves the gateway as `{"error": "..."}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use promptr_core::PromptrError;
use serde::de::DeserializeOwned;

#[derive(Debug)]
pub(crate) enum ApiError {
    Core(PromptrError),
    BadRequest(String),
    Unauthorized,
}

impl ApiError {
    pub(crate) fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
}

impl From<PromptrError> for ApiError {
    fn from(e: PromptrError) -> Self {
        Self::Core(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::Core(PromptrError::InvalidInput(msg)) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Core(e @ PromptrError::NotFound(_)) => (StatusCode::NOT_FOUND, e.to_string()),
            ApiError::Core(e) => {
                tracing::error!(target: "promptr::gateway", error = %e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Decode a JSON body; anything unreadable becomes a 400 carrying `message`.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &[u8], message: &str) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(target: "promptr::gateway", error = %e, "rejected request body");
        ApiError::bad_request(message)
    })
}
