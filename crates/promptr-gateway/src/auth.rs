//! Bearer-token authentication against the configured token table.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::ApiError;
use crate::AppState;

/// The user id a request acts for.
#[derive(Debug, Clone)]
pub(crate) struct AuthUser(pub String);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::Unauthorized)?;

        match state.config.user_for_token(token) {
            Some(user_id) => Ok(AuthUser(user_id.to_string())),
            None => {
                tracing::warn!(target: "promptr::gateway", "rejected unknown bearer token");
                Err(ApiError::Unauthorized)
            }
        }
    }
}
