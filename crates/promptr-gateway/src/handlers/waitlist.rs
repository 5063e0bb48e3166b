use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use promptr_core::WaitlistOutcome;
use serde_json::{json, Value};

use super::success;
use crate::error::{parse_body, ApiError};
use crate::AppState;

const EMAIL_REQUIRED: &str = "Email is required";

pub(crate) async fn join_waitlist(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let payload: Value = parse_body(&body, EMAIL_REQUIRED)?;
    let email = payload
        .get("email")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_request(EMAIL_REQUIRED))?;

    match state.stores.waitlist.join(email)? {
        WaitlistOutcome::Joined => Ok(Json(success())),
        WaitlistOutcome::AlreadyJoined => Ok(Json(json!({
            "code": "duplicate",
            "error": "Already on the waitlist",
        }))),
    }
}
