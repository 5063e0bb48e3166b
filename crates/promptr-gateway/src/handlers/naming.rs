use axum::body::Bytes;
use axum::Json;
use promptr_core::generate_title;
use serde_json::{json, Value};

use crate::error::{parse_body, ApiError};

const TEXT_REQUIRED: &str = "Text is required";

/// POST /api/memories/generate-name: `{text}` -> `{name}`. No auth; the title is pure.
/// Only a missing, non-string, or empty `text` is rejected; blank text gets the placeholder title.
pub(crate) async fn generate_name(body: Bytes) -> Result<Json<Value>, ApiError> {
    let payload: Value = parse_body(&body, TEXT_REQUIRED)?;
    let text = payload
        .get("text")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request(TEXT_REQUIRED))?;
    Ok(Json(json!({ "name": generate_title(text) })))
}
