use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::Json;
use promptr_core::{
    fill_variables, missing_variables, MemoryMetadata, MemoryPatch, MemoryRecord, NewMemory,
    PromptVersion, PromptrError,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::success;
use crate::auth::AuthUser;
use crate::error::{parse_body, ApiError};
use crate::AppState;

const INVALID_BODY: &str = "Invalid request body";

#[derive(Deserialize)]
pub(crate) struct IdParam {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Deserialize)]
struct RevertBody {
    index: usize,
}

#[derive(Deserialize, Default)]
struct CopyBody {
    #[serde(default)]
    values: HashMap<String, String>,
}

#[derive(Deserialize)]
struct TagBody {
    tag: String,
}

#[derive(Deserialize)]
struct FolderBody {
    #[serde(default)]
    folder_id: Option<String>,
}

#[derive(Deserialize)]
struct BulkDeleteBody {
    ids: Vec<String>,
}

/// Either a bare array or the `{ "memories": [...] }` export envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum ImportBody {
    List(Vec<NewMemory>),
    Wrapped { memories: Vec<NewMemory> },
}

fn require_memory(state: &AppState, user_id: &str, id: &str) -> Result<MemoryRecord, ApiError> {
    state
        .stores
        .memories
        .get(user_id, id)?
        .ok_or_else(|| PromptrError::not_found("memory").into())
}

pub(crate) async fn list_memories(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<MemoryRecord>>, ApiError> {
    Ok(Json(state.stores.memories.list(&user_id)?))
}

pub(crate) async fn create_memory(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let new: NewMemory = parse_body(&body, "Text is required")?;
    let record = state.stores.memories.insert(&user_id, new)?;
    Ok(Json(json!({ "success": true, "id": record.id })))
}

pub(crate) async fn delete_memory(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<IdParam>,
) -> Result<Json<Value>, ApiError> {
    let id = params
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Memory ID is required"))?;
    state.stores.delete_memory(&user_id, id.trim())?;
    Ok(Json(success()))
}

pub(crate) async fn update_memory(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<MemoryRecord>, ApiError> {
    let patch: MemoryPatch = parse_body(&body, INVALID_BODY)?;
    let updated = state
        .stores
        .library
        .edit(&state.stores.memories, &user_id, &id, &patch)?;
    Ok(Json(updated))
}

pub(crate) async fn duplicate_memory(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MemoryRecord>, ApiError> {
    Ok(Json(state.stores.memories.duplicate(&user_id, &id)?))
}

pub(crate) async fn revert_memory(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<MemoryRecord>, ApiError> {
    let RevertBody { index } = parse_body(&body, "Version index is required")?;
    let restored = state
        .stores
        .library
        .revert(&state.stores.memories, &user_id, &id, index)?;
    Ok(Json(restored))
}

pub(crate) async fn list_versions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<PromptVersion>>, ApiError> {
    require_memory(&state, &user_id, &id)?;
    Ok(Json(state.stores.library.metadata(&user_id, &id)?.versions))
}

/// Fill the prompt's placeholders (saved defaults first, then request values) and count the copy.
pub(crate) async fn copy_memory(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let record = require_memory(&state, &user_id, &id)?;
    let request: CopyBody = if body.is_empty() {
        CopyBody::default()
    } else {
        parse_body(&body, INVALID_BODY)?
    };

    let mut values: HashMap<String, String> = record
        .variable_defaults
        .iter()
        .flatten()
        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
        .collect();
    values.extend(request.values);

    let missing = missing_variables(&record.text, &values);
    if !missing.is_empty() {
        return Err(ApiError::bad_request(format!(
            "Missing values for: {}",
            missing.join(", ")
        )));
    }

    let text = fill_variables(&record.text, &values);
    let meta = state.stores.library.record_copy(&user_id, &id)?;
    Ok(Json(json!({
        "text": text,
        "copy_count": meta.copy_count,
        "last_used": meta.last_used,
    })))
}

pub(crate) async fn toggle_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    require_memory(&state, &user_id, &id)?;
    let favorite = state.stores.library.toggle_favorite(&user_id, &id)?;
    Ok(Json(json!({ "favorite": favorite })))
}

pub(crate) async fn add_tag(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<MemoryMetadata>, ApiError> {
    require_memory(&state, &user_id, &id)?;
    let TagBody { tag } = parse_body(&body, "Tag is required")?;
    Ok(Json(state.stores.library.add_tag(&user_id, &id, &tag)?))
}

pub(crate) async fn remove_tag(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((id, tag)): Path<(String, String)>,
) -> Result<Json<MemoryMetadata>, ApiError> {
    require_memory(&state, &user_id, &id)?;
    Ok(Json(state.stores.library.remove_tag(&user_id, &id, &tag)?))
}

pub(crate) async fn assign_folder(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<MemoryMetadata>, ApiError> {
    require_memory(&state, &user_id, &id)?;
    let FolderBody { folder_id } = parse_body(&body, INVALID_BODY)?;
    let folder_id = folder_id.as_deref().map(str::trim).filter(|f| !f.is_empty());
    Ok(Json(
        state
            .stores
            .library
            .assign_folder(&user_id, &id, folder_id)?,
    ))
}

pub(crate) async fn bulk_delete(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let BulkDeleteBody { ids } = parse_body(&body, "Memory IDs are required")?;
    let deleted = state.stores.delete_memories(&user_id, &ids)?;
    Ok(Json(json!({ "success": true, "deleted": deleted })))
}

pub(crate) async fn import_memories(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let items = match parse_body::<ImportBody>(&body, "Invalid import payload")? {
        ImportBody::List(items) | ImportBody::Wrapped { memories: items } => items,
    };
    let imported = state.stores.memories.import(&user_id, items)?;
    Ok(Json(json!({ "success": true, "imported": imported })))
}

pub(crate) async fn export_memories(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let memories = state.stores.memories.list(&user_id)?;
    Ok(Json(json!({
        "exported_at": chrono::Utc::now(),
        "memories": memories,
    })))
}
