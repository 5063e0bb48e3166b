use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::Json;
use promptr_core::{
    library_stats, Folder, FolderSelection, LibraryEntry, LibraryQuery, LibraryStats, PromptrError,
    SortOption,
};
use serde::Deserialize;
use serde_json::Value;

use super::success;
use crate::auth::AuthUser;
use crate::error::{parse_body, ApiError};
use crate::AppState;

#[derive(Deserialize)]
struct NewFolderBody {
    name: String,
    #[serde(default)]
    color: Option<String>,
}

/// `GET /api/library` query string. `tags` is a comma-separated list.
#[derive(Deserialize, Default)]
pub(crate) struct LibraryParams {
    #[serde(default)]
    folder: Option<String>,
    #[serde(default)]
    tags: Option<String>,
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    sort: Option<String>,
}

impl LibraryParams {
    fn into_query(self) -> LibraryQuery {
        LibraryQuery {
            folder: FolderSelection::parse(self.folder.as_deref().unwrap_or_default()),
            tags: self
                .tags
                .as_deref()
                .unwrap_or_default()
                .split(',')
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            search: self.q,
            sort: SortOption::parse(self.sort.as_deref().unwrap_or_default()),
        }
    }
}

pub(crate) async fn list_folders(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Folder>>, ApiError> {
    Ok(Json(state.stores.library.list_folders(&user_id)?))
}

pub(crate) async fn create_folder(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    body: Bytes,
) -> Result<Json<Folder>, ApiError> {
    let NewFolderBody { name, color } = parse_body(&body, "Folder name is required")?;
    let folder = state
        .stores
        .library
        .create_folder(&user_id, &name, color.as_deref())?;
    Ok(Json(folder))
}

pub(crate) async fn delete_folder(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(folder_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state.stores.library.delete_folder(&user_id, &folder_id)? {
        return Err(PromptrError::not_found("folder").into());
    }
    Ok(Json(success()))
}

pub(crate) async fn library(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<LibraryParams>,
) -> Result<Json<Vec<LibraryEntry>>, ApiError> {
    let library = &state.stores.library;
    let records = state.stores.memories.list(&user_id)?;
    let entries = params.into_query().apply(
        records,
        &library.metadata_map(&user_id)?,
        &library.favorites(&user_id)?,
    );
    Ok(Json(entries))
}

pub(crate) async fn stats(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<LibraryStats>, ApiError> {
    let records = state.stores.memories.list(&user_id)?;
    let favorites = state.stores.library.favorites(&user_id)?;
    Ok(Json(library_stats(&records, &favorites)))
}

pub(crate) async fn tags(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.stores.library.all_tags(&user_id)?))
}
