//! Library metadata layered over saved prompts: tags, folders, favorites, copy counts,
//! and version history. Each user's entries share one per-user key prefix in three sled trees.

pub mod query;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PromptrError, Result};
use crate::memories::{
    is_valid_id, scoped_key, user_prefix, MemoryPatch, MemoryRecord, MemoryStore,
};

const METADATA_TREE: &str = "library_metadata";
const FAVORITES_TREE: &str = "library_favorites";
const FOLDERS_TREE: &str = "library_folders";

/// Edits keep at most this many earlier versions, newest first.
pub const MAX_VERSIONS: usize = 10;
pub const DEFAULT_FOLDER_COLOR: &str = "#6366f1";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetadata {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub copy_count: u64,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default)]
    pub versions: Vec<PromptVersion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptVersion {
    pub text: String,
    pub name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct LibraryStore {
    metadata: sled::Tree,
    favorites: sled::Tree,
    folders: sled::Tree,
    /// Held across a record update and its history push so versions follow update order.
    edit_lock: Arc<Mutex<()>>,
}

impl LibraryStore {
    pub fn open(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            metadata: db.open_tree(METADATA_TREE)?,
            favorites: db.open_tree(FAVORITES_TREE)?,
            folders: db.open_tree(FOLDERS_TREE)?,
            edit_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Metadata for one prompt; untouched prompts get the empty default.
    pub fn metadata(&self, user_id: &str, memory_id: &str) -> Result<MemoryMetadata> {
        match self.metadata.get(scoped_key(user_id, memory_id).as_bytes())? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(MemoryMetadata::default()),
        }
    }

    /// Every stored metadata entry for `user_id`, keyed by prompt id.
    pub fn metadata_map(&self, user_id: &str) -> Result<HashMap<String, MemoryMetadata>> {
        let prefix = user_prefix(user_id);
        let mut out = HashMap::new();
        for entry in self.metadata.scan_prefix(prefix.as_bytes()) {
            let (key, bytes) = entry?;
            let Some(memory_id) = key_suffix(&key, &prefix) else {
                continue;
            };
            out.insert(memory_id, serde_json::from_slice(&bytes)?);
        }
        Ok(out)
    }

    pub fn favorites(&self, user_id: &str) -> Result<HashSet<String>> {
        let prefix = user_prefix(user_id);
        let mut out = HashSet::new();
        for entry in self.favorites.scan_prefix(prefix.as_bytes()) {
            let (key, _) = entry?;
            if let Some(memory_id) = key_suffix(&key, &prefix) {
                out.insert(memory_id);
            }
        }
        Ok(out)
    }

    pub fn is_favorite(&self, user_id: &str, memory_id: &str) -> Result<bool> {
        Ok(self
            .favorites
            .contains_key(scoped_key(user_id, memory_id).as_bytes())?)
    }

    /// Flip the favorite flag; returns the new state.
    pub fn toggle_favorite(&self, user_id: &str, memory_id: &str) -> Result<bool> {
        if !is_valid_id(memory_id) {
            return Err(PromptrError::not_found("memory"));
        }
        let key = scoped_key(user_id, memory_id);
        if self.favorites.remove(key.as_bytes())?.is_some() {
            return Ok(false);
        }
        self.favorites.insert(key.as_bytes(), &[] as &[u8])?;
        Ok(true)
    }

    /// Tags are trimmed and lowercased; adding an existing tag is a no-op.
    pub fn add_tag(&self, user_id: &str, memory_id: &str, tag: &str) -> Result<MemoryMetadata> {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            return Err(PromptrError::invalid("Tag is required"));
        }
        self.modify(user_id, memory_id, |meta| {
            if !meta.tags.contains(&tag) {
                meta.tags.push(tag.clone());
            }
        })
    }

    pub fn remove_tag(&self, user_id: &str, memory_id: &str, tag: &str) -> Result<MemoryMetadata> {
        let tag = tag.trim().to_lowercase();
        self.modify(user_id, memory_id, |meta| meta.tags.retain(|t| *t != tag))
    }

    /// Sorted, de-duplicated tags across all of the user's prompts.
    pub fn all_tags(&self, user_id: &str) -> Result<Vec<String>> {
        let tags: BTreeSet<String> = self
            .metadata_map(user_id)?
            .into_values()
            .flat_map(|meta| meta.tags)
            .collect();
        Ok(tags.into_iter().collect())
    }

    pub fn create_folder(&self, user_id: &str, name: &str, color: Option<&str>) -> Result<Folder> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PromptrError::invalid("Folder name is required"));
        }
        let folder = Folder {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            color: color
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(DEFAULT_FOLDER_COLOR)
                .to_string(),
            created_at: Utc::now(),
        };
        self.folders.insert(
            scoped_key(user_id, &folder.id).as_bytes(),
            serde_json::to_vec(&folder)?,
        )?;
        tracing::info!(user_id, folder_id = %folder.id, "folder created");
        Ok(folder)
    }

    /// Folders in creation order.
    pub fn list_folders(&self, user_id: &str) -> Result<Vec<Folder>> {
        let mut folders = Vec::new();
        let prefix = user_prefix(user_id);
        for entry in self.folders.scan_prefix(prefix.as_bytes()) {
            let (key, bytes) = entry?;
            if key_suffix(&key, &prefix).is_none() {
                continue;
            }
            folders.push(serde_json::from_slice::<Folder>(&bytes)?);
        }
        folders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(folders)
    }

    /// Remove a folder and unassign every prompt that was in it.
    pub fn delete_folder(&self, user_id: &str, folder_id: &str) -> Result<bool> {
        if !is_valid_id(folder_id) {
            return Ok(false);
        }
        if self
            .folders
            .remove(scoped_key(user_id, folder_id).as_bytes())?
            .is_none()
        {
            return Ok(false);
        }
        for (memory_id, meta) in self.metadata_map(user_id)? {
            if meta.folder.as_deref() == Some(folder_id) {
                self.modify(user_id, &memory_id, |m| m.folder = None)?;
            }
        }
        tracing::info!(user_id, folder_id, "folder deleted");
        Ok(true)
    }

    pub fn assign_folder(
        &self,
        user_id: &str,
        memory_id: &str,
        folder_id: Option<&str>,
    ) -> Result<MemoryMetadata> {
        if let Some(folder_id) = folder_id {
            let known = is_valid_id(folder_id)
                && self
                    .folders
                    .contains_key(scoped_key(user_id, folder_id).as_bytes())?;
            if !known {
                return Err(PromptrError::not_found("folder"));
            }
        }
        self.modify(user_id, memory_id, |meta| {
            meta.folder = folder_id.map(str::to_string)
        })
    }

    pub fn record_copy(&self, user_id: &str, memory_id: &str) -> Result<MemoryMetadata> {
        let now = Utc::now();
        self.modify(user_id, memory_id, |meta| {
            meta.copy_count += 1;
            meta.last_used = Some(now);
        })
    }

    /// Apply `patch` to the prompt and keep its prior text and name in the version history.
    /// Edits through this store are serialized, so history order matches update order.
    pub fn edit(
        &self,
        memories: &MemoryStore,
        user_id: &str,
        memory_id: &str,
        patch: &MemoryPatch,
    ) -> Result<MemoryRecord> {
        let _guard = self.lock_edits();
        self.edit_locked(memories, user_id, memory_id, patch)
    }

    /// Restore version `index` (0 = most recent). The current text becomes a new version.
    pub fn revert(
        &self,
        memories: &MemoryStore,
        user_id: &str,
        memory_id: &str,
        index: usize,
    ) -> Result<MemoryRecord> {
        let _guard = self.lock_edits();
        let version = self
            .metadata(user_id, memory_id)?
            .versions
            .into_iter()
            .nth(index)
            .ok_or_else(|| PromptrError::not_found("version"))?;
        let patch = MemoryPatch {
            text: Some(version.text),
            name: Some(version.name.unwrap_or_default()),
            tool: None,
        };
        self.edit_locked(memories, user_id, memory_id, &patch)
    }

    /// Drop everything the library knows about a deleted prompt.
    pub fn forget(&self, user_id: &str, memory_id: &str) -> Result<()> {
        let key = scoped_key(user_id, memory_id);
        self.metadata.remove(key.as_bytes())?;
        self.favorites.remove(key.as_bytes())?;
        Ok(())
    }

    fn lock_edits(&self) -> std::sync::MutexGuard<'_, ()> {
        self.edit_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn edit_locked(
        &self,
        memories: &MemoryStore,
        user_id: &str,
        memory_id: &str,
        patch: &MemoryPatch,
    ) -> Result<MemoryRecord> {
        let (previous, updated) = memories.update(user_id, memory_id, patch)?;
        self.push_version(user_id, &previous)?;
        Ok(updated)
    }

    fn push_version(&self, user_id: &str, previous: &MemoryRecord) -> Result<MemoryMetadata> {
        let version = PromptVersion {
            text: previous.text.clone(),
            name: previous.name.clone(),
            timestamp: Utc::now(),
        };
        self.modify(user_id, &previous.id, |meta| {
            meta.versions.insert(0, version.clone());
            meta.versions.truncate(MAX_VERSIONS);
        })
    }

    /// Optimistic read-modify-write; retried when another writer got there first.
    fn modify(
        &self,
        user_id: &str,
        memory_id: &str,
        mut apply: impl FnMut(&mut MemoryMetadata),
    ) -> Result<MemoryMetadata> {
        if !is_valid_id(memory_id) {
            return Err(PromptrError::not_found("memory"));
        }
        let key = scoped_key(user_id, memory_id);
        loop {
            let current = self.metadata.get(key.as_bytes())?;
            let mut meta = match &current {
                Some(bytes) => serde_json::from_slice(bytes)?,
                None => MemoryMetadata::default(),
            };
            apply(&mut meta);
            let encoded = serde_json::to_vec(&meta)?;
            if self
                .metadata
                .compare_and_swap(key.as_bytes(), current, Some(encoded))?
                .is_ok()
            {
                return Ok(meta);
            }
        }
    }
}

fn key_suffix(key: &[u8], prefix: &str) -> Option<String> {
    let key = std::str::from_utf8(key).ok()?;
    key.strip_prefix(prefix)
        .filter(|rest| !rest.contains('/'))
        .map(str::to_string)
}
