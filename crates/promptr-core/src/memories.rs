//! Saved prompts ("memories"): one sled tree keyed by user and id with JSON values.
//! Every read and write is scoped to the calling user; a hot DashMap cache sits in
//! front of point reads.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PromptrError, Result};
use crate::template::extract_variables;

const MEMORIES_TREE: &str = "memories";

/// Tool recorded when the capture did not name one.
pub const UNKNOWN_TOOL: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub tool: Option<String>,
    pub name: Option<String>,
    pub model: Option<String>,
    pub variables: Option<Vec<String>>,
    pub variable_defaults: Option<Map<String, Value>>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload. Blank optional strings are stored as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewMemory {
    pub text: String,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub variables: Option<Vec<String>>,
    #[serde(default, alias = "variableDefaults")]
    pub variable_defaults: Option<Value>,
}

impl NewMemory {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Edit payload. `None` leaves a field alone; for `name` and `tool` a blank string clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryPatch {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tool: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `{len}:{user_id}/`. The byte length pins where the user id ends, so one user's
/// range never contains another's even when user ids themselves contain `/`.
pub(crate) fn user_prefix(user_id: &str) -> String {
    format!("{}:{}/", user_id.len(), user_id)
}

pub(crate) fn scoped_key(user_id: &str, id: &str) -> String {
    format!("{}{}", user_prefix(user_id), id)
}

/// Record and folder ids are single key segments.
pub(crate) fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && !id.contains('/')
}

/// Point reads kept in memory at most.
pub const DEFAULT_CACHE_LIMIT: usize = 1024;

#[derive(Clone)]
pub struct MemoryStore {
    tree: sled::Tree,
    cache: Arc<DashMap<String, MemoryRecord>>,
    cache_limit: usize,
}

impl MemoryStore {
    pub fn open(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            tree: db.open_tree(MEMORIES_TREE)?,
            cache: Arc::new(DashMap::new()),
            cache_limit: DEFAULT_CACHE_LIMIT,
        })
    }

    pub fn with_cache_limit(mut self, limit: usize) -> Self {
        self.cache_limit = limit;
        self
    }

    /// Save a new prompt for `user_id`. Text is required; variables are taken from the
    /// payload when given, otherwise read from `{{name}}` placeholders in the text.
    pub fn insert(&self, user_id: &str, new: NewMemory) -> Result<MemoryRecord> {
        let text = new.text.trim().to_string();
        if text.is_empty() {
            return Err(PromptrError::invalid("Text is required"));
        }

        let variables = match new.variables {
            Some(vars) => Some(vars),
            None => {
                let found = extract_variables(&text);
                (!found.is_empty()).then_some(found)
            }
        };
        let variable_defaults = match new.variable_defaults {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        };

        let record = MemoryRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            tool: Some(non_blank(new.tool.as_deref()).unwrap_or_else(|| UNKNOWN_TOOL.to_string())),
            name: non_blank(new.name.as_deref()),
            model: non_blank(new.model.as_deref()),
            variables,
            variable_defaults,
            created_at: Utc::now(),
            text,
        };
        self.put(&record)?;
        tracing::info!(user_id, memory_id = %record.id, "memory saved");
        Ok(record)
    }

    pub fn get(&self, user_id: &str, id: &str) -> Result<Option<MemoryRecord>> {
        if !is_valid_id(id) {
            return Ok(None);
        }
        let key = scoped_key(user_id, id);
        let cached = self.cache.get(&key).map(|hit| hit.clone());
        let record = match cached {
            Some(record) => record,
            None => {
                let Some(bytes) = self.tree.get(key.as_bytes())? else {
                    return Ok(None);
                };
                let record: MemoryRecord = serde_json::from_slice(&bytes)?;
                self.cache_put(key, record.clone());
                record
            }
        };
        if record.user_id != user_id || record.id != id {
            tracing::warn!(user_id, memory_id = id, "stored record owner mismatch");
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// All prompts owned by `user_id`, newest first.
    pub fn list(&self, user_id: &str) -> Result<Vec<MemoryRecord>> {
        let mut records = Vec::new();
        for entry in self.tree.scan_prefix(user_prefix(user_id).as_bytes()) {
            let (_, bytes) = entry?;
            let record: MemoryRecord = serde_json::from_slice(&bytes)?;
            if record.user_id == user_id {
                records.push(record);
            }
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Apply `patch` and return `(previous, updated)`.
    pub fn update(
        &self,
        user_id: &str,
        id: &str,
        patch: &MemoryPatch,
    ) -> Result<(MemoryRecord, MemoryRecord)> {
        let previous = self
            .get(user_id, id)?
            .ok_or_else(|| PromptrError::not_found("memory"))?;
        let mut updated = previous.clone();

        if let Some(text) = &patch.text {
            let text = text.trim();
            if text.is_empty() {
                return Err(PromptrError::invalid("Text is required"));
            }
            updated.text = text.to_string();
        }
        if let Some(name) = &patch.name {
            updated.name = non_blank(Some(name.as_str()));
        }
        if let Some(tool) = &patch.tool {
            updated.tool = non_blank(Some(tool.as_str()));
        }

        self.put(&updated)?;
        tracing::debug!(user_id, memory_id = id, "memory updated");
        Ok((previous, updated))
    }

    pub fn delete(&self, user_id: &str, id: &str) -> Result<bool> {
        if self.get(user_id, id)?.is_none() {
            return Ok(false);
        }
        let key = scoped_key(user_id, id);
        self.cache.remove(&key);
        let removed = self.tree.remove(key.as_bytes())?.is_some();
        if removed {
            tracing::info!(user_id, memory_id = id, "memory deleted");
        }
        Ok(removed)
    }

    pub fn delete_many(&self, user_id: &str, ids: &[String]) -> Result<usize> {
        let mut removed = 0;
        for id in ids {
            if self.delete(user_id, id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Copy a prompt; the copy's name gets a ` (copy)` suffix when the original had one.
    pub fn duplicate(&self, user_id: &str, id: &str) -> Result<MemoryRecord> {
        let source = self
            .get(user_id, id)?
            .ok_or_else(|| PromptrError::not_found("memory"))?;
        self.insert(
            user_id,
            NewMemory {
                text: source.text,
                tool: source.tool,
                name: source.name.map(|n| format!("{} (copy)", n)),
                model: source.model,
                variables: source.variables,
                variable_defaults: source.variable_defaults.map(Value::Object),
            },
        )
    }

    /// Insert each item with non-blank text; returns how many were saved.
    pub fn import(&self, user_id: &str, items: Vec<NewMemory>) -> Result<usize> {
        let mut saved = 0;
        for item in items {
            if item.text.trim().is_empty() {
                continue;
            }
            self.insert(user_id, item)?;
            saved += 1;
        }
        tracing::info!(user_id, saved, "memories imported");
        Ok(saved)
    }

    fn put(&self, record: &MemoryRecord) -> Result<()> {
        let key = scoped_key(&record.user_id, &record.id);
        let bytes = serde_json::to_vec(record)?;
        self.tree.insert(key.as_bytes(), bytes)?;
        self.cache_put(key, record.clone());
        Ok(())
    }

    /// Insert into the hot cache, evicting an arbitrary entry once the limit is reached.
    fn cache_put(&self, key: String, record: MemoryRecord) {
        if self.cache_limit == 0 {
            return;
        }
        if !self.cache.contains_key(&key) && self.cache.len() >= self.cache_limit {
            let victim = self.cache.iter().next().map(|entry| entry.key().clone());
            if let Some(victim) = victim {
                self.cache.remove(&victim);
            }
        }
        self.cache.insert(key, record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, MemoryStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let db = sled::open(dir.path().join("db")).expect("open sled");
        (dir, MemoryStore::open(&db).expect("open store"))
    }

    #[test]
    fn insert_normalizes_optional_fields() {
        let (_dir, store) = store();
        let record = store
            .insert(
                "u1",
                NewMemory {
                    text: "  Summarize {{doc}} for {{audience}}  ".into(),
                    tool: Some("   ".into()),
                    name: Some("  ".into()),
                    model: Some(" gpt-4o ".into()),
                    variables: None,
                    variable_defaults: Some(Value::String("not an object".into())),
                },
            )
            .unwrap();
        assert_eq!(record.text, "Summarize {{doc}} for {{audience}}");
        assert_eq!(record.tool.as_deref(), Some(UNKNOWN_TOOL));
        assert_eq!(record.name, None);
        assert_eq!(record.model.as_deref(), Some("gpt-4o"));
        assert_eq!(
            record.variables,
            Some(vec!["doc".to_string(), "audience".to_string()])
        );
        assert_eq!(record.variable_defaults, None);
    }

    #[test]
    fn blank_text_is_rejected() {
        let (_dir, store) = store();
        let err = store.insert("u1", NewMemory::text("   ")).unwrap_err();
        assert!(matches!(err, PromptrError::InvalidInput(_)));
    }

    #[test]
    fn records_are_scoped_to_their_owner() {
        let (_dir, store) = store();
        let mine = store.insert("alice", NewMemory::text("alpha prompt")).unwrap();
        store.insert("alice/x", NewMemory::text("lookalike owner")).unwrap();
        store.insert("bob", NewMemory::text("beta prompt")).unwrap();

        let listed = store.list("alice").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine.id);

        assert!(store.get("bob", &mine.id).unwrap().is_none());
        assert!(!store.delete("bob", &mine.id).unwrap());
        assert!(store.get("alice", &mine.id).unwrap().is_some());
    }

    #[test]
    fn slash_in_id_cannot_reach_a_lookalike_user() {
        let (_dir, store) = store();
        let secret = store
            .insert("team/ops", NewMemory::text("secret runbook"))
            .unwrap();
        let crafted = format!("ops/{}", secret.id);

        assert!(store.get("team", &crafted).unwrap().is_none());
        assert!(store.update("team", &crafted, &MemoryPatch::default()).is_err());
        assert!(store.duplicate("team", &crafted).is_err());
        assert!(!store.delete("team", &crafted).unwrap());
        assert!(store.list("team").unwrap().is_empty());

        let owned = store.list("team/ops").unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].text, "secret runbook");
    }

    #[test]
    fn hot_cache_stays_within_limit() {
        let (_dir, store) = store();
        let store = store.with_cache_limit(2);
        let ids: Vec<String> = (0..5)
            .map(|i| store.insert("u1", NewMemory::text(format!("prompt {}", i))).unwrap().id)
            .collect();
        for id in &ids {
            assert!(store.get("u1", id).unwrap().is_some());
        }
        assert!(store.cache.len() <= 2);
    }

    #[test]
    fn list_is_newest_first() {
        let (_dir, store) = store();
        let first = store.insert("u1", NewMemory::text("first prompt")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = store.insert("u1", NewMemory::text("second prompt")).unwrap();
        let ids: Vec<String> = store.list("u1").unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn update_returns_previous_and_clears_blank_name() {
        let (_dir, store) = store();
        let mut new = NewMemory::text("original body");
        new.name = Some("Original".into());
        let record = store.insert("u1", new).unwrap();

        let patch = MemoryPatch {
            text: Some(" edited body ".into()),
            name: Some("".into()),
            tool: None,
        };
        let (previous, updated) = store.update("u1", &record.id, &patch).unwrap();
        assert_eq!(previous.text, "original body");
        assert_eq!(previous.name.as_deref(), Some("Original"));
        assert_eq!(updated.text, "edited body");
        assert_eq!(updated.name, None);
        assert_eq!(updated.tool.as_deref(), Some(UNKNOWN_TOOL));

        let reread = store.get("u1", &record.id).unwrap().unwrap();
        assert_eq!(reread, updated);
    }

    #[test]
    fn duplicate_suffixes_name() {
        let (_dir, store) = store();
        let mut new = NewMemory::text("some body");
        new.name = Some("Weekly Digest".into());
        let record = store.insert("u1", new).unwrap();
        let copy = store.duplicate("u1", &record.id).unwrap();
        assert_ne!(copy.id, record.id);
        assert_eq!(copy.name.as_deref(), Some("Weekly Digest (copy)"));
        assert_eq!(copy.text, record.text);
    }

    #[test]
    fn import_skips_blank_items_and_bulk_delete_counts() {
        let (_dir, store) = store();
        let saved = store
            .import(
                "u1",
                vec![
                    NewMemory::text("one"),
                    NewMemory::text("  "),
                    NewMemory::text("two"),
                ],
            )
            .unwrap();
        assert_eq!(saved, 2);

        let ids: Vec<String> = store.list("u1").unwrap().into_iter().map(|r| r.id).collect();
        let mut targets = ids.clone();
        targets.push("missing".into());
        assert_eq!(store.delete_many("u1", &targets).unwrap(), 2);
        assert!(store.list("u1").unwrap().is_empty());
    }
}
