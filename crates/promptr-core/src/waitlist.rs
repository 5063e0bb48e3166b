//! Pre-launch waitlist: one entry per normalized email address.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{PromptrError, Result};

const WAITLIST_TREE: &str = "waitlist";

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\S+@\S+\.\S+").expect("email pattern"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitlistOutcome {
    Joined,
    AlreadyJoined,
}

/// Trim and lowercase, then look for an `x@y.z` run anywhere in the address.
pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(PromptrError::invalid("Email is required"));
    }
    if !EMAIL.is_match(&email) {
        return Err(PromptrError::invalid("Invalid email"));
    }
    Ok(email)
}

#[derive(Clone)]
pub struct WaitlistStore {
    tree: sled::Tree,
}

impl WaitlistStore {
    pub fn open(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            tree: db.open_tree(WAITLIST_TREE)?,
        })
    }

    pub fn join(&self, raw_email: &str) -> Result<WaitlistOutcome> {
        let email = normalize_email(raw_email)?;
        let entry = WaitlistEntry {
            email: email.clone(),
            created_at: Utc::now(),
        };
        let bytes = serde_json::to_vec(&entry)?;
        match self
            .tree
            .compare_and_swap(email.as_bytes(), None::<&[u8]>, Some(bytes))?
        {
            Ok(()) => {
                tracing::info!(target: "promptr::waitlist", "waitlist signup recorded");
                Ok(WaitlistOutcome::Joined)
            }
            Err(_) => Ok(WaitlistOutcome::AlreadyJoined),
        }
    }

    pub fn get(&self, raw_email: &str) -> Result<Option<WaitlistEntry>> {
        let email = normalize_email(raw_email)?;
        match self.tree.get(email.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn count(&self) -> usize {
        self.tree.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, WaitlistStore) {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let store = WaitlistStore::open(&db).unwrap();
        (dir, store)
    }

    #[test]
    fn normalizes_and_validates() {
        assert_eq!(normalize_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
        assert_eq!(
            normalize_email("   ").unwrap_err().to_string(),
            "Email is required"
        );
        assert_eq!(
            normalize_email("not-an-email").unwrap_err().to_string(),
            "Invalid email"
        );
        assert!(normalize_email("a@b").is_err());
        assert_eq!(
            normalize_email("Ada Lovelace@Example.com").unwrap(),
            "ada lovelace@example.com"
        );
    }

    #[test]
    fn second_join_is_reported_as_duplicate() {
        let (_dir, store) = store();
        assert_eq!(store.join("ada@example.com").unwrap(), WaitlistOutcome::Joined);
        assert_eq!(
            store.join(" ADA@example.com").unwrap(),
            WaitlistOutcome::AlreadyJoined
        );
        assert_eq!(store.count(), 1);
        let entry = store.get("ada@example.com").unwrap().unwrap();
        assert_eq!(entry.email, "ada@example.com");
    }
}
