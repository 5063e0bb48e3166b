//! Promptr core library.
//! Title heuristic, prompt templates, and the sled-backed prompt library.

pub mod config;
pub mod error;
pub mod library;
pub mod memories;
pub mod template;
pub mod title;
pub mod waitlist;

use std::path::Path;

pub use config::PromptrConfig;
pub use error::{PromptrError, Result};
pub use library::query::{
    display_title, library_stats, FolderSelection, LibraryEntry, LibraryQuery, LibraryStats,
    SortOption,
};
pub use library::{Folder, LibraryStore, MemoryMetadata, PromptVersion};
pub use memories::{MemoryPatch, MemoryRecord, MemoryStore, NewMemory};
pub use template::{extract_variables, fill_variables, missing_variables};
pub use title::{generate_title, normalize_title, PLACEHOLDER_TITLE};
pub use waitlist::{WaitlistEntry, WaitlistOutcome, WaitlistStore};

/// Every store, opened over one sled database.
#[derive(Clone)]
pub struct PromptrStores {
    pub memories: MemoryStore,
    pub library: LibraryStore,
    pub waitlist: WaitlistStore,
}

impl PromptrStores {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)?;
        Self::from_db(&db)
    }

    pub fn from_db(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            memories: MemoryStore::open(db)?,
            library: LibraryStore::open(db)?,
            waitlist: WaitlistStore::open(db)?,
        })
    }

    /// Delete a prompt together with its favorite flag, tags, and history.
    pub fn delete_memory(&self, user_id: &str, id: &str) -> Result<bool> {
        let removed = self.memories.delete(user_id, id)?;
        if removed {
            self.library.forget(user_id, id)?;
        }
        Ok(removed)
    }

    pub fn delete_memories(&self, user_id: &str, ids: &[String]) -> Result<usize> {
        let removed = self.memories.delete_many(user_id, ids)?;
        for id in ids {
            self.library.forget(user_id, id)?;
        }
        Ok(removed)
    }
}

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
