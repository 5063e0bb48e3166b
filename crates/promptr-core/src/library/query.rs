//! Library view: folder selection, tag and text filters, sort orders, and stats.
//! Pure functions over records already loaded for one user.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::MemoryMetadata;
use crate::memories::{MemoryRecord, UNKNOWN_TOOL};
use crate::title::clamp_chars;

/// How many of the newest prompts the `recent` folder shows.
pub const RECENT_LIMIT: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FolderSelection {
    #[default]
    All,
    Favorites,
    Recent,
    /// A user folder, selected as `folder-<id>`.
    Folder(String),
    /// Prompts captured from one tool (case-insensitive).
    Tool(String),
}

impl FolderSelection {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.to_lowercase().as_str() {
            "" | "all" => Self::All,
            "favorites" => Self::Favorites,
            "recent" => Self::Recent,
            lowered => match raw.strip_prefix("folder-") {
                Some(id) => Self::Folder(id.to_string()),
                None => Self::Tool(lowered.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOption {
    #[default]
    Newest,
    Oldest,
    NameAsc,
    NameDesc,
    MostUsed,
    RecentlyUsed,
}

impl SortOption {
    /// Unknown values fall back to `newest`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "oldest" => Self::Oldest,
            "name-asc" => Self::NameAsc,
            "name-desc" => Self::NameDesc,
            "most-used" => Self::MostUsed,
            "recently-used" => Self::RecentlyUsed,
            _ => Self::Newest,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LibraryQuery {
    pub folder: FolderSelection,
    /// A prompt must carry every listed tag.
    pub tags: Vec<String>,
    pub search: Option<String>,
    pub sort: SortOption,
}

/// A prompt annotated with its library metadata and display title.
#[derive(Debug, Clone, Serialize)]
pub struct LibraryEntry {
    #[serde(flatten)]
    pub record: MemoryRecord,
    pub title: String,
    pub favorite: bool,
    pub tags: Vec<String>,
    pub folder: Option<String>,
    pub copy_count: u64,
    pub last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LibraryStats {
    pub total: usize,
    pub favorites: usize,
    pub by_tool: BTreeMap<String, usize>,
}

impl LibraryQuery {
    /// Filter and sort `records` (expected newest first, as `MemoryStore::list` returns them).
    pub fn apply(
        &self,
        records: Vec<MemoryRecord>,
        metadata: &HashMap<String, MemoryMetadata>,
        favorites: &HashSet<String>,
    ) -> Vec<LibraryEntry> {
        let empty = MemoryMetadata::default();
        let meta_of = |id: &str| metadata.get(id).unwrap_or(&empty);

        let selected: Vec<MemoryRecord> = match &self.folder {
            FolderSelection::All => records,
            FolderSelection::Favorites => records
                .into_iter()
                .filter(|r| favorites.contains(&r.id))
                .collect(),
            FolderSelection::Recent => records.into_iter().take(RECENT_LIMIT).collect(),
            FolderSelection::Folder(folder_id) => records
                .into_iter()
                .filter(|r| meta_of(&r.id).folder.as_deref() == Some(folder_id.as_str()))
                .collect(),
            FolderSelection::Tool(tool) => records
                .into_iter()
                .filter(|r| r.tool.as_deref().map(str::to_lowercase).as_deref() == Some(tool.as_str()))
                .collect(),
        };

        let query = self
            .search
            .as_deref()
            .filter(|q| !q.trim().is_empty())
            .map(str::to_lowercase);

        let mut entries: Vec<LibraryEntry> = selected
            .into_iter()
            .filter(|r| {
                let tags = &meta_of(&r.id).tags;
                self.tags.iter().all(|t| tags.contains(t))
            })
            .filter(|r| match &query {
                Some(q) => matches_search(r, meta_of(&r.id), q),
                None => true,
            })
            .map(|r| {
                let meta = meta_of(&r.id);
                LibraryEntry {
                    title: display_title(&r),
                    favorite: favorites.contains(&r.id),
                    tags: meta.tags.clone(),
                    folder: meta.folder.clone(),
                    copy_count: meta.copy_count,
                    last_used: meta.last_used,
                    record: r,
                }
            })
            .collect();

        sort_entries(&mut entries, self.sort);
        entries
    }
}

fn matches_search(record: &MemoryRecord, meta: &MemoryMetadata, query: &str) -> bool {
    let contains = |field: Option<&str>| field.is_some_and(|f| f.to_lowercase().contains(query));
    contains(Some(record.text.as_str()))
        || contains(record.name.as_deref())
        || contains(record.tool.as_deref())
        || contains(record.model.as_deref())
        || meta.tags.iter().any(|t| t.to_lowercase().contains(query))
}

fn sort_key(record: &MemoryRecord) -> String {
    record.name.as_deref().unwrap_or(&record.text).to_lowercase()
}

fn sort_entries(entries: &mut [LibraryEntry], sort: SortOption) {
    entries.sort_by(|a, b| b.record.created_at.cmp(&a.record.created_at));
    match sort {
        SortOption::Newest => {}
        SortOption::Oldest => entries.reverse(),
        SortOption::NameAsc => entries.sort_by_key(|e| sort_key(&e.record)),
        SortOption::NameDesc => entries.sort_by(|a, b| sort_key(&b.record).cmp(&sort_key(&a.record))),
        SortOption::MostUsed => entries.sort_by(|a, b| b.copy_count.cmp(&a.copy_count)),
        SortOption::RecentlyUsed => entries.sort_by(|a, b| match (a.last_used, b.last_used) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }),
    }
}

/// Counts over every prompt the user owns.
pub fn library_stats(records: &[MemoryRecord], favorites: &HashSet<String>) -> LibraryStats {
    let mut by_tool = BTreeMap::new();
    for record in records {
        let tool = record.tool.clone().unwrap_or_else(|| UNKNOWN_TOOL.to_string());
        *by_tool.entry(tool).or_insert(0) += 1;
    }
    LibraryStats {
        total: records.len(),
        favorites: records.iter().filter(|r| favorites.contains(&r.id)).count(),
        by_tool,
    }
}

/// The saved name when there is one, otherwise the opening words of the text
/// (between 5 and 7 words, about 30% of the text) clamped to 50 chars.
pub fn display_title(record: &MemoryRecord) -> String {
    if let Some(name) = record.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    let words: Vec<&str> = record.text.split_whitespace().collect();
    let count = (words.len() * 3 / 10).clamp(5, 7);
    let prefix = words.into_iter().take(count).collect::<Vec<_>>().join(" ");
    clamp_chars(&prefix, 50)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: &str, text: &str, tool: &str, minutes_ago: i64) -> MemoryRecord {
        MemoryRecord {
            id: id.to_string(),
            user_id: "u1".to_string(),
            text: text.to_string(),
            tool: Some(tool.to_string()),
            name: None,
            model: None,
            variables: None,
            variable_defaults: None,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    fn sample() -> Vec<MemoryRecord> {
        let mut named = record("c", "Gamma body text", "Claude", 30);
        named.name = Some("Alpha report".to_string());
        vec![
            record("a", "Beta prompt about rust lifetimes", "ChatGPT", 10),
            record("b", "Zeta prompt about sql joins", "claude", 20),
            named,
        ]
    }

    fn ids(entries: &[LibraryEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.record.id.as_str()).collect()
    }

    #[test]
    fn parses_folder_selection() {
        assert_eq!(FolderSelection::parse(""), FolderSelection::All);
        assert_eq!(FolderSelection::parse("Favorites"), FolderSelection::Favorites);
        assert_eq!(FolderSelection::parse("recent"), FolderSelection::Recent);
        assert_eq!(
            FolderSelection::parse("folder-AbC"),
            FolderSelection::Folder("AbC".to_string())
        );
        assert_eq!(
            FolderSelection::parse("ChatGPT"),
            FolderSelection::Tool("chatgpt".to_string())
        );
        assert_eq!(SortOption::parse("name-desc"), SortOption::NameDesc);
        assert_eq!(SortOption::parse("bogus"), SortOption::Newest);
    }

    #[test]
    fn tool_folder_is_case_insensitive() {
        let query = LibraryQuery {
            folder: FolderSelection::parse("Claude"),
            ..LibraryQuery::default()
        };
        let out = query.apply(sample(), &HashMap::new(), &HashSet::new());
        assert_eq!(ids(&out), vec!["b", "c"]);
    }

    #[test]
    fn favorites_tags_and_search_combine() {
        let mut metadata = HashMap::new();
        metadata.insert(
            "a".to_string(),
            MemoryMetadata {
                tags: vec!["code".into(), "rust".into()],
                ..MemoryMetadata::default()
            },
        );
        metadata.insert(
            "b".to_string(),
            MemoryMetadata {
                tags: vec!["code".into()],
                ..MemoryMetadata::default()
            },
        );
        let favorites: HashSet<String> = ["a".to_string(), "b".to_string()].into_iter().collect();

        let query = LibraryQuery {
            folder: FolderSelection::Favorites,
            tags: vec!["code".into()],
            search: Some("SQL".into()),
            sort: SortOption::Newest,
        };
        let out = query.apply(sample(), &metadata, &favorites);
        assert_eq!(ids(&out), vec!["b"]);
        assert!(out[0].favorite);
        assert_eq!(out[0].tags, vec!["code"]);

        let by_tag = LibraryQuery {
            search: Some("rus".into()),
            ..LibraryQuery::default()
        };
        assert_eq!(ids(&by_tag.apply(sample(), &metadata, &favorites)), vec!["a"]);
    }

    #[test]
    fn sorts_by_name_usage_and_age() {
        let mut metadata = HashMap::new();
        let now = Utc::now();
        metadata.insert(
            "b".to_string(),
            MemoryMetadata {
                copy_count: 5,
                last_used: Some(now - Duration::minutes(5)),
                ..MemoryMetadata::default()
            },
        );
        metadata.insert(
            "c".to_string(),
            MemoryMetadata {
                copy_count: 2,
                last_used: Some(now),
                ..MemoryMetadata::default()
            },
        );
        let run = |sort| {
            let query = LibraryQuery {
                sort,
                ..LibraryQuery::default()
            };
            ids(&query.apply(sample(), &metadata, &HashSet::new()))
                .into_iter()
                .map(str::to_string)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(SortOption::Newest), vec!["a", "b", "c"]);
        assert_eq!(run(SortOption::Oldest), vec!["c", "b", "a"]);
        assert_eq!(run(SortOption::NameAsc), vec!["c", "a", "b"]);
        assert_eq!(run(SortOption::NameDesc), vec!["b", "a", "c"]);
        assert_eq!(run(SortOption::MostUsed), vec!["b", "c", "a"]);
        assert_eq!(run(SortOption::RecentlyUsed), vec!["c", "b", "a"]);
    }

    #[test]
    fn recent_keeps_ten_newest() {
        let records: Vec<MemoryRecord> = (0..15)
            .map(|i| record(&format!("m{}", i), "body", "ChatGPT", i))
            .collect();
        let query = LibraryQuery {
            folder: FolderSelection::Recent,
            ..LibraryQuery::default()
        };
        let out = query.apply(records, &HashMap::new(), &HashSet::new());
        assert_eq!(out.len(), RECENT_LIMIT);
        assert_eq!(out[0].record.id, "m0");
    }

    #[test]
    fn stats_count_tools_and_live_favorites() {
        let favorites: HashSet<String> = ["a".to_string(), "gone".to_string()].into_iter().collect();
        let mut records = sample();
        records[0].tool = None;
        let stats = library_stats(&records, &favorites);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.favorites, 1);
        assert_eq!(stats.by_tool.get(UNKNOWN_TOOL), Some(&1));
        assert_eq!(stats.by_tool.get("claude"), Some(&1));
        assert_eq!(stats.by_tool.get("Claude"), Some(&1));
    }

    #[test]
    fn display_title_prefers_name_then_words() {
        let mut r = record("x", "one two three four five six seven eight", "t", 0);
        assert_eq!(display_title(&r), "one two three four five");

        let long: Vec<String> = (0..30).map(|i| format!("w{}", i)).collect();
        r.text = long.join(" ");
        assert_eq!(display_title(&r), "w0 w1 w2 w3 w4 w5 w6");

        r.text = "a".repeat(80);
        assert_eq!(display_title(&r).chars().count(), 50);

        r.name = Some("  Named  ".to_string());
        assert_eq!(display_title(&r), "Named");
    }
}
