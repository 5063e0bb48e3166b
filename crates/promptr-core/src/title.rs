//! Title heuristic: derive a short display name from free-form prompt text.
//!
//! Strategies run in a fixed order (question, code identifier, action verb, topic
//! phrase, filtered words, raw prefix) and the first usable candidate wins. The
//! winner is normalized to title case and clamped to 60 characters. Every function
//! here is pure; the word lists and patterns are compiled once and never written.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Returned whenever no strategy yields printable ASCII text.
pub const PLACEHOLDER_TITLE: &str = "Untitled Prompt";

const MAX_TITLE_CHARS: usize = 60;
const MAX_RAW_PREFIX_CHARS: usize = 50;
const ELLIPSIS: &str = "...";

const QUESTION_WORD_LIMIT: usize = 8;
const FALLBACK_WORD_LIMIT: usize = 5;

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "from", "as", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
        "do", "does", "did", "will", "would", "should", "could", "may", "might", "must", "can",
        "this", "that", "these", "those", "it", "its", "they", "them", "their", "there", "here",
        "where", "when", "what", "which", "who", "whom", "whose", "why", "how",
    ]
    .into_iter()
    .collect()
});

/// Tried in this order; the first verb with a usable object wins, not the best one.
const ACTION_VERBS: &[&str] = &[
    "write", "create", "generate", "make", "build", "design", "develop", "code", "implement",
    "analyze", "explain", "summarize", "review", "fix", "debug", "optimize", "improve",
    "refactor", "help", "show", "tell", "give", "provide", "find", "search", "get", "fetch",
    "load", "save",
];

const COMMON_PREFIXES: &[&str] = &[
    "write", "create", "make", "do", "get", "show", "tell", "give", "help",
];

const SKIP_FIRST: &[&str] = &[
    "please", "can", "could", "would", "will", "should", "i", "we", "you",
];

const CODE_KEYWORDS: &[&str] = &[
    "function", "class", "def", "const", "let", "var", "async", "export", "import",
];

static LEADING_OPENER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:please|can you|could you|i need|help me|write|create|generate|make|do|show|explain|tell|give|provide)\s+",
    )
    .expect("opener pattern")
});

static TRAILING_COURTESY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s+(?:please|thanks|thank you)[.!?]*$").expect("courtesy pattern")
});

static SENTENCE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s+").expect("sentence pattern"));

static QUESTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\n)([^.!?]*\?)").expect("question pattern"));

static CODE_DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:function|class|def|const|let|var|async|export|import)\s+([A-Za-z0-9_]+)")
        .expect("code declaration pattern")
});

static ACTION_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    ACTION_VERBS
        .iter()
        .map(|verb| {
            let pattern = format!(
                r"(?i){verb}\s+(?:a|an|the)?\s*([^.!?\s]+(?:\s+[^.!?\s]+){{0,4}})"
            );
            (*verb, Regex::new(&pattern).expect("action verb pattern"))
        })
        .collect()
});

static TOPIC_PATTERNS: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(
            r"(?i)(?:about|on|for|regarding|concerning|related to)\s+([^.!?]+?)(?:\s|$|,|\.)",
        )
        .expect("topic pattern"),
        Regex::new(
            r"(?i)(?:topic|subject|theme|focus|discuss|talk)\s+(?:is|about|on)?\s*:?\s*([^.!?]+?)(?:\s|$|,|\.)",
        )
        .expect("subject pattern"),
    ]
});

/// Produce a title for `text`. Total over all inputs and never empty.
pub fn generate_title(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return PLACEHOLDER_TITLE.to_string();
    }

    let (cleaned, opener_stripped) = strip_request_phrases(trimmed);
    let words = meaningful_words(lead_sentence(&cleaned));

    let mut candidate = question_candidate(trimmed)
        .or_else(|| code_candidate(trimmed))
        .or_else(|| action_candidate(&cleaned))
        .or_else(|| opener_stripped.then(|| action_candidate(trimmed)).flatten())
        .or_else(|| topic_candidate(&cleaned))
        .or_else(|| word_candidate(&words))
        .unwrap_or_default();

    if char_len(&candidate) < 3 {
        candidate = raw_prefix(trimmed);
    }

    normalize_title(&candidate)
}

/// Collapse whitespace, trim ASCII punctuation from the ends, title-case each word
/// (all-caps words longer than one char are kept as acronyms) and clamp to 60 chars.
pub fn normalize_title(candidate: &str) -> String {
    let collapsed = candidate.split_whitespace().collect::<Vec<_>>().join(" ");
    let stripped = collapsed.trim_matches(|c: char| !c.is_ascii_alphanumeric());

    let titled = stripped
        .split(' ')
        .map(title_case_word)
        .collect::<Vec<_>>()
        .join(" ");
    let titled = clamp_chars(&titled, MAX_TITLE_CHARS);

    if titled.is_empty() {
        PLACEHOLDER_TITLE.to_string()
    } else {
        titled
    }
}

/// Drop one leading request opener and one trailing courtesy phrase.
/// The flag reports whether an opener was removed.
fn strip_request_phrases(trimmed: &str) -> (String, bool) {
    let without_opener = LEADING_OPENER.replace(trimmed, "");
    let opener_stripped = without_opener.len() != trimmed.len();
    let without_courtesy = TRAILING_COURTESY.replace(&without_opener, "");
    (without_courtesy.trim().to_string(), opener_stripped)
}

fn lead_sentence(cleaned: &str) -> &str {
    SENTENCE_BREAK
        .split(cleaned)
        .find(|s| char_len(s) > 10)
        .unwrap_or(cleaned)
}

/// Lowercased ASCII letters and digits of `word`; the key used for stop-word checks.
fn alnum_key(word: &str) -> String {
    word.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

fn is_meaningful(word: &str) -> bool {
    let key = alnum_key(word);
    key.len() > 2 && !STOP_WORDS.contains(key.as_str())
}

fn meaningful_words(text: &str) -> Vec<&str> {
    text.split_whitespace().filter(|w| is_meaningful(w)).collect()
}

fn question_candidate(trimmed: &str) -> Option<String> {
    if !trimmed.contains('?') {
        return None;
    }
    let question = QUESTION.captures(trimmed)?.get(1)?.as_str().trim();
    let words = meaningful_words(question);
    if words.is_empty() {
        return None;
    }
    Some(join_words(words.into_iter().take(QUESTION_WORD_LIMIT)))
}

/// A keyword directly followed by another keyword (`export function`) is not a
/// declaration; the scan resumes at the second keyword.
fn code_candidate(trimmed: &str) -> Option<String> {
    let mut offset = 0;
    while let Some(caps) = CODE_DECLARATION.captures(&trimmed[offset..]) {
        let ident = caps.get(1)?;
        if CODE_KEYWORDS.contains(&ident.as_str().to_ascii_lowercase().as_str()) {
            offset += ident.start();
            continue;
        }
        return Some(split_identifier(ident.as_str()));
    }
    None
}

/// `calculateTotalPrice` -> `Calculate Total Price`.
fn split_identifier(ident: &str) -> String {
    let mut spaced = String::with_capacity(ident.len() + 8);
    for ch in ident.chars() {
        if ch.is_ascii_uppercase() {
            spaced.push(' ');
        }
        spaced.push(ch);
    }
    spaced
        .trim()
        .split(' ')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn action_candidate(text: &str) -> Option<String> {
    for (verb, pattern) in ACTION_PATTERNS.iter() {
        let Some(object) = pattern.captures(text).and_then(|c| c.get(1)) else {
            continue;
        };
        let object = object.as_str().trim();
        if char_len(object) > 3 && !STOP_WORDS.contains(alnum_key(object).as_str()) {
            return Some(format!("{} {}", capitalize(verb), object));
        }
    }
    None
}

fn topic_candidate(cleaned: &str) -> Option<String> {
    for pattern in TOPIC_PATTERNS.iter() {
        let Some(topic) = pattern.captures(cleaned).and_then(|c| c.get(1)) else {
            continue;
        };
        let topic = join_words(topic.as_str().split_whitespace().take(FALLBACK_WORD_LIMIT));
        if char_len(&topic) > 3 {
            return Some(topic);
        }
    }
    None
}

fn word_candidate(words: &[&str]) -> Option<String> {
    let first = words.first()?;
    let start = usize::from(COMMON_PREFIXES.contains(&first.to_lowercase().as_str()));
    Some(join_words(
        words.iter().copied().skip(start).take(FALLBACK_WORD_LIMIT),
    ))
}

fn raw_prefix(trimmed: &str) -> String {
    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    let start = match tokens.first() {
        Some(first) if SKIP_FIRST.contains(&first.to_lowercase().as_str()) => 1,
        _ => 0,
    };
    let prefix = join_words(tokens.into_iter().skip(start).take(FALLBACK_WORD_LIMIT));
    clamp_chars(&prefix, MAX_RAW_PREFIX_CHARS)
}

fn title_case_word(word: &str) -> String {
    if char_len(word) > 1 && word == word.to_uppercase() {
        word.to_string()
    } else {
        capitalize(word)
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

fn join_words<'a>(words: impl Iterator<Item = &'a str>) -> String {
    words.collect::<Vec<_>>().join(" ")
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Longer than `max` chars -> first `max - 3` chars plus an ellipsis.
pub(crate) fn clamp_chars(s: &str, max: usize) -> String {
    if char_len(s) <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max - ELLIPSIS.len()).collect();
    out.push_str(ELLIPSIS);
    out
}
