use std::collections::BTreeSet;

use serde_json::Value;

use crate::models::{Block, IndexEntry, Role, SessionIndex, Turn};
use crate::utils::truncate_bytes;

const TITLE_MAX_BYTES: usize = 120;
const SUMMARY_MAX_BYTES: usize = 240;
const DECISION_MAX_BYTES: usize = 200;
const MAX_KEYWORDS: usize = 40;
const MAX_FILES: usize = 30;
const MAX_DECISIONS: usize = 20;

/// Words carrying no search value, filtered out of keyword sets.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "that", "this", "with", "you", "your", "are", "was", "were", "have",
    "has", "had", "not", "but", "can", "could", "should", "would", "will", "what", "when",
    "where", "which", "who", "how", "why", "all", "any", "its", "it's", "into", "from", "out",
    "about", "then", "than", "there", "here", "they", "them", "been", "being", "just", "also",
    "some", "more", "most", "only", "over", "under", "very", "please",
];

/// Phrases whose presence marks a sentence as a recorded decision.
const DECISION_MARKERS: &[&str] = &[
    "decided",
    "decision",
    "we will",
    "we'll",
    "going with",
    "chose",
    "chosen",
    "agreed",
    "instead of",
    "opted",
    "settled on",
];

/// JSON keys in tool-call arguments that name files.
const PATH_KEYS: &[&str] = &["path", "file_path", "filename", "file", "notebook_path"];

/// Compute the index entry for one transcript.
///
/// Pure function of the turns: same input, same entry, which is what makes
/// [`rebuild_index`] byte-equivalent to incremental updates. Returns `None`
/// for an empty transcript (nothing to index yet).
pub fn build_entry(association_id: &str, turns: &[Turn]) -> Option<IndexEntry> {
    let first = turns.first()?;
    let last = turns.last()?;

    let title = turns
        .iter()
        .filter(|t| t.role == Role::User)
        .flat_map(|t| t.content.iter())
        .find_map(block_text)
        .map(|text| truncate_bytes(text.lines().next().unwrap_or(""), TITLE_MAX_BYTES).to_string())
        .unwrap_or_default();

    let summary = turns
        .iter()
        .filter(|t| t.role == Role::Assistant)
        .flat_map(|t| t.content.iter())
        .find_map(block_text)
        .map(|text| truncate_bytes(text, SUMMARY_MAX_BYTES).to_string())
        .unwrap_or_default();

    Some(IndexEntry {
        association_id: association_id.to_string(),
        title,
        summary,
        created_at: first.timestamp,
        updated_at: last.timestamp,
        turn_count: turns.len(),
        keywords: extract_keywords(turns),
        referenced_files: extract_referenced_files(turns),
        decisions: extract_decisions(turns),
    })
}

/// Recompute exactly one entry and upsert it into the index.
///
/// O(transcript size). Callers run this after every mutation that should be
/// searchable; skipping it is non-fatal since the index is a cache.
pub fn update_entry(index: &mut SessionIndex, association_id: &str, turns: &[Turn]) {
    if let Some(entry) = build_entry(association_id, turns) {
        index.insert(association_id.to_string(), entry);
    }
}

/// Full recompute from scratch.
///
/// Produces the same index as applying [`update_entry`] per transcript in
/// any order: entries are keyed by association id and derived independently.
pub fn rebuild_index<'a, I>(transcripts: I) -> SessionIndex
where
    I: IntoIterator<Item = (&'a str, &'a [Turn])>,
{
    let mut index = SessionIndex::new();
    for (association_id, turns) in transcripts {
        update_entry(&mut index, association_id, turns);
    }
    index
}

fn block_text(block: &Block) -> Option<&str> {
    match block {
        Block::Text { text } if !text.trim().is_empty() => Some(text.as_str()),
        _ => None,
    }
}

/// Lowercase content tokens from user text, minus stopwords, deduped and
/// sorted for stable output.
fn extract_keywords(turns: &[Turn]) -> Vec<String> {
    let mut keywords = BTreeSet::new();
    for turn in turns.iter().filter(|t| t.role == Role::User) {
        for text in turn.content.iter().filter_map(block_text) {
            for token in tokenize(text) {
                keywords.insert(token);
            }
        }
    }
    keywords.into_iter().take(MAX_KEYWORDS).collect()
}

/// Split into lowercase alphanumeric tokens, dropping short words and
/// stopwords. Shared with query tokenization in [`super::search`].
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() >= 3 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Paths named in tool-call arguments, discovered by key name anywhere in
/// the argument tree.
fn extract_referenced_files(turns: &[Turn]) -> Vec<String> {
    let mut files = BTreeSet::new();
    for turn in turns {
        for block in &turn.content {
            if let Block::ToolUse { input, .. } = block {
                collect_paths(input, &mut files);
            }
        }
    }
    files.into_iter().take(MAX_FILES).collect()
}

fn collect_paths(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            for (key, val) in map {
                if PATH_KEYS.contains(&key.as_str())
                    && let Some(path) = val.as_str()
                    && !path.is_empty()
                {
                    out.insert(path.to_string());
                } else {
                    collect_paths(val, out);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_paths(item, out);
            }
        }
        _ => {}
    }
}

/// Sentences matching the decision-indicator vocabulary, from either role's
/// text blocks.
fn extract_decisions(turns: &[Turn]) -> Vec<String> {
    let mut decisions = Vec::new();
    for turn in turns {
        for text in turn.content.iter().filter_map(block_text) {
            for sentence in split_sentences(text) {
                let lower = sentence.to_lowercase();
                if DECISION_MARKERS.iter().any(|marker| lower.contains(marker)) {
                    decisions.push(truncate_bytes(sentence, DECISION_MAX_BYTES).to_string());
                    if decisions.len() >= MAX_DECISIONS {
                        return decisions;
                    }
                }
            }
        }
    }
    decisions
}

fn split_sentences(text: &str) -> impl Iterator<Item = &str> {
    text.split(['.', '!', '?', '\n']).map(str::trim).filter(|s| !s.is_empty())
}
