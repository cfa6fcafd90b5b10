use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Derived per-association summary used for cross-session search.
///
/// Regenerable at any time from the transcript; losing an entry is a
/// performance regression, never data loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub association_id: String,
    /// First line of the first user message, bounded.
    pub title: String,
    /// Bounded prefix of the first assistant text block.
    pub summary: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub turn_count: usize,
    /// Lowercased content tokens from user text, minus stopwords.
    pub keywords: Vec<String>,
    /// Paths named in tool-call arguments.
    pub referenced_files: Vec<String>,
    /// Sentences matching the decision-indicator vocabulary.
    pub decisions: Vec<String>,
}

/// The whole derived index, keyed by association id.
///
/// BTreeMap keying makes a full rebuild byte-equivalent to incremental
/// updates applied in any order.
pub type SessionIndex = BTreeMap<String, IndexEntry>;

/// One scored search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub association_id: String,
    pub title: String,
    pub score: f64,
    pub updated_at: DateTime<Utc>,
}
