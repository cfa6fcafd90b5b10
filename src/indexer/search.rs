use crate::models::{IndexEntry, SearchHit, SessionIndex};

use super::builder::tokenize;

// Field weights: a title match is near-certain relevance and a recorded
// decision is high-value; summary and keyword overlap are weaker signals.
const WEIGHT_TITLE: f64 = 5.0;
const WEIGHT_DECISION: f64 = 3.0;
const WEIGHT_FILE: f64 = 2.0;
const WEIGHT_KEYWORD: f64 = 2.0;
const WEIGHT_SUMMARY: f64 = 1.0;

/// Score every index entry against `query` and return hits ordered by
/// descending score, ties broken by most-recently-updated first.
///
/// A query with no matches returns an empty vec, not an error.
pub fn search(index: &SessionIndex, query: &str) -> Vec<SearchHit> {
    let terms = tokenize(query);
    if terms.is_empty() {
        return Vec::new();
    }

    let mut hits: Vec<SearchHit> = index
        .values()
        .filter_map(|entry| {
            let score = score_entry(entry, &terms);
            (score > 0.0).then(|| SearchHit {
                association_id: entry.association_id.clone(),
                title: entry.title.clone(),
                score,
                updated_at: entry.updated_at,
            })
        })
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.updated_at.cmp(&a.updated_at))
            .then_with(|| a.association_id.cmp(&b.association_id))
    });
    hits
}

/// Weighted term overlap across the entry's fields. Each term counts once
/// per field, not once per occurrence.
fn score_entry(entry: &IndexEntry, terms: &[String]) -> f64 {
    let title = entry.title.to_lowercase();
    let summary = entry.summary.to_lowercase();
    let mut score = 0.0;

    for term in terms {
        if title.contains(term.as_str()) {
            score += WEIGHT_TITLE;
        }
        if entry.decisions.iter().any(|d| d.to_lowercase().contains(term.as_str())) {
            score += WEIGHT_DECISION;
        }
        if entry.referenced_files.iter().any(|f| f.to_lowercase().contains(term.as_str())) {
            score += WEIGHT_FILE;
        }
        if entry.keywords.iter().any(|k| keyword_matches(k, term)) {
            score += WEIGHT_KEYWORD;
        }
        if summary.contains(term.as_str()) {
            score += WEIGHT_SUMMARY;
        }
    }
    score
}

/// Keywords match on shared stems: "caching" finds the keyword "cache" and
/// vice versa.
fn keyword_matches(keyword: &str, term: &str) -> bool {
    keyword == term || keyword.starts_with(term) || term.starts_with(keyword)
}
