//! Cache persistence: load/save with atomic writes and version checks.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::models::{ArchiveIndex, SessionIndex};
use crate::utils::atomic_write;

/// Schema version for invalidation on format changes.
const CACHE_VERSION: u32 = 1;

const SESSION_INDEX_FILENAME: &str = "session-index.json";
const ARCHIVE_INDEX_FILENAME: &str = "archive-index.json";

/// Load the session index cache from `<root>/session-index.json`.
///
/// Returns `None` if the cache is missing, corrupt, or from another schema
/// version; the caller should rebuild from transcripts.
pub fn load_session_index(root: &Path) -> Option<SessionIndex> {
    load_versioned(&root.join(SESSION_INDEX_FILENAME))
}

/// Atomically save the session index cache.
pub fn save_session_index(root: &Path, index: &SessionIndex) -> Result<()> {
    save_versioned(&root.join(SESSION_INDEX_FILENAME), index)
}

/// Load the archive index from `<root>/archive-index.json`.
///
/// Unlike the session index this is authoritative state, but a missing file
/// is still just an empty index (nothing archived yet). A corrupt or
/// version-mismatched file returns `None` so the caller can decide between
/// failing loudly and starting over.
pub fn load_archive_index(root: &Path) -> Option<ArchiveIndex> {
    let path = root.join(ARCHIVE_INDEX_FILENAME);
    if !path.exists() {
        return Some(ArchiveIndex::new());
    }
    load_versioned(&path)
}

/// Atomically save the archive index.
pub fn save_archive_index(root: &Path, index: &ArchiveIndex) -> Result<()> {
    save_versioned(&root.join(ARCHIVE_INDEX_FILENAME), index)
}

fn load_versioned<T: DeserializeOwned>(path: &Path) -> Option<T> {
    if !path.exists() {
        return None;
    }
    let json = match fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read cache file");
            return None;
        }
    };
    let value: Value = match serde_json::from_str(&json) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt cache file");
            return None;
        }
    };

    let version = value.get("version").and_then(Value::as_u64).unwrap_or(0);
    if version != u64::from(CACHE_VERSION) {
        warn!(
            path = %path.display(),
            expected = CACHE_VERSION,
            found = version,
            "cache version mismatch, caller should rebuild"
        );
        return None;
    }

    match value.get("data") {
        Some(data) => match serde_json::from_value(data.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to deserialize cache");
                None
            }
        },
        None => None,
    }
}

fn save_versioned<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let wrapped = serde_json::json!({ "version": CACHE_VERSION, "data": data });
    let json = serde_json::to_string_pretty(&wrapped)
        .with_context(|| format!("failed to serialize cache {}", path.display()))?;
    atomic_write(path, json.as_bytes())
}
