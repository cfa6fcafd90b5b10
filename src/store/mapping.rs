//! Persistence for the association-id → transcript mapping table.
//!
//! Stored as `<root>/mappings.json`, written atomically. A missing file is
//! an empty table, not an error; a corrupt file is surfaced loudly since the
//! table is authoritative (unlike the rebuildable session index).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};

use crate::models::{Mapping, MappingTable, TranscriptHandle};
use crate::utils::atomic_write;

const MAPPINGS_FILENAME: &str = "mappings.json";

/// Load the mapping table from `<root>/mappings.json`.
pub fn load_mappings(root: &Path) -> Result<MappingTable> {
    let path = root.join(MAPPINGS_FILENAME);
    if !path.exists() {
        return Ok(MappingTable::new());
    }
    let json = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("corrupt mapping table {}", path.display()))
}

/// Atomically save the mapping table to `<root>/mappings.json`.
pub fn save_mappings(root: &Path, table: &MappingTable) -> Result<()> {
    let json = serde_json::to_string_pretty(table).context("failed to serialize mapping table")?;
    atomic_write(&root.join(MAPPINGS_FILENAME), json.as_bytes())
}

/// Bind an association id to a transcript handle.
///
/// The relation is exclusive: rebinding an association that already points
/// at a different live transcript is a caller bug and fails loudly.
pub fn bind_mapping(
    table: &mut MappingTable,
    association_id: &str,
    handle: TranscriptHandle,
    now: DateTime<Utc>,
) -> Result<()> {
    if let Some(existing) = table.get(association_id)
        && existing.handle != handle
        && !existing.is_archived()
    {
        bail!(
            "association {} is already bound to transcript {}",
            association_id,
            existing.handle
        );
    }
    table.insert(association_id.to_string(), Mapping::new(handle, now));
    Ok(())
}
