use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::transcript::TranscriptHandle;

/// Derived retention state of a transcript.
///
/// Never stored as truth; computed by [`crate::lifecycle::classify`] from
/// association status, recency, and the archive index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Active,
    Dormant,
    Archived,
    Purged,
}

/// Snapshot of an association object's external state, as reported by the
/// (out-of-scope) GitHub layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssociationStatus {
    /// Whether the issue/PR is open.
    pub open: bool,
    /// When the association last saw external activity.
    pub last_activity: DateTime<Utc>,
}

/// Where a mapping's transcript currently lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum MappingState {
    /// Transcript file is in the primary working set.
    Active,
    /// Transcript was moved to the archive namespace.
    Archived { location: String },
}

/// Binding of one association id to one transcript.
///
/// The mapping table exclusively owns this relation; nothing else records
/// which transcript belongs to which issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub handle: TranscriptHandle,
    pub updated_at: DateTime<Utc>,
    pub state: MappingState,
}

impl Mapping {
    pub fn new(handle: TranscriptHandle, updated_at: DateTime<Utc>) -> Self {
        Self { handle, updated_at, state: MappingState::Active }
    }

    pub fn is_archived(&self) -> bool {
        matches!(self.state, MappingState::Archived { .. })
    }
}

/// All known association-id → transcript bindings, keyed by association id.
///
/// BTreeMap keying keeps the serialized form stable across rebuilds.
pub type MappingTable = BTreeMap<String, Mapping>;

/// One archived transcript's bookkeeping record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub association_id: String,
    pub handle: TranscriptHandle,
    /// Transport location of the blob (opaque to this crate).
    pub location: String,
    pub archived_at: DateTime<Utc>,
    /// Size of the transcript file at archival time, after compression.
    pub original_bytes: u64,
    pub turn_count: usize,
    /// Set once the blob has been purged. Purge is terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purged_at: Option<DateTime<Utc>>,
}

/// Append-only collection of [`ArchiveEntry`], never duplicated by
/// association id. Owns all knowledge of archive locations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveIndex {
    entries: BTreeMap<String, ArchiveEntry>,
}

impl ArchiveIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for its association id.
    ///
    /// Re-archival after a restore overwrites the old entry; the index never
    /// holds two entries for one association.
    pub fn upsert(&mut self, entry: ArchiveEntry) {
        self.entries.insert(entry.association_id.clone(), entry);
    }

    pub fn get(&self, association_id: &str) -> Option<&ArchiveEntry> {
        self.entries.get(association_id)
    }

    pub fn get_mut(&mut self, association_id: &str) -> Option<&mut ArchiveEntry> {
        self.entries.get_mut(association_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
