use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::classify::{archive_eligible, purge_eligible};
use super::transport::ArchiveTransport;
use crate::compressor::compress;
use crate::config::{CompressionConfig, LifecycleConfig};
use crate::error::RestoreError;
use crate::models::{
    ArchiveEntry, ArchiveIndex, AssociationStatus, Mapping, MappingState, MappingTable,
    TranscriptHandle,
};
use crate::store::TranscriptStore;

/// Answers "is association X open, and when did it last see activity?"
/// Implemented by the excluded GitHub layer.
pub trait StatusProvider {
    fn status(&self, association_id: &str) -> Result<AssociationStatus>;
}

/// Outcome counts for one lifecycle sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub archived: usize,
    pub purged: usize,
    /// Per-transcript failures that were logged and skipped.
    pub errors: usize,
}

/// Drives compression → archival → restoration → purge transitions.
///
/// The mapping table and archive index are passed in and mutated explicitly
/// rather than owned here; persistence of both is the caller's thin adapter
/// (see [`crate::index_storage`]), which keeps every operation unit-testable
/// in memory.
pub struct LifecycleManager<'a> {
    store: &'a TranscriptStore,
    transport: &'a dyn ArchiveTransport,
    lifecycle: LifecycleConfig,
    compression: CompressionConfig,
}

impl<'a> LifecycleManager<'a> {
    pub fn new(
        store: &'a TranscriptStore,
        transport: &'a dyn ArchiveTransport,
        lifecycle: LifecycleConfig,
        compression: CompressionConfig,
    ) -> Self {
        Self { store, transport, lifecycle, compression }
    }

    /// Move one transcript from the primary working set into the archive.
    ///
    /// Step order is chosen so the only irreversible step (removing the
    /// primary copy) happens last, after eligibility is re-checked against a
    /// fresh status answer - a transcript that went active again between
    /// classification and this call is left untouched. Failures before the
    /// removal leave the primary copy readable; a failed removal leaves a
    /// harmless duplicate.
    pub fn archive(
        &self,
        association_id: &str,
        provider: &dyn StatusProvider,
        mappings: &mut MappingTable,
        archive_index: &mut ArchiveIndex,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mapping = mappings
            .get(association_id)
            .with_context(|| format!("no mapping for association {}", association_id))?;
        if mapping.is_archived() {
            bail!("association {} is already archived", association_id);
        }
        let handle = mapping.handle.clone();

        // Captured before compression rewrites the file: the rewrite bumps
        // the mtime, and compression is not conversational activity.
        let last_modified = self.store.last_modified(&handle)?;

        // Smaller payload to move; a compression failure is not a reason to
        // keep a dormant transcript in the working set.
        if let Err(e) = compress(self.store, &handle, &self.compression) {
            warn!(association = association_id, error = %e, "pre-archive compression failed");
        }

        let bytes = self.store.raw_bytes(&handle)?;
        let turn_count = self.store.read_all(&handle)?.len();
        let location = format!("{}.jsonl", handle);
        self.transport
            .write(&location, &bytes)
            .with_context(|| format!("failed to write archive blob {}", location))?;

        // Re-check right before the irreversible part: classification may be
        // minutes stale by the time a sweep reaches this transcript.
        let fresh = provider.status(association_id)?;
        if !archive_eligible(&fresh, last_modified, now, &self.lifecycle) {
            if let Err(e) = self.transport.remove(&location) {
                warn!(association = association_id, error = %format!("{e:#}"), "orphaned archive blob");
            }
            bail!("association {} became active again; archive aborted", association_id);
        }

        archive_index.upsert(ArchiveEntry {
            association_id: association_id.to_string(),
            handle: handle.clone(),
            location: location.clone(),
            archived_at: now,
            original_bytes: bytes.len() as u64,
            turn_count,
            purged_at: None,
        });
        if let Some(mapping) = mappings.get_mut(association_id) {
            mapping.state = MappingState::Archived { location: location.clone() };
            mapping.updated_at = now;
        }

        if let Err(e) = self.store.remove(&handle) {
            // Duplication over data loss: the blob and the primary both
            // exist until a later sweep retries the removal.
            warn!(association = association_id, error = %e, "primary copy left behind after archive");
        }

        info!(
            association = association_id,
            transcript = %handle,
            location = %location,
            bytes = bytes.len(),
            turns = turn_count,
            "transcript archived"
        );
        Ok(())
    }

    /// Bring an archived transcript back into the primary working set.
    ///
    /// # Errors
    ///
    /// [`RestoreError::NotFound`] when no archive entry exists,
    /// [`RestoreError::ContentMissing`] when the blob is unreachable or
    /// empty, [`RestoreError::Purged`] for purged associations. All are
    /// recoverable: the caller falls back to a fresh transcript.
    pub fn restore(
        &self,
        association_id: &str,
        mappings: &mut MappingTable,
        archive_index: &ArchiveIndex,
        now: DateTime<Utc>,
    ) -> Result<TranscriptHandle, RestoreError> {
        let entry = archive_index
            .get(association_id)
            .ok_or_else(|| RestoreError::NotFound(association_id.to_string()))?;
        if entry.purged_at.is_some() {
            return Err(RestoreError::Purged(association_id.to_string()));
        }

        let bytes = self
            .transport
            .read(&entry.location)
            .map_err(RestoreError::Other)?
            .filter(|b| !b.is_empty())
            .ok_or_else(|| RestoreError::ContentMissing(entry.location.clone()))?;

        self.store
            .write_raw(&entry.handle, &bytes)
            .map_err(|e| RestoreError::Other(e.into()))?;

        mappings.insert(
            association_id.to_string(),
            Mapping { handle: entry.handle.clone(), updated_at: now, state: MappingState::Active },
        );

        info!(association = association_id, transcript = %entry.handle, "transcript restored");
        Ok(entry.handle.clone())
    }

    /// Delete archived content past the retention window. Irreversible, and
    /// only ever applied to content that was archived first.
    pub fn purge(
        &self,
        association_id: &str,
        mappings: &mut MappingTable,
        archive_index: &mut ArchiveIndex,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let entry = archive_index
            .get_mut(association_id)
            .with_context(|| format!("no archive entry for association {}", association_id))?;
        if entry.purged_at.is_some() {
            bail!("association {} is already purged", association_id);
        }

        if let Err(e) = self.transport.remove(&entry.location) {
            // The entry is still marked purged: retention has expired and
            // the orphaned blob is an operator cleanup, not a reason to keep
            // serving the content.
            warn!(association = association_id, error = %format!("{e:#}"), "purge left an orphaned blob");
        }
        entry.purged_at = Some(now);
        mappings.remove(association_id);

        info!(association = association_id, location = %entry.location, "transcript purged");
        Ok(())
    }

    /// Periodic batch job: classify every mapping and drive eligible
    /// archives and purges. One bad transcript never aborts the sweep.
    pub fn sweep(
        &self,
        provider: &dyn StatusProvider,
        mappings: &mut MappingTable,
        archive_index: &mut ArchiveIndex,
        now: DateTime<Utc>,
    ) -> SweepReport {
        let mut report = SweepReport::default();
        let ids: Vec<String> = mappings.keys().cloned().collect();

        for id in ids {
            report.examined += 1;

            let archived =
                archive_index.get(&id).map(|entry| purge_eligible(entry, now, &self.lifecycle));
            if let Some(eligible) = archived {
                if eligible {
                    match self.purge(&id, mappings, archive_index, now) {
                        Ok(()) => report.purged += 1,
                        Err(e) => {
                            report.errors += 1;
                            warn!(association = %id, error = %format!("{e:#}"), "purge failed");
                        }
                    }
                }
                continue;
            }

            let Some(mapping) = mappings.get(&id) else { continue };
            let handle = mapping.handle.clone();

            let status = match provider.status(&id) {
                Ok(status) => status,
                Err(e) => {
                    report.errors += 1;
                    warn!(association = %id, error = %format!("{e:#}"), "status lookup failed");
                    continue;
                }
            };
            let last_modified = match self.store.last_modified(&handle) {
                Ok(mtime) => mtime,
                Err(e) => {
                    report.errors += 1;
                    warn!(association = %id, error = %e, "transcript missing from working set");
                    continue;
                }
            };

            if archive_eligible(&status, last_modified, now, &self.lifecycle) {
                match self.archive(&id, provider, mappings, archive_index, now) {
                    Ok(()) => report.archived += 1,
                    Err(e) => {
                        report.errors += 1;
                        warn!(association = %id, error = %format!("{e:#}"), "archive failed");
                    }
                }
            }
        }

        report
    }
}
