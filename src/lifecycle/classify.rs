use chrono::{DateTime, Utc};

use crate::config::LifecycleConfig;
use crate::models::{ArchiveEntry, AssociationStatus, LifecycleState};

/// Derive a transcript's lifecycle state.
///
/// Inputs are the association's external status, the transcript's last
/// modification time, and whatever the archive index knows. The state is
/// recomputed on demand; nothing persists it.
pub fn classify(
    status: &AssociationStatus,
    last_modified: DateTime<Utc>,
    archive_entry: Option<&ArchiveEntry>,
    now: DateTime<Utc>,
    config: &LifecycleConfig,
) -> LifecycleState {
    if let Some(entry) = archive_entry {
        if entry.purged_at.is_some() {
            return LifecycleState::Purged;
        }
        return LifecycleState::Archived;
    }

    let idle_days = idle_days(status, last_modified, now);
    if !status.open || idle_days >= config.dormant_after_days {
        LifecycleState::Dormant
    } else {
        LifecycleState::Active
    }
}

/// Whether a dormant transcript has been idle long enough to archive.
///
/// This is advisory: [`LifecycleManager::archive`](super::LifecycleManager::archive)
/// re-checks with a fresh status answer right before the irreversible step.
pub fn archive_eligible(
    status: &AssociationStatus,
    last_modified: DateTime<Utc>,
    now: DateTime<Utc>,
    config: &LifecycleConfig,
) -> bool {
    let idle = idle_days(status, last_modified, now);
    let dormant = !status.open || idle >= config.dormant_after_days;
    dormant && idle >= config.dormant_after_days + config.archive_after_days
}

/// Whether an archived transcript is past the retention window.
pub fn purge_eligible(entry: &ArchiveEntry, now: DateTime<Utc>, config: &LifecycleConfig) -> bool {
    entry.purged_at.is_none()
        && (now - entry.archived_at).num_days() >= config.purge_after_days
}

/// Days since the association or the transcript last saw activity,
/// whichever is more recent.
fn idle_days(status: &AssociationStatus, last_modified: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let last_touch = status.last_activity.max(last_modified);
    (now - last_touch).num_days()
}
