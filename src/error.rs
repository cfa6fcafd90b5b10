//! Error taxonomy for the session engine.
//!
//! Errors come in two tiers with different contracts:
//!
//! - **Hard tier** ([`StoreError`], [`RestoreError`]): structural invariant
//!   violations and restore misses. These are typed so callers can match on
//!   them, and they always propagate; swallowing one hides data corruption
//!   or loses a conversation.
//! - **Soft tier** (`anyhow::Result` at call sites): best-effort work such as
//!   index updates, backups, and cache persistence. Failures there are logged
//!   and degrade gracefully; the system prefers imperfect data over failing
//!   the user-facing operation.

use std::path::PathBuf;

use thiserror::Error;

/// Hard failures from the transcript store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A turn violated the role/block invariants (e.g. empty block list).
    #[error("invalid turn: {0}")]
    InvalidTurn(String),

    /// A mutation would change turn count, role, timestamp, or block
    /// structure, or a stored transcript file failed to parse.
    #[error("transcript integrity violation: {0}")]
    IntegrityViolation(String),

    /// Transcript file does not exist in the primary working set.
    #[error("transcript not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("transcript I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("transcript serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Failures from [`crate::lifecycle::LifecycleManager::restore`].
///
/// Both variants are recoverable: the caller is expected to fall back to
/// starting a fresh transcript rather than blocking the conversation.
#[derive(Debug, Error)]
pub enum RestoreError {
    /// No archive entry exists for this association id.
    #[error("no archive entry for association {0}")]
    NotFound(String),

    /// An archive entry exists but the blob is unreachable or empty.
    #[error("archive content missing at {0}")]
    ContentMissing(String),

    /// The association was purged; purge is terminal.
    #[error("association {0} was purged and cannot be restored")]
    Purged(String),

    #[error("restore failed: {0}")]
    Other(#[from] anyhow::Error),
}
