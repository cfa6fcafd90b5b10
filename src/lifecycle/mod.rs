//! Lifecycle management: classification, archival, restore, purge.
//!
//! A transcript's lifecycle state (active → dormant → archived → purged) is
//! derived, never stored as truth. The manager drives the transitions as
//! periodic batch sweeps against two external capabilities:
//!
//! - [`StatusProvider`] answers "is association X open, and when was it last
//!   active?" (the excluded GitHub layer)
//! - [`ArchiveTransport`] moves byte blobs to and from a namespace disjoint
//!   from the primary working set (a branch, a bucket, or a directory -
//!   [`DirTransport`] ships as the directory-backed impl)
//!
//! # Error Handling Strategy
//!
//! Archival is fail-safe: the primary-working-set copy is removed only as
//! the final step, after the blob is written, the archive index appended,
//! the mapping updated, and eligibility re-checked against a fresh status
//! answer. Any failure before that leaves a readable primary copy -
//! duplication is always preferred over data loss. Restore misses are typed
//! ([`RestoreError`](crate::error::RestoreError)) and recoverable; sweeps
//! log and skip per-transcript failures rather than aborting the batch.

pub mod classify;
pub mod manager;
pub mod transport;

pub use classify::{archive_eligible, classify, purge_eligible};
pub use manager::{LifecycleManager, StatusProvider, SweepReport};
pub use transport::{ArchiveTransport, DirTransport};
