//! Persistence adapters for the derived indexes.
//!
//! Thin best-effort layer over [`crate::models::SessionIndex`] and
//! [`crate::models::ArchiveIndex`]: load returns `None` for a missing,
//! corrupt, or version-mismatched cache (the caller rebuilds), save is an
//! atomic temp-file + rename. Core logic never touches these files
//! directly, which keeps every index operation unit-testable in memory.

pub mod persistence;

pub use persistence::{
    load_archive_index, load_session_index, save_archive_index, save_session_index,
};
