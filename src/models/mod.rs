//! Data models for the session engine.
//!
//! This module defines the structures shared across components:
//!
//! - [`Turn`] / [`Block`] / [`Role`] - the transcript data model
//! - [`TranscriptHandle`] - opaque identifier for one transcript file
//! - [`Mapping`] / [`MappingTable`] - association id to transcript binding
//! - [`LifecycleState`] / [`ArchiveEntry`] / [`ArchiveIndex`] - retention state
//! - [`IndexEntry`] / [`SessionIndex`] / [`SearchHit`] - the derived search index
//!
//! All on-disk state uses serde JSON; transcript timestamps accept both
//! integer milliseconds and RFC3339 strings via a custom deserializer.

pub mod archive;
pub mod search;
pub mod transcript;

pub use archive::{
    ArchiveEntry, ArchiveIndex, AssociationStatus, LifecycleState, Mapping, MappingState,
    MappingTable,
};
pub use search::{IndexEntry, SearchHit, SessionIndex};
pub use transcript::{Block, Role, TranscriptHandle, Turn};
