//! Transcript storage: append-only JSONL files plus the association mapping
//! table.
//!
//! # Error Handling Strategy
//!
//! Store operations sit on the hard error tier: a turn that violates the
//! block invariants, a transform that would change transcript structure, or
//! a transcript file that no longer parses all surface as typed
//! [`StoreError`](crate::error::StoreError) values. These indicate a
//! structural bug in the caller or on-disk corruption and are never
//! swallowed. Only the backup helpers degrade gracefully - a failed backup
//! is logged by the caller and compression proceeds without it.

pub mod mapping;
pub mod transcript;

pub use mapping::{bind_mapping, load_mappings, save_mappings};
pub use transcript::{TranscriptStore, TurnIter};
