//! Transcript compression.
//!
//! Shrinks a transcript's historical bulk without losing the conversational
//! meaning needed for continuation. Bulky tool-call arguments and
//! tool-result payloads become bounded head+tail previews with omission
//! markers; model-internal reasoning blocks become fixed-size markers; text
//! blocks are never touched. Turn count, order, roles, and timestamps are
//! preserved exactly - all mutation goes through
//! [`TranscriptStore::rewrite_historical`](crate::store::TranscriptStore::rewrite_historical),
//! which enforces the structural invariants.

pub mod compress;

pub use compress::{CompressionRecord, compress};
