//! Caller-supplied tuning knobs.
//!
//! Every threshold in the engine lives here rather than as a constant:
//! dormancy windows, retention windows, and compression thresholds are
//! policy decisions owned by the orchestrator, not by this core. The
//! defaults are conservative and documented per field.

use serde::{Deserialize, Serialize};

/// Tuning for [`crate::compressor::compress`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Transcripts smaller than this many bytes are never compressed.
    pub min_transcript_bytes: u64,

    /// The last N turns are never touched; they hold the material the agent
    /// needs most for continuation.
    pub protected_suffix_turns: usize,

    /// Tool-call arguments whose serialized size exceeds this are replaced
    /// with a bounded summary.
    pub tool_call_threshold_bytes: usize,

    /// Tool-result payloads whose serialized size exceeds this are replaced
    /// with a head+tail preview.
    pub tool_result_threshold_bytes: usize,

    /// Bytes of head and of tail kept in previews.
    pub preview_bytes: usize,

    /// Copy the transcript file aside before its first compression so lossy
    /// compression stays recoverable.
    pub backup_original: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            min_transcript_bytes: 50 * 1024,
            protected_suffix_turns: 4,
            tool_call_threshold_bytes: 2048,
            tool_result_threshold_bytes: 2048,
            preview_bytes: 200,
            backup_original: true,
        }
    }
}

/// Tuning for [`crate::lifecycle`] classification and sweeps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Days without activity before an open association goes dormant.
    /// A closed association is dormant immediately.
    pub dormant_after_days: i64,

    /// Additional days of dormancy before a transcript is archive-eligible.
    pub archive_after_days: i64,

    /// Days in the archive before content is purge-eligible.
    pub purge_after_days: i64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self { dormant_after_days: 7, archive_after_days: 14, purge_after_days: 90 }
    }
}
