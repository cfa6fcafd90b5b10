use std::cell::Cell;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::CompressionConfig;
use crate::error::StoreError;
use crate::models::{Block, TranscriptHandle};
use crate::store::TranscriptStore;
use crate::utils::{head_tail_preview, line_count, truncate_bytes};

/// Marker key stamped into summarized tool-call arguments; its presence
/// means the block was already compressed and must be left alone.
const SUMMARY_MARKER_KEY: &str = "compressed";

/// Prefix of the marker that replaces stripped reasoning blocks.
const THINKING_MARKER_PREFIX: &str = "[reasoning removed:";

/// Marker embedded by [`head_tail_preview`]; a payload carrying it has
/// already been through a preview pass.
const OMISSION_MARKER: &str = "... [omitted ";

/// Keys probed for a human-meaningful target in tool-call arguments.
const TARGET_KEYS: &[&str] = &["path", "file_path", "filename", "file", "target", "url", "command"];

/// Per-transcript compression statistics. Ephemeral and reportable; not
/// required for correctness.
#[derive(Debug, Clone, Serialize)]
pub struct CompressionRecord {
    pub original_bytes: u64,
    pub compressed_bytes: u64,
    pub tool_calls_compressed: usize,
    pub tool_results_compressed: usize,
    pub thinking_stripped: usize,
    pub turns_scanned: usize,
    /// True when the transcript was below the size threshold and nothing ran.
    pub skipped: bool,
}

impl CompressionRecord {
    fn skipped(size: u64) -> Self {
        Self {
            original_bytes: size,
            compressed_bytes: size,
            tool_calls_compressed: 0,
            tool_results_compressed: 0,
            thinking_stripped: 0,
            turns_scanned: 0,
            skipped: true,
        }
    }
}

/// Compress a transcript's historical turns in place.
///
/// Only runs on transcripts whose file size exceeds
/// `config.min_transcript_bytes`; the last `config.protected_suffix_turns`
/// turns are never touched. Re-running on an already-compressed transcript
/// is a no-op unless turns have since aged out of the protected suffix.
///
/// Compression is best-effort per block: a payload that cannot be
/// summarized is left untouched rather than dropped. Structural failures
/// (the transcript no longer parses) surface as [`StoreError`].
pub fn compress(
    store: &TranscriptStore,
    handle: &TranscriptHandle,
    config: &CompressionConfig,
) -> Result<CompressionRecord, StoreError> {
    let original_bytes = store.size_of(handle)?;
    if original_bytes < config.min_transcript_bytes {
        debug!(
            transcript = %handle,
            size = original_bytes,
            threshold = config.min_transcript_bytes,
            "compression skipped: below size threshold"
        );
        return Ok(CompressionRecord::skipped(original_bytes));
    }

    let turn_count = store.read_turns(handle)?.count();
    let protected_from = turn_count.saturating_sub(config.protected_suffix_turns);
    if protected_from == 0 {
        return Ok(CompressionRecord::skipped(original_bytes));
    }

    if config.backup_original
        && !store.has_backup(handle)
        && let Err(e) = store.backup(handle)
    {
        // Lossy compression without a backup is still allowed; the backup is
        // a recovery aid, not a precondition.
        warn!(transcript = %handle, error = %format!("{e:#}"), "pre-compression backup failed");
    }

    let tool_calls = Cell::new(0usize);
    let tool_results = Cell::new(0usize);
    let thinking = Cell::new(0usize);

    store.rewrite_historical(
        handle,
        |ordinal, _| ordinal < protected_from,
        |block| match block {
            Block::Text { .. } => None,
            Block::Thinking { thinking: body } => {
                let marker = strip_thinking(body)?;
                thinking.set(thinking.get() + 1);
                Some(Block::Thinking { thinking: marker })
            }
            Block::ToolUse { id, name, input } => {
                let summary = summarize_tool_call(name, input, config)?;
                tool_calls.set(tool_calls.get() + 1);
                Some(Block::ToolUse { id: id.clone(), name: name.clone(), input: summary })
            }
            Block::ToolResult { tool_use_id, content, is_error } => {
                let preview = preview_tool_result(content, config)?;
                tool_results.set(tool_results.get() + 1);
                Some(Block::ToolResult {
                    tool_use_id: tool_use_id.clone(),
                    content: preview,
                    is_error: *is_error,
                })
            }
        },
    )?;

    let compressed_bytes = store.size_of(handle)?;
    Ok(CompressionRecord {
        original_bytes,
        compressed_bytes,
        tool_calls_compressed: tool_calls.get(),
        tool_results_compressed: tool_results.get(),
        thinking_stripped: thinking.get(),
        turns_scanned: protected_from,
        skipped: false,
    })
}

/// Replace reasoning content with a fixed-size marker noting its length.
///
/// Reasoning is scratch deliberation, not replayable history; the marker
/// keeps the block present so turn structure is unchanged.
fn strip_thinking(body: &str) -> Option<String> {
    if body.starts_with(THINKING_MARKER_PREFIX) {
        return None;
    }
    Some(format!("{} {} chars]", THINKING_MARKER_PREFIX, body.chars().count()))
}

/// Summarize oversized tool-call arguments into a bounded object: tool
/// target, original size, and a head+tail preview. Works for any tool name;
/// unknown tools just lose the target field.
fn summarize_tool_call(name: &str, input: &Value, config: &CompressionConfig) -> Option<Value> {
    if input.get(SUMMARY_MARKER_KEY).is_some() {
        return None;
    }
    let serialized = serde_json::to_string(input).ok()?;
    if serialized.len() <= config.tool_call_threshold_bytes {
        return None;
    }

    let target = TARGET_KEYS
        .iter()
        .find_map(|key| input.get(*key).and_then(Value::as_str))
        .map(|t| truncate_bytes(t, 256).to_string());

    let mut summary = json!({
        SUMMARY_MARKER_KEY: true,
        "tool": name,
        "original_bytes": serialized.len(),
        "original_lines": line_count(&serialized),
        "preview": head_tail_preview(&serialized, config.preview_bytes, config.preview_bytes),
    });
    if let Some(target) = target {
        summary["target"] = Value::String(target);
    }
    Some(summary)
}

/// Replace an oversized tool-result payload with a head+tail preview string
/// carrying an omitted-content marker.
fn preview_tool_result(content: &Value, config: &CompressionConfig) -> Option<Value> {
    let text = match content {
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).ok()?,
    };
    if text.len() <= config.tool_result_threshold_bytes || text.contains(OMISSION_MARKER) {
        return None;
    }
    Some(Value::String(head_tail_preview(&text, config.preview_bytes, config.preview_bytes)))
}
