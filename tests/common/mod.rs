//! Shared test utilities for integration tests
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use gitclaw_sessions::models::{Block, Role, Turn};
use gitclaw_sessions::store::TranscriptStore;
use serde_json::{Value, json};
use tempfile::TempDir;

/// A temp workspace with a transcript store rooted in it.
pub struct Workspace {
    temp_dir: TempDir,
    pub store: TranscriptStore,
}

impl Workspace {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = TranscriptStore::new(temp_dir.path()).expect("Failed to open store");
        Self { temp_dir, store }
    }

    pub fn path(&self) -> &std::path::Path {
        self.temp_dir.path()
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for conversation turns with deterministic timestamps.
pub struct TurnBuilder {
    role: Role,
    timestamp: DateTime<Utc>,
    blocks: Vec<Block>,
}

impl TurnBuilder {
    pub fn user() -> Self {
        Self { role: Role::User, timestamp: ts(1_000), blocks: Vec::new() }
    }

    pub fn assistant() -> Self {
        Self { role: Role::Assistant, timestamp: ts(1_000), blocks: Vec::new() }
    }

    pub fn at(mut self, secs: i64) -> Self {
        self.timestamp = ts(secs);
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.blocks.push(Block::text(text));
        self
    }

    pub fn thinking(mut self, thinking: &str) -> Self {
        self.blocks.push(Block::thinking(thinking));
        self
    }

    pub fn tool_use(mut self, id: &str, name: &str, input: Value) -> Self {
        self.blocks.push(Block::tool_use(id, name, input));
        self
    }

    pub fn tool_result(mut self, tool_use_id: &str, content: Value) -> Self {
        self.blocks.push(Block::tool_result(tool_use_id, content, false));
        self
    }

    pub fn build(self) -> Turn {
        Turn::new(self.role, self.timestamp, self.blocks)
    }
}

/// Deterministic timestamp from seconds since the epoch.
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

/// A short user/assistant exchange about one topic.
pub fn simple_conversation(topic: &str) -> Vec<Turn> {
    vec![
        TurnBuilder::user().at(100).text(&format!("Help me with {}", topic)).build(),
        TurnBuilder::assistant().at(200).text(&format!("Here is a plan for {}", topic)).build(),
    ]
}

/// A tool-heavy turn whose payload exceeds compression thresholds.
pub fn bulky_tool_turn(secs: i64, payload_bytes: usize) -> Turn {
    TurnBuilder::assistant()
        .at(secs)
        .tool_use(
            "tool-1",
            "write_file",
            json!({"path": "/src/generated.rs", "content": "x".repeat(payload_bytes)}),
        )
        .build()
}

/// Append a whole conversation to a fresh transcript and return its handle.
pub fn seed_transcript(
    store: &TranscriptStore,
    turns: &[Turn],
) -> gitclaw_sessions::models::TranscriptHandle {
    let handle = store.create();
    for turn in turns {
        store.append(&handle, turn).expect("Failed to append turn");
    }
    handle
}
