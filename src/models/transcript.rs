use chrono::{DateTime, Utc};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One typed unit of content within a turn.
///
/// Tool-call arguments and tool-result payloads are free-form JSON; the
/// compressor treats them generically rather than special-casing tool names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Value,
        #[serde(default)]
        is_error: bool,
    },
}

impl Block {
    pub fn text(text: impl Into<String>) -> Self {
        Block::Text { text: text.into() }
    }

    pub fn thinking(thinking: impl Into<String>) -> Self {
        Block::Thinking { thinking: thinking.into() }
    }

    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Block::ToolUse { id: id.into(), name: name.into(), input }
    }

    pub fn tool_result(tool_use_id: impl Into<String>, content: Value, is_error: bool) -> Self {
        Block::ToolResult { tool_use_id: tool_use_id.into(), content, is_error }
    }

    /// Stable name of the block's type tag, used in integrity checks and
    /// compression statistics.
    pub fn kind(&self) -> &'static str {
        match self {
            Block::Text { .. } => "text",
            Block::Thinking { .. } => "thinking",
            Block::ToolUse { .. } => "tool_use",
            Block::ToolResult { .. } => "tool_result",
        }
    }

    /// Whether two blocks carry the same type tag.
    pub fn same_kind(&self, other: &Block) -> bool {
        self.kind() == other.kind()
    }
}

/// One role-tagged unit of conversation.
///
/// Turns are ordered and immutable once appended; only the compressor may
/// rewrite block payloads, and never the role, timestamp, or position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub content: Vec<Block>,
}

impl Turn {
    pub fn new(role: Role, timestamp: DateTime<Utc>, content: Vec<Block>) -> Self {
        Self { role, timestamp, content }
    }

    /// Convenience constructor stamped with the current time.
    pub fn now(role: Role, content: Vec<Block>) -> Self {
        Self { role, timestamp: Utc::now(), content }
    }

    /// Check the structural invariants enforced on append.
    ///
    /// Returns a human-readable description of the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if self.content.is_empty() {
            return Err("turn has an empty block list".to_string());
        }
        for block in &self.content {
            if let Block::ToolUse { name, .. } = block
                && name.is_empty()
            {
                return Err("tool_use block has an empty tool name".to_string());
            }
        }
        Ok(())
    }
}

/// Opaque identifier for one transcript file in the primary working set.
///
/// The handle doubles as the file stem (`<handle>.jsonl`); it carries no
/// path information of its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranscriptHandle(String);

impl TranscriptHandle {
    /// Generate a fresh random handle.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TranscriptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TranscriptHandle {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Custom deserializer for timestamps that accepts both integers (ms) and
/// RFC3339 strings.
pub fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Number(n) => {
            let ms = n.as_i64().ok_or_else(|| DeError::custom("invalid timestamp"))?;
            DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| DeError::custom("timestamp out of range"))
        }
        Value::String(s) => s
            .parse::<DateTime<Utc>>()
            .map_err(|e| DeError::custom(format!("invalid RFC3339 timestamp: {}", e))),
        _ => Err(DeError::custom("timestamp must be a number or string")),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_block_roundtrip_wire_format() {
        let json = r#"{"type":"tool_use","id":"tool_123","name":"read_file","input":{"path":"/test/file.txt"}}"#;
        let block: Block = serde_json::from_str(json).unwrap();
        match &block {
            Block::ToolUse { name, input, .. } => {
                assert_eq!(name, "read_file");
                assert_eq!(input["path"], "/test/file.txt");
            }
            other => panic!("unexpected block: {:?}", other),
        }

        let back = serde_json::to_value(&block).unwrap();
        assert_eq!(back["type"], "tool_use");
    }

    #[test]
    fn test_tool_result_defaults_is_error() {
        let json = r#"{"type":"tool_result","tool_use_id":"tool_123","content":"File contents here"}"#;
        let block: Block = serde_json::from_str(json).unwrap();
        match block {
            Block::ToolResult { is_error, .. } => assert!(!is_error),
            other => panic!("unexpected block: {:?}", other),
        }
    }

    #[test]
    fn test_turn_timestamp_integer_millis() {
        let json = r#"{"role":"user","timestamp":1762076480016,"content":[{"type":"text","text":"hi"}]}"#;
        let turn: Turn = serde_json::from_str(json).unwrap();
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.timestamp, DateTime::from_timestamp_millis(1762076480016).unwrap());
    }

    #[test]
    fn test_turn_timestamp_rfc3339() {
        let json = r#"{"role":"assistant","timestamp":"2024-01-15T10:30:00Z","content":[{"type":"text","text":"hi"}]}"#;
        let turn: Turn = serde_json::from_str(json).unwrap();
        assert_eq!(turn.role, Role::Assistant);
    }

    #[test]
    fn test_validate_rejects_empty_block_list() {
        let turn = Turn::now(Role::User, vec![]);
        assert!(turn.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_tool_name() {
        let turn = Turn::now(Role::Assistant, vec![Block::tool_use("t1", "", json!({}))]);
        assert!(turn.validate().unwrap_err().contains("tool name"));
    }

    #[test]
    fn test_same_kind() {
        let a = Block::text("a");
        let b = Block::text("b");
        let c = Block::thinking("c");
        assert!(a.same_kind(&b));
        assert!(!a.same_kind(&c));
    }

    #[test]
    fn test_handle_generate_unique() {
        assert_ne!(TranscriptHandle::generate(), TranscriptHandle::generate());
    }
}
