//! GitClaw session-state engine.
//!
//! This library is the conversation-state core of GitClaw, a GitHub-hosted
//! conversational agent. It owns how conversational history is stored,
//! shrunk, searched, archived, restored, and validated:
//!
//! - Append-only transcript files mapped to external association ids
//!   (issue/PR numbers) via a mapping table
//! - Lossy compression of historical tool payloads and reasoning blocks
//! - A lifecycle state machine (active/dormant/archived/purged) with
//!   archival to a pluggable blob transport
//! - A derived, rebuildable cross-session search index
//! - A detect/run/fix verification pipeline gating agent-produced changes
//!
//! The crate is a library consumed by an orchestrator. It contains no GitHub
//! client, no LLM invocation, and no presentation logic; those arrive
//! through the trait seams in [`lifecycle`] and [`verify`].
//!
//! # Example
//!
//! ```no_run
//! use gitclaw_sessions::models::{Block, Role, Turn};
//! use gitclaw_sessions::store::TranscriptStore;
//! use std::path::PathBuf;
//!
//! let store = TranscriptStore::new(PathBuf::from("/var/lib/gitclaw"))?;
//! let handle = store.create();
//! store.append(&handle, &Turn::now(Role::User, vec![Block::text("hello")]))?;
//! println!("{} turns", store.read_all(&handle)?.len());
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod compressor;
pub mod config;
pub mod error;
pub mod index_storage;
pub mod indexer;
pub mod lifecycle;
pub mod models;
pub mod store;
pub mod utils;
pub mod verify;

// Re-export commonly used types
pub use compressor::{CompressionRecord, compress};
pub use config::{CompressionConfig, LifecycleConfig};
pub use error::{RestoreError, StoreError};
pub use indexer::{rebuild_index, search, update_entry};
pub use lifecycle::{ArchiveTransport, LifecycleManager, StatusProvider, classify};
pub use models::{Block, LifecycleState, Role, TranscriptHandle, Turn};
pub use store::TranscriptStore;
pub use verify::{detect_stages, run_pipeline};
