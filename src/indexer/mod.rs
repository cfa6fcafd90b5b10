//! The cross-session index: derived summaries and search over them.
//!
//! Every entry is a pure function of one transcript's turns, so the index
//! can be updated incrementally after each append or rebuilt from scratch
//! with identical results. Losing it is never data loss - only slower
//! search until it is rebuilt.

pub mod builder;
pub mod search;

pub use builder::{build_entry, rebuild_index, update_entry};
pub use search::search;
