pub mod fs;
pub mod text;

pub use fs::{atomic_write, file_size};
pub use text::{head_tail_preview, line_count, tail_bytes, truncate_bytes};
