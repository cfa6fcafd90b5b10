use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::utils::atomic_write;

/// Write/read/remove named byte blobs in a namespace disjoint from the
/// primary working set.
///
/// Locations are opaque strings minted by the caller; the same lifecycle
/// code works against a separate branch, a bucket, or a directory tree.
/// `remove` exists for purge; a transport that cannot delete may return an
/// error and purge degrades to orphaning the blob.
pub trait ArchiveTransport {
    fn write(&self, location: &str, bytes: &[u8]) -> Result<()>;

    /// `Ok(None)` when no blob exists at `location`.
    fn read(&self, location: &str) -> Result<Option<Vec<u8>>>;

    fn remove(&self, location: &str) -> Result<()>;
}

/// Directory-backed transport: each location is a relative file path under
/// the archive root.
#[derive(Debug, Clone)]
pub struct DirTransport {
    root: PathBuf,
}

impl DirTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, location: &str) -> PathBuf {
        self.root.join(location)
    }
}

impl ArchiveTransport for DirTransport {
    fn write(&self, location: &str, bytes: &[u8]) -> Result<()> {
        atomic_write(&self.path_for(location), bytes)
    }

    fn read(&self, location: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(location);
        if !path.exists() {
            return Ok(None);
        }
        let bytes =
            fs::read(&path).with_context(|| format!("failed to read blob {}", path.display()))?;
        Ok(Some(bytes))
    }

    fn remove(&self, location: &str) -> Result<()> {
        let path = self.path_for(location);
        fs::remove_file(&path)
            .with_context(|| format!("failed to remove blob {}", path.display()))
    }
}
