use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Lines, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use crate::error::StoreError;
use crate::models::{Block, TranscriptHandle, Turn};

const SESSIONS_DIR: &str = "sessions";
const BACKUPS_DIR: &str = "backups";
const TRANSCRIPT_EXT: &str = "jsonl";

/// Append-only store of transcript files under `<root>/sessions/`.
///
/// One transcript is one JSONL file, one [`Turn`] per line. Turns are
/// immutable once appended; the only sanctioned mutation is
/// [`rewrite_historical`](TranscriptStore::rewrite_historical), which
/// replaces block payloads in place without touching structure.
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    root: PathBuf,
}

impl TranscriptStore {
    /// Open a store rooted at `root`, creating the working-set directories
    /// if missing.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(root.join(SESSIONS_DIR))?;
        fs::create_dir_all(root.join(BACKUPS_DIR))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a transcript file in the primary working set.
    pub fn path_of(&self, handle: &TranscriptHandle) -> PathBuf {
        self.root.join(SESSIONS_DIR).join(format!("{}.{}", handle, TRANSCRIPT_EXT))
    }

    fn backup_path_of(&self, handle: &TranscriptHandle) -> PathBuf {
        self.root.join(BACKUPS_DIR).join(format!("{}.{}", handle, TRANSCRIPT_EXT))
    }

    /// Allocate a fresh handle. No file exists until the first append.
    pub fn create(&self) -> TranscriptHandle {
        TranscriptHandle::generate()
    }

    pub fn exists(&self, handle: &TranscriptHandle) -> bool {
        self.path_of(handle).exists()
    }

    /// Append one turn at the end of the transcript.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidTurn`] if the turn violates the block
    /// invariants (empty block list, empty tool name).
    pub fn append(&self, handle: &TranscriptHandle, turn: &Turn) -> Result<(), StoreError> {
        turn.validate().map_err(StoreError::InvalidTurn)?;

        let line = serde_json::to_string(turn)?;
        let mut file = OpenOptions::new().create(true).append(true).open(self.path_of(handle))?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }

    /// Lazy, restartable iterator over the transcript's turns.
    ///
    /// Re-reading from the start is always possible by calling this again;
    /// the iterator is not a destructive stream.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the transcript has no file yet.
    /// Individual items are [`StoreError::IntegrityViolation`] when a stored
    /// line no longer parses - our own files are not foreign input, so a bad
    /// line means corruption, not something to skip.
    pub fn read_turns(&self, handle: &TranscriptHandle) -> Result<TurnIter, StoreError> {
        let path = self.path_of(handle);
        if !path.exists() {
            return Err(StoreError::NotFound(path));
        }
        let file = File::open(&path)?;
        Ok(TurnIter { lines: BufReader::new(file).lines(), path, line_num: 0 })
    }

    /// Read every turn into memory.
    pub fn read_all(&self, handle: &TranscriptHandle) -> Result<Vec<Turn>, StoreError> {
        self.read_turns(handle)?.collect()
    }

    /// Apply `block_transform` to blocks within turns where `turn_predicate`
    /// holds, rewriting the file atomically.
    ///
    /// The transform receives each block and returns `Some(replacement)` or
    /// `None` to leave it untouched. Returns the number of blocks replaced.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IntegrityViolation`] if a replacement changes
    /// the block's type tag. Turn count, order, roles, and timestamps cannot
    /// change through this interface; the per-block check closes the one
    /// hole the signature leaves open.
    pub fn rewrite_historical<P, T>(
        &self,
        handle: &TranscriptHandle,
        turn_predicate: P,
        block_transform: T,
    ) -> Result<usize, StoreError>
    where
        P: Fn(usize, &Turn) -> bool,
        T: Fn(&Block) -> Option<Block>,
    {
        let mut turns = self.read_all(handle)?;
        let mut replaced = 0;

        for (ordinal, turn) in turns.iter_mut().enumerate() {
            if !turn_predicate(ordinal, turn) {
                continue;
            }
            for block in turn.content.iter_mut() {
                if let Some(replacement) = block_transform(block) {
                    if !replacement.same_kind(block) {
                        return Err(StoreError::IntegrityViolation(format!(
                            "transform changed block type {} -> {} in turn {}",
                            block.kind(),
                            replacement.kind(),
                            ordinal
                        )));
                    }
                    *block = replacement;
                    replaced += 1;
                }
            }
        }

        if replaced > 0 {
            self.write_turns(handle, &turns)?;
        }
        Ok(replaced)
    }

    /// Serialize `turns` and atomically replace the transcript file.
    fn write_turns(&self, handle: &TranscriptHandle, turns: &[Turn]) -> Result<(), StoreError> {
        let mut buf = Vec::new();
        for turn in turns {
            serde_json::to_writer(&mut buf, turn)?;
            buf.push(b'\n');
        }
        crate::utils::atomic_write(&self.path_of(handle), &buf)
            .map_err(|e| StoreError::IntegrityViolation(format!("atomic rewrite failed: {e:#}")))
    }

    /// Size of the transcript file in bytes.
    pub fn size_of(&self, handle: &TranscriptHandle) -> Result<u64, StoreError> {
        let path = self.path_of(handle);
        if !path.exists() {
            return Err(StoreError::NotFound(path));
        }
        Ok(fs::metadata(path)?.len())
    }

    /// Modification time of the transcript file.
    pub fn last_modified(&self, handle: &TranscriptHandle) -> Result<DateTime<Utc>, StoreError> {
        let path = self.path_of(handle);
        if !path.exists() {
            return Err(StoreError::NotFound(path));
        }
        let mtime = fs::metadata(path)?.modified()?;
        Ok(DateTime::<Utc>::from(mtime))
    }

    /// Raw file bytes, used by archival to copy the transcript verbatim.
    pub fn raw_bytes(&self, handle: &TranscriptHandle) -> Result<Vec<u8>, StoreError> {
        let path = self.path_of(handle);
        if !path.exists() {
            return Err(StoreError::NotFound(path));
        }
        Ok(fs::read(path)?)
    }

    /// Write raw transcript bytes, used by restore to bring an archived
    /// transcript back into the working set.
    pub fn write_raw(&self, handle: &TranscriptHandle, bytes: &[u8]) -> Result<(), StoreError> {
        crate::utils::atomic_write(&self.path_of(handle), bytes)
            .map_err(|e| StoreError::IntegrityViolation(format!("raw write failed: {e:#}")))
    }

    /// Remove the transcript from the primary working set.
    pub fn remove(&self, handle: &TranscriptHandle) -> Result<(), StoreError> {
        let path = self.path_of(handle);
        if !path.exists() {
            return Err(StoreError::NotFound(path));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    /// All transcript handles currently in the primary working set.
    pub fn list_handles(&self) -> Vec<TranscriptHandle> {
        let mut handles = Vec::new();
        for entry in WalkDir::new(self.root.join(SESSIONS_DIR))
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(TRANSCRIPT_EXT)
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                handles.push(TranscriptHandle::from(stem));
            }
        }
        handles.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        handles
    }

    /// Copy the transcript file aside before its first compression.
    ///
    /// Best-effort tier: callers log and continue on failure.
    pub fn backup(&self, handle: &TranscriptHandle) -> anyhow::Result<PathBuf> {
        use anyhow::Context;
        let source = self.path_of(handle);
        let target = self.backup_path_of(handle);
        fs::copy(&source, &target)
            .with_context(|| format!("failed to back up {}", source.display()))?;
        Ok(target)
    }

    pub fn has_backup(&self, handle: &TranscriptHandle) -> bool {
        self.backup_path_of(handle).exists()
    }
}

/// Lazy iterator over a transcript's turns. See
/// [`TranscriptStore::read_turns`].
#[derive(Debug)]
pub struct TurnIter {
    lines: Lines<BufReader<File>>,
    path: PathBuf,
    line_num: usize,
}

impl Iterator for TurnIter {
    type Item = Result<Turn, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(StoreError::Io(e))),
            };
            self.line_num += 1;

            if line.trim().is_empty() {
                continue;
            }

            return Some(serde_json::from_str::<Turn>(&line).map_err(|e| {
                StoreError::IntegrityViolation(format!(
                    "malformed turn at line {} of {}: {}",
                    self.line_num,
                    self.path.display(),
                    e
                ))
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::models::Role;

    fn store() -> (TempDir, TranscriptStore) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = TranscriptStore::new(dir.path()).unwrap();
        (dir, store)
    }

    fn text_turn(role: Role, text: &str) -> Turn {
        Turn::now(role, vec![Block::text(text)])
    }

    #[test]
    fn test_append_and_read_roundtrip() {
        let (_dir, store) = store();
        let handle = store.create();

        store.append(&handle, &text_turn(Role::User, "hello")).unwrap();
        store.append(&handle, &text_turn(Role::Assistant, "hi")).unwrap();

        let turns = store.read_all(&handle).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Assistant);
    }

    #[test]
    fn test_append_rejects_empty_block_list() {
        let (_dir, store) = store();
        let handle = store.create();
        let err = store.append(&handle, &Turn::now(Role::User, vec![])).unwrap_err();
        assert!(matches!(err, StoreError::InvalidTurn(_)));
        assert!(!store.exists(&handle));
    }

    #[test]
    fn test_read_turns_is_restartable() {
        let (_dir, store) = store();
        let handle = store.create();
        store.append(&handle, &text_turn(Role::User, "one")).unwrap();

        let first: Vec<_> = store.read_turns(&handle).unwrap().collect();
        let second: Vec<_> = store.read_turns(&handle).unwrap().collect();
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn test_read_missing_transcript() {
        let (_dir, store) = store();
        let err = store.read_turns(&TranscriptHandle::from("nope")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_read_surfaces_corruption() {
        let (_dir, store) = store();
        let handle = store.create();
        store.append(&handle, &text_turn(Role::User, "good")).unwrap();
        fs::write(
            store.path_of(&handle),
            "not json at all\n",
        )
        .unwrap();

        let result: Result<Vec<_>, _> = store.read_turns(&handle).unwrap().collect();
        assert!(matches!(result.unwrap_err(), StoreError::IntegrityViolation(_)));
    }

    #[test]
    fn test_rewrite_historical_replaces_only_matching_turns() {
        let (_dir, store) = store();
        let handle = store.create();
        for i in 0..4 {
            store.append(&handle, &text_turn(Role::User, &format!("turn {}", i))).unwrap();
        }

        let replaced = store
            .rewrite_historical(
                &handle,
                |ordinal, _| ordinal < 2,
                |block| match block {
                    Block::Text { .. } => Some(Block::text("rewritten")),
                    _ => None,
                },
            )
            .unwrap();

        assert_eq!(replaced, 2);
        let turns = store.read_all(&handle).unwrap();
        assert_eq!(turns[0].content[0], Block::text("rewritten"));
        assert_eq!(turns[3].content[0], Block::text("turn 3"));
    }

    #[test]
    fn test_rewrite_historical_preserves_roles_and_timestamps() {
        let (_dir, store) = store();
        let handle = store.create();
        store.append(&handle, &text_turn(Role::User, "a")).unwrap();
        store.append(&handle, &text_turn(Role::Assistant, "b")).unwrap();
        let before = store.read_all(&handle).unwrap();

        store
            .rewrite_historical(&handle, |_, _| true, |b| match b {
                Block::Text { .. } => Some(Block::text("x")),
                _ => None,
            })
            .unwrap();

        let after = store.read_all(&handle).unwrap();
        assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(after.iter()) {
            assert_eq!(b.role, a.role);
            assert_eq!(b.timestamp, a.timestamp);
        }
    }

    #[test]
    fn test_rewrite_historical_rejects_type_change() {
        let (_dir, store) = store();
        let handle = store.create();
        store
            .append(&handle, &Turn::now(Role::Assistant, vec![Block::tool_use("t1", "bash", json!({"cmd": "ls"}))]))
            .unwrap();

        let err = store
            .rewrite_historical(&handle, |_, _| true, |_| Some(Block::text("swapped")))
            .unwrap_err();
        assert!(matches!(err, StoreError::IntegrityViolation(_)));

        // File unchanged after the failed rewrite
        let turns = store.read_all(&handle).unwrap();
        assert_eq!(turns[0].content[0].kind(), "tool_use");
    }

    #[test]
    fn test_list_handles() {
        let (_dir, store) = store();
        let h1 = store.create();
        let h2 = store.create();
        store.append(&h1, &text_turn(Role::User, "a")).unwrap();
        store.append(&h2, &text_turn(Role::User, "b")).unwrap();

        let handles = store.list_handles();
        assert_eq!(handles.len(), 2);
        assert!(handles.contains(&h1));
        assert!(handles.contains(&h2));
    }

    #[test]
    fn test_backup_and_raw_roundtrip() {
        let (_dir, store) = store();
        let handle = store.create();
        store.append(&handle, &text_turn(Role::User, "keep me")).unwrap();

        assert!(!store.has_backup(&handle));
        store.backup(&handle).unwrap();
        assert!(store.has_backup(&handle));

        let bytes = store.raw_bytes(&handle).unwrap();
        store.remove(&handle).unwrap();
        assert!(!store.exists(&handle));

        store.write_raw(&handle, &bytes).unwrap();
        assert_eq!(store.read_all(&handle).unwrap().len(), 1);
    }
}
