//! Snapshot store: one full copy of the tracked file per commit.
//!
//! Layout is `commits/<commit_id>/<original-filename>`. A commit directory
//! is created exactly once; snapshots are never rewritten.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::TapelineError;
use crate::store::{write_atomic, StagedFile};
use crate::types::ids::is_valid_commit_id;
use crate::types::CommitId;

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    commits_dir: PathBuf,
    file_name: String,
}

impl SnapshotStore {
    /// Store rooted at `commits_dir`, saving snapshots as `file_name`
    pub fn new(commits_dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            commits_dir: commits_dir.into(),
            file_name: file_name.into(),
        }
    }

    pub fn commits_dir(&self) -> &Path {
        &self.commits_dir
    }

    fn commit_dir(&self, commit_id: &str) -> PathBuf {
        self.commits_dir.join(commit_id)
    }

    /// Whether a snapshot directory exists for this commit
    pub fn contains(&self, commit_id: &str) -> bool {
        self.commit_dir(commit_id).is_dir()
    }

    /// Path of the stored file for a commit.
    ///
    /// Prefers the store's file name; a directory written under another
    /// name (the tracked file was renamed, or it came from a bundle) falls
    /// back to the single file it holds.
    pub fn snapshot_path(&self, commit_id: &str) -> Result<PathBuf, TapelineError> {
        let dir = self.commit_dir(commit_id);
        let preferred = dir.join(&self.file_name);
        if preferred.is_file() {
            return Ok(preferred);
        }
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TapelineError::SnapshotMissing(commit_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            if entry.file_type()?.is_file() && !name.to_string_lossy().starts_with('.') {
                return Ok(entry.path());
            }
        }
        Err(TapelineError::SnapshotMissing(commit_id.to_string()))
    }

    /// Store a snapshot. Fails if the commit directory already exists.
    pub fn put(&self, commit_id: &str, bytes: &[u8]) -> Result<(), TapelineError> {
        fs::create_dir_all(&self.commits_dir)?;
        let dir = self.commit_dir(commit_id);
        match fs::create_dir(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(TapelineError::SnapshotExists(commit_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        if let Err(e) = write_atomic(&dir.join(&self.file_name), bytes) {
            let _ = fs::remove_dir_all(&dir);
            return Err(e);
        }
        debug!(commit_id, size = bytes.len(), "Stored snapshot");
        Ok(())
    }

    /// Read a snapshot's bytes
    pub fn get(&self, commit_id: &str) -> Result<Vec<u8>, TapelineError> {
        let path = self.snapshot_path(commit_id)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TapelineError::SnapshotMissing(commit_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Copy a snapshot over `dest`. Returns the number of bytes restored.
    pub fn restore(&self, commit_id: &str, dest: &Path) -> Result<u64, TapelineError> {
        let src = self.snapshot_path(commit_id)?;
        let size = fs::metadata(&src)?.len();
        StagedFile::copy(&src, dest)?.commit()?;
        debug!(commit_id, dest = %dest.display(), size, "Restored snapshot");
        Ok(size)
    }

    /// Remove a snapshot directory. Deleting an absent snapshot succeeds.
    pub fn delete(&self, commit_id: &str) -> Result<(), TapelineError> {
        match fs::remove_dir_all(self.commit_dir(commit_id)) {
            Ok(()) => {
                debug!(commit_id, "Deleted snapshot");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Ids of every stored snapshot, sorted
    pub fn list(&self) -> Result<Vec<CommitId>, TapelineError> {
        let entries = match fs::read_dir(&self.commits_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_valid_commit_id(&name) {
                ids.push(name);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Copy one commit directory from another store into this one.
    /// Returns false when the snapshot was already present.
    pub fn copy_from(&self, other: &SnapshotStore, commit_id: &str) -> Result<bool, TapelineError> {
        if self.contains(commit_id) {
            return Ok(false);
        }
        let src = other.snapshot_path(commit_id)?;
        let file_name = src
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_name.clone());
        fs::create_dir_all(&self.commits_dir)?;
        let dir = self.commit_dir(commit_id);
        fs::create_dir(&dir)?;
        if let Err(e) = StagedFile::copy(&src, &dir.join(&file_name)).and_then(|s| s.commit()) {
            let _ = fs::remove_dir_all(&dir);
            return Err(e);
        }
        debug!(commit_id, "Copied snapshot");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store(dir: &Path) -> SnapshotStore {
        SnapshotStore::new(dir.join("commits"), "beat.flp")
    }

    #[test]
    fn test_put_get() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        store.put("abcd1234", b"pattern one").unwrap();

        assert!(store.contains("abcd1234"));
        assert!(dir.path().join("commits/abcd1234/beat.flp").is_file());
        assert_eq!(store.get("abcd1234").unwrap(), b"pattern one");
    }

    #[test]
    fn test_put_twice_fails() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.put("abcd1234", b"one").unwrap();

        let err = store.put("abcd1234", b"two").unwrap_err();
        assert!(matches!(err, TapelineError::SnapshotExists(id) if id == "abcd1234"));
        assert_eq!(store.get("abcd1234").unwrap(), b"one");
    }

    #[test]
    fn test_get_missing() {
        let dir = tempdir().unwrap();
        let err = store(dir.path()).get("deadbeef").unwrap_err();
        assert!(matches!(err, TapelineError::SnapshotMissing(_)));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.put("abcd1234", b"one").unwrap();

        store.delete("abcd1234").unwrap();
        store.delete("abcd1234").unwrap();
        assert!(!store.contains("abcd1234"));
    }

    #[test]
    fn test_restore_overwrites_destination() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.put("abcd1234", b"saved state").unwrap();
        let dest = dir.path().join("beat.flp");
        std::fs::write(&dest, b"unsaved edits that are longer").unwrap();

        let size = store.restore("abcd1234", &dest).unwrap();

        assert_eq!(size, 11);
        assert_eq!(std::fs::read(&dest).unwrap(), b"saved state");
    }

    #[test]
    fn test_renamed_file_falls_back_to_stored_name() {
        let dir = tempdir().unwrap();
        store(dir.path()).put("abcd1234", b"old name").unwrap();

        let renamed = SnapshotStore::new(dir.path().join("commits"), "beat-v2.flp");
        assert_eq!(renamed.get("abcd1234").unwrap(), b"old name");
    }

    #[test]
    fn test_list_skips_foreign_entries() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.put("bbbb2222", b"b").unwrap();
        store.put("aaaa1111", b"a").unwrap();
        std::fs::create_dir_all(dir.path().join("commits/not-a-commit")).unwrap();
        std::fs::write(dir.path().join("commits/README"), b"x").unwrap();

        assert_eq!(store.list().unwrap(), vec!["aaaa1111", "bbbb2222"]);
    }

    #[test]
    fn test_copy_from_other_store() {
        let src_dir = tempdir().unwrap();
        let dst_dir = tempdir().unwrap();
        let src = store(src_dir.path());
        let dst = store(dst_dir.path());
        src.put("abcd1234", b"shared").unwrap();

        assert!(dst.copy_from(&src, "abcd1234").unwrap());
        assert!(!dst.copy_from(&src, "abcd1234").unwrap());
        assert_eq!(dst.get("abcd1234").unwrap(), b"shared");
    }
}
