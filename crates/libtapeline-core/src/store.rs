//! Whole-document persistence for `metadata.json` and `commit_log.json`.
//!
//! Documents are never written in place. Each save serializes to a hidden
//! temp file in the same directory, syncs it, and renames it over the
//! target, so a crash leaves either the old or the new document on disk.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{commit_log_path, commits_dir, metadata_path};
use crate::error::TapelineError;
use crate::types::{CommitLog, ProjectMetadata};

/// A fully written temp file waiting to be renamed over its destination
pub(crate) struct StagedFile {
    tmp: PathBuf,
    dest: PathBuf,
}

impl StagedFile {
    /// Write `bytes` next to `dest` without touching `dest` itself
    pub(crate) fn write(dest: &Path, bytes: &[u8]) -> Result<Self, TapelineError> {
        let tmp = temp_path_for(dest);
        let result = (|| -> std::io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()
        })();
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(Self {
            tmp,
            dest: dest.to_path_buf(),
        })
    }

    /// Copy `src` next to `dest` without touching `dest` itself
    pub(crate) fn copy(src: &Path, dest: &Path) -> Result<Self, TapelineError> {
        let tmp = temp_path_for(dest);
        if let Err(e) = fs::copy(src, &tmp) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(Self {
            tmp,
            dest: dest.to_path_buf(),
        })
    }

    pub(crate) fn commit(self) -> Result<(), TapelineError> {
        if let Err(e) = fs::rename(&self.tmp, &self.dest) {
            let _ = fs::remove_file(&self.tmp);
            return Err(e.into());
        }
        Ok(())
    }

    pub(crate) fn discard(self) {
        let _ = fs::remove_file(&self.tmp);
    }
}

fn temp_path_for(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    dest.with_file_name(format!(".{}.tmp", name))
}

/// Write a file atomically (temp file + rename)
pub(crate) fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<(), TapelineError> {
    StagedFile::write(dest, bytes)?.commit()
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, TapelineError> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Load/save interface for the two project documents
#[derive(Debug, Clone)]
pub struct MetadataStore {
    vcs_dir: PathBuf,
}

impl MetadataStore {
    pub fn new(vcs_dir: impl Into<PathBuf>) -> Self {
        Self {
            vcs_dir: vcs_dir.into(),
        }
    }

    pub fn vcs_dir(&self) -> &Path {
        &self.vcs_dir
    }

    /// Whether the project documents have been created
    pub fn exists(&self) -> bool {
        metadata_path(&self.vcs_dir).is_file()
    }

    /// Create the directory layout and write fresh documents
    pub fn init(&self, metadata: &ProjectMetadata) -> Result<(), TapelineError> {
        fs::create_dir_all(commits_dir(&self.vcs_dir))?;
        self.save(Some(metadata), Some(&CommitLog::new()))?;
        debug!(vcs_dir = %self.vcs_dir.display(), "Initialized project documents");
        Ok(())
    }

    /// Load the metadata document
    pub fn load_metadata(&self) -> Result<ProjectMetadata, TapelineError> {
        let path = metadata_path(&self.vcs_dir);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TapelineError::NotInitialized(self.vcs_dir.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Load the commit log. A missing log reads as empty.
    pub fn load_commit_log(&self) -> Result<CommitLog, TapelineError> {
        let path = commit_log_path(&self.vcs_dir);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(CommitLog::new()),
            Err(e) => return Err(e.into()),
        };
        let mut log: CommitLog = serde_json::from_slice(&bytes)?;
        for (id, record) in log.iter_mut() {
            if record.id.is_empty() {
                record.id = id.clone();
            }
        }
        Ok(log)
    }

    /// Load both documents
    pub fn load(&self) -> Result<(ProjectMetadata, CommitLog), TapelineError> {
        Ok((self.load_metadata()?, self.load_commit_log()?))
    }

    pub fn save_metadata(&self, metadata: &ProjectMetadata) -> Result<(), TapelineError> {
        self.save(Some(metadata), None)
    }

    pub fn save_commit_log(&self, log: &CommitLog) -> Result<(), TapelineError> {
        self.save(None, Some(log))
    }

    /// Persist one or both documents.
    ///
    /// Both documents are serialized and staged before either is renamed
    /// into place; a serialization or write failure leaves the on-disk
    /// documents untouched.
    pub fn save(
        &self,
        metadata: Option<&ProjectMetadata>,
        log: Option<&CommitLog>,
    ) -> Result<(), TapelineError> {
        let staged_log = match log {
            Some(log) => Some(StagedFile::write(
                &commit_log_path(&self.vcs_dir),
                &to_pretty_json(log)?,
            )?),
            None => None,
        };

        let staged_meta = match metadata.map(to_pretty_json).transpose() {
            Ok(Some(bytes)) => match StagedFile::write(&metadata_path(&self.vcs_dir), &bytes) {
                Ok(staged) => Some(staged),
                Err(e) => {
                    if let Some(s) = staged_log {
                        s.discard();
                    }
                    return Err(e);
                }
            },
            Ok(None) => None,
            Err(e) => {
                if let Some(s) = staged_log {
                    s.discard();
                }
                return Err(e);
            }
        };

        if let Some(staged) = staged_log {
            if let Err(e) = staged.commit() {
                if let Some(s) = staged_meta {
                    s.discard();
                }
                return Err(e);
            }
        }
        if let Some(staged) = staged_meta {
            staged.commit().map_err(|e| {
                warn!(error = %e, "Commit log saved but metadata rename failed");
                e
            })?;
        }

        debug!(
            metadata = metadata.is_some(),
            commit_log = log.is_some(),
            "Saved project documents"
        );
        Ok(())
    }
}
