//! Branch bundles: a directory holding both project documents plus the
//! snapshots of one branch, used to move work between machines.
//!
//! Merging a bundle is additive. Branch lists are unioned, per-branch
//! history and exclusion entries are replaced by the incoming ones, and
//! incoming commit records win over local ones with the same id.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::branch::verify_branch_graph;
use crate::config::{commits_dir, metadata_path};
use crate::engine::{Clock, VersionEngine};
use crate::error::TapelineError;
use crate::snapshot::SnapshotStore;
use crate::store::MetadataStore;
use crate::types::ids::is_valid_commit_id;

/// Result of exporting a bundle
#[derive(Debug, Clone, Serialize)]
pub struct BundleStats {
    pub branch: String,
    /// Commits owned by the branch
    pub commits: usize,
    /// Snapshots written into the bundle
    pub snapshots: usize,
    pub bytes: u64,
}

/// Result of importing a bundle
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeStats {
    pub branches_added: Vec<String>,
    pub commits_added: usize,
    pub commits_updated: usize,
    pub snapshots_copied: usize,
    /// Incoming commits with a snapshot in neither place
    pub snapshots_unavailable: usize,
}

impl<C: Clock> VersionEngine<C> {
    /// Write both documents and the snapshots of `branch` into `dest_dir`
    pub fn export_bundle(&self, branch: &str, dest_dir: &Path) -> Result<BundleStats, TapelineError> {
        let (metadata, log) = self.store().load()?;
        if !metadata.has_branch(branch) {
            return Err(TapelineError::BranchNotFound(branch.to_string()));
        }
        if metadata_path(dest_dir).exists() {
            return Err(TapelineError::InvalidArgs(format!(
                "'{}' already contains a bundle",
                dest_dir.display()
            )));
        }

        let bundle_store = MetadataStore::new(dest_dir);
        let bundle_snapshots = SnapshotStore::new(
            commits_dir(dest_dir),
            self.tracked_file()
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        fs::create_dir_all(bundle_snapshots.commits_dir())?;

        let mut stats = BundleStats {
            branch: branch.to_string(),
            commits: 0,
            snapshots: 0,
            bytes: 0,
        };
        for record in log.values().filter(|c| c.branch == branch) {
            stats.commits += 1;
            if bundle_snapshots.copy_from(self.snapshots(), &record.id)? {
                stats.snapshots += 1;
                stats.bytes += fs::metadata(bundle_snapshots.snapshot_path(&record.id)?)?.len();
            }
        }
        bundle_store.save(Some(&metadata), Some(&log))?;

        info!(
            branch,
            dest = %dest_dir.display(),
            commits = stats.commits,
            bytes = stats.bytes,
            "Exported bundle"
        );
        Ok(stats)
    }

    /// Merge a bundle directory into this project
    pub fn import_bundle(&self, src_dir: &Path) -> Result<MergeStats, TapelineError> {
        let bundle_store = MetadataStore::new(src_dir);
        let (incoming_meta, incoming_log) = bundle_store.load()?;

        if let Some(bad) = incoming_log.keys().find(|id| !is_valid_commit_id(id)) {
            return Err(TapelineError::InvalidArgs(format!(
                "bundle contains malformed commit id '{}'",
                bad
            )));
        }

        let (mut metadata, mut log) = self.store().load()?;
        let mut stats = MergeStats::default();

        for branch in &incoming_meta.branches {
            if !metadata.has_branch(branch) {
                metadata.branches.push(branch.clone());
                stats.branches_added.push(branch.clone());
            }
        }
        for (branch, record) in &incoming_meta.branch_history {
            metadata.branch_history.insert(branch.clone(), record.clone());
        }
        for (branch, excluded) in &incoming_meta.branch_exclusions {
            metadata
                .branch_exclusions
                .insert(branch.clone(), excluded.clone());
        }
        verify_branch_graph(&metadata.branch_history)?;

        for (id, record) in &incoming_log {
            match log.insert(id.clone(), record.clone()) {
                None => stats.commits_added += 1,
                Some(previous) if previous != *record => stats.commits_updated += 1,
                Some(_) => {}
            }
        }

        let bundle_snapshots = SnapshotStore::new(commits_dir(src_dir), String::new());
        let mut copied = Vec::new();
        for id in incoming_log.keys() {
            if self.snapshots().contains(id) {
                continue;
            }
            if !bundle_snapshots.contains(id) {
                stats.snapshots_unavailable += 1;
                continue;
            }
            if let Err(e) = self.snapshots().copy_from(&bundle_snapshots, id) {
                self.discard_snapshots(&copied);
                return Err(e);
            }
            copied.push(id.clone());
        }
        stats.snapshots_copied = copied.len();

        if let Err(e) = self.store().save(Some(&metadata), Some(&log)) {
            self.discard_snapshots(&copied);
            return Err(e);
        }

        if stats.snapshots_unavailable > 0 {
            warn!(
                count = stats.snapshots_unavailable,
                "Imported commits without snapshots"
            );
        }
        info!(
            src = %src_dir.display(),
            branches_added = stats.branches_added.len(),
            commits_added = stats.commits_added,
            snapshots_copied = stats.snapshots_copied,
            "Imported bundle"
        );
        Ok(stats)
    }

    fn discard_snapshots(&self, ids: &[String]) {
        for id in ids {
            if let Err(e) = self.snapshots().delete(id) {
                warn!(commit_id = %id, error = %e, "Failed to roll back copied snapshot");
            } else {
                debug!(commit_id = %id, "Rolled back copied snapshot");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FixedClock;
    use crate::types::Timestamp;
    use tempfile::tempdir;

    #[test]
    fn test_export_rejects_unknown_branch() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("beat.flp");
        std::fs::write(&file, b"v1").unwrap();
        let clock = FixedClock::new(Timestamp::parse("2024-01-01T00:00:00Z").unwrap());
        let engine = VersionEngine::open_with_clock(&file, &clock).unwrap();

        let err = engine
            .export_bundle("nope", &dir.path().join("bundle"))
            .unwrap_err();
        assert!(matches!(err, TapelineError::BranchNotFound(_)));
    }

    #[test]
    fn test_import_rejects_path_like_ids() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("beat.flp");
        std::fs::write(&file, b"v1").unwrap();
        let engine = VersionEngine::open(&file).unwrap();

        let bundle = dir.path().join("bundle");
        std::fs::create_dir_all(&bundle).unwrap();
        std::fs::copy(
            dir.path().join(".tapeline/metadata.json"),
            bundle.join("metadata.json"),
        )
        .unwrap();
        std::fs::write(
            bundle.join("commit_log.json"),
            r#"{"../../etc": {"message": "m", "timestamp": "2024-01-01T00:00:00Z", "branch": "main"}}"#,
        )
        .unwrap();

        let err = engine.import_bundle(&bundle).unwrap_err();
        assert!(matches!(err, TapelineError::InvalidArgs(_)));
    }
}
