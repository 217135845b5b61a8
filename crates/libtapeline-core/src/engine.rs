//! The versioning engine: commit, checkout, branching and deletion.
//!
//! Every operation loads both documents, mutates them in memory and saves
//! them back as a whole. Nothing is cached between calls, so several
//! engines bound to the same project observe each other's writes.

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::branch::{verify_branch_graph, BranchView};
use crate::config::{commits_dir, load_repo_config, vcs_dir_for, RepoConfig};
use crate::error::TapelineError;
use crate::snapshot::SnapshotStore;
use crate::store::MetadataStore;
use crate::types::ids::compute_commit_id;
use crate::types::metadata::SizeSample;
use crate::types::{
    BranchRecord, CommitId, CommitLog, CommitRecord, ProjectMetadata, Timestamp, MAIN_BRANCH,
};

/// Source of wall-clock time for new commits and forks
pub trait Clock {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from(Utc::now())
    }
}

/// Manually driven clock for deterministic tests
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Cell<Timestamp>,
}

impl FixedClock {
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    pub fn set(&self, now: Timestamp) {
        self.now.set(now);
    }

    pub fn advance(&self, by: chrono::Duration) {
        let next = self.now.get().as_datetime() + by;
        self.now.set(Timestamp::from(next));
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// Summary of a project's state
#[derive(Debug, Clone, Serialize)]
pub struct ProjectStatus {
    pub project_name: String,
    pub tracked_file: PathBuf,
    pub tracked_file_present: bool,
    pub current_branch: String,
    pub branches: Vec<String>,
    pub total_commits: u64,
    pub visible_commits: usize,
    pub head: Option<CommitId>,
    pub created_at: Timestamp,
    pub last_modified: Timestamp,
    pub latest_size_bytes: Option<u64>,
}

/// Branch names must be usable as a single path-free token
pub fn validate_branch_name(name: &str) -> Result<(), TapelineError> {
    if name.is_empty() {
        return Err(TapelineError::InvalidArgs(
            "branch name must not be empty".to_string(),
        ));
    }
    if name
        .chars()
        .any(|c| c.is_whitespace() || c == '/' || c == '\\' || c.is_control())
    {
        return Err(TapelineError::InvalidArgs(format!(
            "branch name '{}' must not contain whitespace or path separators",
            name
        )));
    }
    Ok(())
}

/// Versioning engine bound to one tracked file
pub struct VersionEngine<C: Clock = SystemClock> {
    tracked_file: PathBuf,
    store: MetadataStore,
    snapshots: SnapshotStore,
    id_length: usize,
    clock: C,
}

impl VersionEngine<SystemClock> {
    /// Open (and on first use, initialize) the project for `tracked_file`
    pub fn open(tracked_file: impl AsRef<Path>) -> Result<Self, TapelineError> {
        Self::open_with_clock(tracked_file, SystemClock)
    }
}

impl<C: Clock> VersionEngine<C> {
    pub fn open_with_clock(tracked_file: impl AsRef<Path>, clock: C) -> Result<Self, TapelineError> {
        let tracked_file = tracked_file.as_ref().to_path_buf();
        let file_name = tracked_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                TapelineError::InvalidArgs(format!(
                    "'{}' does not name a file",
                    tracked_file.display()
                ))
            })?;

        let vcs_dir = vcs_dir_for(&tracked_file);
        let config = load_repo_config(&vcs_dir)?.unwrap_or_default();
        let id_length = config.id_length()?;

        let store = MetadataStore::new(&vcs_dir);
        let snapshots = SnapshotStore::new(commits_dir(&vcs_dir), file_name);

        if !store.exists() {
            let project_name = tracked_file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            store.init(&ProjectMetadata::new(project_name, clock.now()))?;
            info!(vcs_dir = %vcs_dir.display(), "Initialized project");
        }

        Ok(Self {
            tracked_file,
            store,
            snapshots,
            id_length,
            clock,
        })
    }

    pub fn tracked_file(&self) -> &Path {
        &self.tracked_file
    }

    pub fn vcs_dir(&self) -> &Path {
        self.store.vcs_dir()
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// Repo config as currently on disk
    pub fn config(&self) -> Result<RepoConfig, TapelineError> {
        Ok(load_repo_config(self.vcs_dir())?.unwrap_or_default())
    }

    fn file_name(&self) -> String {
        self.tracked_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// A timestamp strictly after everything already recorded
    fn issue_timestamp(&self, metadata: &ProjectMetadata, log: &CommitLog) -> Timestamp {
        let latest = log
            .values()
            .map(|c| c.timestamp)
            .fold(metadata.latest_timestamp(), Timestamp::max);
        let now = self.clock.now();
        if now > latest {
            now
        } else {
            latest.succ()
        }
    }

    fn read_tracked_file(&self) -> Result<Vec<u8>, TapelineError> {
        match fs::read(&self.tracked_file) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TapelineError::SourceMissing(self.tracked_file.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Record a new commit on the current branch, in memory and in the
    /// snapshot store. The caller persists the documents.
    fn record_commit(
        &self,
        metadata: &mut ProjectMetadata,
        log: &mut CommitLog,
        message: &str,
        content: &[u8],
    ) -> Result<CommitRecord, TapelineError> {
        let timestamp = self.issue_timestamp(metadata, log);
        let id = compute_commit_id(content, &timestamp, self.id_length);
        if log.contains_key(&id) {
            return Err(TapelineError::SnapshotExists(id));
        }
        self.snapshots.put(&id, content)?;

        let branch = metadata.current_branch.clone();
        let record = CommitRecord {
            id: id.clone(),
            message: message.to_string(),
            timestamp,
            file: self.file_name(),
            branch: branch.clone(),
        };
        log.insert(id.clone(), record.clone());

        let project_created = metadata.created_at;
        metadata
            .branch_history
            .entry(branch.clone())
            .or_insert_with(|| {
                if branch == MAIN_BRANCH {
                    BranchRecord {
                        parent: None,
                        created_at: project_created,
                        commit_ids: Vec::new(),
                    }
                } else {
                    BranchRecord {
                        parent: Some(MAIN_BRANCH.to_string()),
                        created_at: timestamp,
                        commit_ids: Vec::new(),
                    }
                }
            })
            .commit_ids
            .push(id);
        metadata.total_commits += 1;
        metadata.project_stats.size_history.push(SizeSample {
            timestamp,
            size_bytes: content.len() as u64,
        });
        metadata.last_modified = timestamp;

        Ok(record)
    }

    /// Save both documents; a failure removes the snapshot just written
    fn save_after_commit(
        &self,
        metadata: &ProjectMetadata,
        log: &CommitLog,
        new_commit: &str,
    ) -> Result<(), TapelineError> {
        if let Err(e) = self.store.save(Some(metadata), Some(log)) {
            if let Err(cleanup) = self.snapshots.delete(new_commit) {
                warn!(commit_id = new_commit, error = %cleanup, "Failed to remove orphaned snapshot");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Snapshot the tracked file onto the current branch
    pub fn commit(&self, message: &str) -> Result<CommitId, TapelineError> {
        let (mut metadata, mut log) = self.store.load()?;
        let content = self.read_tracked_file()?;
        let record = self.record_commit(&mut metadata, &mut log, message, &content)?;
        self.save_after_commit(&metadata, &log, &record.id)?;

        info!(
            commit_id = %record.id,
            branch = %record.branch,
            size = content.len(),
            "Committed"
        );
        Ok(record.id)
    }

    /// Overwrite the tracked file with a commit's snapshot
    pub fn checkout(&self, commit_id: &str) -> Result<CommitId, TapelineError> {
        let log = self.store.load_commit_log()?;
        if !log.contains_key(commit_id) {
            return Err(TapelineError::commit_not_found(commit_id));
        }
        self.snapshots.restore(commit_id, &self.tracked_file)?;
        info!(commit_id, "Checked out");
        Ok(commit_id.to_string())
    }

    /// Fork a new branch from the current one and switch to it
    pub fn create_branch(&self, name: &str) -> Result<String, TapelineError> {
        validate_branch_name(name)?;
        let (mut metadata, mut log) = self.store.load()?;
        if metadata.has_branch(name) {
            return Err(TapelineError::BranchExists(name.to_string()));
        }
        verify_branch_graph(&metadata.branch_history)?;

        let previous = metadata.current_branch.clone();
        let head = newest_visible(&previous, &metadata, &log).map(|c| c.id.clone());

        let created_at = self.issue_timestamp(&metadata, &log);
        metadata.branch_history.insert(
            name.to_string(),
            BranchRecord {
                parent: Some(previous.clone()),
                created_at,
                commit_ids: Vec::new(),
            },
        );
        metadata.branches.push(name.to_string());
        metadata.current_branch = name.to_string();

        match head {
            Some(head) => {
                let content = self.snapshots.get(&head)?;
                let message = format!("Initial commit for branch '{}'", name);
                let record = self.record_commit(&mut metadata, &mut log, &message, &content)?;
                self.save_after_commit(&metadata, &log, &record.id)?;
                // The working file is only replaced once the branch exists
                self.snapshots.restore(&head, &self.tracked_file)?;
                debug!(branch = name, head = %head, initial = %record.id, "Seeded branch");
            }
            None => self.store.save_metadata(&metadata)?,
        }

        info!(branch = name, parent = %previous, "Created branch");
        Ok(name.to_string())
    }

    /// Make `name` current and check out its newest own commit, if any
    pub fn switch_branch(&self, name: &str) -> Result<Option<CommitId>, TapelineError> {
        let (mut metadata, log) = self.store.load()?;
        if !metadata.has_branch(name) {
            return Err(TapelineError::BranchNotFound(name.to_string()));
        }

        let latest = log
            .values()
            .filter(|c| c.branch == name)
            .min_by(|a, b| CommitRecord::newest_first(a, b))
            .map(|c| c.id.clone());
        let previous = std::mem::replace(&mut metadata.current_branch, name.to_string());
        self.store.save_metadata(&metadata)?;

        if let Some(id) = &latest {
            if let Err(e) = self.snapshots.restore(id, &self.tracked_file) {
                metadata.current_branch = previous;
                if let Err(revert) = self.store.save_metadata(&metadata) {
                    warn!(branch = name, error = %revert, "Failed to restore previous branch");
                }
                return Err(e);
            }
        }

        info!(branch = name, head = ?latest, "Switched branch");
        Ok(latest)
    }

    /// History of the current branch, newest first
    pub fn list_commits(&self) -> Result<Vec<CommitRecord>, TapelineError> {
        let (metadata, log) = self.store.load()?;
        Ok(visible_commits(&metadata.current_branch, &metadata, &log))
    }

    /// History of any branch, newest first
    pub fn list_branch_commits(&self, branch: &str) -> Result<Vec<CommitRecord>, TapelineError> {
        let (metadata, log) = self.store.load()?;
        if !metadata.has_branch(branch) {
            return Err(TapelineError::BranchNotFound(branch.to_string()));
        }
        Ok(visible_commits(branch, &metadata, &log))
    }

    /// Every commit in the log, newest first
    pub fn list_all_commits(&self) -> Result<Vec<CommitRecord>, TapelineError> {
        let log = self.store.load_commit_log()?;
        let mut commits: Vec<CommitRecord> = log.into_values().collect();
        commits.sort_by(CommitRecord::newest_first);
        Ok(commits)
    }

    /// Hide a commit from the current branch, deleting it outright when no
    /// other branch still sees it
    pub fn delete_commit(&self, commit_id: &str) -> Result<CommitId, TapelineError> {
        let (mut metadata, mut log) = self.store.load()?;
        let record = log
            .get(commit_id)
            .cloned()
            .ok_or_else(|| TapelineError::commit_not_found(commit_id))?;
        verify_branch_graph(&metadata.branch_history)?;

        let current = metadata.current_branch.clone();
        metadata.exclude(&current, commit_id);

        if record.branch != current {
            self.store.save_metadata(&metadata)?;
            info!(commit_id, branch = %current, owner = %record.branch, "Excluded inherited commit");
            return Ok(commit_id.to_string());
        }

        let needed_by = metadata
            .branches
            .iter()
            .map(String::as_str)
            .filter(|b| *b != current)
            .find(|b| {
                record.branch == *b
                    || (BranchView::new(b, &metadata).inherits(&record)
                        && !metadata.is_excluded(b, commit_id))
            })
            .map(str::to_string);

        if let Some(dependent) = needed_by {
            self.store.save_metadata(&metadata)?;
            info!(commit_id, branch = %current, needed_by = %dependent, "Excluded commit still needed elsewhere");
            return Ok(commit_id.to_string());
        }

        log.remove(commit_id);
        forget_commits(&mut metadata, &[commit_id.to_string()]);
        self.store.save(Some(&metadata), Some(&log))?;
        self.delete_snapshots(&[commit_id.to_string()]);

        info!(commit_id, branch = %current, "Deleted commit");
        Ok(commit_id.to_string())
    }

    /// Remove a branch and every commit no surviving child depends on
    pub fn delete_branch(&self, name: &str) -> Result<String, TapelineError> {
        let (mut metadata, mut log) = self.store.load()?;
        if !metadata.has_branch(name) {
            return Err(TapelineError::BranchNotFound(name.to_string()));
        }
        if name == MAIN_BRANCH {
            return Err(TapelineError::ProtectedBranch(name.to_string()));
        }
        if name == metadata.current_branch {
            return Err(TapelineError::CurrentBranch(name.to_string()));
        }
        verify_branch_graph(&metadata.branch_history)?;

        let has_child = metadata.branch_history.iter().any(|(branch, record)| {
            branch != name
                && metadata.has_branch(branch)
                && record.parent.as_deref() == Some(name)
        });

        let removed: Vec<CommitId> = if has_child {
            Vec::new()
        } else {
            log.values()
                .filter(|c| c.branch == name)
                .map(|c| c.id.clone())
                .collect()
        };
        for id in &removed {
            log.remove(id);
        }
        forget_commits(&mut metadata, &removed);

        metadata.branches.retain(|b| b != name);
        metadata.branch_history.remove(name);
        metadata.branch_exclusions.remove(name);

        if removed.is_empty() {
            self.store.save_metadata(&metadata)?;
        } else {
            self.store.save(Some(&metadata), Some(&log))?;
        }
        self.delete_snapshots(&removed);

        info!(
            branch = name,
            deleted_commits = removed.len(),
            kept_for_children = has_child,
            "Deleted branch"
        );
        Ok(name.to_string())
    }

    /// Snapshots are removed only after the documents stopped referencing
    /// them; a failure here leaves an orphan, not a dangling reference.
    fn delete_snapshots(&self, ids: &[CommitId]) {
        for id in ids {
            if let Err(e) = self.snapshots.delete(id) {
                warn!(commit_id = %id, error = %e, "Failed to delete snapshot");
            }
        }
    }

    pub fn list_branches(&self) -> Result<Vec<String>, TapelineError> {
        Ok(self.store.load_metadata()?.branches)
    }

    pub fn current_branch(&self) -> Result<String, TapelineError> {
        Ok(self.store.load_metadata()?.current_branch)
    }

    pub fn commit_details(&self, commit_id: &str) -> Result<CommitRecord, TapelineError> {
        self.store
            .load_commit_log()?
            .remove(commit_id)
            .ok_or_else(|| TapelineError::commit_not_found(commit_id))
    }

    pub fn metadata(&self) -> Result<ProjectMetadata, TapelineError> {
        self.store.load_metadata()
    }

    /// File size recorded at every commit, oldest first
    pub fn project_growth(&self) -> Result<Vec<SizeSample>, TapelineError> {
        Ok(self.store.load_metadata()?.project_stats.size_history)
    }

    pub fn status(&self) -> Result<ProjectStatus, TapelineError> {
        let (metadata, log) = self.store.load()?;
        let visible = visible_commits(&metadata.current_branch, &metadata, &log);
        Ok(ProjectStatus {
            project_name: metadata.project_name.clone(),
            tracked_file: self.tracked_file.clone(),
            tracked_file_present: self.tracked_file.is_file(),
            current_branch: metadata.current_branch.clone(),
            branches: metadata.branches.clone(),
            total_commits: metadata.total_commits,
            visible_commits: visible.len(),
            head: visible.first().map(|c| c.id.clone()),
            created_at: metadata.created_at,
            last_modified: metadata.last_modified,
            latest_size_bytes: metadata
                .project_stats
                .size_history
                .last()
                .map(|s| s.size_bytes),
        })
    }
}

/// Commits visible on `branch`, newest first
pub(crate) fn visible_commits(
    branch: &str,
    metadata: &ProjectMetadata,
    log: &CommitLog,
) -> Vec<CommitRecord> {
    let view = BranchView::new(branch, metadata);
    let mut commits: Vec<CommitRecord> = log
        .values()
        .filter(|c| view.is_visible(c))
        .cloned()
        .collect();
    commits.sort_by(CommitRecord::newest_first);
    commits
}

fn newest_visible<'a>(
    branch: &str,
    metadata: &ProjectMetadata,
    log: &'a CommitLog,
) -> Option<&'a CommitRecord> {
    let view = BranchView::new(branch, metadata);
    log.values()
        .filter(|c| view.is_visible(c))
        .min_by(|a, b| CommitRecord::newest_first(a, b))
}

/// Drop physically deleted commits from every per-branch list
fn forget_commits(metadata: &mut ProjectMetadata, ids: &[CommitId]) {
    if ids.is_empty() {
        return;
    }
    for record in metadata.branch_history.values_mut() {
        record.commit_ids.retain(|id| !ids.contains(id));
    }
    for excluded in metadata.branch_exclusions.values_mut() {
        for id in ids {
            excluded.remove(id);
        }
    }
    metadata.branch_exclusions.retain(|_, ids| !ids.is_empty());
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn setup(clock: &FixedClock) -> (TempDir, PathBuf, VersionEngine<&FixedClock>) {
        let dir = tempdir().unwrap();
        let file = dir.path().join("beat.flp");
        fs::write(&file, b"v1").unwrap();
        let engine = VersionEngine::open_with_clock(&file, clock).unwrap();
        (dir, file, engine)
    }

    #[test]
    fn test_open_initializes_documents() {
        let clock = FixedClock::new(ts("2024-01-01T00:00:00Z"));
        let (dir, _file, engine) = setup(&clock);

        assert!(dir.path().join(".tapeline/metadata.json").is_file());
        let meta = engine.metadata().unwrap();
        assert_eq!(meta.project_name, "beat");
        assert_eq!(meta.branches, vec!["main"]);
        assert!(engine.list_commits().unwrap().is_empty());
    }

    #[test]
    fn test_commit_synthesizes_main_entry() {
        let clock = FixedClock::new(ts("2024-01-01T00:00:00Z"));
        let (_dir, _file, engine) = setup(&clock);
        clock.advance(chrono::Duration::seconds(5));

        let id = engine.commit("first").unwrap();

        let meta = engine.metadata().unwrap();
        let main = &meta.branch_history["main"];
        assert_eq!(main.parent, None);
        assert_eq!(main.created_at, meta.created_at);
        assert_eq!(main.commit_ids, vec![id.clone()]);
        assert_eq!(meta.total_commits, 1);
        assert_eq!(meta.project_stats.size_history[0].size_bytes, 2);
        assert_eq!(meta.last_modified, ts("2024-01-01T00:00:05Z"));
        assert_eq!(id.len(), 8);
    }

    #[test]
    fn test_commit_without_file_fails() {
        let clock = FixedClock::new(ts("2024-01-01T00:00:00Z"));
        let (_dir, file, engine) = setup(&clock);
        fs::remove_file(&file).unwrap();

        assert!(matches!(
            engine.commit("gone"),
            Err(TapelineError::SourceMissing(_))
        ));
        assert_eq!(engine.metadata().unwrap().total_commits, 0);
    }

    #[test]
    fn test_frozen_clock_still_orders_commits() {
        let clock = FixedClock::new(ts("2024-01-01T00:00:00Z"));
        let (_dir, _file, engine) = setup(&clock);

        let a = engine.commit("a").unwrap();
        let b = engine.commit("b").unwrap();
        let c = engine.commit("c").unwrap();

        let ids: Vec<_> = engine.list_commits().unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![c, b, a]);
    }

    #[test]
    fn test_checkout_unknown_commit() {
        let clock = FixedClock::new(ts("2024-01-01T00:00:00Z"));
        let (_dir, _file, engine) = setup(&clock);
        assert!(matches!(
            engine.checkout("deadbeef"),
            Err(TapelineError::CommitNotFound(_))
        ));
    }

    #[test]
    fn test_create_branch_without_commits_skips_seed() {
        let clock = FixedClock::new(ts("2024-01-01T00:00:00Z"));
        let (_dir, _file, engine) = setup(&clock);

        engine.create_branch("empty").unwrap();

        assert_eq!(engine.current_branch().unwrap(), "empty");
        assert!(engine.list_commits().unwrap().is_empty());
        assert_eq!(engine.metadata().unwrap().total_commits, 0);
    }

    #[test]
    fn test_invalid_branch_names() {
        for name in ["", "two words", "a/b", "a\\b", "tab\there"] {
            assert!(
                matches!(validate_branch_name(name), Err(TapelineError::InvalidArgs(_))),
                "{:?}",
                name
            );
        }
        assert!(validate_branch_name("verse-2").is_ok());
    }

    #[test]
    fn test_switch_to_branch_without_own_commits() {
        let clock = FixedClock::new(ts("2024-01-01T00:00:00Z"));
        let (_dir, _file, engine) = setup(&clock);
        engine.create_branch("idea").unwrap();

        assert_eq!(engine.switch_branch("main").unwrap(), None);
        assert_eq!(engine.current_branch().unwrap(), "main");
        assert!(matches!(
            engine.switch_branch("nope"),
            Err(TapelineError::BranchNotFound(_))
        ));
    }

    #[test]
    fn test_forget_commits_prunes_empty_exclusion_sets() {
        let mut meta = ProjectMetadata::new("beat", ts("2024-01-01T00:00:00Z"));
        meta.exclude("feat", "aaaa1111");
        meta.branch_history.insert(
            "feat".into(),
            BranchRecord {
                parent: Some("main".into()),
                created_at: ts("2024-01-02T00:00:00Z"),
                commit_ids: vec!["aaaa1111".into(), "bbbb2222".into()],
            },
        );

        forget_commits(&mut meta, &["aaaa1111".to_string()]);

        assert!(meta.branch_exclusions.is_empty());
        assert_eq!(meta.branch_history["feat"].commit_ids, vec!["bbbb2222"]);
    }

    #[test]
    fn test_status_reports_head() {
        let clock = FixedClock::new(ts("2024-01-01T00:00:00Z"));
        let (_dir, _file, engine) = setup(&clock);
        let id = engine.commit("first").unwrap();

        let status = engine.status().unwrap();
        assert_eq!(status.head, Some(id));
        assert_eq!(status.visible_commits, 1);
        assert_eq!(status.latest_size_bytes, Some(2));
        assert!(status.tracked_file_present);
    }
}
