//! Integrity checking for the project documents and snapshot store
//!
//! Cross-checks branch lists, the commit log and snapshot directories.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::branch::resolve_ancestors;
use crate::engine::{Clock, VersionEngine};
use crate::error::TapelineError;
use crate::snapshot::SnapshotStore;
use crate::types::{CommitId, CommitLog, ProjectMetadata, MAIN_BRANCH};

/// Result of an integrity check
#[derive(Debug, Default, Serialize)]
pub struct IntegrityReport {
    /// Commit records checked
    pub commits_checked: usize,
    /// Snapshot directories found on disk
    pub snapshots_found: usize,
    /// Problems that break an invariant
    pub problems: Vec<IntegrityIssue>,
    /// Findings that do not affect correctness
    pub notices: Vec<IntegrityIssue>,
}

/// One finding of an integrity check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityIssue {
    /// A branch lists a commit the log does not contain
    DanglingCommitRef { branch: String, commit_id: CommitId },
    /// A commit record has no snapshot directory
    MissingSnapshot { commit_id: CommitId },
    /// A commit's authoring branch no longer exists
    UnknownAuthorBranch { commit_id: CommitId, branch: String },
    /// A snapshot directory no commit record refers to
    OrphanSnapshot { commit_id: CommitId },
    /// `current_branch` is not in the branch list
    CurrentBranchUnknown { branch: String },
    /// `main` is missing from the branch list
    MainMissing,
    /// Parent links loop back on themselves
    BranchCycle { branch: String, cycle_at: String },
}

impl IntegrityReport {
    /// Check if the report indicates all is well
    pub fn is_healthy(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn problem_count(&self) -> usize {
        self.problems.len()
    }
}

/// Check a project's documents against its snapshot store
pub fn check_integrity<C: Clock>(engine: &VersionEngine<C>) -> Result<IntegrityReport, TapelineError> {
    let (metadata, log) = engine.store().load()?;
    check_documents(&metadata, &log, engine.snapshots())
}

/// Check loaded documents against a snapshot store
pub fn check_documents(
    metadata: &ProjectMetadata,
    log: &CommitLog,
    snapshots: &SnapshotStore,
) -> Result<IntegrityReport, TapelineError> {
    let mut report = IntegrityReport {
        commits_checked: log.len(),
        ..Default::default()
    };

    if !metadata.has_branch(MAIN_BRANCH) {
        report.problems.push(IntegrityIssue::MainMissing);
    }
    if !metadata.has_branch(&metadata.current_branch) {
        report.problems.push(IntegrityIssue::CurrentBranchUnknown {
            branch: metadata.current_branch.clone(),
        });
    }

    let mut cycles_seen = BTreeSet::new();
    for branch in metadata.branch_history.keys() {
        if let Some(cycle_at) = resolve_ancestors(branch, &metadata.branch_history).cycle_at {
            if cycles_seen.insert(cycle_at.clone()) {
                report.problems.push(IntegrityIssue::BranchCycle {
                    branch: branch.clone(),
                    cycle_at,
                });
            }
        }
    }

    for (branch, record) in &metadata.branch_history {
        for commit_id in &record.commit_ids {
            if !log.contains_key(commit_id) {
                report.problems.push(IntegrityIssue::DanglingCommitRef {
                    branch: branch.clone(),
                    commit_id: commit_id.clone(),
                });
            }
        }
    }

    let stored: BTreeSet<CommitId> = snapshots.list()?.into_iter().collect();
    report.snapshots_found = stored.len();

    for (commit_id, record) in log {
        if !stored.contains(commit_id) {
            report.problems.push(IntegrityIssue::MissingSnapshot {
                commit_id: commit_id.clone(),
            });
        }
        if !metadata.has_branch(&record.branch) {
            report.notices.push(IntegrityIssue::UnknownAuthorBranch {
                commit_id: commit_id.clone(),
                branch: record.branch.clone(),
            });
        }
    }

    for commit_id in stored.iter().filter(|id| !log.contains_key(*id)) {
        report.notices.push(IntegrityIssue::OrphanSnapshot {
            commit_id: commit_id.clone(),
        });
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BranchRecord, CommitRecord, Timestamp};
    use tempfile::tempdir;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn commit(id: &str, branch: &str) -> CommitRecord {
        CommitRecord {
            id: id.to_string(),
            message: "m".to_string(),
            timestamp: ts("2024-01-01T12:00:00Z"),
            file: "beat.flp".to_string(),
            branch: branch.to_string(),
        }
    }

    #[test]
    fn test_clean_project_is_healthy() {
        let dir = tempdir().unwrap();
        let snapshots = SnapshotStore::new(dir.path(), "beat.flp");
        snapshots.put("aaaa1111", b"x").unwrap();
        let mut meta = ProjectMetadata::new("beat", ts("2024-01-01T00:00:00Z"));
        meta.branch_history.insert(
            "main".into(),
            BranchRecord {
                parent: None,
                created_at: meta.created_at,
                commit_ids: vec!["aaaa1111".into()],
            },
        );
        let mut log = CommitLog::new();
        log.insert("aaaa1111".into(), commit("aaaa1111", "main"));

        let report = check_documents(&meta, &log, &snapshots).unwrap();
        assert!(report.is_healthy(), "{:?}", report);
        assert!(report.notices.is_empty());
        assert_eq!(report.commits_checked, 1);
        assert_eq!(report.snapshots_found, 1);
    }

    #[test]
    fn test_reports_each_kind_of_damage() {
        let dir = tempdir().unwrap();
        let snapshots = SnapshotStore::new(dir.path(), "beat.flp");
        snapshots.put("eeee5555", b"orphan").unwrap();

        let mut meta = ProjectMetadata::new("beat", ts("2024-01-01T00:00:00Z"));
        meta.current_branch = "ghost".into();
        meta.branch_history.insert(
            "a".into(),
            BranchRecord {
                parent: Some("b".into()),
                created_at: meta.created_at,
                commit_ids: vec!["ffff6666".into()],
            },
        );
        meta.branch_history.insert(
            "b".into(),
            BranchRecord {
                parent: Some("a".into()),
                created_at: meta.created_at,
                commit_ids: vec![],
            },
        );
        let mut log = CommitLog::new();
        log.insert("aaaa1111".into(), commit("aaaa1111", "gone"));

        let report = check_documents(&meta, &log, &snapshots).unwrap();

        assert!(!report.is_healthy());
        assert!(report.problems.contains(&IntegrityIssue::CurrentBranchUnknown {
            branch: "ghost".into()
        }));
        assert!(report.problems.contains(&IntegrityIssue::DanglingCommitRef {
            branch: "a".into(),
            commit_id: "ffff6666".into()
        }));
        assert!(report.problems.contains(&IntegrityIssue::MissingSnapshot {
            commit_id: "aaaa1111".into()
        }));
        assert!(report
            .problems
            .iter()
            .any(|p| matches!(p, IntegrityIssue::BranchCycle { .. })));
        assert!(report.notices.contains(&IntegrityIssue::UnknownAuthorBranch {
            commit_id: "aaaa1111".into(),
            branch: "gone".into()
        }));
        assert!(report.notices.contains(&IntegrityIssue::OrphanSnapshot {
            commit_id: "eeee5555".into()
        }));
    }
}
