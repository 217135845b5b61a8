use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::ids::CommitId;
use super::timestamp::Timestamp;

/// Root branch; always present, never deletable
pub const MAIN_BRANCH: &str = "main";

/// Branch name -> fork record
pub type BranchHistory = BTreeMap<String, BranchRecord>;

/// Branch name -> commits hidden from that branch
pub type BranchExclusions = BTreeMap<String, BTreeSet<CommitId>>;

/// Fork record of one branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRecord {
    /// Branch this one was forked from; `None` for the root
    pub parent: Option<String>,
    /// Fork point; only parent commits strictly before it are inherited
    pub created_at: Timestamp,
    /// Commits authored directly on this branch, oldest first
    #[serde(default)]
    pub commit_ids: Vec<CommitId>,
}

/// One file-size sample, taken at every commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeSample {
    pub timestamp: Timestamp,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectStats {
    #[serde(default)]
    pub size_history: Vec<SizeSample>,
}

/// The project metadata document (`metadata.json`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub project_name: String,
    pub created_at: Timestamp,
    pub last_modified: Timestamp,
    #[serde(default)]
    pub total_commits: u64,
    pub branches: Vec<String>,
    pub current_branch: String,
    #[serde(default)]
    pub branch_history: BranchHistory,
    #[serde(default)]
    pub branch_exclusions: BranchExclusions,
    #[serde(default)]
    pub project_stats: ProjectStats,
}

impl ProjectMetadata {
    /// Fresh metadata for a new project, checked out on `main`
    pub fn new(project_name: impl Into<String>, now: Timestamp) -> Self {
        Self {
            project_name: project_name.into(),
            created_at: now,
            last_modified: now,
            total_commits: 0,
            branches: vec![MAIN_BRANCH.to_string()],
            current_branch: MAIN_BRANCH.to_string(),
            branch_history: BranchHistory::new(),
            branch_exclusions: BranchExclusions::new(),
            project_stats: ProjectStats::default(),
        }
    }

    pub fn has_branch(&self, name: &str) -> bool {
        self.branches.iter().any(|b| b == name)
    }

    pub fn is_excluded(&self, branch: &str, commit_id: &str) -> bool {
        self.branch_exclusions
            .get(branch)
            .is_some_and(|ids| ids.contains(commit_id))
    }

    /// Hide a commit from a branch. Returns false if it was already hidden.
    pub fn exclude(&mut self, branch: &str, commit_id: &str) -> bool {
        self.branch_exclusions
            .entry(branch.to_string())
            .or_default()
            .insert(commit_id.to_string())
    }

    /// Fork point of a branch, if it has a history entry
    pub fn fork_point(&self, branch: &str) -> Option<Timestamp> {
        self.branch_history.get(branch).map(|r| r.created_at)
    }

    /// Latest timestamp recorded anywhere in this document
    pub fn latest_timestamp(&self) -> Timestamp {
        let mut latest = self.created_at.max(self.last_modified);
        for record in self.branch_history.values() {
            latest = latest.max(record.created_at);
        }
        if let Some(sample) = self.project_stats.size_history.last() {
            latest = latest.max(sample.timestamp);
        }
        latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[test]
    fn test_new_metadata_starts_on_main() {
        let meta = ProjectMetadata::new("song", ts("2024-01-01T00:00:00Z"));
        assert_eq!(meta.branches, vec!["main".to_string()]);
        assert_eq!(meta.current_branch, MAIN_BRANCH);
        assert!(meta.branch_history.is_empty());
        assert_eq!(meta.total_commits, 0);
    }

    #[test]
    fn test_exclude_is_idempotent() {
        let mut meta = ProjectMetadata::new("song", ts("2024-01-01T00:00:00Z"));
        assert!(meta.exclude("feat", "aaaa1111"));
        assert!(!meta.exclude("feat", "aaaa1111"));
        assert!(meta.is_excluded("feat", "aaaa1111"));
        assert!(!meta.is_excluded("main", "aaaa1111"));
    }

    #[test]
    fn test_metadata_json_shape() {
        let mut meta = ProjectMetadata::new("song", ts("2024-01-01T00:00:00Z"));
        meta.branch_history.insert(
            "feat".to_string(),
            BranchRecord {
                parent: Some("main".to_string()),
                created_at: ts("2024-01-02T00:00:00Z"),
                commit_ids: vec!["abcd1234".to_string()],
            },
        );
        meta.exclude("feat", "0000ffff");

        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["branch_history"]["feat"]["parent"], "main");
        assert_eq!(value["branch_history"]["feat"]["commit_ids"][0], "abcd1234");
        assert_eq!(value["branch_exclusions"]["feat"][0], "0000ffff");
        assert!(value["project_stats"]["size_history"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_missing_optional_sections_default() {
        let json = r#"{
            "project_name": "song",
            "created_at": "2024-01-01T10:00:00",
            "last_modified": "2024-01-01T10:00:00",
            "branches": ["main"],
            "current_branch": "main"
        }"#;
        let meta: ProjectMetadata = serde_json::from_str(json).unwrap();
        assert!(meta.branch_exclusions.is_empty());
        assert!(meta.project_stats.size_history.is_empty());
    }

    #[test]
    fn test_latest_timestamp_covers_forks() {
        let mut meta = ProjectMetadata::new("song", ts("2024-01-01T00:00:00Z"));
        meta.branch_history.insert(
            "feat".to_string(),
            BranchRecord {
                parent: Some("main".to_string()),
                created_at: ts("2024-06-01T00:00:00Z"),
                commit_ids: vec![],
            },
        );
        assert_eq!(meta.latest_timestamp(), ts("2024-06-01T00:00:00Z"));
    }
}
