//! Branch hierarchy resolution and commit visibility.
//!
//! A branch sees the commits it authored plus the commits of its ancestors
//! made strictly before its own fork point. `main` sees only its own.

use std::collections::HashSet;

use tracing::warn;

use crate::error::TapelineError;
use crate::types::metadata::BranchHistory;
use crate::types::{CommitRecord, ProjectMetadata, Timestamp, MAIN_BRANCH};

/// Result of walking parent links from one branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestorChain {
    /// The starting branch followed by each ancestor, nearest first
    pub branches: Vec<String>,
    /// Branch whose parent link closed a cycle, if any
    pub cycle_at: Option<String>,
}

impl AncestorChain {
    pub fn contains(&self, branch: &str) -> bool {
        self.branches.iter().any(|b| b == branch)
    }
}

/// Walk parent links from `branch` until a root, a missing entry or a cycle
pub fn resolve_ancestors(branch: &str, history: &BranchHistory) -> AncestorChain {
    let mut branches = Vec::new();
    let mut visited = HashSet::new();
    let mut current = branch.to_string();

    loop {
        visited.insert(current.clone());
        let parent = history.get(&current).and_then(|r| r.parent.clone());
        branches.push(current.clone());
        match parent {
            None => {
                return AncestorChain {
                    branches,
                    cycle_at: None,
                }
            }
            Some(p) if visited.contains(&p) => {
                return AncestorChain {
                    branches,
                    cycle_at: Some(current),
                }
            }
            Some(p) => current = p,
        }
    }
}

/// `branch` followed by its ancestors. Stops early on a cycle.
pub fn ancestor_chain(branch: &str, history: &BranchHistory) -> Vec<String> {
    let chain = resolve_ancestors(branch, history);
    if let Some(at) = &chain.cycle_at {
        warn!(branch, cycle_at = %at, "Branch graph has a cycle; truncating ancestor chain");
    }
    chain.branches
}

/// Fail if any recorded branch reaches a cycle through its parent links
pub fn verify_branch_graph(history: &BranchHistory) -> Result<(), TapelineError> {
    for name in history.keys() {
        if let Some(at) = resolve_ancestors(name, history).cycle_at {
            return Err(TapelineError::InconsistentBranchGraph(format!(
                "parent links from '{}' loop back at '{}'",
                name, at
            )));
        }
    }
    Ok(())
}

/// Visibility rules for one branch, resolved once and applied per commit
#[derive(Debug, Clone)]
pub struct BranchView<'a> {
    branch: &'a str,
    metadata: &'a ProjectMetadata,
    fork_point: Option<Timestamp>,
    ancestors: Vec<String>,
}

impl<'a> BranchView<'a> {
    pub fn new(branch: &'a str, metadata: &'a ProjectMetadata) -> Self {
        let parent = match metadata.branch_history.get(branch) {
            Some(record) if branch != MAIN_BRANCH => record.parent.as_deref(),
            _ => None,
        };
        let ancestors = parent
            .map(|p| ancestor_chain(p, &metadata.branch_history))
            .unwrap_or_default();
        Self {
            branch,
            metadata,
            fork_point: metadata.fork_point(branch),
            ancestors,
        }
    }

    pub fn branch(&self) -> &str {
        self.branch
    }

    /// Whether the branch inherits `commit` from an ancestor.
    ///
    /// Exclusions are not consulted here.
    pub fn inherits(&self, commit: &CommitRecord) -> bool {
        if commit.branch == self.branch {
            return false;
        }
        match self.fork_point {
            Some(fork) => commit.timestamp < fork && self.ancestors.contains(&commit.branch),
            None => false,
        }
    }

    /// Whether `commit` shows up in the branch's history
    pub fn is_visible(&self, commit: &CommitRecord) -> bool {
        if self.metadata.is_excluded(self.branch, &commit.id) {
            return false;
        }
        commit.branch == self.branch || self.inherits(commit)
    }
}

/// Whether `branch` inherits `commit` from an ancestor.
///
/// Exclusions are not consulted here.
pub fn inherits(commit: &CommitRecord, branch: &str, metadata: &ProjectMetadata) -> bool {
    BranchView::new(branch, metadata).inherits(commit)
}

/// Whether `commit` shows up in `branch`'s history
pub fn is_visible(commit: &CommitRecord, branch: &str, metadata: &ProjectMetadata) -> bool {
    BranchView::new(branch, metadata).is_visible(commit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BranchRecord;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn record(parent: Option<&str>, created_at: &str) -> BranchRecord {
        BranchRecord {
            parent: parent.map(String::from),
            created_at: ts(created_at),
            commit_ids: vec![],
        }
    }

    fn commit(id: &str, branch: &str, at: &str) -> CommitRecord {
        CommitRecord {
            id: id.to_string(),
            message: id.to_string(),
            timestamp: ts(at),
            file: "beat.flp".to_string(),
            branch: branch.to_string(),
        }
    }

    fn metadata() -> ProjectMetadata {
        let mut meta = ProjectMetadata::new("beat", ts("2024-01-01T00:00:00Z"));
        meta.branches = vec!["main".into(), "feat".into(), "solo".into()];
        meta.branch_history
            .insert("main".into(), record(None, "2024-01-01T00:00:00Z"));
        meta.branch_history
            .insert("feat".into(), record(Some("main"), "2024-01-02T00:00:00Z"));
        meta.branch_history
            .insert("solo".into(), record(Some("feat"), "2024-01-03T00:00:00Z"));
        meta
    }

    #[test]
    fn test_ancestor_chain_follows_parents() {
        let meta = metadata();
        assert_eq!(
            ancestor_chain("solo", &meta.branch_history),
            vec!["solo", "feat", "main"]
        );
        assert_eq!(ancestor_chain("main", &meta.branch_history), vec!["main"]);
        assert_eq!(ancestor_chain("ghost", &meta.branch_history), vec!["ghost"]);
    }

    #[test]
    fn test_cycle_terminates() {
        let mut history = BranchHistory::new();
        history.insert("a".into(), record(Some("b"), "2024-01-01T00:00:00Z"));
        history.insert("b".into(), record(Some("a"), "2024-01-01T00:00:00Z"));

        let chain = resolve_ancestors("a", &history);
        assert_eq!(chain.branches, vec!["a", "b"]);
        assert_eq!(chain.cycle_at.as_deref(), Some("b"));
        assert_eq!(ancestor_chain("a", &history), vec!["a", "b"]);

        let err = verify_branch_graph(&history).unwrap_err();
        assert!(matches!(err, TapelineError::InconsistentBranchGraph(_)));
    }

    #[test]
    fn test_verify_accepts_tree() {
        assert!(verify_branch_graph(&metadata().branch_history).is_ok());
    }

    #[test]
    fn test_inherits_only_before_fork() {
        let meta = metadata();
        let before = commit("aaaa0001", "main", "2024-01-01T12:00:00Z");
        let at_fork = commit("aaaa0002", "main", "2024-01-02T00:00:00Z");
        let after = commit("aaaa0003", "main", "2024-01-02T12:00:00Z");

        assert!(is_visible(&before, "feat", &meta));
        assert!(!is_visible(&at_fork, "feat", &meta));
        assert!(!is_visible(&after, "feat", &meta));
    }

    #[test]
    fn test_grandchild_sees_grandparent() {
        let meta = metadata();
        let on_main = commit("aaaa0001", "main", "2024-01-01T12:00:00Z");
        let on_feat = commit("bbbb0001", "feat", "2024-01-02T12:00:00Z");

        assert!(is_visible(&on_main, "solo", &meta));
        assert!(is_visible(&on_feat, "solo", &meta));
        assert!(!is_visible(&on_feat, "main", &meta));
    }

    #[test]
    fn test_main_sees_only_its_own() {
        let meta = metadata();
        let on_feat = commit("bbbb0001", "feat", "2023-12-31T00:00:00Z");
        assert!(!is_visible(&on_feat, "main", &meta));
        assert!(is_visible(&commit("aaaa0001", "main", "2024-01-05T00:00:00Z"), "main", &meta));
    }

    #[test]
    fn test_exclusions_hide_commits() {
        let mut meta = metadata();
        let on_main = commit("aaaa0001", "main", "2024-01-01T12:00:00Z");
        meta.exclude("feat", "aaaa0001");

        assert!(!is_visible(&on_main, "feat", &meta));
        assert!(inherits(&on_main, "feat", &meta));
        assert!(is_visible(&on_main, "main", &meta));
    }

    #[test]
    fn test_view_over_cycle_degrades() {
        let mut meta = metadata();
        meta.branch_history
            .insert("main".into(), record(Some("solo"), "2024-01-01T00:00:00Z"));
        let on_feat = commit("bbbb0001", "feat", "2024-01-02T12:00:00Z");

        let view = BranchView::new("solo", &meta);
        assert!(view.is_visible(&on_feat));
    }

    #[test]
    fn test_branch_without_history_sees_own_commits() {
        let meta = metadata();
        let own = commit("cccc0001", "orphan", "2024-01-05T00:00:00Z");
        let on_main = commit("aaaa0001", "main", "2024-01-01T12:00:00Z");

        assert!(is_visible(&own, "orphan", &meta));
        assert!(!is_visible(&on_main, "orphan", &meta));
    }
}
