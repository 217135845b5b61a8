use std::path::PathBuf;

use thiserror::Error;

/// Main error type for tapeline operations
#[derive(Debug, Error)]
pub enum TapelineError {
    #[error("tracked file not found: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("commit {0} not found")]
    CommitNotFound(String),

    #[error("branch '{0}' does not exist")]
    BranchNotFound(String),

    #[error("branch '{0}' already exists")]
    BranchExists(String),

    #[error("cannot delete the current branch '{0}'")]
    CurrentBranch(String),

    #[error("branch '{0}' is protected and cannot be deleted")]
    ProtectedBranch(String),

    #[error("inconsistent branch graph: {0}")]
    InconsistentBranchGraph(String),

    #[error("snapshot for commit {0} already exists")]
    SnapshotExists(String),

    #[error("snapshot for commit {0} is missing")]
    SnapshotMissing(String),

    #[error("no tapeline project found at {}", .0.display())]
    NotInitialized(PathBuf),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl TapelineError {
    /// Get the error code for JSON output
    pub fn error_code(&self) -> &'static str {
        match self {
            TapelineError::SourceMissing(_) => "source_missing",
            TapelineError::CommitNotFound(_) => "commit_not_found",
            TapelineError::BranchNotFound(_) => "branch_not_found",
            TapelineError::BranchExists(_) => "branch_exists",
            TapelineError::CurrentBranch(_) => "current_branch",
            TapelineError::ProtectedBranch(_) => "protected_branch",
            TapelineError::InconsistentBranchGraph(_) => "inconsistent_branch_graph",
            TapelineError::SnapshotExists(_) => "snapshot_exists",
            TapelineError::SnapshotMissing(_) => "snapshot_missing",
            TapelineError::NotInitialized(_) => "not_initialized",
            TapelineError::InvalidArgs(_) => "invalid_args",
            TapelineError::Io(_) => "io_error",
            TapelineError::Json(_) => "data_error",
            TapelineError::TomlParse(_) => "invalid_config",
            TapelineError::TomlSerialize(_) => "internal_error",
            TapelineError::Internal(_) => "internal_error",
        }
    }

    /// Get the exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            TapelineError::InvalidArgs(_) => 2,
            TapelineError::CommitNotFound(_)
            | TapelineError::BranchNotFound(_)
            | TapelineError::SourceMissing(_)
            | TapelineError::NotInitialized(_) => 3,
            TapelineError::BranchExists(_)
            | TapelineError::CurrentBranch(_)
            | TapelineError::ProtectedBranch(_)
            | TapelineError::SnapshotExists(_) => 4,
            TapelineError::Io(_) | TapelineError::SnapshotMissing(_) => 5,
            TapelineError::Json(_)
            | TapelineError::TomlParse(_)
            | TapelineError::InconsistentBranchGraph(_) => 6,
            _ => 1,
        }
    }

    /// Get actionable suggestions for fixing the error
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            TapelineError::CommitNotFound(_) => {
                vec!["Run 'tapeline log --all' to see every commit id"]
            }
            TapelineError::BranchNotFound(_) => {
                vec!["Run 'tapeline branch list' to see available branches"]
            }
            TapelineError::CurrentBranch(_) => {
                vec!["Switch to another branch first with 'tapeline branch switch <name>'"]
            }
            TapelineError::NotInitialized(_) => {
                vec!["Run 'tapeline init' in the directory holding your project file"]
            }
            TapelineError::SourceMissing(_) => vec![
                "Check that the project file has not been moved or renamed",
                "Or pass the file explicitly with '--file <path>'",
            ],
            TapelineError::SnapshotMissing(_) | TapelineError::InconsistentBranchGraph(_) => {
                vec!["Run 'tapeline doctor' to inspect the repository"]
            }
            TapelineError::SnapshotExists(_) => vec![
                "Retry the commit; ids include the commit time",
                "Or raise 'id_length' in .tapeline/config.toml",
            ],
            _ => vec![],
        }
    }

    /// Create a CommitNotFound error, shortening over-long ids
    pub fn commit_not_found(commit_id: &str) -> Self {
        TapelineError::CommitNotFound(commit_id.chars().take(16).collect())
    }
}
