pub mod types;
pub mod config;
pub mod error;
pub mod store;
pub mod snapshot;
pub mod branch;
pub mod engine;
pub mod integrity;
pub mod sync;

pub use error::TapelineError;
pub use types::{CommitId, CommitLog, CommitRecord, ProjectMetadata, Timestamp, MAIN_BRANCH};
pub use types::metadata::{BranchRecord, SizeSample};
pub use types::ids::{compute_commit_id, is_valid_commit_id};
pub use config::{RepoConfig, load_repo_config, save_repo_config, vcs_dir_for, VCS_DIR_NAME};
pub use store::MetadataStore;
pub use snapshot::SnapshotStore;
pub use branch::{ancestor_chain, is_visible, BranchView};
pub use engine::{validate_branch_name, Clock, FixedClock, ProjectStatus, SystemClock, VersionEngine};
pub use integrity::{check_integrity, IntegrityIssue, IntegrityReport};
pub use sync::{BundleStats, MergeStats};
