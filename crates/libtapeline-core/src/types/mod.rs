pub mod commit;
pub mod ids;
pub mod metadata;
pub mod timestamp;

pub use commit::{CommitLog, CommitRecord};
pub use ids::CommitId;
pub use metadata::{BranchRecord, ProjectMetadata, MAIN_BRANCH};
pub use timestamp::Timestamp;
