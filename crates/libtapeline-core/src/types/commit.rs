use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ids::CommitId;
use super::timestamp::Timestamp;

/// Commit log document: commit id -> record
pub type CommitLog = BTreeMap<CommitId, CommitRecord>;

/// One entry of the commit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Filled from the log key when absent in the document
    #[serde(default)]
    pub id: CommitId,
    pub message: String,
    /// Used for display order and for fork-point comparisons
    pub timestamp: Timestamp,
    /// Name of the tracked file when the snapshot was taken
    #[serde(default)]
    pub file: String,
    /// Branch the commit was authored on
    pub branch: String,
}

impl CommitRecord {
    /// Ordering for history listings: newest first, ties broken by id
    pub fn newest_first(a: &CommitRecord, b: &CommitRecord) -> std::cmp::Ordering {
        (b.timestamp, &b.id).cmp(&(a.timestamp, &a.id))
    }
}
