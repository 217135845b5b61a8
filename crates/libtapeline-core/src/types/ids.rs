use sha2::{Digest, Sha256};

use super::timestamp::Timestamp;

/// Short hex identifier of a commit (truncated SHA-256)
pub type CommitId = String;

/// Number of hex characters kept from the digest unless configured otherwise
pub const DEFAULT_ID_LEN: usize = 8;

/// Shortest accepted id length
pub const MIN_ID_LEN: usize = 4;

/// Full SHA-256 digest in hex
pub const MAX_ID_LEN: usize = 64;

/// Derive a commit id from the tracked file's bytes and the commit instant.
///
/// The digest covers the content followed by the RFC 3339 text of the
/// timestamp. With 8 hex characters (32 bits) the birthday bound gives a
/// ~1% collision chance after roughly 9,300 commits in one project;
/// collisions are detected by the engine, never silently overwritten.
pub fn compute_commit_id(content: &[u8], timestamp: &Timestamp, len: usize) -> CommitId {
    let len = len.clamp(MIN_ID_LEN, MAX_ID_LEN);
    let mut hasher = Sha256::new();
    hasher.update(content);
    hasher.update(timestamp.to_iso().as_bytes());
    let mut id = hex::encode(hasher.finalize());
    id.truncate(len);
    id
}

/// Check that a string could be a commit id (lowercase hex of a sane length).
///
/// Ids become directory names, so anything read from outside the local
/// documents must pass this before it touches the filesystem.
pub fn is_valid_commit_id(s: &str) -> bool {
    (MIN_ID_LEN..=MAX_ID_LEN).contains(&s.len())
        && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[test]
    fn test_commit_id_is_deterministic() {
        let t = ts("2024-01-01T00:00:00Z");
        let a = compute_commit_id(b"project bytes", &t, DEFAULT_ID_LEN);
        let b = compute_commit_id(b"project bytes", &t, DEFAULT_ID_LEN);
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert!(is_valid_commit_id(&a));
    }

    #[test]
    fn test_commit_id_depends_on_time_and_content() {
        let t1 = ts("2024-01-01T00:00:00Z");
        let t2 = t1.succ();
        let base = compute_commit_id(b"same", &t1, 16);
        assert_ne!(base, compute_commit_id(b"same", &t2, 16));
        assert_ne!(base, compute_commit_id(b"other", &t1, 16));
    }

    #[test]
    fn test_commit_id_is_prefix_of_full_digest() {
        let t = ts("2024-01-01T00:00:00Z");
        let full = compute_commit_id(b"x", &t, MAX_ID_LEN);
        let short = compute_commit_id(b"x", &t, 12);
        assert_eq!(full.len(), 64);
        assert!(full.starts_with(&short));
    }

    #[test]
    fn test_commit_id_length_is_clamped() {
        let t = ts("2024-01-01T00:00:00Z");
        assert_eq!(compute_commit_id(b"x", &t, 1).len(), MIN_ID_LEN);
        assert_eq!(compute_commit_id(b"x", &t, 500).len(), MAX_ID_LEN);
    }

    #[test]
    fn test_is_valid_commit_id() {
        assert!(is_valid_commit_id("0a1b2c3d"));
        assert!(!is_valid_commit_id("0A1B2C3D"));
        assert!(!is_valid_commit_id("../../etc"));
        assert!(!is_valid_commit_id("abc"));
        assert!(!is_valid_commit_id(""));
    }
}
