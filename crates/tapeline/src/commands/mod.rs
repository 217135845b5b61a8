pub mod branch;
pub mod bundle;
pub mod checkout;
pub mod commit;
pub mod delete;
pub mod doctor;
pub mod init;
pub mod log;
pub mod show;
pub mod status;

use chrono::Local;
use libtapeline_core::{TapelineError, Timestamp};

/// Timestamp in local time for human output
pub fn format_local(ts: &Timestamp) -> String {
    ts.as_datetime()
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Destructive commands run only with an explicit `--yes`
pub fn require_confirmation(yes: bool, what: &str) -> Result<(), TapelineError> {
    if yes {
        Ok(())
    } else {
        Err(TapelineError::InvalidArgs(format!(
            "refusing to {} without --yes",
            what
        )))
    }
}
