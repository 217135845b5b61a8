use libtapeline_core::{is_visible, CommitRecord, TapelineError};
use serde::Serialize;

use crate::cli::Cli;
use crate::commands::format_local;
use crate::context::TapelineContext;
use crate::output::output_success;

#[derive(Serialize)]
struct ShowOutput {
    #[serde(flatten)]
    commit: CommitRecord,
    snapshot_present: bool,
    snapshot_size_bytes: Option<u64>,
    visible_on: Vec<String>,
}

pub fn run(cli: &Cli, commit: &str) -> Result<(), TapelineError> {
    let ctx = TapelineContext::resolve(cli)?;
    let engine = ctx.open_engine()?;
    let record = engine.commit_details(commit)?;
    let metadata = engine.metadata()?;

    let snapshot_size_bytes = engine
        .snapshots()
        .snapshot_path(&record.id)
        .ok()
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len());
    let visible_on = metadata
        .branches
        .iter()
        .filter(|b| is_visible(&record, b, &metadata))
        .cloned()
        .collect();

    let output = ShowOutput {
        snapshot_present: snapshot_size_bytes.is_some(),
        snapshot_size_bytes,
        visible_on,
        commit: record,
    };
    output_success(cli, output, |o| {
        let mut lines = vec![
            format!("Commit: {}", o.commit.id),
            format!("Message: {}", o.commit.message),
            format!("Date: {}", format_local(&o.commit.timestamp)),
            format!("Branch: {}", o.commit.branch),
            format!("File: {}", o.commit.file),
        ];
        match o.snapshot_size_bytes {
            Some(size) => lines.push(format!("Snapshot: {} bytes", size)),
            None => lines.push("Snapshot: missing".to_string()),
        }
        lines.push(format!("Visible on: {}", o.visible_on.join(", ")));
        lines.join("\n")
    });
    Ok(())
}
