use libtapeline_core::{BundleStats, MergeStats, TapelineError};
use serde::Serialize;

use crate::cli::{BundleCommand, Cli};
use crate::context::{absolute, TapelineContext};
use crate::output::{output_success, print_human};

#[derive(Serialize)]
struct ImportOutput {
    #[serde(flatten)]
    stats: MergeStats,
    /// Commit checked out when the import touched the current branch
    checked_out: Option<String>,
}

pub fn run(cli: &Cli, cmd: BundleCommand) -> Result<(), TapelineError> {
    let ctx = TapelineContext::resolve(cli)?;
    let engine = ctx.open_engine()?;

    match cmd {
        BundleCommand::Export { dir, branch } => {
            let branch = match branch {
                Some(b) => b,
                None => engine.current_branch()?,
            };
            let dest = absolute(&dir)?;
            print_human(cli, &format!("Exporting branch '{}'...", branch));
            let stats = engine.export_bundle(&branch, &dest)?;
            output_success(cli, stats, |s: &BundleStats| {
                format!(
                    "Exported branch '{}' to {} ({} commits, {} bytes)",
                    s.branch,
                    dest.display(),
                    s.commits,
                    s.bytes
                )
            });
        }
        BundleCommand::Import { dir } => {
            let src = absolute(&dir)?;
            let head_before = engine.status()?.head;
            let stats = engine.import_bundle(&src)?;

            // Refresh the working file when the current branch's history moved
            let head_after = engine.status()?.head;
            let checked_out = match head_after {
                Some(head) if Some(&head) != head_before.as_ref() => {
                    engine.checkout(&head)?;
                    Some(head)
                }
                _ => None,
            };

            output_success(cli, ImportOutput { stats, checked_out }, |o| {
                let mut text = format!(
                    "Imported {} new commits, {} new branches, {} snapshots",
                    o.stats.commits_added,
                    o.stats.branches_added.len(),
                    o.stats.snapshots_copied
                );
                if let Some(id) = &o.checked_out {
                    text.push_str(&format!("\nUpdated project file to latest commit ({})", id));
                }
                text
            });
        }
    }

    Ok(())
}
