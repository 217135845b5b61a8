use libtapeline_core::TapelineError;
use serde::Serialize;

use crate::cli::Cli;
use crate::commands::require_confirmation;
use crate::context::TapelineContext;
use crate::output::output_success;

#[derive(Serialize)]
struct DeleteOutput {
    commit_id: String,
    branch: String,
    /// Whether the commit and its snapshot were removed from storage
    removed: bool,
}

pub fn run(cli: &Cli, commit: &str, yes: bool) -> Result<(), TapelineError> {
    require_confirmation(yes, &format!("delete commit {}", commit))?;

    let ctx = TapelineContext::resolve(cli)?;
    let engine = ctx.open_engine()?;
    let branch = engine.current_branch()?;
    let commit_id = engine.delete_commit(commit)?;
    let removed = engine.commit_details(&commit_id).is_err();

    output_success(
        cli,
        DeleteOutput {
            commit_id,
            branch,
            removed,
        },
        |o| format!("Deleted commit {} from the current branch", o.commit_id),
    );
    Ok(())
}
