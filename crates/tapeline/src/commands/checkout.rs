use libtapeline_core::TapelineError;
use serde::Serialize;

use crate::cli::Cli;
use crate::context::TapelineContext;
use crate::output::output_success;

#[derive(Serialize)]
struct CheckoutOutput {
    commit_id: String,
    tracked_file: String,
}

pub fn run(cli: &Cli, commit: &str) -> Result<(), TapelineError> {
    let ctx = TapelineContext::resolve(cli)?;
    let engine = ctx.open_engine()?;
    let commit_id = engine.checkout(commit)?;

    output_success(
        cli,
        CheckoutOutput {
            commit_id,
            tracked_file: ctx.tracked_file.display().to_string(),
        },
        |o| format!("Checked out commit {}", o.commit_id),
    );
    Ok(())
}
