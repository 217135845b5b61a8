use libtapeline_core::TapelineError;
use serde::Serialize;

use crate::cli::Cli;
use crate::context::TapelineContext;
use crate::output::output_success;

#[derive(Serialize)]
struct CommitOutput {
    commit_id: String,
    branch: String,
    message: String,
}

pub fn run(cli: &Cli, message: &str) -> Result<(), TapelineError> {
    let ctx = TapelineContext::resolve(cli)?;
    let engine = ctx.open_engine()?;
    let commit_id = engine.commit(message)?;
    let branch = engine.current_branch()?;

    output_success(
        cli,
        CommitOutput {
            commit_id,
            branch,
            message: message.to_string(),
        },
        |o| format!("Created commit {}: {}", o.commit_id, o.message),
    );
    Ok(())
}
