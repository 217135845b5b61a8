use libtapeline_core::TapelineError;
use serde::Serialize;

use crate::cli::{BranchCommand, Cli};
use crate::commands::require_confirmation;
use crate::context::TapelineContext;
use crate::output::output_success;

#[derive(Serialize)]
struct BranchCreateOutput {
    branch: String,
    parent: String,
    initial_commit: Option<String>,
}

#[derive(Serialize)]
struct BranchListOutput {
    branches: Vec<String>,
    current: String,
}

#[derive(Serialize)]
struct BranchSwitchOutput {
    branch: String,
    checked_out: Option<String>,
}

#[derive(Serialize)]
struct BranchOutput {
    branch: String,
}

pub fn run(cli: &Cli, cmd: BranchCommand) -> Result<(), TapelineError> {
    let ctx = TapelineContext::resolve(cli)?;
    let engine = ctx.open_engine()?;

    match cmd {
        BranchCommand::Create { name } => {
            let parent = engine.current_branch()?;
            let branch = engine.create_branch(&name)?;
            let initial_commit = engine
                .list_commits()?
                .into_iter()
                .find(|c| c.branch == branch)
                .map(|c| c.id);
            output_success(
                cli,
                BranchCreateOutput {
                    branch,
                    parent,
                    initial_commit,
                },
                |o| match &o.initial_commit {
                    Some(id) => format!(
                        "Created and switched to branch '{}' from '{}' (initial commit {})",
                        o.branch, o.parent, id
                    ),
                    None => format!(
                        "Created and switched to branch '{}' from '{}'",
                        o.branch, o.parent
                    ),
                },
            );
        }
        BranchCommand::List => {
            let output = BranchListOutput {
                branches: engine.list_branches()?,
                current: engine.current_branch()?,
            };
            output_success(cli, output, |o| {
                o.branches
                    .iter()
                    .map(|b| {
                        let marker = if *b == o.current { "*" } else { " " };
                        format!("{} {}", marker, b)
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            });
        }
        BranchCommand::Switch { name } => {
            let checked_out = engine.switch_branch(&name)?;
            output_success(
                cli,
                BranchSwitchOutput {
                    branch: name,
                    checked_out,
                },
                |o| match &o.checked_out {
                    Some(id) => format!("Switched to branch '{}' at commit {}", o.branch, id),
                    None => format!("Switched to branch '{}' (no commits yet)", o.branch),
                },
            );
        }
        BranchCommand::Current => {
            let branch = engine.current_branch()?;
            output_success(cli, BranchOutput { branch }, |o| o.branch.clone());
        }
        BranchCommand::Delete { name, yes } => {
            require_confirmation(yes, &format!("delete branch '{}'", name))?;
            let branch = engine.delete_branch(&name)?;
            output_success(cli, BranchOutput { branch }, |o| {
                format!("Deleted branch '{}'", o.branch)
            });
        }
    }

    Ok(())
}
