use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use libtapeline_core::{CommitRecord, TapelineError};
use serde::Serialize;

use crate::cli::Cli;
use crate::commands::format_local;
use crate::context::TapelineContext;
use crate::output::output_success;

#[derive(Serialize)]
struct LogOutput {
    branch: Option<String>,
    commits: Vec<CommitRecord>,
    total: usize,
}

fn render_table(commits: &[CommitRecord]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec!["Commit", "Date", "Branch", "Message"]);

    for commit in commits {
        table.add_row(vec![
            commit.id.clone(),
            format_local(&commit.timestamp),
            commit.branch.clone(),
            commit.message.clone(),
        ]);
    }
    table.to_string()
}

pub fn run(cli: &Cli, all: bool, branch: Option<&str>) -> Result<(), TapelineError> {
    let ctx = TapelineContext::resolve(cli)?;
    let engine = ctx.open_engine()?;

    let (branch, commits) = if all {
        (None, engine.list_all_commits()?)
    } else if let Some(branch) = branch {
        (Some(branch.to_string()), engine.list_branch_commits(branch)?)
    } else {
        (Some(engine.current_branch()?), engine.list_commits()?)
    };

    let total = commits.len();
    output_success(cli, LogOutput { branch, commits, total }, |o| {
        if o.commits.is_empty() {
            return "No commits yet".to_string();
        }
        let title = match &o.branch {
            Some(b) => format!("Commit history for branch '{}':", b),
            None => "All commits:".to_string(),
        };
        format!("{}\n{}", title, render_table(&o.commits))
    });
    Ok(())
}
