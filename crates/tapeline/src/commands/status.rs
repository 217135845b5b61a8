use libtapeline_core::{ProjectStatus, TapelineError};
use serde::Serialize;

use crate::cli::Cli;
use crate::commands::format_local;
use crate::context::TapelineContext;
use crate::output::output_success;

#[derive(Serialize)]
struct StatusOutput {
    #[serde(flatten)]
    status: ProjectStatus,
    project_root: String,
    /// How the tracked file was resolved
    file_source: &'static str,
}

fn render(output: &StatusOutput) -> String {
    let status = &output.status;
    let mut lines = vec![
        format!("Project: {} ({})", status.project_name, output.project_root),
        format!(
            "Tracked file: {}{}",
            status.tracked_file.display(),
            if status.tracked_file_present { "" } else { " (missing)" }
        ),
        format!("On branch {}", status.current_branch),
        format!("Branches: {}", status.branches.join(", ")),
        format!(
            "Commits: {} visible, {} recorded",
            status.visible_commits, status.total_commits
        ),
    ];
    if let Some(head) = &status.head {
        lines.push(format!("Latest commit: {}", head));
    }
    if let Some(size) = status.latest_size_bytes {
        lines.push(format!("Latest size: {} bytes", size));
    }
    lines.push(format!("Created: {}", format_local(&status.created_at)));
    lines.push(format!("Last modified: {}", format_local(&status.last_modified)));
    lines.join("\n")
}

pub fn run(cli: &Cli) -> Result<(), TapelineError> {
    let ctx = TapelineContext::resolve(cli)?;
    let engine = ctx.open_engine()?;
    let output = StatusOutput {
        status: engine.status()?,
        project_root: ctx.root.display().to_string(),
        file_source: ctx.source.as_str(),
    };
    output_success(cli, output, render);
    Ok(())
}
