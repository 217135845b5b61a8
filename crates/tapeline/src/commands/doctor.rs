use libtapeline_core::{check_integrity, IntegrityIssue, IntegrityReport, TapelineError};

use crate::cli::Cli;
use crate::context::TapelineContext;
use crate::output::output_success;

fn describe(issue: &IntegrityIssue) -> String {
    match issue {
        IntegrityIssue::DanglingCommitRef { branch, commit_id } => {
            format!("branch '{}' lists unknown commit {}", branch, commit_id)
        }
        IntegrityIssue::MissingSnapshot { commit_id } => {
            format!("commit {} has no snapshot", commit_id)
        }
        IntegrityIssue::UnknownAuthorBranch { commit_id, branch } => {
            format!("commit {} belongs to deleted branch '{}'", commit_id, branch)
        }
        IntegrityIssue::OrphanSnapshot { commit_id } => {
            format!("snapshot {} is not referenced by any commit", commit_id)
        }
        IntegrityIssue::CurrentBranchUnknown { branch } => {
            format!("current branch '{}' is not in the branch list", branch)
        }
        IntegrityIssue::MainMissing => "branch 'main' is missing".to_string(),
        IntegrityIssue::BranchCycle { branch, cycle_at } => {
            format!("parent links from '{}' loop back at '{}'", branch, cycle_at)
        }
    }
}

fn render(report: &IntegrityReport) -> String {
    let mut lines = vec![format!(
        "Checked {} commits, {} snapshots",
        report.commits_checked, report.snapshots_found
    )];
    for issue in &report.problems {
        lines.push(format!("  [error] {}", describe(issue)));
    }
    for issue in &report.notices {
        lines.push(format!("  [note] {}", describe(issue)));
    }
    if report.is_healthy() {
        lines.push("No problems found".to_string());
    } else {
        lines.push(format!("{} problem(s) found", report.problem_count()));
    }
    lines.join("\n")
}

pub fn run(cli: &Cli) -> Result<(), TapelineError> {
    let ctx = TapelineContext::resolve(cli)?;
    let engine = ctx.open_engine()?;
    let report = check_integrity(&engine)?;
    output_success(cli, report, render);
    Ok(())
}
