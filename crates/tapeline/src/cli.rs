use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tapeline", about = "Snapshot version control for DAW project files", version)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress human-readable output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Project file to track (overrides discovery)
    #[arg(long, global = true)]
    pub file: Option<PathBuf>,

    /// Log filter used when TAPELINE_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start tracking a project file and record an initial commit
    Init {
        /// Hex characters kept from each commit digest (4-64)
        #[arg(long)]
        id_length: Option<usize>,
    },

    /// Snapshot the project file onto the current branch
    Commit {
        /// Commit message
        message: String,
    },

    /// Show commit history
    Log {
        /// List every commit regardless of branch
        #[arg(long, conflicts_with = "branch")]
        all: bool,

        /// Show another branch's history
        #[arg(long)]
        branch: Option<String>,
    },

    /// Restore the project file to a commit
    Checkout {
        /// Commit id
        commit: String,
    },

    /// Show project status
    Status,

    /// Branch management commands
    Branch {
        #[command(subcommand)]
        cmd: BranchCommand,
    },

    /// Delete a commit from the current branch
    Delete {
        /// Commit id
        commit: String,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Show commit details
    Show {
        /// Commit id
        commit: String,
    },

    /// Check project documents and snapshots for damage
    Doctor,

    /// Move branches between copies of a project
    Bundle {
        #[command(subcommand)]
        cmd: BundleCommand,
    },
}

#[derive(Clone, Subcommand)]
pub enum BranchCommand {
    /// Fork a new branch from the current one and switch to it
    Create {
        /// Branch name
        name: String,
    },

    /// List all branches
    List,

    /// Switch to a branch and restore its latest commit
    Switch {
        /// Branch name
        name: String,
    },

    /// Show the current branch
    Current,

    /// Delete a branch and the commits only it needs
    Delete {
        /// Branch name
        name: String,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Clone, Subcommand)]
pub enum BundleCommand {
    /// Write a branch and its snapshots into a directory
    Export {
        /// Destination directory
        dir: PathBuf,

        /// Branch to export (defaults to the current branch)
        #[arg(long)]
        branch: Option<String>,
    },

    /// Merge a bundle directory into this project
    Import {
        /// Bundle directory
        dir: PathBuf,
    },
}
