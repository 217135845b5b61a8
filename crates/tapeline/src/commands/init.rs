use libtapeline_core::{
    config::metadata_path, save_repo_config, vcs_dir_for, RepoConfig, TapelineError, VersionEngine,
};
use serde::Serialize;

use crate::cli::Cli;
use crate::context::{absolute, detect_project_file};
use crate::output::output_success;

#[derive(Serialize)]
struct InitOutput {
    tracked_file: String,
    vcs_dir: String,
    commit_id: Option<String>,
    already_initialized: bool,
}

pub fn run(cli: &Cli, id_length: Option<usize>) -> Result<(), TapelineError> {
    let tracked_file = match &cli.file {
        Some(file) => absolute(file)?,
        None => {
            let cwd = std::env::current_dir()?;
            detect_project_file(&cwd, None)?
                .map(|(path, _)| path)
                .ok_or_else(|| {
                    TapelineError::InvalidArgs(
                        "no project file found here; pass --file <path>".to_string(),
                    )
                })?
        }
    };
    if !tracked_file.is_file() {
        return Err(TapelineError::SourceMissing(tracked_file));
    }

    let vcs_dir = vcs_dir_for(&tracked_file);
    let file_name = tracked_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if metadata_path(&vcs_dir).is_file() {
        let output = InitOutput {
            tracked_file: tracked_file.display().to_string(),
            vcs_dir: vcs_dir.display().to_string(),
            commit_id: None,
            already_initialized: true,
        };
        output_success(cli, output, |_| {
            "Version control is already initialized in this directory".to_string()
        });
        return Ok(());
    }

    let config = RepoConfig {
        tracked_file: Some(file_name.clone()),
        id_length,
    };
    config.id_length()?;
    save_repo_config(&vcs_dir, &config)?;

    let engine = VersionEngine::open(&tracked_file)?;
    let commit_id = engine.commit("Initial commit")?;

    let output = InitOutput {
        tracked_file: tracked_file.display().to_string(),
        vcs_dir: vcs_dir.display().to_string(),
        commit_id: Some(commit_id),
        already_initialized: false,
    };
    output_success(cli, output, |o| {
        format!(
            "Initialized version control for {}\nCreated initial commit {}",
            file_name,
            o.commit_id.as_deref().unwrap_or_default()
        )
    });
    Ok(())
}
