use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TapelineError;
use crate::types::ids::{DEFAULT_ID_LEN, MAX_ID_LEN, MIN_ID_LEN};

/// Name of the hidden directory kept next to the tracked file
pub const VCS_DIR_NAME: &str = ".tapeline";

/// Repo-level configuration stored in .tapeline/config.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// File name of the tracked project file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracked_file: Option<String>,
    /// Hex characters kept from the commit digest
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_length: Option<usize>,
}

impl RepoConfig {
    /// Commit id length, validated against the accepted range
    pub fn id_length(&self) -> Result<usize, TapelineError> {
        match self.id_length {
            None => Ok(DEFAULT_ID_LEN),
            Some(len) if (MIN_ID_LEN..=MAX_ID_LEN).contains(&len) => Ok(len),
            Some(len) => Err(TapelineError::InvalidArgs(format!(
                "id_length must be between {} and {}, got {}",
                MIN_ID_LEN, MAX_ID_LEN, len
            ))),
        }
    }
}

/// Load repo config from .tapeline/config.toml
pub fn load_repo_config(vcs_dir: &Path) -> Result<Option<RepoConfig>, TapelineError> {
    let config_path = config_path(vcs_dir);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&config_path)?;
    let config: RepoConfig = toml::from_str(&content)?;
    Ok(Some(config))
}

/// Save repo config to .tapeline/config.toml
pub fn save_repo_config(vcs_dir: &Path, config: &RepoConfig) -> Result<(), TapelineError> {
    std::fs::create_dir_all(vcs_dir)?;
    let content = toml::to_string_pretty(config)?;
    std::fs::write(config_path(vcs_dir), content)?;
    Ok(())
}

/// Get the version-control directory for a tracked file
pub fn vcs_dir_for(tracked_file: &Path) -> PathBuf {
    let parent = match tracked_file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    parent.join(VCS_DIR_NAME)
}

pub fn config_path(vcs_dir: &Path) -> PathBuf {
    vcs_dir.join("config.toml")
}

pub fn metadata_path(vcs_dir: &Path) -> PathBuf {
    vcs_dir.join("metadata.json")
}

pub fn commit_log_path(vcs_dir: &Path) -> PathBuf {
    vcs_dir.join("commit_log.json")
}

pub fn commits_dir(vcs_dir: &Path) -> PathBuf {
    vcs_dir.join("commits")
}
