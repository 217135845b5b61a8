use std::path::{Path, PathBuf};

use libtapeline_core::{
    config::metadata_path, load_repo_config, vcs_dir_for, MetadataStore, TapelineError,
    VersionEngine, VCS_DIR_NAME,
};
use tracing::debug;

use crate::cli::Cli;

/// Project file extensions of common DAWs, in lookup order
pub const DAW_EXTENSIONS: &[&str] = &[
    "flp", "als", "ptx", "cpr", "rpp", "logic", "aup", "aup3", "sfl", "sesx", "reason",
];

/// How the tracked file was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSource {
    Flag,
    Config,
    Extension,
    ProjectName,
    OnlyFile,
}

impl FileSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileSource::Flag => "flag",
            FileSource::Config => "config",
            FileSource::Extension => "extension",
            FileSource::ProjectName => "project_name",
            FileSource::OnlyFile => "only_file",
        }
    }
}

/// Resolved context for a tapeline command
#[derive(Debug)]
pub struct TapelineContext {
    pub root: PathBuf,
    pub tracked_file: PathBuf,
    pub source: FileSource,
}

impl TapelineContext {
    /// Walk up from the working directory to the nearest `.tapeline/`
    pub fn find_project_root() -> Result<PathBuf, TapelineError> {
        let cwd = std::env::current_dir()?;
        for dir in cwd.ancestors() {
            if metadata_path(&dir.join(VCS_DIR_NAME)).is_file() {
                return Ok(dir.to_path_buf());
            }
        }
        Err(TapelineError::NotInitialized(cwd))
    }

    /// Resolve the project and its tracked file.
    ///
    /// Resolution order:
    /// 1. `--file <path>`
    /// 2. `tracked_file` in .tapeline/config.toml
    /// 3. The first file with a known DAW extension
    /// 4. A file whose stem is the project name
    /// 5. The only regular file in the project directory
    pub fn resolve(cli: &Cli) -> Result<Self, TapelineError> {
        if let Some(file) = &cli.file {
            let tracked_file = absolute(file)?;
            let vcs_dir = vcs_dir_for(&tracked_file);
            if !metadata_path(&vcs_dir).is_file() {
                return Err(TapelineError::NotInitialized(vcs_dir));
            }
            let root = vcs_dir
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            return Ok(Self {
                root,
                tracked_file,
                source: FileSource::Flag,
            });
        }

        let root = Self::find_project_root()?;
        let vcs_dir = root.join(VCS_DIR_NAME);

        if let Some(name) = load_repo_config(&vcs_dir)?.and_then(|c| c.tracked_file) {
            return Ok(Self {
                tracked_file: root.join(name),
                root,
                source: FileSource::Config,
            });
        }

        let project_name = MetadataStore::new(&vcs_dir).load_metadata()?.project_name;
        let (tracked_file, source) = detect_project_file(&root, Some(&project_name))?
            .ok_or_else(|| {
                TapelineError::SourceMissing(root.join(format!("{}.*", project_name)))
            })?;
        debug!(file = %tracked_file.display(), source = source.as_str(), "Detected tracked file");
        Ok(Self {
            root,
            tracked_file,
            source,
        })
    }

    pub fn open_engine(&self) -> Result<VersionEngine, TapelineError> {
        VersionEngine::open(&self.tracked_file)
    }
}

/// Make a path absolute against the working directory
pub fn absolute(path: &Path) -> Result<PathBuf, TapelineError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn glob_files(pattern: &str) -> Result<Vec<PathBuf>, TapelineError> {
    let paths = glob::glob(pattern)
        .map_err(|e| TapelineError::InvalidArgs(format!("bad file pattern: {}", e)))?;
    let mut files: Vec<PathBuf> = paths.filter_map(Result::ok).filter(|p| p.is_file()).collect();
    files.sort();
    Ok(files)
}

/// Look for the project file in `dir`
pub fn detect_project_file(
    dir: &Path,
    project_name: Option<&str>,
) -> Result<Option<(PathBuf, FileSource)>, TapelineError> {
    let base = glob::Pattern::escape(&dir.to_string_lossy());

    for ext in DAW_EXTENSIONS {
        let files = glob_files(&format!("{}/*.{}", base, ext))?;
        if let Some(first) = files.first() {
            if files.len() > 1 {
                tracing::warn!(
                    extension = ext,
                    using = %first.display(),
                    "Multiple project files found"
                );
            }
            return Ok(Some((first.clone(), FileSource::Extension)));
        }
    }

    if let Some(name) = project_name.filter(|n| !n.is_empty()) {
        let pattern = format!("{}/{}.*", base, glob::Pattern::escape(name));
        if let Some(first) = glob_files(&pattern)?.into_iter().next() {
            return Ok(Some((first, FileSource::ProjectName)));
        }
    }

    let visible: Vec<PathBuf> = glob_files(&format!("{}/*", base))?
        .into_iter()
        .filter(|p| {
            p.file_name()
                .is_some_and(|n| !n.to_string_lossy().starts_with('.'))
        })
        .collect();
    if let [only] = visible.as_slice() {
        return Ok(Some((only.clone(), FileSource::OnlyFile)));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_daw_extension_wins() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("song.als"), b"x").unwrap();
        std::fs::write(dir.path().join("beat.flp"), b"x").unwrap();

        let (file, source) = detect_project_file(dir.path(), None).unwrap().unwrap();
        assert_eq!(file.file_name().unwrap(), "beat.flp");
        assert_eq!(source, FileSource::Extension);
    }

    #[test]
    fn test_project_name_fallback() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("mix.wav"), b"x").unwrap();
        std::fs::write(dir.path().join("beat.custom"), b"x").unwrap();

        let (file, source) = detect_project_file(dir.path(), Some("beat")).unwrap().unwrap();
        assert_eq!(file.file_name().unwrap(), "beat.custom");
        assert_eq!(source, FileSource::ProjectName);
    }

    #[test]
    fn test_single_file_fallback() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(".hidden"), b"x").unwrap();
        std::fs::write(dir.path().join("session.bin"), b"x").unwrap();

        let (file, source) = detect_project_file(dir.path(), None).unwrap().unwrap();
        assert_eq!(file.file_name().unwrap(), "session.bin");
        assert_eq!(source, FileSource::OnlyFile);
    }

    #[test]
    fn test_ambiguous_directory_finds_nothing() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), b"x").unwrap();
        std::fs::write(dir.path().join("b.bin"), b"x").unwrap();

        assert!(detect_project_file(dir.path(), None).unwrap().is_none());
    }
}
