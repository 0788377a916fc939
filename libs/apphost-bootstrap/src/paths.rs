//! Home directory and data path resolution.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

#[derive(Debug, thiserror::Error)]
pub enum HomeDirError {
    #[error("HOME environment variable is not set")]
    HomeMissing,
    #[error("home_dir must be an absolute path (after ~ expansion): {0}")]
    AbsoluteRequired(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Expand a leading `~` to the user home directory.
///
/// Returns the path unchanged if no tilde prefix is present.
///
/// # Errors
/// Returns `HomeDirError::HomeMissing` when `~` is used and `HOME` is unset.
pub fn expand_tilde(raw: &str) -> Result<PathBuf, HomeDirError> {
    if let Some(stripped) = raw.strip_prefix("~/") {
        let home = env::var("HOME").map_err(|_| HomeDirError::HomeMissing)?;
        Ok(Path::new(&home).join(stripped))
    } else if raw == "~" {
        let home = env::var("HOME").map_err(|_| HomeDirError::HomeMissing)?;
        Ok(PathBuf::from(home))
    } else {
        Ok(PathBuf::from(raw))
    }
}

/// Resolve the process home directory.
///
/// - `config_home` set: `~` is expanded and the result must be absolute.
/// - unset: `$HOME/<default_subdir>`.
///
/// With `create`, the directory is created when missing.
///
/// # Errors
/// Fails when the path is relative, `HOME` is missing, or creation fails.
pub fn resolve_home_dir(
    config_home: Option<&str>,
    default_subdir: &str,
    create: bool,
) -> Result<PathBuf, HomeDirError> {
    let path = if let Some(raw) = config_home {
        let expanded = expand_tilde(raw)?;
        if !expanded.is_absolute() {
            return Err(HomeDirError::AbsoluteRequired(
                expanded.to_string_lossy().into(),
            ));
        }
        expanded
    } else {
        let home = env::var("HOME").map_err(|_| HomeDirError::HomeMissing)?;
        Path::new(&home).join(default_subdir)
    };

    if create {
        fs::create_dir_all(&path)?;
    }
    Ok(path)
}

/// Resolve `raw` against `home`: `~` is expanded, absolute paths are kept,
/// relative paths are joined onto `home`.
///
/// # Errors
/// Returns `HomeDirError::HomeMissing` when `~` is used and `HOME` is unset.
pub fn resolve_under(home: &Path, raw: &str) -> Result<PathBuf, HomeDirError> {
    let expanded = expand_tilde(raw)?;
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(home.join(expanded))
    }
}
