use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{BootstrapError, Result};

/// Locate a logical directory relative to the current working directory.
///
/// Returns `name` unchanged when it exists; otherwise `../name` when that
/// exists (the process was started one level below the project root).
pub fn resolve_source_dir(name: impl AsRef<Path>) -> Result<PathBuf> {
    resolve_source_dir_in(Path::new("."), name)
}

/// Like `resolve_source_dir`, with existence checked against `base` instead of
/// the process working directory. The returned path is relative to `base`.
pub fn resolve_source_dir_in(base: &Path, name: impl AsRef<Path>) -> Result<PathBuf> {
    let primary = name.as_ref().to_path_buf();
    if base.join(&primary).is_dir() {
        return Ok(primary);
    }

    let fallback = Path::new("..").join(&primary);
    if base.join(&fallback).is_dir() {
        info!(
            "Directory {} not found, using {} instead",
            primary.display(),
            fallback.display()
        );
        return Ok(fallback);
    }

    Err(BootstrapError::DirectoryNotFound { primary, fallback })
}
