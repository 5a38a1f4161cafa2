use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced to the bootstrap driver.
///
/// Every variant is fatal for the pass that raised it; nothing here is retried.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("directory not found at {} or {}", primary.display(), fallback.display())]
    DirectoryNotFound { primary: PathBuf, fallback: PathBuf },

    #[error("no matching files found under {}", root.display())]
    EmptySourceTree { root: PathBuf },

    #[error("failed to materialize {path}: {source}")]
    MaterializationWriteFailure {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("another bootstrap pass holds the lock at {}", lock.display())]
    BootstrapInProgress { lock: PathBuf },

    #[error("failed to write to console: {0}")]
    ConsoleWriteFailure(#[source] io::Error),

    #[error("terminal error: {0}")]
    Terminal(#[source] io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BootstrapError {
    pub(crate) fn write_failure(path: impl Into<String>, source: io::Error) -> Self {
        Self::MaterializationWriteFailure {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, BootstrapError>;
