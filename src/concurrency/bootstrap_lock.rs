//! Cross-process bootstrap lock using advisory file locking (fs2 flock).
//!
//! Only one bootstrap pass may populate a sandbox root at a time. The lock
//! file sits beside the root (`<root>.lock`), never inside it, so it is not
//! materialized along with the tree.

use fs2::FileExt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{BootstrapError, Result};

#[derive(Debug, Clone)]
pub struct BootstrapLock {
    path: PathBuf,
}

/// RAII guard that releases the lock on drop.
pub struct BootstrapLockGuard {
    file: File,
}

impl Drop for BootstrapLockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl BootstrapLock {
    /// Lock guarding the sandbox root at `root`.
    pub fn for_root(root: &Path) -> Self {
        let name = root
            .file_name()
            .map(|name| format!("{}.lock", name.to_string_lossy()))
            .unwrap_or_else(|| "sandbox.lock".to_string());
        let path = match root.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
            _ => PathBuf::from(name),
        };
        Self { path }
    }

    /// Lock backed by the file at `path`.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Non-blocking try-acquire: returns `None` if another pass holds it.
    pub fn try_acquire(&self) -> io::Result<Option<BootstrapLockGuard>> {
        let file = self.open()?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(BootstrapLockGuard { file })),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            #[cfg(unix)]
            Err(ref e) if e.raw_os_error() == Some(libc::EAGAIN) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Take the lock for a bootstrap pass, failing fast when it is held.
    pub fn begin_pass(&self) -> Result<BootstrapLockGuard> {
        let guard = self
            .try_acquire()
            .map_err(|e| BootstrapError::write_failure(self.path.display().to_string(), e))?;
        guard.ok_or_else(|| BootstrapError::BootstrapInProgress {
            lock: self.path.clone(),
        })
    }

    fn open(&self) -> io::Result<File> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        File::create(&self.path)
    }
}
