use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{BootstrapError, Result};
use crate::sandbox::{FileContents, SandboxFs, SandboxPath};

/// Which files of a host tree are mirrored, and how their content travels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeMode {
    /// Only files with `extension`, read as UTF-8 text.
    Source { extension: String },
    /// Every file, copied as raw bytes.
    Assets,
}

impl TreeMode {
    pub fn source(extension: &str) -> Self {
        TreeMode::Source {
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn accepts(&self, path: &Path) -> bool {
        match self {
            TreeMode::Source { extension } => path
                .extension()
                .is_some_and(|ext| ext == extension.as_str()),
            TreeMode::Assets => true,
        }
    }
}

/// Summary of one materialization pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializeReport {
    /// Host directory that was mirrored.
    pub source: PathBuf,
    /// Sandbox directory it was mirrored into.
    pub root: SandboxPath,
    pub directories: usize,
    pub files: usize,
    pub skipped: usize,
    pub bytes: u64,
}

/// Whether the tree under `root` holds at least one file `mode` accepts.
pub fn has_matching_file(root: &Path, mode: &TreeMode) -> Result<bool> {
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).display().to_string();
            BootstrapError::write_failure(path, e.into())
        })?;
        if entry.file_type().is_file() && mode.accepts(entry.path()) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Mirror the host tree at `source` into the sandbox under `./<basename>`.
///
/// Fails with `EmptySourceTree` before touching the sandbox when nothing in
/// the tree matches `mode`. Any read or write error aborts the pass; files
/// already written stay in place.
pub fn materialize<S>(sandbox: &mut S, source: &Path, mode: &TreeMode) -> Result<MaterializeReport>
where
    S: SandboxFs + ?Sized,
{
    if !has_matching_file(source, mode)? {
        return Err(BootstrapError::EmptySourceTree {
            root: source.to_path_buf(),
        });
    }

    let base = base_name(source)?;
    let root = SandboxPath::root(&base).map_err(|e| host_failure(source, e))?;

    let mut pass = Pass {
        sandbox,
        mode,
        report: MaterializeReport {
            source: source.to_path_buf(),
            root: root.clone(),
            directories: 0,
            files: 0,
            skipped: 0,
            bytes: 0,
        },
    };
    pass.ensure_directory(&root)?;
    pass.copy_directory(source, &root)?;

    let report = pass.report;
    info!(
        "Materialized {} -> {} ({} files, {} directories, {} bytes, {} skipped)",
        report.source.display(),
        report.root,
        report.files,
        report.directories,
        report.bytes,
        report.skipped
    );
    Ok(report)
}

struct Pass<'a, S: ?Sized> {
    sandbox: &'a mut S,
    mode: &'a TreeMode,
    report: MaterializeReport,
}

impl<S: SandboxFs + ?Sized> Pass<'_, S> {
    fn ensure_directory(&mut self, path: &SandboxPath) -> Result<()> {
        self.sandbox
            .ensure_directory(path)
            .map_err(|e| BootstrapError::write_failure(path.as_str(), e))?;
        self.report.directories += 1;
        Ok(())
    }

    fn copy_directory(&mut self, host: &Path, target: &SandboxPath) -> Result<()> {
        debug!("Processing directory: {} -> {}", host.display(), target);

        let entries = fs::read_dir(host).map_err(|e| host_failure(host, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| host_failure(host, e))?;
            let host_path = entry.path();
            // Follows symlinks, like a plain stat.
            let metadata = fs::metadata(&host_path).map_err(|e| host_failure(&host_path, e))?;
            let child = target
                .join_os(&entry.file_name())
                .map_err(|e| host_failure(&host_path, e))?;

            if metadata.is_dir() {
                self.ensure_directory(&child)?;
                self.copy_directory(&host_path, &child)?;
            } else if metadata.is_file() && self.mode.accepts(&host_path) {
                self.copy_file(&host_path, &child)?;
            } else {
                debug!("Skipping {}", host_path.display());
                self.report.skipped += 1;
            }
        }
        Ok(())
    }

    fn copy_file(&mut self, host: &Path, target: &SandboxPath) -> Result<()> {
        // Re-check the parent even though the recursion created it.
        let parent = target.parent().unwrap_or_else(SandboxPath::workdir);
        self.sandbox
            .ensure_directory(&parent)
            .map_err(|e| BootstrapError::write_failure(parent.as_str(), e))?;

        let written = match self.mode {
            TreeMode::Source { .. } => {
                let text = fs::read_to_string(host).map_err(|e| host_failure(host, e))?;
                self.write(target, FileContents::Text(&text))?
            }
            TreeMode::Assets => {
                let bytes = fs::read(host).map_err(|e| host_failure(host, e))?;
                self.write(target, FileContents::Bytes(&bytes))?
            }
        };

        self.report.files += 1;
        self.report.bytes += written as u64;
        debug!("Loaded file: {}", target);
        Ok(())
    }

    fn write(&mut self, target: &SandboxPath, contents: FileContents<'_>) -> Result<usize> {
        self.sandbox
            .write_file(target, contents)
            .map_err(|e| BootstrapError::write_failure(target.as_str(), e))?;
        Ok(contents.len())
    }
}

fn base_name(source: &Path) -> Result<String> {
    let name = match source.file_name() {
        Some(name) => name.to_os_string(),
        None => fs::canonicalize(source)
            .map_err(|e| host_failure(source, e))?
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| {
                host_failure(
                    source,
                    io::Error::new(io::ErrorKind::InvalidInput, "directory has no name"),
                )
            })?,
    };
    name.into_string().map_err(|name| {
        host_failure(
            source,
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("non UTF-8 directory name: {:?}", name),
            ),
        )
    })
}

fn host_failure(path: &Path, source: io::Error) -> BootstrapError {
    BootstrapError::write_failure(path.display().to_string(), source)
}
