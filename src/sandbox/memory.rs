use std::collections::{BTreeMap, BTreeSet};
use std::io;

use super::{FileContents, SandboxFs, SandboxPath};

/// One operation as observed by a `MemorySandbox`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxOp {
    EnsureDirectory(SandboxPath),
    WriteFile { path: SandboxPath, bytes: usize },
}

/// In-memory sandbox namespace.
///
/// Enforces the same parent-before-child rule as a real filesystem and keeps
/// an ordered log of every operation it accepted.
#[derive(Debug, Default)]
pub struct MemorySandbox {
    directories: BTreeSet<SandboxPath>,
    files: BTreeMap<SandboxPath, Vec<u8>>,
    ops: Vec<SandboxOp>,
}

impl MemorySandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[SandboxOp] {
        &self.ops
    }

    pub fn file(&self, path: &SandboxPath) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn files(&self) -> impl Iterator<Item = (&SandboxPath, &[u8])> {
        self.files.iter().map(|(path, bytes)| (path, bytes.as_slice()))
    }

    pub fn has_directory(&self, path: &SandboxPath) -> bool {
        path.is_workdir() || self.directories.contains(path)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

impl SandboxFs for MemorySandbox {
    fn ensure_directory(&mut self, path: &SandboxPath) -> io::Result<()> {
        if self.files.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} exists and is a file", path),
            ));
        }
        let mut current = Some(path.clone());
        while let Some(dir) = current {
            if dir.is_workdir() {
                break;
            }
            current = dir.parent();
            self.directories.insert(dir);
        }
        self.ops.push(SandboxOp::EnsureDirectory(path.clone()));
        Ok(())
    }

    fn write_file(&mut self, path: &SandboxPath, contents: FileContents<'_>) -> io::Result<()> {
        let parent = path.parent().unwrap_or_else(SandboxPath::workdir);
        if !self.has_directory(&parent) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("parent directory {} does not exist", parent),
            ));
        }
        if self.directories.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} exists and is a directory", path),
            ));
        }
        self.files.insert(path.clone(), contents.as_bytes().to_vec());
        self.ops.push(SandboxOp::WriteFile {
            path: path.clone(),
            bytes: contents.len(),
        });
        Ok(())
    }
}
