//! Sandbox filesystem seam: the write primitives the materializer drives.
//!
//! The interpreter sandbox owns a private filesystem namespace. This module
//! names locations inside it (`SandboxPath`) and defines the two operations
//! the bootstrap needs from it (`SandboxFs`). Backends:
//! - `DirSandbox`: a host directory acting as the sandbox root (direct calls)
//! - `ScriptSandbox`: operations rendered as interpreter scripts
//! - `MemorySandbox`: in-memory namespace with an operation log

pub mod dir;
pub mod memory;
pub mod script;

pub use dir::DirSandbox;
pub use memory::{MemorySandbox, SandboxOp};
pub use script::{PythonProcess, ScriptRunner, ScriptSandbox};

use std::fmt;
use std::io;
use std::path::Path;

use crate::config::{SandboxChannel, SandboxConfig};

/// A location inside the sandbox namespace.
///
/// Always relative to the sandbox working directory and written with forward
/// slashes, e.g. `./virtual_shell/commands/ls.py`. Every component is a plain
/// name: no `..`, no separators, no empty segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SandboxPath(String);

impl SandboxPath {
    /// The sandbox working directory itself (`.`).
    pub fn workdir() -> Self {
        Self(".".to_string())
    }

    /// A top-level directory named after a materialized tree.
    pub fn root(base_name: &str) -> io::Result<Self> {
        Self::workdir().join(base_name)
    }

    pub fn join(&self, name: &str) -> io::Result<Self> {
        validate_component(name)?;
        Ok(Self(format!("{}/{}", self.0, name)))
    }

    /// Append a host directory entry name; non-UTF-8 names are rejected.
    pub fn join_os(&self, name: &std::ffi::OsStr) -> io::Result<Self> {
        let name = name.to_str().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("non UTF-8 file name: {:?}", name),
            )
        })?;
        self.join(name)
    }

    /// Parent location; `None` for the working directory.
    pub fn parent(&self) -> Option<Self> {
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| Self(parent.to_string()))
    }

    pub fn file_name(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(_, name)| name)
    }

    pub fn is_workdir(&self) -> bool {
        self.0 == "."
    }

    /// Components below the working directory.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').skip(1)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SandboxPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_component(name: &str) -> io::Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if invalid {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid sandbox path component: {:?}", name),
        ));
    }
    Ok(())
}

/// Content handed to the sandbox for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileContents<'a> {
    /// Source text. Script-driven sandboxes apply the language's text decode step.
    Text(&'a str),
    /// Opaque bytes, written verbatim.
    Bytes(&'a [u8]),
}

impl<'a> FileContents<'a> {
    pub fn as_bytes(&self) -> &'a [u8] {
        match *self {
            FileContents::Text(text) => text.as_bytes(),
            FileContents::Bytes(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// Write primitives exposed by the sandbox collaborator.
pub trait SandboxFs {
    /// Create `path` and any missing ancestors. Idempotent.
    fn ensure_directory(&mut self, path: &SandboxPath) -> io::Result<()>;

    /// Create or replace the file at `path`. The parent must already exist.
    fn write_file(&mut self, path: &SandboxPath, contents: FileContents<'_>) -> io::Result<()>;
}

impl<S: SandboxFs + ?Sized> SandboxFs for Box<S> {
    fn ensure_directory(&mut self, path: &SandboxPath) -> io::Result<()> {
        (**self).ensure_directory(path)
    }

    fn write_file(&mut self, path: &SandboxPath, contents: FileContents<'_>) -> io::Result<()> {
        (**self).write_file(path, contents)
    }
}

/// Open the configured backend rooted at `root` on the host.
pub fn open_sandbox(config: &SandboxConfig, root: &Path) -> io::Result<Box<dyn SandboxFs>> {
    match config.channel {
        SandboxChannel::Direct => Ok(Box::new(DirSandbox::open(root)?)),
        SandboxChannel::Script => {
            std::fs::create_dir_all(root)?;
            let runner = PythonProcess::new(&config.interpreter, root);
            Ok(Box::new(ScriptSandbox::new(runner)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_under_workdir() {
        let root = SandboxPath::root("virtual_shell").unwrap();
        assert_eq!(root.as_str(), "./virtual_shell");
        assert_eq!(root.parent(), Some(SandboxPath::workdir()));
        assert_eq!(root.file_name(), Some("virtual_shell"));
    }

    #[test]
    fn join_and_parent_are_inverse() {
        let dir = SandboxPath::root("pkg").unwrap().join("commands").unwrap();
        let file = dir.join("ls.py").unwrap();
        assert_eq!(file.as_str(), "./pkg/commands/ls.py");
        assert_eq!(file.parent(), Some(dir));
        assert_eq!(
            file.components().collect::<Vec<_>>(),
            vec!["pkg", "commands", "ls.py"]
        );
    }

    #[test]
    fn workdir_has_no_parent() {
        let workdir = SandboxPath::workdir();
        assert!(workdir.is_workdir());
        assert_eq!(workdir.parent(), None);
        assert_eq!(workdir.components().count(), 0);
    }

    #[test]
    fn rejects_traversal_and_separators() {
        let root = SandboxPath::root("pkg").unwrap();
        for bad in ["", ".", "..", "a/b", "a\\b", "nul\0"] {
            let err = root.join(bad).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{bad:?}");
        }
    }

    #[test]
    fn names_with_quotes_are_plain_components() {
        let root = SandboxPath::root("pkg").unwrap();
        let path = root.join("it's \"fine\".py").unwrap();
        assert_eq!(path.file_name(), Some("it's \"fine\".py"));
    }

    #[test]
    fn contents_expose_bytes() {
        assert_eq!(FileContents::Text("hé").as_bytes(), "hé".as_bytes());
        assert_eq!(FileContents::Bytes(&[0, 1]).len(), 2);
        assert!(FileContents::Text("").is_empty());
    }
}
