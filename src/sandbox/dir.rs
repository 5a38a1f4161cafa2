use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{FileContents, SandboxFs, SandboxPath};

/// Sandbox namespace backed by a host directory.
///
/// Used when the interpreter's private filesystem is a directory the host can
/// reach directly (a preopened WASI directory, a container volume). Content is
/// written as-is; no transport encoding is involved.
#[derive(Debug, Clone)]
pub struct DirSandbox {
    root: PathBuf,
}

impl DirSandbox {
    /// Open (creating if needed) the sandbox root at `root`.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host location of a sandbox path. Components are validated by
    /// `SandboxPath`, so the result always stays under the root.
    pub fn host_path(&self, path: &SandboxPath) -> PathBuf {
        path.components()
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }
}

impl SandboxFs for DirSandbox {
    fn ensure_directory(&mut self, path: &SandboxPath) -> io::Result<()> {
        fs::create_dir_all(self.host_path(path))
    }

    fn write_file(&mut self, path: &SandboxPath, contents: FileContents<'_>) -> io::Result<()> {
        fs::write(self.host_path(path), contents.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_sandbox_paths_under_root() {
        let tmp = tempfile::tempdir().unwrap();
        let sandbox = DirSandbox::open(tmp.path().join("box")).unwrap();
        let path = SandboxPath::root("pkg").unwrap().join("a.py").unwrap();
        assert_eq!(
            sandbox.host_path(&path),
            tmp.path().join("box").join("pkg").join("a.py")
        );
        assert_eq!(sandbox.host_path(&SandboxPath::workdir()), sandbox.root());
    }

    #[test]
    fn writes_bytes_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sandbox = DirSandbox::open(tmp.path()).unwrap();
        let dir = SandboxPath::root("pkg").unwrap();
        let file = dir.join("data.bin").unwrap();

        sandbox.ensure_directory(&dir).unwrap();
        sandbox
            .write_file(&file, FileContents::Bytes(&[0, 159, 146, 150, b'\n']))
            .unwrap();

        let written = fs::read(tmp.path().join("pkg").join("data.bin")).unwrap();
        assert_eq!(written, vec![0, 159, 146, 150, b'\n']);
    }

    #[test]
    fn write_into_missing_parent_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sandbox = DirSandbox::open(tmp.path()).unwrap();
        let file = SandboxPath::root("missing")
            .unwrap()
            .join("a.py")
            .unwrap();

        let err = sandbox
            .write_file(&file, FileContents::Text("x = 1\n"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn ensure_directory_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sandbox = DirSandbox::open(tmp.path()).unwrap();
        let dir = SandboxPath::root("pkg").unwrap().join("sub").unwrap();
        sandbox.ensure_directory(&dir).unwrap();
        sandbox.ensure_directory(&dir).unwrap();
        assert!(tmp.path().join("pkg").join("sub").is_dir());
    }
}
