use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

use super::{FileContents, SandboxFs, SandboxPath};
use crate::transport::{TransportPayload, py_str_literal};

/// Executes interpreter source inside the sandbox.
///
/// This is the only channel into a script-driven sandbox: every filesystem
/// operation arrives as a self-contained script.
pub trait ScriptRunner {
    fn run_script(&mut self, script: &str) -> io::Result<()>;
}

/// Sandbox filesystem driven through a `ScriptRunner`.
///
/// File content always travels as a base64 `TransportPayload`; paths travel as
/// escaped string literals.
pub struct ScriptSandbox<R> {
    runner: R,
}

impl<R: ScriptRunner> ScriptSandbox<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn into_runner(self) -> R {
        self.runner
    }
}

impl<R: ScriptRunner> SandboxFs for ScriptSandbox<R> {
    fn ensure_directory(&mut self, path: &SandboxPath) -> io::Result<()> {
        self.runner.run_script(&render_ensure_directory(path))
    }

    fn write_file(&mut self, path: &SandboxPath, contents: FileContents<'_>) -> io::Result<()> {
        self.runner.run_script(&render_write_file(path, contents))
    }
}

pub fn render_ensure_directory(path: &SandboxPath) -> String {
    format!(
        "import os\nos.makedirs({}, exist_ok=True)\n",
        py_str_literal(path.as_str())
    )
}

/// Text files are opened in text mode with newline translation disabled, so
/// the decoded string lands byte-for-byte. Byte files skip the text decode.
pub fn render_write_file(path: &SandboxPath, contents: FileContents<'_>) -> String {
    let target = py_str_literal(path.as_str());
    let payload = TransportPayload::encode(contents.as_bytes());
    match contents {
        FileContents::Text(_) => format!(
            "import base64\n\
             with open({target}, 'w', encoding='utf-8', newline='') as f:\n    \
             f.write({})\n",
            payload.text_expr()
        ),
        FileContents::Bytes(_) => format!(
            "import base64\n\
             with open({target}, 'wb') as f:\n    \
             f.write({})\n",
            payload.bytes_expr()
        ),
    }
}

/// Runs each script in a fresh interpreter process, fed through stdin, with
/// the sandbox root as working directory.
#[derive(Debug, Clone)]
pub struct PythonProcess {
    interpreter: String,
    workdir: PathBuf,
}

impl PythonProcess {
    pub fn new(interpreter: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            workdir: workdir.into(),
        }
    }
}

impl ScriptRunner for PythonProcess {
    fn run_script(&mut self, script: &str) -> io::Result<()> {
        let mut child = Command::new(&self.interpreter)
            .arg("-")
            .current_dir(&self.workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // The pipe closes when `stdin` drops, before waiting on the child.
        let sent = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(script.as_bytes()),
            None => Ok(()),
        };

        let output = child.wait_with_output()?;

        if let Err(e) = sent {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(io::Error::new(
                e.kind(),
                format!(
                    "{} stopped reading the script ({}), exited with {:?}: {}",
                    self.interpreter,
                    e,
                    output.status.code(),
                    stderr.trim_end()
                ),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.is_empty() {
            debug!("[{}] {}", self.interpreter, stdout.trim_end());
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(io::Error::other(format!(
                "{} exited with {:?}: {}",
                self.interpreter,
                output.status.code(),
                stderr.trim_end()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Captures scripts instead of running them.
    #[derive(Default)]
    struct RecordingRunner {
        scripts: Vec<String>,
        fail_on: Option<usize>,
    }

    impl ScriptRunner for RecordingRunner {
        fn run_script(&mut self, script: &str) -> io::Result<()> {
            if self.fail_on == Some(self.scripts.len()) {
                return Err(io::Error::other("interpreter crashed"));
            }
            self.scripts.push(script.to_string());
            Ok(())
        }
    }

    fn decoded_payload(script: &str) -> Vec<u8> {
        let start = script.find("b64decode('").unwrap() + "b64decode('".len();
        let end = start + script[start..].find('\'').unwrap();
        base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            &script[start..end],
        )
        .unwrap()
    }

    #[test]
    fn directory_script_quotes_path() {
        let path = SandboxPath::root("it's").unwrap();
        let script = render_ensure_directory(&path);
        assert_eq!(script, "import os\nos.makedirs('./it\\'s', exist_ok=True)\n");
    }

    #[test]
    fn text_script_applies_utf8_decode() {
        let path = SandboxPath::root("pkg").unwrap().join("a.py").unwrap();
        let script = render_write_file(&path, FileContents::Text("x = 'é'\n"));

        assert!(script.contains("open('./pkg/a.py', 'w', encoding='utf-8', newline='')"));
        assert!(script.contains(".decode('utf-8')"));
        assert_eq!(decoded_payload(&script), "x = 'é'\n".as_bytes());
    }

    #[test]
    fn bytes_script_writes_binary_without_text_decode() {
        let path = SandboxPath::root("assets").unwrap().join("logo.bin").unwrap();
        let script = render_write_file(&path, FileContents::Bytes(&[0xff, 0x00, b'\'']));

        assert!(script.contains("open('./assets/logo.bin', 'wb')"));
        assert!(!script.contains(".decode('utf-8')"));
        assert_eq!(decoded_payload(&script), vec![0xff, 0x00, b'\'']);
    }

    #[test]
    fn content_cannot_escape_the_literal() {
        let path = SandboxPath::root("pkg").unwrap().join("evil.py").unwrap();
        let content = "'); import shutil; shutil.rmtree('/'); ('\n\"\"\"\\";
        let script = render_write_file(&path, FileContents::Text(content));
        assert!(!script.contains("rmtree"));
        assert_eq!(script.lines().count(), 3);
    }

    #[test]
    fn sandbox_forwards_each_operation_as_one_script() {
        let mut sandbox = ScriptSandbox::new(RecordingRunner::default());
        let dir = SandboxPath::root("pkg").unwrap();
        sandbox.ensure_directory(&dir).unwrap();
        sandbox
            .write_file(&dir.join("a.py").unwrap(), FileContents::Text("pass\n"))
            .unwrap();

        let scripts = &sandbox.runner().scripts;
        assert_eq!(scripts.len(), 2);
        assert!(scripts[0].contains("os.makedirs('./pkg'"));
        assert!(scripts[1].contains("open('./pkg/a.py'"));
    }

    #[test]
    fn runner_failure_propagates() {
        let runner = RecordingRunner {
            fail_on: Some(0),
            ..Default::default()
        };
        let mut sandbox = ScriptSandbox::new(runner);
        let err = sandbox
            .ensure_directory(&SandboxPath::root("pkg").unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("interpreter crashed"));
    }

    #[cfg(unix)]
    #[test]
    fn interpreter_exiting_early_is_reaped_and_reported() {
        let tmp = tempfile::tempdir().unwrap();
        // `true` never reads stdin, so a script larger than the pipe buffer
        // cannot be delivered.
        let mut runner = PythonProcess::new("true", tmp.path());
        let script = "#".repeat(1 << 20);

        let err = runner.run_script(&script).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(err.to_string().contains("true stopped reading the script"), "{err}");
    }
}
