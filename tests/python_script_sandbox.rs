//! Drives the script channel through a real `python3`. Skipped when no
//! interpreter is on PATH.

use std::fs;
use std::path::Path;
use std::process::Command;

use sandbox_bootstrap::materialize::{TreeMode, materialize};
use sandbox_bootstrap::sandbox::{PythonProcess, ScriptSandbox};

fn python_available() -> bool {
    Command::new("python3")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

fn write(path: &Path, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn source_tree_round_trips_through_python() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }

    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("host").join("virtual_shell");
    let tricky = "s = 'it\\'s'\nd = \"\"\"triple\"\"\"\r\nu = 'caf\u{e9} \u{2615} \u{1f980}'\n\\\n";
    write(&source.join("main.py"), tricky.as_bytes());
    write(&source.join("commands").join("ls.py"), b"def run():\n    pass\n");
    write(&source.join("commands").join("notes.txt"), b"not copied");

    let root = tmp.path().join("box");
    fs::create_dir_all(&root).unwrap();
    let mut sandbox = ScriptSandbox::new(PythonProcess::new("python3", &root));

    let report = materialize(&mut sandbox, &source, &TreeMode::source("py")).unwrap();
    assert_eq!(report.files, 2);

    let copied = root.join("virtual_shell");
    assert_eq!(fs::read(copied.join("main.py")).unwrap(), tricky.as_bytes());
    assert_eq!(
        fs::read(copied.join("commands").join("ls.py")).unwrap(),
        b"def run():\n    pass\n"
    );
    assert!(!copied.join("commands").join("notes.txt").exists());
}

#[test]
fn asset_bytes_round_trip_through_python() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }

    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("data");
    let blob: Vec<u8> = (0u8..=255).collect();
    write(&source.join("nested").join("blob.bin"), &blob);

    let root = tmp.path().join("box");
    fs::create_dir_all(&root).unwrap();
    let mut sandbox = ScriptSandbox::new(PythonProcess::new("python3", &root));

    materialize(&mut sandbox, &source, &TreeMode::Assets).unwrap();

    assert_eq!(
        fs::read(root.join("data").join("nested").join("blob.bin")).unwrap(),
        blob
    );
}

#[test]
fn interpreter_failure_is_reported() {
    if !python_available() {
        eprintln!("python3 not found, skipping");
        return;
    }

    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("pkg");
    write(&source.join("a.py"), b"x = 1\n");

    // The sandbox root does not exist, so the interpreter cannot start there.
    let mut sandbox = ScriptSandbox::new(PythonProcess::new("python3", tmp.path().join("missing")));
    let err = materialize(&mut sandbox, &source, &TreeMode::source("py")).unwrap_err();
    assert!(err.to_string().contains("./pkg"), "{err}");
}
