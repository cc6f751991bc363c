//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::process::Command;

use commit_gate::config::Settings;
use commit_gate::fakes::ScriptedRunner;
use commit_gate::gate::{Outcome, Pipeline};
use commit_gate::process::{CommandOutput, ProcessRunner};
use commit_gate::Error;
use tempfile::TempDir;

/// Scripted runner whose `git diff-index` reports `files` as added.
pub fn runner_with_staged(files: &[&str]) -> ScriptedRunner {
    let listing: String = files.iter().map(|f| format!("A\0{}\0", f)).collect();
    ScriptedRunner::new().on("git", &["diff-index"], CommandOutput::ok(listing))
}

/// Run a pipeline and return its result plus everything it printed.
pub async fn run_pipeline<R: ProcessRunner>(
    runner: &R,
    root: &Path,
    settings: &Settings,
) -> (Result<Outcome, Error>, String) {
    let mut pipeline = Pipeline::new(runner, root, settings, Vec::new());
    let result = pipeline.run().await;
    let output = String::from_utf8(pipeline.into_output()).unwrap();
    (result, output)
}

pub fn write_file(root: &Path, path: &str, content: &str) {
    let full = root.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, content).unwrap();
}

/// Write an executable shell script.
pub fn write_script(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }
}

pub fn run_git(repo_dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Fresh repository without any commit.
pub fn make_git_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    run_git(dir.path(), &["init", "--quiet"]);
    run_git(dir.path(), &["config", "user.name", "test-user"]);
    run_git(dir.path(), &["config", "user.email", "test@example.com"]);
    run_git(dir.path(), &["config", "commit.gpgsign", "false"]);
    dir
}
