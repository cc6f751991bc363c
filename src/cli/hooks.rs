//! Pre-commit hook installation and removal.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Error;
use crate::git::Git;
use crate::process::SystemRunner;

/// Our section of the pre-commit hook.
const PRE_COMMIT_BLOCK: &str = r#"# commit-gate quality checks (auto-installed)
commit-gate run || exit 1
"#;

fn pre_commit_path(hooks_dir: &Path) -> PathBuf {
    hooks_dir.join("pre-commit")
}

/// A line we wrote; user lines that merely mention the gate don't count.
fn is_gate_line(line: &str) -> bool {
    PRE_COMMIT_BLOCK.lines().any(|own| own == line.trim_end())
}

fn contains_gate_block(content: &str) -> bool {
    content.lines().any(is_gate_line)
}

/// Check if our pre-commit hook is installed.
pub fn hook_installed(hooks_dir: &Path) -> bool {
    fs::read_to_string(pre_commit_path(hooks_dir))
        .map(|content| contains_gate_block(&content))
        .unwrap_or(false)
}

/// Install the pre-commit hook into `hooks_dir`, preserving any existing hook.
pub fn install_hook(hooks_dir: &Path) -> Result<(), Error> {
    fs::create_dir_all(hooks_dir)?;

    let path = pre_commit_path(hooks_dir);
    let content = if path.exists() {
        let existing = fs::read_to_string(&path)?;
        if contains_gate_block(&existing) {
            return Ok(());
        }
        format!("{}\n\n{}", existing.trim_end(), PRE_COMMIT_BLOCK)
    } else {
        format!("#!/bin/sh\n{}", PRE_COMMIT_BLOCK)
    };

    fs::write(&path, content)?;
    make_executable(&path)?;
    info!(path = %path.display(), "Installed pre-commit hook");

    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), Error> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), Error> {
    Ok(())
}

/// Remove our section from the pre-commit hook.
///
/// Deletes the hook when nothing but the shebang is left. Returns whether
/// anything was removed.
pub fn uninstall_hook(hooks_dir: &Path) -> Result<bool, Error> {
    let path = pre_commit_path(hooks_dir);
    if !path.exists() {
        return Ok(false);
    }

    let content = fs::read_to_string(&path)?;
    if !contains_gate_block(&content) {
        return Ok(false);
    }

    let cleaned = remove_gate_section(&content);
    if cleaned.trim().is_empty() || cleaned.trim() == "#!/bin/sh" {
        fs::remove_file(&path)?;
    } else {
        fs::write(&path, format!("{}\n", cleaned.trim_end()))?;
    }
    info!(path = %path.display(), "Removed pre-commit hook");

    Ok(true)
}

fn remove_gate_section(content: &str) -> String {
    content
        .lines()
        .filter(|line| !is_gate_line(line))
        .collect::<Vec<_>>()
        .join("\n")
}

async fn locate_hooks(project_root: &Path) -> Option<PathBuf> {
    match Git::new(&SystemRunner, project_root).hooks_dir().await {
        Ok(dir) => Some(dir),
        Err(e) => {
            debug!(error = %e, "No hooks directory");
            None
        }
    }
}

/// `commit-gate install`.
pub async fn install(project_root: &Path) -> Result<(), Error> {
    let Some(hooks_dir) = locate_hooks(project_root).await else {
        println!("No git repository at {}, nothing to do.", project_root.display());
        return Ok(());
    };
    if hook_installed(&hooks_dir) {
        println!("Pre-commit hook already installed.");
        return Ok(());
    }

    install_hook(&hooks_dir)?;
    println!("Pre-commit hook installed.");
    Ok(())
}

/// `commit-gate uninstall`.
pub async fn uninstall(project_root: &Path) -> Result<(), Error> {
    let removed = match locate_hooks(project_root).await {
        Some(hooks_dir) => uninstall_hook(&hooks_dir)?,
        None => false,
    };

    if removed {
        println!("Pre-commit hook removed.");
    } else {
        println!("No commit-gate pre-commit hook found.");
    }
    Ok(())
}
