//! CLI commands for commit-gate.

pub mod config;
pub mod files;
pub mod hooks;
pub mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::error::Error;
use crate::git::Git;
use crate::process::ProcessRunner;

/// commit-gate - pre-commit quality gate for PHP projects
#[derive(Parser)]
#[command(name = "commit-gate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Repository root (defaults to the top level of the current work tree)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run the checks against the staged files (default)
    Run,

    /// Install the git pre-commit hook
    Install,

    /// Remove the git pre-commit hook
    Uninstall,

    /// List the staged files the checks would see
    Files,

    /// Show the effective settings
    Config,
}

/// Directory the commands operate on.
///
/// An explicit `--root` wins. Otherwise the top level of the work tree around
/// `cwd`, or `cwd` itself when it is not inside one.
pub async fn resolve_root<R: ProcessRunner>(
    runner: &R,
    explicit: Option<PathBuf>,
    cwd: PathBuf,
) -> PathBuf {
    let root = match explicit {
        Some(root) => root,
        None => match Git::new(runner, &cwd).toplevel().await {
            Ok(top) => top,
            Err(e) => {
                debug!(error = %e, "No work tree around the current directory");
                cwd
            }
        },
    };
    root.canonicalize().unwrap_or(root)
}

/// [`resolve_root`] from the process's current directory.
pub async fn current_root<R: ProcessRunner>(
    runner: &R,
    explicit: Option<PathBuf>,
) -> Result<PathBuf, Error> {
    Ok(resolve_root(runner, explicit, std::env::current_dir()?).await)
}
