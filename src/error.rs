//! Error types for commit-gate.

use std::path::PathBuf;

use thiserror::Error;

use crate::gate::Stage;

/// Gate error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid settings file {}: {reason}", .path.display())]
    ConfigParse { path: PathBuf, reason: String },

    #[error("Could not determine the current GIT branch.")]
    BranchUndetermined,

    #[error("Git error: {0}")]
    Git(String),

    #[error("composer.lock must be commited if composer.json is modified!")]
    ComposerLockMissing,

    #[error("{}", .stage.failure_message())]
    StageFailed { stage: Stage },

    #[error("{program} timed out after {secs} seconds")]
    Timeout { program: String, secs: u64 },

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }
}
