//! commit-gate library.
//!
//! Pre-commit quality gate: lints, scans, fixes, style-checks and tests the
//! files staged for a git commit, aborting on the first failing stage.

pub mod cli;
pub mod config;
pub mod error;
pub mod fakes;
pub mod gate;
pub mod git;
pub mod process;

pub use error::Error;
