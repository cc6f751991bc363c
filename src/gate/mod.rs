//! The commit gate: stage definitions and the pipeline that runs them.

pub mod files;
pub mod pipeline;
pub mod stages;

pub use pipeline::{Outcome, Pipeline};
pub use stages::{Stage, StageResult};
