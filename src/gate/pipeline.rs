//! Pipeline controller.
//!
//! Runs the pre-checks and then every stage in order, stopping at the first
//! stage that fails.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::Settings;
use crate::error::Error;
use crate::gate::stages::{self, Stage, StageContext};
use crate::git::Git;
use crate::process::ProcessRunner;

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The branch matched a skip entry; nothing was checked.
    Skipped { branch: String },
    /// Every stage passed.
    Passed,
}

/// One gate run over a repository.
pub struct Pipeline<'a, R: ProcessRunner, W: Write + Send> {
    runner: &'a R,
    root: PathBuf,
    settings: &'a Settings,
    out: W,
}

impl<'a, R: ProcessRunner, W: Write + Send> Pipeline<'a, R, W> {
    pub fn new(runner: &'a R, root: &Path, settings: &'a Settings, out: W) -> Self {
        Self {
            runner,
            root: root.to_path_buf(),
            settings,
            out,
        }
    }

    /// Give back the output sink.
    pub fn into_output(self) -> W {
        self.out
    }

    /// Run the gate. Any failure is returned as an error.
    pub async fn run(&mut self) -> Result<Outcome, Error> {
        writeln!(self.out, "Commit Gate")?;

        if let Some(branch) = self.whitelisted_branch().await? {
            info!(branch = %branch, "Branch whitelisted, skipping checks");
            writeln!(
                self.out,
                "Skipping checks for this branch, since it is whitelisted"
            )?;
            return Ok(Outcome::Skipped { branch });
        }

        writeln!(self.out, "Fetching files")?;
        let files = Git::new(self.runner, &self.root).staged_files().await?;
        info!(count = files.len(), "Collected staged files");

        writeln!(self.out, "Check composer")?;
        stages::check_composer(&files)?;

        let ctx = StageContext {
            runner: self.runner,
            root: &self.root,
            settings: self.settings,
            files: &files,
        };

        for stage in Stage::sequence(self.settings) {
            writeln!(self.out, "{}", stage.banner())?;

            let result = stage.run(&ctx, &mut self.out).await?;
            for line in &result.diagnostics {
                writeln!(self.out, "{}", line)?;
            }

            if !result.success {
                warn!(stage = stage.name(), "Stage failed");
                return Err(Error::StageFailed { stage });
            }
        }

        writeln!(self.out, "Everything checks out!")?;
        Ok(Outcome::Passed)
    }

    /// The current branch, if it matches a skip entry.
    ///
    /// The branch is only looked up when skip entries are configured.
    async fn whitelisted_branch(&self) -> Result<Option<String>, Error> {
        let skip = &self.settings.precommit_skip_branches;
        if skip.is_empty() {
            return Ok(None);
        }

        let branch = Git::new(self.runner, &self.root).current_branch().await?;
        Ok(stages::is_whitelisted(&branch, skip).then_some(branch))
    }
}
