//! Run the gate against the staged files.

use std::path::Path;

use tracing::debug;

use crate::config::Settings;
use crate::error::Error;
use crate::gate::{Outcome, Pipeline};
use crate::process::SystemRunner;

/// Run the run command.
pub async fn run(project_root: &Path) -> Result<(), Error> {
    let settings = Settings::load(project_root)?;
    debug!(?settings, "Loaded settings");

    let runner = SystemRunner;
    let mut pipeline = Pipeline::new(&runner, project_root, &settings, std::io::stdout());

    match pipeline.run().await? {
        Outcome::Skipped { branch } => debug!(branch = %branch, "Checks skipped"),
        Outcome::Passed => debug!("All checks passed"),
    }

    Ok(())
}
