//! List staged files.

use std::path::Path;

use crate::error::Error;
use crate::git::Git;
use crate::process::SystemRunner;

/// Run the files command.
pub async fn run(project_root: &Path) -> Result<(), Error> {
    let files = Git::new(&SystemRunner, project_root).staged_files().await?;

    if files.is_empty() {
        println!("No added or modified files staged.");
    }
    for file in &files {
        println!("{}", file);
    }

    Ok(())
}
