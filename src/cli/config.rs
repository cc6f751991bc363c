//! Show the effective settings.

use std::path::Path;

use crate::config::Settings;
use crate::error::Error;

/// Print settings (defaults merged with `.githook-settings`) as JSON.
pub fn show(project_root: &Path) -> Result<(), Error> {
    let path = Settings::path(project_root);
    let settings = Settings::load(project_root)?;

    if path.exists() {
        println!("Settings: {}", path.display());
    } else {
        println!("No {} found, using defaults.", path.display());
    }
    println!("{}", serde_json::to_string_pretty(&settings)?);

    Ok(())
}
