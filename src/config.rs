//! Gate settings.
//!
//! Handles loading `.githook-settings` from the repository root and merging
//! it with the built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::error::Error;

/// Settings file name, relative to the repository root.
pub const SETTINGS_FILE: &str = ".githook-settings";

/// Functions banned in every project.
pub const DEFAULT_FORBIDDEN_FUNCTIONS: &[&str] = &["dump", "var_dump", "is_null"];

/// Effective gate settings. Built once per run, read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    /// Branch name substrings for which the gate is skipped.
    #[serde(default, deserialize_with = "one_or_many")]
    pub precommit_skip_branches: Vec<String>,

    /// Banned function names (defaults plus user additions).
    #[serde(default)]
    pub forbidden_functions: Vec<String>,

    /// Ruleset handed to phpcbf and phpcs.
    #[serde(default = "default_coding_standard")]
    pub coding_standard: String,

    /// Directory holding the composer-installed tools.
    #[serde(default = "default_bin_dir")]
    pub bin_dir: PathBuf,

    /// PHP interpreter used for syntax linting.
    #[serde(default = "default_php_binary")]
    pub php_binary: String,

    /// Unit test timeout in seconds.
    #[serde(default = "default_unit_test_timeout")]
    pub unit_test_timeout: u64,

    /// Run phpmd between the style check and the unit tests.
    #[serde(default)]
    pub precommit_mess_detection: bool,

    /// phpcbf exit codes that count as a successful fix.
    #[serde(default = "default_auto_fix_success_codes")]
    pub auto_fix_success_codes: Vec<i32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(branch)) => vec![branch],
        Some(OneOrMany::Many(branches)) => branches,
    })
}

// Default value functions
fn default_coding_standard() -> String {
    "Dovab".to_string()
}

fn default_bin_dir() -> PathBuf {
    PathBuf::from("vendor/bin")
}

fn default_php_binary() -> String {
    "php".to_string()
}

fn default_unit_test_timeout() -> u64 {
    3600
}

fn default_auto_fix_success_codes() -> Vec<i32> {
    vec![0, 1]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            precommit_skip_branches: Vec::new(),
            forbidden_functions: DEFAULT_FORBIDDEN_FUNCTIONS
                .iter()
                .map(|f| f.to_string())
                .collect(),
            coding_standard: default_coding_standard(),
            bin_dir: default_bin_dir(),
            php_binary: default_php_binary(),
            unit_test_timeout: default_unit_test_timeout(),
            precommit_mess_detection: false,
            auto_fix_success_codes: default_auto_fix_success_codes(),
        }
    }
}

impl Settings {
    /// Get the settings file path for a repository.
    pub fn path(root: &Path) -> PathBuf {
        root.join(SETTINGS_FILE)
    }

    /// Load settings from a repository root, falling back to defaults when
    /// the file does not exist.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = Self::path(root);
        if !path.exists() {
            debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path).map_err(|e| Error::ConfigParse {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Self::from_json(&content).map_err(|e| Error::ConfigParse {
            path,
            reason: e.to_string(),
        })
    }

    /// Parse settings JSON and merge it with the defaults.
    pub fn from_json(content: &str) -> Result<Self, Error> {
        let mut settings: Settings = serde_json::from_str(content)?;
        settings.forbidden_functions = merge_forbidden(&settings.forbidden_functions);
        settings
            .precommit_skip_branches
            .retain(|branch| !branch.trim().is_empty());
        Ok(settings)
    }

    /// Resolve the tool directory against the repository root.
    pub fn bin_path(&self, root: &Path) -> PathBuf {
        if self.bin_dir.is_absolute() {
            self.bin_dir.clone()
        } else {
            root.join(&self.bin_dir)
        }
    }
}

/// Defaults first, then user additions; case-insensitive duplicates dropped.
fn merge_forbidden(extra: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    let candidates = DEFAULT_FORBIDDEN_FUNCTIONS
        .iter()
        .map(|f| f.to_string())
        .chain(extra.iter().map(|f| f.trim().to_string()));

    for name in candidates {
        if name.is_empty() {
            continue;
        }
        if !merged.iter().any(|m| m.eq_ignore_ascii_case(&name)) {
            merged.push(name);
        }
    }
    merged
}
