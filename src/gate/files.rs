//! Staged file selection.

use std::sync::LazyLock;

use regex::Regex;

/// PHP sources under `src/`, the set the style and function checks cover.
static PHP_FILES_IN_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^src/(.*)(\.php)$").unwrap());

/// Dependency manifest and its lock file.
pub const COMPOSER_JSON: &str = "composer.json";
pub const COMPOSER_LOCK: &str = "composer.lock";

/// Any PHP file, wherever it lives.
pub fn is_php_file(path: &str) -> bool {
    path.ends_with(".php")
}

/// PHP file inside the `src/` tree.
pub fn is_php_in_src(path: &str) -> bool {
    PHP_FILES_IN_SRC.is_match(path)
}

pub fn php_files(files: &[String]) -> impl Iterator<Item = &str> {
    files.iter().map(String::as_str).filter(|f| is_php_file(f))
}

pub fn php_files_in_src(files: &[String]) -> impl Iterator<Item = &str> {
    files.iter().map(String::as_str).filter(|f| is_php_in_src(f))
}
