//! Gate stages.
//!
//! The pre-checks (branch whitelist, composer lock) are plain functions. The
//! tool-backed stages are variants of [`Stage`]; each one walks its whole
//! file set before reporting, so a single run shows every problem.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::config::Settings;
use crate::error::Error;
use crate::gate::files::{self, COMPOSER_JSON, COMPOSER_LOCK};
use crate::process::{CommandOutput, CommandSpec, ProcessRunner};

/// Tool-backed stages, in the order the pipeline may run them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// `php -l` on every staged PHP file.
    Lint,
    /// Regex scan of `src/` for banned calls.
    ForbiddenFunctions,
    /// `phpcbf` on every staged `src/` file.
    AutoFix,
    /// `phpcs` on every staged `src/` file.
    CodeStyle,
    /// `phpmd` on every staged `src/` file (opt-in).
    MessDetection,
    /// One `simple-phpunit` run for the whole repository.
    UnitTests,
}

impl Stage {
    /// Stages to run for the given settings.
    pub fn sequence(settings: &Settings) -> Vec<Stage> {
        let mut stages = vec![
            Stage::Lint,
            Stage::ForbiddenFunctions,
            Stage::AutoFix,
            Stage::CodeStyle,
        ];
        if settings.precommit_mess_detection {
            stages.push(Stage::MessDetection);
        }
        stages.push(Stage::UnitTests);
        stages
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Lint => "lint",
            Stage::ForbiddenFunctions => "forbidden_functions",
            Stage::AutoFix => "auto_fix",
            Stage::CodeStyle => "code_style",
            Stage::MessDetection => "mess_detection",
            Stage::UnitTests => "unit_tests",
        }
    }

    /// Progress line printed when the stage starts.
    pub fn banner(&self) -> &'static str {
        match self {
            Stage::Lint => "Running PHPLint",
            Stage::ForbiddenFunctions => "Checking for forbidden functions",
            Stage::AutoFix => "Fixing code style",
            Stage::CodeStyle => "Checking code style with PHPCS",
            Stage::MessDetection => "Checking code mess with PHPMD",
            Stage::UnitTests => "Running unit tests",
        }
    }

    /// Message the run aborts with when the stage fails.
    pub fn failure_message(&self) -> &'static str {
        match self {
            Stage::Lint => "There are some PHP syntax errors!",
            Stage::ForbiddenFunctions => "There are still forbidden functions in this commit!",
            Stage::AutoFix => "Could not auto fix everything!",
            Stage::CodeStyle => {
                "There are coding standard violations which could not be fixed automatically!"
            }
            Stage::MessDetection => "There are PHPMD violations!",
            Stage::UnitTests => "Fix the unit tests!",
        }
    }

    /// Run the stage over the staged files.
    ///
    /// `sink` receives live output of stages that stream (the unit tests).
    pub async fn run<R: ProcessRunner>(
        self,
        ctx: &StageContext<'_, R>,
        sink: &mut (dyn Write + Send),
    ) -> Result<StageResult, Error> {
        match self {
            Stage::Lint => Ok(lint(ctx).await),
            Stage::ForbiddenFunctions => {
                forbidden_functions(ctx.root, &ctx.settings.forbidden_functions, ctx.files)
            }
            Stage::AutoFix => Ok(auto_fix(ctx).await),
            Stage::CodeStyle => Ok(code_style(ctx).await),
            Stage::MessDetection => Ok(mess_detection(ctx).await),
            Stage::UnitTests => unit_tests(ctx, sink).await,
        }
    }
}

/// Outcome of one stage: pass/fail plus the lines to show the user.
#[derive(Debug, Clone)]
pub struct StageResult {
    pub stage: Stage,
    pub success: bool,
    pub diagnostics: Vec<String>,
}

impl StageResult {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            success: true,
            diagnostics: Vec::new(),
        }
    }

    /// Mark the stage failed.
    pub fn fail(&mut self) {
        self.success = false;
    }

    /// Add a diagnostic line; blank text is dropped.
    pub fn report(&mut self, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            self.diagnostics.push(text.to_string());
        }
    }
}

/// Inputs shared by every stage of one run.
pub struct StageContext<'a, R: ProcessRunner> {
    pub runner: &'a R,
    pub root: &'a Path,
    pub settings: &'a Settings,
    pub files: &'a [String],
}

impl<R: ProcessRunner> StageContext<'_, R> {
    /// Command for a composer-installed tool, run from the repository root.
    fn tool(&self, name: &str) -> CommandSpec {
        CommandSpec::tool(&self.settings.bin_path(self.root), name).current_dir(self.root)
    }

    fn standard_arg(&self) -> String {
        format!("--standard={}", self.settings.coding_standard)
    }
}

/// Case-insensitive substring match of any skip entry against the branch.
pub fn is_whitelisted(branch: &str, skip_branches: &[String]) -> bool {
    let branch = branch.to_lowercase();
    skip_branches
        .iter()
        .filter(|entry| !entry.is_empty())
        .any(|entry| branch.contains(&entry.to_lowercase()))
}

/// A staged composer.json requires a staged composer.lock.
pub fn check_composer(files: &[String]) -> Result<(), Error> {
    let staged = |name: &str| files.iter().any(|f| f == name);

    if staged(COMPOSER_JSON) && !staged(COMPOSER_LOCK) {
        return Err(Error::ComposerLockMissing);
    }
    Ok(())
}

/// Pattern matching a call to `name`: whole identifier, optional
/// whitespace, opening parenthesis.
pub fn forbidden_pattern(name: &str) -> Result<Regex, Error> {
    let pattern = RegexBuilder::new(&format!(r"\b{}\s*\(", regex::escape(name)))
        .case_insensitive(true)
        .multi_line(true)
        .build()?;
    Ok(pattern)
}

/// Scan staged `src/` PHP files for calls to forbidden functions.
pub fn forbidden_functions(
    root: &Path,
    names: &[String],
    files: &[String],
) -> Result<StageResult, Error> {
    let patterns = names
        .iter()
        .map(|name| forbidden_pattern(name).map(|pattern| (name.as_str(), pattern)))
        .collect::<Result<Vec<_>, Error>>()?;

    let mut result = StageResult::new(Stage::ForbiddenFunctions);

    for file in files::php_files_in_src(files) {
        let content = match fs::read(root.join(file)) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                result.fail();
                result.report(&format!("Could not read {}: {}", file, e));
                continue;
            }
        };

        for (name, pattern) in &patterns {
            if pattern.is_match(&content) {
                result.fail();
                result.report(&format!("{} found in {}", name, file));
            }
        }
    }

    Ok(result)
}

async fn lint<R: ProcessRunner>(ctx: &StageContext<'_, R>) -> StageResult {
    let mut result = StageResult::new(Stage::Lint);

    for file in files::php_files(ctx.files) {
        let cmd = CommandSpec::new(&ctx.settings.php_binary)
            .arg("-l")
            .arg(file)
            .current_dir(ctx.root);

        match ctx.runner.output(&cmd).await {
            Ok(output) if output.success() => {}
            Ok(output) => {
                result.fail();
                result.report(file);
                result.report(error_text(&output));
            }
            Err(e) => {
                result.fail();
                result.report(file);
                result.report(&e.to_string());
            }
        }
    }

    result
}

async fn auto_fix<R: ProcessRunner>(ctx: &StageContext<'_, R>) -> StageResult {
    let mut result = StageResult::new(Stage::AutoFix);

    for file in files::php_files_in_src(ctx.files) {
        let cmd = ctx.tool("phpcbf").arg(ctx.standard_arg()).arg(file);

        match ctx.runner.output(&cmd).await {
            Ok(output) => {
                let fixed = output
                    .code
                    .is_some_and(|code| ctx.settings.auto_fix_success_codes.contains(&code));
                if !fixed {
                    result.fail();
                    result.report(file);
                    result.report(&output.stdout);
                } else if !output.success() {
                    debug!(file, "Code style fixed");
                }
            }
            Err(e) => {
                result.fail();
                result.report(file);
                result.report(&e.to_string());
            }
        }
    }

    result
}

async fn code_style<R: ProcessRunner>(ctx: &StageContext<'_, R>) -> StageResult {
    let mut result = StageResult::new(Stage::CodeStyle);

    for file in files::php_files_in_src(ctx.files) {
        let cmd = ctx.tool("phpcs").arg(ctx.standard_arg()).arg(file);

        match ctx.runner.output(&cmd).await {
            Ok(output) if output.success() => {}
            Ok(output) => {
                result.fail();
                result.report(if output.stdout.trim().is_empty() {
                    error_text(&output)
                } else {
                    output.stdout.as_str()
                });
            }
            Err(e) => {
                result.fail();
                result.report(file);
                result.report(&e.to_string());
            }
        }
    }

    result
}

async fn mess_detection<R: ProcessRunner>(ctx: &StageContext<'_, R>) -> StageResult {
    let mut result = StageResult::new(Stage::MessDetection);

    for file in files::php_files_in_src(ctx.files) {
        let cmd = ctx.tool("phpmd").args([file, "text", "controversial"]);

        match ctx.runner.output(&cmd).await {
            Ok(output) if output.success() => {}
            Ok(output) => {
                result.fail();
                result.report(file);
                result.report(&output.stderr);
                result.report(&output.stdout);
            }
            Err(e) => {
                result.fail();
                result.report(file);
                result.report(&e.to_string());
            }
        }
    }

    result
}

async fn unit_tests<R: ProcessRunner>(
    ctx: &StageContext<'_, R>,
    sink: &mut (dyn Write + Send),
) -> Result<StageResult, Error> {
    let mut result = StageResult::new(Stage::UnitTests);
    let cmd = ctx.tool("simple-phpunit");
    let timeout = Duration::from_secs(ctx.settings.unit_test_timeout);

    match ctx.runner.stream(&cmd, timeout, sink).await {
        Ok(true) => {}
        Ok(false) => result.fail(),
        Err(e @ Error::Timeout { .. }) => return Err(e),
        Err(e) => {
            result.fail();
            result.report(&e.to_string());
        }
    }

    Ok(result)
}

/// Prefer stderr, fall back to stdout (php -l reports parse errors on either).
fn error_text(output: &CommandOutput) -> &str {
    if output.stderr.trim().is_empty() {
        &output.stdout
    } else {
        &output.stderr
    }
}
