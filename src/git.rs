//! Git integration: current branch and staged file discovery.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Error;
use crate::process::{CommandSpec, ProcessRunner};

/// Hash of git's empty tree, used as the diff base before the first commit.
pub const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// Git commands run against one repository.
pub struct Git<'a, R: ProcessRunner> {
    runner: &'a R,
    root: PathBuf,
}

impl<'a, R: ProcessRunner> Git<'a, R> {
    pub fn new(runner: &'a R, root: &Path) -> Self {
        Self {
            runner,
            root: root.to_path_buf(),
        }
    }

    fn git(&self, args: &[&str]) -> CommandSpec {
        CommandSpec::new("git")
            .args(args.iter().copied())
            .current_dir(&self.root)
    }

    /// Name of the checked-out branch.
    pub async fn current_branch(&self) -> Result<String, Error> {
        let output = self
            .runner
            .output(&self.git(&["rev-parse", "--abbrev-ref", "HEAD"]))
            .await
            .map_err(|_| Error::BranchUndetermined)?;

        if !output.success() {
            return Err(Error::BranchUndetermined);
        }

        let branch = output.stdout.lines().next().unwrap_or("").trim();
        if branch.is_empty() {
            return Err(Error::BranchUndetermined);
        }

        Ok(branch.to_string())
    }

    /// Check whether a revision resolves.
    pub async fn revision_exists(&self, revision: &str) -> Result<bool, Error> {
        let output = self
            .runner
            .output(&self.git(&["rev-parse", "--verify", "--quiet", revision]))
            .await?;
        Ok(output.success())
    }

    /// Top-level directory of the work tree containing the root.
    pub async fn toplevel(&self) -> Result<PathBuf, Error> {
        let output = self
            .runner
            .output(&self.git(&["rev-parse", "--show-toplevel"]))
            .await?;

        let top = output.stdout.trim();
        if !output.success() || top.is_empty() {
            return Err(Error::Git(format!(
                "not inside a git work tree: {}",
                output.stderr.trim()
            )));
        }
        Ok(PathBuf::from(top))
    }

    /// Directory git runs hooks from; honors worktrees and `core.hooksPath`.
    pub async fn hooks_dir(&self) -> Result<PathBuf, Error> {
        let output = self
            .runner
            .output(&self.git(&["rev-parse", "--git-path", "hooks"]))
            .await?;

        let path = output.stdout.trim();
        if !output.success() || path.is_empty() {
            return Err(Error::Git(format!(
                "could not locate the hooks directory: {}",
                output.stderr.trim()
            )));
        }
        Ok(self.root.join(path))
    }

    /// Files added or modified in the index, in git's output order.
    pub async fn staged_files(&self) -> Result<Vec<String>, Error> {
        let against = if self.revision_exists("HEAD").await? {
            "HEAD"
        } else {
            EMPTY_TREE
        };
        debug!(against, "Diffing index");

        let output = self
            .runner
            .output(&self.git(&["diff-index", "--cached", "--name-status", "-z", against]))
            .await?;

        if !output.success() {
            return Err(Error::Git(format!(
                "git diff-index failed: {}",
                output.stderr.trim()
            )));
        }

        Ok(parse_name_status(&output.stdout))
    }
}

/// Keep added (`A`) and modified (`M`) entries of `--name-status -z` output.
///
/// Records are `status NUL path NUL`; copies and renames carry a second path.
/// Paths come through unquoted, whatever bytes they contain.
pub fn parse_name_status(output: &str) -> Vec<String> {
    let mut fields = output.split('\0');
    let mut files = Vec::new();

    while let Some(status) = fields.next() {
        if status.is_empty() {
            continue;
        }
        let Some(path) = fields.next() else { break };
        if status.starts_with('R') || status.starts_with('C') {
            fields.next();
            continue;
        }
        if (status.starts_with('A') || status.starts_with('M')) && !path.is_empty() {
            files.push(path.to_string());
        }
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedRunner;
    use crate::process::CommandOutput;

    #[test]
    fn test_parse_name_status_filters_statuses() {
        let output = "A\0src/New.php\0M\0src/Changed.php\0D\0src/Gone.php\0R100\0old.php\0new.php\0M\0dir with space/File.php\0";
        assert_eq!(
            parse_name_status(output),
            vec!["src/New.php", "src/Changed.php", "dir with space/File.php"]
        );
    }

    #[test]
    fn test_parse_name_status_keeps_raw_paths() {
        let output = "A\0src/Caf\u{e9}.php\0M\0src/Tab\tName.php\0A\0src/\"quoted\".php\0";
        assert_eq!(
            parse_name_status(output),
            vec!["src/Caf\u{e9}.php", "src/Tab\tName.php", "src/\"quoted\".php"]
        );
    }

    #[test]
    fn test_parse_name_status_empty() {
        assert!(parse_name_status("").is_empty());
    }

    #[tokio::test]
    async fn test_current_branch() {
        let runner = ScriptedRunner::new().on(
            "git",
            &["rev-parse", "--abbrev-ref"],
            CommandOutput::ok("feature/WIP-42\n"),
        );
        let git = Git::new(&runner, Path::new("/repo"));

        assert_eq!(git.current_branch().await.unwrap(), "feature/WIP-42");
        assert_eq!(runner.calls()[0].cwd.as_deref(), Some(Path::new("/repo")));
    }

    #[tokio::test]
    async fn test_current_branch_fails_closed() {
        let runner = ScriptedRunner::new().on(
            "git",
            &["rev-parse"],
            CommandOutput::exit(128, "", "fatal: not a git repository"),
        );
        let git = Git::new(&runner, Path::new("/repo"));
        assert!(matches!(
            git.current_branch().await,
            Err(Error::BranchUndetermined)
        ));

        let runner = ScriptedRunner::new().on("git", &["rev-parse"], CommandOutput::ok("\n"));
        let git = Git::new(&runner, Path::new("/repo"));
        assert!(matches!(
            git.current_branch().await,
            Err(Error::BranchUndetermined)
        ));
    }

    #[tokio::test]
    async fn test_staged_files_against_head() {
        let runner = ScriptedRunner::new()
            .on("git", &["diff-index"], CommandOutput::ok("M\0src/A.php\0"));
        let git = Git::new(&runner, Path::new("/repo"));

        assert_eq!(git.staged_files().await.unwrap(), vec!["src/A.php"]);
        let diff = &runner.calls()[1];
        assert_eq!(diff.args.last().map(String::as_str), Some("HEAD"));
    }

    #[tokio::test]
    async fn test_staged_files_against_empty_tree() {
        let runner = ScriptedRunner::new()
            .on("git", &["rev-parse", "--verify"], CommandOutput::exit(1, "", ""))
            .on("git", &["diff-index"], CommandOutput::ok("A\0composer.json\0"));
        let git = Git::new(&runner, Path::new("/repo"));

        assert_eq!(git.staged_files().await.unwrap(), vec!["composer.json"]);
        let diff = &runner.calls()[1];
        assert_eq!(diff.args.last().map(String::as_str), Some(EMPTY_TREE));
    }

    #[tokio::test]
    async fn test_hooks_dir_relative_to_root() {
        let runner = ScriptedRunner::new().on(
            "git",
            &["rev-parse", "--git-path"],
            CommandOutput::ok(".git/hooks\n"),
        );
        let git = Git::new(&runner, Path::new("/repo"));

        assert_eq!(
            git.hooks_dir().await.unwrap(),
            PathBuf::from("/repo/.git/hooks")
        );
    }

    #[tokio::test]
    async fn test_hooks_dir_outside_repository() {
        let runner = ScriptedRunner::new().on(
            "git",
            &["rev-parse"],
            CommandOutput::exit(128, "", "fatal: not a git repository"),
        );
        let git = Git::new(&runner, Path::new("/tmp"));

        assert!(matches!(git.hooks_dir().await, Err(Error::Git(_))));
    }

    #[tokio::test]
    async fn test_staged_files_diff_failure() {
        let runner = ScriptedRunner::new().on(
            "git",
            &["diff-index"],
            CommandOutput::exit(128, "", "fatal: bad object"),
        );
        let git = Git::new(&runner, Path::new("/repo"));

        assert!(matches!(git.staged_files().await, Err(Error::Git(_))));
    }
}
