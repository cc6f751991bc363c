//! External process execution.
//!
//! Every tool the gate wraps (git, php, phpcbf, phpcs, phpmd, phpunit) is run
//! through a [`ProcessRunner`], so the pipeline can be driven by the real
//! system or by the scripted runner in [`crate::fakes`].

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::Error;

/// A command line to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Build a command for a tool living in `bin_dir`.
    pub fn tool(bin_dir: &Path, name: &str) -> Self {
        Self::new(bin_dir.join(name).to_string_lossy().into_owned())
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// File name of the program, without its directory.
    pub fn program_name(&self) -> &str {
        Path::new(&self.program)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.program)
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(ref cwd) = self.cwd {
            command.current_dir(cwd);
        }
        command
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code; `None` when killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful exit with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Exit with the given code and output.
    pub fn exit(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external commands.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run a command to completion and capture its output.
    async fn output(&self, cmd: &CommandSpec) -> Result<CommandOutput, Error>;

    /// Run a command, forwarding raw stdout and stderr bytes to `sink` as
    /// they arrive. Returns whether the command exited successfully.
    async fn stream(
        &self,
        cmd: &CommandSpec,
        timeout: Duration,
        sink: &mut (dyn Write + Send),
    ) -> Result<bool, Error>;
}

/// Runs commands on the host system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn output(&self, cmd: &CommandSpec) -> Result<CommandOutput, Error> {
        debug!(command = %cmd, "Running command");

        let output = cmd
            .command()
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::other(format!("Failed to run {}: {}", cmd.program, e)))?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    async fn stream(
        &self,
        cmd: &CommandSpec,
        timeout: Duration,
        sink: &mut (dyn Write + Send),
    ) -> Result<bool, Error> {
        debug!(command = %cmd, timeout_secs = timeout.as_secs(), "Streaming command");

        let mut child = cmd
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::other(format!("Failed to run {}: {}", cmd.program, e)))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::other("Child stdout not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::other("Child stderr not captured"))?;

        let pump = async {
            let mut out_buf = [0u8; 4096];
            let mut err_buf = [0u8; 4096];
            let mut out_done = false;
            let mut err_done = false;

            while !(out_done && err_done) {
                tokio::select! {
                    n = stdout.read(&mut out_buf), if !out_done => match n? {
                        0 => out_done = true,
                        n => {
                            sink.write_all(&out_buf[..n])?;
                            sink.flush()?;
                        }
                    },
                    n = stderr.read(&mut err_buf), if !err_done => match n? {
                        0 => err_done = true,
                        n => {
                            sink.write_all(&err_buf[..n])?;
                            sink.flush()?;
                        }
                    },
                }
            }

            Ok::<_, Error>(child.wait().await?)
        };

        // On timeout the child is killed when it goes out of scope (kill_on_drop).
        let status = tokio::time::timeout(timeout, pump)
            .await
            .map_err(|_| Error::Timeout {
                program: cmd.program_name().to_string(),
                secs: timeout.as_secs(),
            })??;

        Ok(status.success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn test_command_display() {
        let cmd = CommandSpec::new("php").args(["-l", "src/A.php"]);
        assert_eq!(cmd.to_string(), "php -l src/A.php");
    }

    #[test]
    fn test_tool_program_name() {
        let cmd = CommandSpec::tool(Path::new("/repo/vendor/bin"), "phpcs");
        assert_eq!(cmd.program, "/repo/vendor/bin/phpcs");
        assert_eq!(cmd.program_name(), "phpcs");
    }

    #[tokio::test]
    async fn test_output_captures_streams() {
        let output = SystemRunner
            .output(&sh("echo out; echo err >&2; exit 3"))
            .await
            .unwrap();

        assert_eq!(output.code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn test_output_respects_cwd() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();

        let output = SystemRunner
            .output(&CommandSpec::new("ls").current_dir(dir.path()))
            .await
            .unwrap();
        assert!(output.stdout.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_output_missing_program() {
        let result = SystemRunner
            .output(&CommandSpec::new("definitely-not-a-real-binary-xyz"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_stream_forwards_both_streams() {
        let mut sink: Vec<u8> = Vec::new();
        let success = SystemRunner
            .stream(
                &sh("echo first; echo second >&2"),
                Duration::from_secs(10),
                &mut sink,
            )
            .await
            .unwrap();

        assert!(success);
        let text = String::from_utf8(sink).unwrap();
        assert!(text.contains("first"));
        assert!(text.contains("second"));
    }

    #[tokio::test]
    async fn test_stream_reports_failure() {
        let mut sink: Vec<u8> = Vec::new();
        let success = SystemRunner
            .stream(&sh("exit 1"), Duration::from_secs(10), &mut sink)
            .await
            .unwrap();
        assert!(!success);
    }

    #[tokio::test]
    async fn test_stream_passes_non_utf8_bytes_through() {
        let mut sink: Vec<u8> = Vec::new();
        let success = SystemRunner
            .stream(
                &sh("printf 'caf\\351\\n'; sleep 0.2; echo after; exit 0"),
                Duration::from_secs(10),
                &mut sink,
            )
            .await
            .unwrap();

        assert!(success);
        assert!(sink.starts_with(b"caf\xe9\n"));
        assert!(String::from_utf8_lossy(&sink).contains("after"));
    }

    /// Sink readable while the command is still running.
    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stream_forwards_partial_lines_live() {
        let sink = SharedSink::default();
        let mut task_sink = sink.clone();
        let task = tokio::spawn(async move {
            SystemRunner
                .stream(
                    &sh("printf '....F'; sleep 2; echo ' done'"),
                    Duration::from_secs(10),
                    &mut task_sink,
                )
                .await
        });

        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(sink.0.lock().unwrap().as_slice(), b"....F");

        assert!(task.await.unwrap().unwrap());
        assert_eq!(sink.0.lock().unwrap().as_slice(), b"....F done\n");
    }

    #[tokio::test]
    async fn test_stream_timeout() {
        let mut sink: Vec<u8> = Vec::new();
        let err = SystemRunner
            .stream(&sh("sleep 5"), Duration::from_millis(200), &mut sink)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout { .. }));
    }
}
