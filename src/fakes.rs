//! Scripted process runner (testing only).
//!
//! `ScriptedRunner` answers commands from a list of rules instead of spawning
//! processes, and records every invocation so tests can assert on what the
//! pipeline ran and in which order.

use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Error;
use crate::process::{CommandOutput, CommandSpec, ProcessRunner};

type Handler = Box<dyn Fn(&CommandSpec) -> Result<CommandOutput, Error> + Send + Sync>;

struct Rule {
    program: String,
    args_prefix: Vec<String>,
    handler: Handler,
}

impl Rule {
    fn matches(&self, cmd: &CommandSpec) -> bool {
        cmd.program_name() == self.program
            && cmd.args.len() >= self.args_prefix.len()
            && cmd.args.iter().zip(&self.args_prefix).all(|(a, p)| a == p)
    }
}

/// In-memory [`ProcessRunner`] driven by per-command rules.
///
/// Rules match on the program's file name plus a prefix of its arguments;
/// the most recently added matching rule wins. Unmatched commands succeed
/// with empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer matching commands with a fixed output.
    pub fn on(self, program: &str, args_prefix: &[&str], output: CommandOutput) -> Self {
        self.on_with(program, args_prefix, move |_| Ok(output.clone()))
    }

    /// Answer matching commands by calling `handler`.
    pub fn on_with<F>(mut self, program: &str, args_prefix: &[&str], handler: F) -> Self
    where
        F: Fn(&CommandSpec) -> Result<CommandOutput, Error> + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            program: program.to_string(),
            args_prefix: args_prefix.iter().map(|a| a.to_string()).collect(),
            handler: Box::new(handler),
        });
        self
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Program names of every command run so far, in order.
    pub fn programs(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|c| c.program_name().to_string())
            .collect()
    }

    fn answer(&self, cmd: &CommandSpec) -> Result<CommandOutput, Error> {
        self.calls.lock().unwrap().push(cmd.clone());
        match self.rules.iter().rev().find(|rule| rule.matches(cmd)) {
            Some(rule) => (rule.handler)(cmd),
            None => Ok(CommandOutput::ok("")),
        }
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn output(&self, cmd: &CommandSpec) -> Result<CommandOutput, Error> {
        self.answer(cmd)
    }

    async fn stream(
        &self,
        cmd: &CommandSpec,
        _timeout: Duration,
        sink: &mut (dyn Write + Send),
    ) -> Result<bool, Error> {
        let output = self.answer(cmd)?;
        sink.write_all(output.stdout.as_bytes())?;
        sink.write_all(output.stderr.as_bytes())?;
        Ok(output.success())
    }
}
