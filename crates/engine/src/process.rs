//! External process execution.
//!
//! Commands are described by [`ProcessCommand`] and run by a
//! [`ProcessExecutor`]. Argument vectors are passed to the program directly,
//! so user-supplied values are never interpreted by a shell. Only
//! [`CommandLine::Shell`] goes through `sh -c`, and callers choose it explicitly.

use std::{fmt, process::Stdio, sync::Mutex, time::Duration};

use async_trait::async_trait;
use chatops_util::{quote_for_shell, redact_sensitive};
use indexmap::IndexMap;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How to start a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// Program and arguments, executed without a shell.
    Argv { program: String, args: Vec<String> },
    /// A script handed to `sh -c`.
    Shell(String),
}

impl CommandLine {
    /// Rendered line with credentials masked, for logs.
    pub fn redacted(&self) -> String {
        redact_sensitive(&self.to_string())
    }

    pub fn argv<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Argv {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shell(script) => f.write_str(script),
            Self::Argv { program, args } => {
                f.write_str(&quote_for_shell(program))?;
                for arg in args {
                    write!(f, " {}", quote_for_shell(arg))?;
                }
                Ok(())
            }
        }
    }
}

/// A command line plus the environment and deadline it runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub line: CommandLine,
    /// Variables added on top of the inherited environment.
    pub env: IndexMap<String, String>,
    pub timeout: Duration,
}

impl ProcessCommand {
    pub fn new(line: CommandLine, timeout: Duration) -> Self {
        Self {
            line,
            env: IndexMap::new(),
            timeout,
        }
    }

    pub fn with_env(mut self, env: &IndexMap<String, String>) -> Self {
        self.env.extend(env.iter().map(|(key, value)| (key.clone(), value.clone())));
        self
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    #[error("`{command}` was cancelled")]
    Cancelled { command: String },

    #[error("`{command}` exited with {}", describe_status(.status))]
    Failed {
        command: String,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("I/O error while waiting for `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {code}"),
        None => "no exit status (terminated by signal)".to_string(),
    }
}

/// Runs external commands.
#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    /// Run `command` to completion, honoring its timeout and `cancel`.
    ///
    /// A non-zero exit is reported as [`ProcessError::Failed`].
    async fn execute(&self, command: &ProcessCommand, cancel: &CancellationToken)
    -> Result<ProcessOutput, ProcessError>;
}

/// Executor backed by `tokio::process`.
///
/// Children are killed when the wait is abandoned, whether by timeout or by
/// cancellation.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcessExecutor;

#[async_trait]
impl ProcessExecutor for TokioProcessExecutor {
    async fn execute(
        &self,
        command: &ProcessCommand,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, ProcessError> {
        let rendered = command.line.to_string();
        let logged = command.line.redacted();
        let mut process = match &command.line {
            CommandLine::Argv { program, args } => {
                let mut process = Command::new(program);
                process.args(args);
                process
            }
            CommandLine::Shell(script) => {
                let mut process = Command::new("sh");
                process.arg("-c").arg(script);
                process
            }
        };
        process
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(command = %logged, timeout_secs = command.timeout.as_secs(), "spawning process");
        let child = process.spawn().map_err(|source| ProcessError::Spawn {
            command: rendered.clone(),
            source,
        })?;

        let output = tokio::select! {
            _ = cancel.cancelled() => {
                warn!(command = %logged, "process cancelled");
                return Err(ProcessError::Cancelled { command: rendered });
            }
            result = tokio::time::timeout(command.timeout, child.wait_with_output()) => match result {
                Ok(Ok(output)) => output,
                Ok(Err(source)) => return Err(ProcessError::Io { command: rendered, source }),
                Err(_) => {
                    warn!(command = %logged, timeout_secs = command.timeout.as_secs(), "process timed out");
                    return Err(ProcessError::Timeout { command: rendered, timeout: command.timeout });
                }
            },
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(ProcessError::Failed {
                command: rendered,
                status: output.status.code(),
                stdout,
                stderr,
            });
        }
        debug!(command = %logged, stdout_bytes = stdout.len(), "process finished");
        Ok(ProcessOutput { stdout, stderr })
    }
}

/// Canned reply of a [`ScriptedExecutor`].
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Success(String),
    Failure { status: i32, stderr: String },
    Timeout,
}

/// An executor that never starts processes.
///
/// Replies are matched by the rendered command line; unmatched commands
/// succeed with empty output. Every call is recorded. Useful for tests and
/// dry runs.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    replies: Mutex<Vec<(String, ScriptedReply)>>,
    calls: Mutex<Vec<ProcessCommand>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to commands whose rendered line equals `command_line`.
    pub fn on(self, command_line: impl Into<String>, reply: ScriptedReply) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push((command_line.into(), reply));
        }
        self
    }

    /// Commands executed so far, oldest first.
    pub fn calls(&self) -> Vec<ProcessCommand> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ProcessExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        command: &ProcessCommand,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, ProcessError> {
        let rendered = command.line.to_string();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command.clone());
        }
        if cancel.is_cancelled() {
            return Err(ProcessError::Cancelled { command: rendered });
        }
        let reply = self.replies.lock().ok().and_then(|replies| {
            replies
                .iter()
                .find(|(line, _)| *line == rendered)
                .map(|(_, reply)| reply.clone())
        });
        match reply {
            None => Ok(ProcessOutput::default()),
            Some(ScriptedReply::Success(stdout)) => Ok(ProcessOutput {
                stdout,
                stderr: String::new(),
            }),
            Some(ScriptedReply::Failure { status, stderr }) => Err(ProcessError::Failed {
                command: rendered,
                status: Some(status),
                stdout: String::new(),
                stderr,
            }),
            Some(ScriptedReply::Timeout) => Err(ProcessError::Timeout {
                command: rendered,
                timeout: command.timeout,
            }),
        }
    }
}
