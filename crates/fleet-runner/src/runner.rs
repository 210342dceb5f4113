//! The `CommandRunner` trait and its production implementation.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Captured result of one external command invocation.
///
/// A non-zero exit code is data, not an error: callers branch on `success`
/// and read `stderr`. Only failures to execute at all (missing binary,
/// timeout, spawn failure) surface as [`Error`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A successful invocation with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed invocation with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Per-invocation options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Working directory for the command. Defaults to the process cwd.
    pub cwd: Option<PathBuf>,
    /// Overrides the runner's default timeout for this invocation.
    pub timeout: Option<Duration>,
}

impl RunOptions {
    pub fn in_dir(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(cwd.into()),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Executes a named external command and captures its output.
///
/// No operation behind this trait may block longer than the configured
/// timeout; implementations must kill the child when the timeout fires.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, name: &str, args: &[&str], opts: RunOptions) -> Result<CommandOutput>;
}

/// Production runner on top of `tokio::process`.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    default_timeout: Duration,
}

impl ProcessRunner {
    /// Create a runner with the given default timeout.
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }
}

impl Default for ProcessRunner {
    /// 30 seconds, matching the bound the core promises for any single
    /// external invocation.
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, name: &str, args: &[&str], opts: RunOptions) -> Result<CommandOutput> {
        let timeout = opts.timeout.unwrap_or(self.default_timeout);

        let mut command = tokio::process::Command::new(name);
        command.args(args).kill_on_drop(true);
        if let Some(cwd) = &opts.cwd {
            command.current_dir(cwd);
        }

        tracing::debug!(command = %name, ?args, ?timeout, "running external command");

        let output = match tokio::time::timeout(timeout, command.output()).await {
            Err(_) => {
                return Err(Error::Timeout {
                    name: name.to_string(),
                    timeout,
                });
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound {
                    name: name.to_string(),
                });
            }
            Ok(Err(e)) => {
                return Err(Error::Spawn {
                    name: name.to_string(),
                    source: e,
                });
            }
            Ok(Ok(output)) => output,
        };

        let exit_code = output.status.code().unwrap_or(-1);
        Ok(CommandOutput {
            success: output.status.success(),
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
