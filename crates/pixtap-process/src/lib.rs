//! Subprocess capability for pixtap.
//!
//! Both the render orchestrator (invoking the external `pixlet` binary) and
//! the callback server (invoking helper programs) run subprocesses. The
//! [`ProcessRunner`] trait models that capability as an injected interface —
//! "run a program with args and environment, capture exit code, stdout and
//! stderr" — so tests can substitute deterministic runners.

mod mock;

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;

pub use mock::MockRunner;

/// A subprocess invocation request.
#[derive(Clone, Debug, Default)]
pub struct ProcessRequest {
    /// Program to execute.
    pub program: String,
    /// Positional arguments.
    pub args: Vec<String>,
    /// Extra environment variables (inherits the parent environment).
    pub envs: Vec<(String, String)>,
}

impl ProcessRequest {
    /// Create a request for `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Append a positional argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a path as a positional argument.
    #[must_use]
    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    /// Set an environment variable for the child process.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

/// Captured outcome of a completed subprocess.
#[derive(Clone, Debug, Default)]
pub struct ProcessOutput {
    /// Exit code, `None` if terminated by a signal.
    pub code: Option<i32>,
    /// Captured standard output bytes.
    pub stdout: Vec<u8>,
    /// Captured standard error bytes.
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    /// True if the process exited with status zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Standard error as lossy UTF-8 text.
    #[must_use]
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Error spawning or waiting on a subprocess.
#[derive(Debug, thiserror::Error)]
#[error("failed to run {program}: {source}")]
pub struct ProcessError {
    /// The program that could not be run.
    pub program: String,
    /// Underlying I/O error.
    pub source: std::io::Error,
}

/// Capability to run a program and capture its outcome.
///
/// A non-zero exit is not an `Err`: callers inspect [`ProcessOutput`] and
/// decide. Only failure to spawn or wait is an error.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run the request to completion and capture its output.
    async fn run(&self, request: ProcessRequest) -> Result<ProcessOutput, ProcessError>;
}

/// Runner backed by real OS processes via tokio.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, request: ProcessRequest) -> Result<ProcessOutput, ProcessError> {
        tracing::debug!(program = %request.program, args = ?request.args, "spawning subprocess");
        let output = tokio::process::Command::new(&request.program)
            .args(&request.args)
            .envs(request.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ProcessError {
                program: request.program.clone(),
                source,
            })?;

        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
