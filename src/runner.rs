//! External process execution: the ADX test runner and the `xmllint` linter.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{AdxError, Result};

/// Captured result of one process run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOutput {
    /// `None` when the process was terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs the ADX test runner with the given arguments.
///
/// The validator spawns a fresh [`ProcessTestShell`] unless the caller hands
/// in a long-lived shell through the run options.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TestShell: Send + Sync {
    async fn run(&self, args: Vec<String>) -> Result<ShellOutput>;
}

#[derive(Debug, Clone)]
pub struct ProcessTestShell {
    program: PathBuf,
    timeout: Duration,
}

impl ProcessTestShell {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl TestShell for ProcessTestShell {
    async fn run(&self, args: Vec<String>) -> Result<ShellOutput> {
        run_process(&self.program, &args, self.timeout).await
    }
}

/// Spawn `program`, wait at most `timeout`, and capture its output.
///
/// A program that cannot be started maps to `NotFound` / `Io`; a process
/// still running at the deadline is killed and reported as `ProcessTimeout`.
pub async fn run_process(program: &Path, args: &[String], timeout: Duration) -> Result<ShellOutput> {
    debug!("Spawning {} {:?}", program.display(), args);

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| AdxError::from_io(e, program))?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => output?,
        Err(_) => {
            return Err(AdxError::ProcessTimeout {
                program: program.display().to_string(),
                timeout_seconds: timeout.as_secs(),
            });
        }
    };

    Ok(ShellOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
