//! External process invocation
//!
//! Every external tool (probe, encode, synthesis) goes through
//! [`ProcessRunner::run`]: captured stdout/stderr, an optional per-call
//! deadline, and run-level cancellation. A child that outlives its deadline,
//! or the cancellation grace period, is killed when its future is dropped.

use crate::error::ToolError;
use std::ffi::{OsStr, OsString};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Captured output of a finished process
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; `None` when terminated by a signal
    pub code: Option<i32>,
    pub success: bool,
}

/// Process runner bound to one run's cancellation token
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    cancel: CancellationToken,
    grace: Duration,
}

impl ProcessRunner {
    /// `grace`: how long an in-flight call may continue after cancellation;
    /// no new process is started once the run is cancelled
    pub fn new(cancel: CancellationToken, grace: Duration) -> Self {
        Self { cancel, grace }
    }

    /// Run a command to completion and capture its output
    ///
    /// A non-zero exit is *not* an error here; see [`run_checked`](Self::run_checked).
    pub async fn run<I, S>(
        &self,
        program: &str,
        args: I,
        timeout: Option<Duration>,
    ) -> Result<ProcessOutput, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();

        // The grace period only covers children spawned before cancellation
        if self.cancel.is_cancelled() {
            return Err(ToolError::Cancelled);
        }

        tracing::debug!(program, args = ?args, timeout = ?timeout, "Spawning external process");

        let child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::Launch {
                program: program.to_string(),
                message: e.to_string(),
            })?;

        let deadline = async move {
            match timeout {
                Some(limit) => {
                    tokio::time::sleep(limit).await;
                    limit
                }
                None => std::future::pending().await,
            }
        };

        let grace = self.grace;
        let abandon = async {
            self.cancel.cancelled().await;
            tokio::time::sleep(grace).await;
        };

        tokio::select! {
            result = child.wait_with_output() => {
                let output = result.map_err(|e| ToolError::Launch {
                    program: program.to_string(),
                    message: e.to_string(),
                })?;
                Ok(ProcessOutput {
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                    code: output.status.code(),
                    success: output.status.success(),
                })
            }
            limit = deadline => {
                tracing::warn!(program, timeout = ?limit, "External process timed out, killing");
                Err(ToolError::Timeout(limit))
            }
            _ = abandon => {
                tracing::warn!(program, "Run cancelled, abandoning external process");
                Err(ToolError::Cancelled)
            }
        }
    }

    /// Like [`run`](Self::run) but maps a non-zero exit to `ToolError::ExitStatus`
    pub async fn run_checked<I, S>(
        &self,
        program: &str,
        args: I,
        timeout: Option<Duration>,
    ) -> Result<ProcessOutput, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = self.run(program, args, timeout).await?;
        if output.success {
            Ok(output)
        } else {
            Err(ToolError::ExitStatus {
                code: output.code,
                stderr: output.stderr,
            })
        }
    }
}
