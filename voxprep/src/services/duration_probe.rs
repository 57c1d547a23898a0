//! Duration probe
//!
//! Runs the measurement tool (ffprobe by default) on one file and parses a
//! single floating-point number of seconds from its stdout. Every failure
//! mode yields an invalid [`DurationMeasurement`] instead of an error.

use super::process_runner::ProcessRunner;
use crate::error::ToolError;
use crate::models::{DurationMeasurement, MediaFile};
use std::ffi::OsString;
use std::time::Duration;

/// ffprobe-compatible duration probe
#[derive(Debug, Clone)]
pub struct DurationProbe {
    program: String,
    runner: ProcessRunner,
    timeout: Option<Duration>,
}

impl DurationProbe {
    pub fn new(program: impl Into<String>, runner: ProcessRunner, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            runner,
            timeout,
        }
    }

    /// Arguments printing only the container duration, bare
    pub fn probe_args(file: &MediaFile) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(file.path().as_os_str().to_os_string());
        args
    }

    /// Measure one file
    pub async fn measure(&self, file: &MediaFile) -> DurationMeasurement {
        let result = self
            .runner
            .run_checked(&self.program, Self::probe_args(file), self.timeout)
            .await
            .and_then(|output| parse_duration(&output.stdout));

        match result {
            Ok(seconds) => DurationMeasurement::measured(file.path(), seconds),
            Err(e) => {
                tracing::warn!(file = %file.path().display(), error = %e, "Duration probe failed");
                DurationMeasurement::invalid(file.path(), e)
            }
        }
    }
}

/// Parse probe stdout: one finite, non-negative number of seconds
pub fn parse_duration(stdout: &str) -> Result<f64, ToolError> {
    let trimmed = stdout.trim();
    match trimmed.parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => Ok(seconds),
        _ => Err(ToolError::Unparsable(trimmed.to_string())),
    }
}
