//! Silence padding engine
//!
//! Per file: `Discovered → Measured → {Skipped | PadAttempted} → {Padded | Failed}`.
//!
//! Short clips are encoded into a side-file next to the original, then the
//! side-file is renamed over the original. Only the rename is retried; the
//! encode runs at most once per file. Every failure path after the encode
//! removes the side-file, so an aborted or failed file leaves the original
//! untouched and nothing else behind.

use super::file_scanner::{FileScanner, TEMP_FILE_MARKER};
use super::media_tool::{FileReplacer, MediaTool};
use super::retry::RetryPolicy;
use crate::error::{BatchResult, ToolError};
use crate::models::{FailureReason, MediaFile, PaddingJob, PaddingStatus};
use crate::workflow::harness::{BatchContext, BatchHarness, BatchReport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use voxprep_common::{BatchEvent, BatchKind};

/// Default minimum clip duration in seconds
pub const DEFAULT_TARGET_DURATION: f64 = 3.1;

/// Padding engine
pub struct PaddingEngine {
    tool: Arc<dyn MediaTool>,
    replacer: Arc<dyn FileReplacer>,
    retry: RetryPolicy,
    target_duration: f64,
}

impl PaddingEngine {
    pub fn new(
        tool: Arc<dyn MediaTool>,
        replacer: Arc<dyn FileReplacer>,
        retry: RetryPolicy,
        target_duration: f64,
    ) -> Self {
        Self {
            tool,
            replacer,
            retry,
            target_duration,
        }
    }

    /// Side-file path for `source`: `<stem>.voxprep-pad.<ext>` in the same directory
    ///
    /// Keeping the extension lets the encoder pick the same container.
    pub fn temp_path_for(source: &MediaFile) -> PathBuf {
        let name = format!(
            "{}{}{}",
            source.stem(),
            TEMP_FILE_MARKER,
            source.extension()
        );
        source.path().with_file_name(name)
    }

    /// Discover every recognized file under `root` and pad each one
    ///
    /// Fails before any external call when `root` is missing or not a
    /// directory; per-file failures are recorded in the report.
    pub async fn run(
        &self,
        root: &Path,
        scanner: &FileScanner,
        harness: &BatchHarness,
    ) -> BatchResult<BatchReport<PaddingJob>> {
        let files = scanner.scan(root)?;

        tracing::info!(
            run_id = %harness.context().run_id,
            root = %root.display(),
            files_found = files.len(),
            target_secs = self.target_duration,
            "Audio files discovered"
        );

        let jobs: Vec<PaddingJob> = files
            .into_iter()
            .map(|file| PaddingJob::new(file, self.target_duration))
            .collect();

        let ctx = harness.context();
        Ok(harness
            .run(BatchKind::Padding, jobs, |job| self.process(job, ctx))
            .await)
    }

    /// Drive one job to a terminal status
    pub async fn process(&self, mut job: PaddingJob, ctx: &BatchContext) -> PaddingJob {
        let measurement = self.tool.measure(&job.file).await;
        if !measurement.valid {
            let reason = match measurement.failure {
                Some(ToolError::Timeout(limit)) => FailureReason::Timeout(limit),
                Some(ToolError::Cancelled) => FailureReason::Cancelled,
                Some(e) => FailureReason::ProbeFailure(e.to_string()),
                None => FailureReason::ProbeFailure("invalid measurement".to_string()),
            };
            job.fail(reason);
            return job;
        }

        let current = measurement.seconds;
        job.current_duration = Some(current);

        if current >= job.target_duration {
            tracing::info!(
                run_id = %ctx.run_id,
                file = %job.file.path().display(),
                duration_secs = current,
                "Already long enough, skipping"
            );
            job.status = PaddingStatus::Skipped;
            return job;
        }

        let silence = job.target_duration - current;
        job.silence_duration = Some(silence);
        let temp = Self::temp_path_for(&job.file);

        tracing::debug!(
            run_id = %ctx.run_id,
            file = %job.file.path().display(),
            silence_secs = silence,
            temp = %temp.display(),
            "Encoding padded side-file"
        );

        if let Err(e) = self.tool.pad_with_silence(job.file.path(), silence, &temp).await {
            remove_temp(&temp).await;
            job.fail(match e {
                ToolError::Timeout(limit) => FailureReason::Timeout(limit),
                ToolError::Cancelled => FailureReason::Cancelled,
                other => FailureReason::EncodeFailure(other.to_string()),
            });
            return job;
        }

        let (attempts, result) = self.replace_with_retry(&job, &temp, ctx).await;
        job.replace_attempts = attempts;
        match result {
            Ok(()) => {
                tracing::info!(
                    run_id = %ctx.run_id,
                    file = %job.file.path().display(),
                    from_secs = current,
                    to_secs = job.target_duration,
                    attempts,
                    "Padded"
                );
                job.status = PaddingStatus::Padded;
            }
            Err(reason) => {
                remove_temp(&temp).await;
                tracing::error!(
                    run_id = %ctx.run_id,
                    file = %job.file.path().display(),
                    reason = %reason,
                    "Replace failed"
                );
                job.fail(reason);
            }
        }
        job
    }

    /// Move `temp` over the original, retrying transient errors
    ///
    /// Returns the number of attempts made alongside the result.
    async fn replace_with_retry(
        &self,
        job: &PaddingJob,
        temp: &Path,
        ctx: &BatchContext,
    ) -> (u32, Result<(), FailureReason>) {
        let target = job.file.path();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let err = match self.replacer.replace(temp, target).await {
                Ok(()) => return (attempt, Ok(())),
                Err(e) => e,
            };

            if !self.retry.is_retryable(&err) {
                return (attempt, Err(FailureReason::ReplaceFailure(err.to_string())));
            }

            let Some(delay) = self.retry.next_delay(attempt) else {
                return (
                    attempt,
                    Err(FailureReason::LockContention {
                        attempts: attempt,
                        last_error: err.to_string(),
                    }),
                );
            };

            tracing::warn!(
                run_id = %ctx.run_id,
                file = %target.display(),
                attempt,
                max_attempts = self.retry.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Replace failed, retrying"
            );
            ctx.report(BatchEvent::RetryScheduled {
                run_id: ctx.run_id,
                item: target.display().to_string(),
                attempt,
                max_attempts: self.retry.max_attempts,
                delay_ms: delay.as_millis() as u64,
                error: err.to_string(),
                timestamp: chrono::Utc::now(),
            });

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = ctx.cancel.cancelled() => {
                    return (attempt, Err(FailureReason::Cancelled));
                }
            }
        }
    }
}

/// Remove a side-file; a missing file is fine
async fn remove_temp(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(temp = %path.display(), "Removed side-file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(temp = %path.display(), error = %e, "Failed to remove side-file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_path_keeps_extension() {
        let file = MediaFile::from_path("/clips/take_01.Wav").unwrap();
        assert_eq!(
            PaddingEngine::temp_path_for(&file),
            PathBuf::from("/clips/take_01.voxprep-pad.wav")
        );
    }
}
