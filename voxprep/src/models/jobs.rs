//! Per-item job records for both batch pipelines
//!
//! A job is created before dispatch, mutated once by its engine, and kept
//! until the batch summary has been emitted.

use super::media::MediaFile;
use super::pairing::SynthesisPair;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use voxprep_common::OutcomeKind;

/// Why one item failed
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// Duration could not be measured
    ProbeFailure(String),
    /// External encode call failed
    EncodeFailure(String),
    /// Replace step kept hitting transient errors until retries ran out
    LockContention { attempts: u32, last_error: String },
    /// Replace step hit a non-retryable error
    ReplaceFailure(String),
    /// Synthesis process exited non-zero or could not be launched
    SynthesisFailure { exit_code: Option<i32>, detail: String },
    /// An external call exceeded its deadline
    Timeout(Duration),
    /// Run cancelled while this item was in flight
    Cancelled,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::ProbeFailure(msg) => write!(f, "probe failure: {}", msg),
            FailureReason::EncodeFailure(msg) => write!(f, "encode failure: {}", msg),
            FailureReason::LockContention {
                attempts,
                last_error,
            } => write!(
                f,
                "replace failed after {} attempts: {}",
                attempts, last_error
            ),
            FailureReason::ReplaceFailure(msg) => write!(f, "replace failure: {}", msg),
            FailureReason::SynthesisFailure { exit_code, detail } => match exit_code {
                Some(code) => write!(f, "synthesis exited with code {}: {}", code, detail.trim()),
                None => write!(f, "synthesis failed: {}", detail.trim()),
            },
            FailureReason::Timeout(limit) => write!(f, "timed out after {:?}", limit),
            FailureReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Explicit per-item result, never thrown across a batch boundary
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Succeeded,
    Skipped,
    Failed(FailureReason),
}

impl ItemOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            ItemOutcome::Succeeded => OutcomeKind::Succeeded,
            ItemOutcome::Skipped => OutcomeKind::Skipped,
            ItemOutcome::Failed(_) => OutcomeKind::Failed,
        }
    }

    pub fn detail(&self) -> Option<String> {
        match self {
            ItemOutcome::Failed(reason) => Some(reason.to_string()),
            _ => None,
        }
    }
}

/// Anything the batch harness can dispatch
pub trait BatchJob {
    /// Label used in progress events and failure lines
    fn label(&self) -> String;

    /// Terminal outcome; `None` while the job was never processed
    fn outcome(&self) -> Option<ItemOutcome>;
}

/// Padding job state
#[derive(Debug, Clone, PartialEq)]
pub enum PaddingStatus {
    /// Discovered, not processed yet
    Pending,
    /// Already at or above target; file untouched
    Skipped,
    /// Silence appended and original replaced
    Padded,
    Failed(FailureReason),
}

/// One discovered file moving through the padding state machine
#[derive(Debug, Clone)]
pub struct PaddingJob {
    pub file: MediaFile,
    pub current_duration: Option<f64>,
    pub target_duration: f64,
    pub silence_duration: Option<f64>,
    pub status: PaddingStatus,
    /// Replace attempts made (0 when no replace was needed)
    pub replace_attempts: u32,
}

impl PaddingJob {
    pub fn new(file: MediaFile, target_duration: f64) -> Self {
        Self {
            file,
            current_duration: None,
            target_duration,
            silence_duration: None,
            status: PaddingStatus::Pending,
            replace_attempts: 0,
        }
    }

    pub fn fail(&mut self, reason: FailureReason) {
        self.status = PaddingStatus::Failed(reason);
    }
}

impl BatchJob for PaddingJob {
    fn label(&self) -> String {
        self.file.path().display().to_string()
    }

    fn outcome(&self) -> Option<ItemOutcome> {
        match &self.status {
            PaddingStatus::Pending => None,
            PaddingStatus::Skipped => Some(ItemOutcome::Skipped),
            PaddingStatus::Padded => Some(ItemOutcome::Succeeded),
            PaddingStatus::Failed(reason) => Some(ItemOutcome::Failed(reason.clone())),
        }
    }
}

/// Synthesis job state
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisStatus {
    Pending,
    Succeeded,
    Failed,
}

/// One (pair, variant) synthesis invocation
#[derive(Debug, Clone)]
pub struct SynthesisJob {
    pub pair: SynthesisPair,
    pub variant_suffix: String,
    pub output_path: PathBuf,
    pub status: SynthesisStatus,
    pub error_detail: Option<FailureReason>,
}

impl SynthesisJob {
    pub fn new(pair: SynthesisPair, variant_suffix: &str, output_path: PathBuf) -> Self {
        Self {
            pair,
            variant_suffix: variant_suffix.to_string(),
            output_path,
            status: SynthesisStatus::Pending,
            error_detail: None,
        }
    }

    pub fn succeed(&mut self) {
        self.status = SynthesisStatus::Succeeded;
        self.error_detail = None;
    }

    pub fn fail(&mut self, reason: FailureReason) {
        self.status = SynthesisStatus::Failed;
        self.error_detail = Some(reason);
    }
}

impl BatchJob for SynthesisJob {
    fn label(&self) -> String {
        self.output_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.output_path.display().to_string())
    }

    fn outcome(&self) -> Option<ItemOutcome> {
        match self.status {
            SynthesisStatus::Pending => None,
            SynthesisStatus::Succeeded => Some(ItemOutcome::Succeeded),
            SynthesisStatus::Failed => Some(ItemOutcome::Failed(
                self.error_detail
                    .clone()
                    .unwrap_or(FailureReason::SynthesisFailure {
                        exit_code: None,
                        detail: String::new(),
                    }),
            )),
        }
    }
}
