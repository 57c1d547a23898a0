//! Error types for voxprep
//!
//! Two families:
//! - [`BatchError`]: precondition or invariant failures that abort a run
//!   before any external call is issued.
//! - [`ToolError`]: one external process call that did not produce a usable
//!   result. Engines convert these into per-item
//!   [`FailureReason`](crate::models::FailureReason) values; they never cross
//!   a batch boundary as errors.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Fatal, run-aborting errors
#[derive(Debug, Error)]
pub enum BatchError {
    /// Input root, corpus or reference directory does not exist
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Corpus and reference audio cannot be aligned index-for-index
    #[error("Text count ({texts}) does not match reference audio count ({references})")]
    CountMismatch { texts: usize, references: usize },

    /// Invalid run parameters
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error while reading inputs or preparing outputs
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// voxprep-common error
    #[error(transparent)]
    Common(#[from] voxprep_common::Error),
}

/// Result type for run-level operations
pub type BatchResult<T> = Result<T, BatchError>;

/// Failure of a single external process call
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    /// Process could not be started (binary missing, permission, ...)
    #[error("Failed to launch {program}: {message}")]
    Launch { program: String, message: String },

    /// Process exited with a non-zero status
    #[error(
        "Exited with {}: {stderr}",
        .code.map_or_else(|| "signal".to_string(), |c| format!("code {}", c))
    )]
    ExitStatus { code: Option<i32>, stderr: String },

    /// Process exceeded its deadline and was killed
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Run was cancelled while the process was in flight
    #[error("Cancelled")]
    Cancelled,

    /// Process succeeded but its output could not be interpreted
    #[error("Unparsable output: {0:?}")]
    Unparsable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status_message() {
        let err = ToolError::ExitStatus {
            code: Some(2),
            stderr: "bad input".to_string(),
        };
        assert_eq!(err.to_string(), "Exited with code 2: bad input");

        let err = ToolError::ExitStatus {
            code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().starts_with("Exited with signal"));
    }

    #[test]
    fn test_count_mismatch_message() {
        let err = BatchError::CountMismatch {
            texts: 5,
            references: 4,
        };
        assert_eq!(
            err.to_string(),
            "Text count (5) does not match reference audio count (4)"
        );
    }
}
