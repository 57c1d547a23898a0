//! Discovered media files and duration measurements

use crate::error::ToolError;
use std::path::{Path, PathBuf};

/// One audio file found by discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    path: PathBuf,
    /// Lowercased extension without the leading dot
    extension: String,
}

impl MediaFile {
    /// Build from a path; `None` when the path has no extension
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let extension = path.extension()?.to_string_lossy().to_lowercase();
        Some(Self { path, extension })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// File name without directory and extension
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Result of one duration probe
///
/// Probe failures are values, not errors: `valid == false` and `failure`
/// says why.
#[derive(Debug, Clone)]
pub struct DurationMeasurement {
    pub file: PathBuf,
    pub seconds: f64,
    pub valid: bool,
    pub failure: Option<ToolError>,
}

impl DurationMeasurement {
    pub fn measured(file: &Path, seconds: f64) -> Self {
        Self {
            file: file.to_path_buf(),
            seconds,
            valid: true,
            failure: None,
        }
    }

    pub fn invalid(file: &Path, failure: ToolError) -> Self {
        Self {
            file: file.to_path_buf(),
            seconds: 0.0,
            valid: false,
            failure: Some(failure),
        }
    }
}
