//! Training list generation
//!
//! One `.list` file per speaker directory, one line per clip:
//! `<absolute path>|<speaker>|<LANG>|<label>`.

use super::file_scanner::FileScanner;
use crate::error::{BatchError, BatchResult};
use crate::models::derive_label;
use std::path::{Path, PathBuf};

/// Default language tag written into each line
pub const DEFAULT_LIST_LANGUAGE: &str = "JA";

/// Default directory receiving `<speaker>.list`
pub const DEFAULT_LIST_OUTPUT_DIR: &str = "output/asr_opt";

/// Written list file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListReport {
    pub speaker: String,
    pub path: PathBuf,
    pub lines: usize,
}

#[derive(Debug, Clone)]
pub struct ListGenerator {
    scanner: FileScanner,
    language: String,
    output_dir: PathBuf,
}

impl ListGenerator {
    pub fn new<I, S>(extensions: I, language: &str, output_dir: PathBuf) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            scanner: FileScanner::new(extensions).with_max_depth(1),
            language: language.to_string(),
            output_dir,
        }
    }

    /// Build the lines for `audio_dir` without writing anything
    pub fn build_lines(&self, audio_dir: &Path) -> BatchResult<(String, Vec<String>)> {
        let files = self.scanner.scan(audio_dir)?;
        let audio_dir = audio_dir.canonicalize()?;
        let speaker = speaker_name(&audio_dir)?;

        let lines = files
            .iter()
            .map(|file| {
                let absolute = audio_dir.join(file.path().file_name().unwrap_or_default());
                format!(
                    "{}|{}|{}|{}",
                    absolute.display(),
                    speaker,
                    self.language,
                    derive_label(file.path())
                )
            })
            .collect();

        Ok((speaker, lines))
    }

    /// Write `<output_dir>/<speaker>.list`
    pub async fn generate(&self, audio_dir: &Path) -> BatchResult<ListReport> {
        let (speaker, lines) = self.build_lines(audio_dir)?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(format!("{}.list", speaker));
        tokio::fs::write(&path, lines.join("\n")).await?;

        tracing::info!(
            speaker = %speaker,
            list = %path.display(),
            lines = lines.len(),
            "List file written"
        );

        Ok(ListReport {
            speaker,
            path,
            lines: lines.len(),
        })
    }
}

fn speaker_name(dir: &Path) -> BatchResult<String> {
    dir.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            BatchError::Config(format!("cannot derive a speaker name from {}", dir.display()))
        })
}
