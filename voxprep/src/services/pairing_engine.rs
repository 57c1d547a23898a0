//! Pairing engine
//!
//! Loads the corpus and the reference clips and aligns them index-for-index.
//! Every check here runs before the first synthesis call; a count mismatch
//! aborts the whole run.

use super::file_scanner::FileScanner;
use crate::error::{BatchError, BatchResult};
use crate::models::{ReferenceAudio, SynthesisPair, TextEntry};
use std::collections::HashSet;
use std::io;
use std::path::Path;

const UTF8_BOM: char = '\u{feff}';

/// Corpus + reference directory loader
#[derive(Debug, Clone)]
pub struct PairingEngine {
    scanner: FileScanner,
}

impl PairingEngine {
    /// `reference_extension`: extension of reference clips, e.g. `"wav"`
    pub fn new(reference_extension: &str) -> Self {
        Self {
            scanner: FileScanner::new([reference_extension]).with_max_depth(1),
        }
    }

    /// Non-blank corpus lines, trimmed, in file order
    pub async fn load_corpus(&self, corpus: &Path) -> BatchResult<Vec<TextEntry>> {
        if !corpus.exists() {
            return Err(BatchError::NotFound(corpus.to_path_buf()));
        }

        let bytes = tokio::fs::read(corpus).await?;
        let content = String::from_utf8(bytes).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} is not valid UTF-8: {}", corpus.display(), e),
            )
        })?;

        Ok(parse_corpus(&content))
    }

    /// Reference clips directly inside `dir`, sorted by file name
    pub fn load_references(&self, dir: &Path) -> BatchResult<Vec<ReferenceAudio>> {
        let files = self.scanner.scan(dir)?;
        Ok(files
            .into_iter()
            .enumerate()
            .map(|(index, file)| ReferenceAudio::new(index, file.path().to_path_buf()))
            .collect())
    }

    /// Load both inputs and align them; fails fast on a count mismatch
    pub async fn pair(&self, corpus: &Path, reference_dir: &Path) -> BatchResult<Vec<SynthesisPair>> {
        let texts = self.load_corpus(corpus).await?;
        let references = self.load_references(reference_dir)?;
        check_distinct_stems(&references)?;

        if texts.len() != references.len() {
            tracing::error!(
                corpus = %corpus.display(),
                reference_dir = %reference_dir.display(),
                texts = texts.len(),
                references = references.len(),
                "Corpus and reference audio counts differ"
            );
            return Err(BatchError::CountMismatch {
                texts: texts.len(),
                references: references.len(),
            });
        }

        tracing::info!(pairs = texts.len(), "Corpus paired with reference audio");

        Ok(texts
            .into_iter()
            .zip(references)
            .map(|(text, reference)| SynthesisPair { text, reference })
            .collect())
    }
}

/// Output names derive from the reference stem, so stems must be unique
///
/// Extensions match case-insensitively: `take.wav` and `take.WAV` can both
/// be present on a case-sensitive filesystem.
fn check_distinct_stems(references: &[ReferenceAudio]) -> BatchResult<()> {
    let mut seen = HashSet::new();
    for reference in references {
        if !seen.insert(reference.stem()) {
            return Err(BatchError::Config(format!(
                "reference clips share the stem '{}'; outputs would overwrite each other",
                reference.stem()
            )));
        }
    }
    Ok(())
}

/// Split corpus text into entries: BOM dropped, lines trimmed, blanks skipped
pub fn parse_corpus(content: &str) -> Vec<TextEntry> {
    content
        .strip_prefix(UTF8_BOM)
        .unwrap_or(content)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| TextEntry {
            index,
            text: line.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_corpus_skips_blanks() {
        let entries = parse_corpus("\u{feff}こんにちは\n\n  \r\n  second line \r\nthird");
        let texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["こんにちは", "second line", "third"]);
        assert_eq!(entries[2].index, 2);
    }

    #[test]
    fn test_parse_empty_corpus() {
        assert!(parse_corpus("").is_empty());
        assert!(parse_corpus("\n\n").is_empty());
    }

    #[test]
    fn test_references_differing_only_in_extension_case_are_rejected() {
        let references = vec![
            ReferenceAudio::new(0, "/refs/take_a.WAV".into()),
            ReferenceAudio::new(1, "/refs/take_a.wav".into()),
        ];
        let err = check_distinct_stems(&references).unwrap_err();
        assert!(matches!(err, BatchError::Config(msg) if msg.contains("take_a")));

        let references = vec![
            ReferenceAudio::new(0, "/refs/take_a.wav".into()),
            ReferenceAudio::new(1, "/refs/take_b.WAV".into()),
        ];
        assert!(check_distinct_stems(&references).is_ok());
    }

    #[tokio::test]
    async fn test_non_utf8_corpus_is_io_error() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let corpus = temp_dir.path().join("corpus.txt");
        std::fs::write(&corpus, [0xff, 0xfe, 0x00, 0x41]).unwrap();

        let engine = PairingEngine::new("wav");
        let err = engine.load_corpus(&corpus).await.unwrap_err();
        assert!(matches!(err, BatchError::Io(e) if e.kind() == io::ErrorKind::InvalidData));
    }
}
