//! Corpus lines, reference audio and the pairs formed from them

use std::path::{Path, PathBuf};

/// One non-blank corpus line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEntry {
    /// Position among non-blank lines (0-based)
    pub index: usize,
    pub text: String,
}

/// One reference clip, in sorted file-name order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceAudio {
    pub index: usize,
    pub file: PathBuf,
    /// Reference transcript taken from the file name
    pub derived_label: String,
}

impl ReferenceAudio {
    pub fn new(index: usize, file: PathBuf) -> Self {
        let derived_label = derive_label(&file);
        Self {
            index,
            file,
            derived_label,
        }
    }

    /// File name without extension
    pub fn stem(&self) -> String {
        file_stem(&self.file)
    }
}

/// Index-aligned corpus line and reference clip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisPair {
    pub text: TextEntry,
    pub reference: ReferenceAudio,
}

/// Label encoded in a file name: the part of the stem after the last
/// underscore, or the whole stem when there is none.
///
/// `narration_intro_hello.wav` → `hello`, `silence.wav` → `silence`.
pub fn derive_label(path: &Path) -> String {
    let stem = file_stem(path);
    match stem.rsplit_once('_') {
        Some((_, label)) => label.to_string(),
        None => stem,
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}
