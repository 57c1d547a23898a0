//! Audio file discovery
//!
//! Recursive (or depth-limited) traversal returning every regular file whose
//! extension is in the recognized set. Results are sorted by path so logs and
//! summaries are reproducible between runs.

use crate::error::BatchError;
use crate::models::MediaFile;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Marker embedded in padding side-files; such files are never inputs
pub const TEMP_FILE_MARKER: &str = ".voxprep-pad.";

/// Audio file scanner errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

impl From<ScanError> for BatchError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::PathNotFound(path) => BatchError::NotFound(path),
            ScanError::NotADirectory(path) => BatchError::NotADirectory(path),
        }
    }
}

/// Audio file scanner
#[derive(Debug, Clone)]
pub struct FileScanner {
    extensions: BTreeSet<String>,
    ignore_patterns: Vec<String>,
    max_depth: Option<usize>,
}

impl FileScanner {
    /// Create a scanner for the given extensions (case-insensitive, leading
    /// dot optional)
    ///
    /// Ignores system files like .DS_Store, Thumbs.db, .git and padding
    /// side-files left behind by an interrupted run.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| normalize_extension(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
            ignore_patterns: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                ".git".to_string(),
                ".svn".to_string(),
                TEMP_FILE_MARKER.to_string(),
            ],
            max_depth: None,
        }
    }

    /// Limit traversal depth (1 = direct children only)
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Scan directory for audio files, sorted by path
    pub fn scan(&self, root_path: &Path) -> Result<Vec<MediaFile>, ScanError> {
        if !root_path.exists() {
            return Err(ScanError::PathNotFound(root_path.to_path_buf()));
        }

        if !root_path.is_dir() {
            return Err(ScanError::NotADirectory(root_path.to_path_buf()));
        }

        let mut symlink_visited = HashSet::new();
        let mut files = Vec::new();

        let walker = WalkDir::new(root_path)
            .follow_links(false)
            .sort_by_file_name()
            .max_depth(self.max_depth.unwrap_or(usize::MAX))
            .into_iter()
            .filter_entry(|e| self.should_process_entry(e, &mut symlink_visited));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    if let Some(file) = MediaFile::from_path(entry.path()) {
                        if self.extensions.contains(file.extension()) {
                            files.push(file);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                    // Continue scanning, don't abort
                }
            }
        }

        // sort_by_file_name orders siblings; a full path sort also fixes the
        // interleaving of files and subdirectories
        files.sort_by(|a, b| a.path().cmp(b.path()));

        tracing::debug!(
            root = %root_path.display(),
            files_found = files.len(),
            "Scan complete"
        );

        Ok(files)
    }

    /// Check if entry should be processed
    fn should_process_entry(
        &self,
        entry: &DirEntry,
        symlink_visited: &mut HashSet<PathBuf>,
    ) -> bool {
        if entry.depth() == 0 {
            return true;
        }

        let file_name = entry.file_name().to_string_lossy();

        for pattern in &self.ignore_patterns {
            if file_name.contains(pattern.as_str()) {
                return false;
            }
        }

        // Detect symlink loops
        if entry.file_type().is_symlink() {
            if let Ok(canonical) = entry.path().canonicalize() {
                if !symlink_visited.insert(canonical) {
                    tracing::warn!("Symlink loop detected: {}", entry.path().display());
                    return false;
                }
            }
        }

        true
    }

    /// Check if extension is recognized
    pub fn is_recognized_extension(&self, ext: &str) -> bool {
        self.extensions.contains(&normalize_extension(ext))
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scanner() -> FileScanner {
        FileScanner::new(["wav", ".MP3", "flac"])
    }

    #[test]
    fn test_extension_normalization() {
        let scanner = scanner();
        assert!(scanner.is_recognized_extension("wav"));
        assert!(scanner.is_recognized_extension("WAV"));
        assert!(scanner.is_recognized_extension(".mp3"));
        assert!(!scanner.is_recognized_extension("txt"));
    }

    #[test]
    fn test_scan_nonexistent_path() {
        let result = scanner().scan(Path::new("/nonexistent/voxprep/path"));
        match result.unwrap_err() {
            ScanError::PathNotFound(_) => {}
            other => panic!("Expected PathNotFound error, got {:?}", other),
        }
    }

    #[test]
    fn test_scan_file_as_directory() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let file = temp_dir.path().join("clip.wav");
        fs::write(&file, b"").unwrap();

        match scanner().scan(&file).unwrap_err() {
            ScanError::NotADirectory(path) => assert_eq!(path, file),
            other => panic!("Expected NotADirectory error, got {:?}", other),
        }
    }

    #[test]
    fn test_scan_recursive_sorted_case_insensitive() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("b_dir")).unwrap();
        fs::create_dir_all(root.join("a_dir/nested")).unwrap();
        fs::write(root.join("z.WAV"), b"").unwrap();
        fs::write(root.join("b_dir/one.flac"), b"").unwrap();
        fs::write(root.join("a_dir/nested/two.mp3"), b"").unwrap();
        fs::write(root.join("a_dir/notes.txt"), b"").unwrap();
        fs::write(root.join("noext"), b"").unwrap();

        let files = scanner().scan(root).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.path().strip_prefix(root).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            names,
            vec![
                PathBuf::from("a_dir/nested/two.mp3"),
                PathBuf::from("b_dir/one.flac"),
                PathBuf::from("z.WAV"),
            ]
        );
        assert_eq!(files[2].extension(), "wav");
    }

    #[test]
    fn test_scan_skips_padding_side_files() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        fs::write(temp_dir.path().join("clip.wav"), b"").unwrap();
        fs::write(temp_dir.path().join("clip.voxprep-pad.wav"), b"").unwrap();

        let files = scanner().scan(temp_dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].stem(), "clip");
    }

    #[test]
    fn test_max_depth_one_is_flat() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("sub")).unwrap();
        fs::write(temp_dir.path().join("top.wav"), b"").unwrap();
        fs::write(temp_dir.path().join("sub/deep.wav"), b"").unwrap();

        let files = scanner().with_max_depth(1).scan(temp_dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].stem(), "top");
    }
}
