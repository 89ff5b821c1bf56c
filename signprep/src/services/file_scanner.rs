//! Recursive file discovery by extension
//!
//! Used to find raw videos under the input root and finished archives
//! under the output root. Results are sorted so that planning is
//! deterministic across runs. Symlinked files and directories are
//! followed; walkdir reports link loops as entry errors, which are logged
//! and skipped.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// File scanner errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Scan result with statistics
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// Matching file paths, sorted
    pub files: Vec<PathBuf>,
    /// Total size of all files in bytes
    pub total_size: u64,
    /// Count of files by extension
    pub by_format: BTreeMap<String, usize>,
}

/// Extension-matching file scanner
pub struct FileScanner {
    extensions: Vec<String>,
    ignored_names: Vec<String>,
}

impl FileScanner {
    /// Create a scanner matching `extensions` (without dot, case-insensitive)
    ///
    /// Skips entries named exactly .DS_Store, Thumbs.db, .git or .svn.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
            ignored_names: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                ".git".to_string(),
                ".svn".to_string(),
            ],
        }
    }

    /// Scan directory for matching files
    pub fn scan(&self, root_path: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !root_path.exists() {
            return Err(ScanError::PathNotFound(root_path.to_path_buf()));
        }

        if !root_path.is_dir() {
            return Err(ScanError::NotADirectory(root_path.to_path_buf()));
        }

        let mut files = Vec::new();

        let walker = WalkDir::new(root_path)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| self.should_process_entry(e));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.matches_extension(entry.path()) {
                        files.push(entry.path().to_path_buf());
                    }
                }
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                    // Continue scanning, don't abort
                }
            }
        }

        files.sort();
        tracing::debug!(root = %root_path.display(), files = files.len(), "Scan complete");
        Ok(files)
    }

    /// Scan with statistics
    pub fn scan_with_stats(&self, root_path: &Path) -> Result<ScanResult, ScanError> {
        let files = self.scan(root_path)?;

        let mut total_size = 0u64;
        let mut by_format = BTreeMap::new();

        for file in &files {
            match std::fs::metadata(file) {
                Ok(metadata) => total_size += metadata.len(),
                Err(e) => tracing::warn!("Cannot stat {}: {}", file.display(), e),
            }

            if let Some(ext) = file.extension() {
                let ext_str = ext.to_string_lossy().to_lowercase();
                *by_format.entry(ext_str).or_insert(0) += 1;
            }
        }

        Ok(ScanResult {
            files,
            total_size,
            by_format,
        })
    }

    /// Check if entry should be processed
    fn should_process_entry(&self, entry: &DirEntry) -> bool {
        let file_name = entry.file_name().to_string_lossy();
        !self.ignored_names.iter().any(|name| *name == file_name)
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            })
            .unwrap_or(false)
    }
}
