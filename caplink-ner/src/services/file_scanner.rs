//! Caption file discovery
//!
//! Input is one `.vtt` file or a directory searched recursively.

use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// File discovery errors
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Not a .vtt file or directory: {0}")]
    Unsupported(PathBuf),
}

/// Case-insensitive `.vtt` extension check
pub fn is_caption_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("vtt"))
        .unwrap_or(false)
}

/// Caption file finder
#[derive(Debug, Clone, Default)]
pub struct FileScanner {
    max_depth: Option<usize>,
}

impl FileScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Caption files under `input`, sorted by path
    ///
    /// Unreadable directory entries are logged and skipped.
    pub fn scan(&self, input: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !input.exists() {
            return Err(ScanError::PathNotFound(input.to_path_buf()));
        }

        if input.is_file() {
            return if is_caption_file(input) {
                Ok(vec![input.to_path_buf()])
            } else {
                Err(ScanError::Unsupported(input.to_path_buf()))
            };
        }

        if !input.is_dir() {
            return Err(ScanError::Unsupported(input.to_path_buf()));
        }

        let mut walker = WalkDir::new(input).follow_links(false);
        if let Some(depth) = self.max_depth {
            walker = walker.max_depth(depth);
        }

        let mut files = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() && is_caption_file(entry.path()) => {
                    files.push(entry.into_path());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Skipping unreadable entry: {}", e),
            }
        }

        files.sort();
        tracing::info!(count = files.len(), "Found caption files in {}", input.display());
        Ok(files)
    }
}
