//! Run orchestration
//!
//! Drives caption files through the mention pipeline and gathers the rows
//! the exporters write.

pub mod pipeline;

use crate::export::ExportSummary;
use caplink_common::MentionRow;
use std::path::PathBuf;

pub use pipeline::{build_linker, build_recognizer, MentionPipeline};

/// A file that could not be processed
#[derive(Debug, Clone, PartialEq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of a run over many files
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Rows in input-file order
    pub rows: Vec<MentionRow>,
    pub files_processed: usize,
    pub failures: Vec<FileFailure>,
}

impl RunReport {
    pub fn needs_review_count(&self) -> usize {
        self.rows.iter().filter(|r| r.needs_review).count()
    }
}

/// A finished batch: what ran and what was written
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub report: RunReport,
    pub export: ExportSummary,
}
