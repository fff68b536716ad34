//! Error types for caplink-ner

use crate::export::ExportError;
use crate::services::caption_parser::CaptionError;
use crate::services::entity_linker::LinkerError;
use crate::services::entity_recognizer::RecognizerError;
use crate::services::file_scanner::ScanError;
use thiserror::Error;

/// Pipeline error type
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Caption file could not be read or parsed
    #[error("Caption error: {0}")]
    Caption(#[from] CaptionError),

    /// Entity pattern file is unusable
    #[error("Pattern error: {0}")]
    Patterns(#[from] RecognizerError),

    /// Linker table is unusable
    #[error("Linker table error: {0}")]
    LinkerTable(#[from] LinkerError),

    /// Input path is missing or unsupported
    #[error("Input error: {0}")]
    Scan(#[from] ScanError),

    /// Outputs could not be written
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Settings out of range
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
