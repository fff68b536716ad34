//! caplink-ner library interface
//!
//! Caption entity extraction and knowledge-base linking. Exposes the
//! pipeline pieces for the binary and for integration testing.

pub mod config;
pub mod error;
pub mod export;
pub mod services;
pub mod workflow;

pub use crate::config::{CliOverrides, PipelineSettings};
pub use crate::error::{PipelineError, PipelineResult};
pub use crate::workflow::{BatchOutcome, MentionPipeline, RunReport};
