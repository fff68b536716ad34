//! # caplink common library
//!
//! Shared code for the caption entity-linking tools including:
//! - Data model (cues, stitched segments, candidates, mention rows)
//! - Timestamp codec
//! - Configuration file schema and discovery

pub mod config;
pub mod error;
pub mod models;
pub mod time;

pub use error::{Error, Result};
pub use models::{Candidate, Cue, CueSpan, MentionRow, Segment};
