//! Shared data model
//!
//! Cues come from a caption parser, segments from the stitcher, and
//! mention rows are what the exporters write.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One timed line of caption text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Whitespace-normalized cue text
    pub text: String,
}

impl Cue {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// Half-open char interval `[char_start, char_end)` of a segment mapped to a cue index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CueSpan {
    pub char_start: usize,
    pub char_end: usize,
    pub cue_index: usize,
}

impl CueSpan {
    pub fn new(char_start: usize, char_end: usize, cue_index: usize) -> Self {
        Self {
            char_start,
            char_end,
            cue_index,
        }
    }

    /// Half-open overlap test against `[start, end)`
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.char_end > start && self.char_start < end
    }
}

/// A run of consecutive cues stitched into one analysis window
///
/// Offsets are char (Unicode scalar) offsets into `text`. The `char_to_cue`
/// intervals are in increasing order and partition `[0, text.chars().count())`;
/// each join space belongs to the cue before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub char_to_cue: Vec<CueSpan>,
    /// Index of the first member cue in the source cue list
    pub start_cue_idx: usize,
    /// Index of the last member cue in the source cue list (inclusive)
    pub end_cue_idx: usize,
}

impl Segment {
    /// Length of `text` in chars
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Number of cues stitched into this segment
    pub fn cue_count(&self) -> usize {
        self.end_cue_idx + 1 - self.start_cue_idx
    }
}

/// A proposed knowledge-base identity for a mention
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "qid")]
    pub id: Option<String>,
    pub label: Option<String>,
    pub score: Option<f64>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Candidate {
    /// True if `mention` equals one of the aliases, ignoring case and surrounding whitespace
    pub fn has_alias(&self, mention: &str) -> bool {
        let needle = mention.trim().to_lowercase();
        self.aliases
            .iter()
            .any(|alias| alias.trim().to_lowercase() == needle)
    }
}

/// One detected entity occurrence with its timing and link resolution
///
/// Serialized field names are the export column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentionRow {
    pub file_id: String,
    pub cue_start: String,
    pub cue_end: String,
    pub mention_text: String,
    /// Entity type, e.g. PERSON or ORG
    pub label: String,
    pub context: String,
    pub char_start: usize,
    pub char_end: usize,
    #[serde(rename = "wikidata_qid")]
    pub resolved_id: Option<String>,
    #[serde(rename = "wikidata_label")]
    pub resolved_label: Option<String>,
    pub candidates: Vec<Candidate>,
    /// Authority identifier name → value (viaf, lcnaf, wikipedia_en, ...)
    #[serde(rename = "other_ids")]
    pub authority_ids: BTreeMap<String, String>,
    #[serde(rename = "link_confidence")]
    pub confidence: Option<f64>,
    pub needs_review: bool,
    #[serde(rename = "notes")]
    pub note: String,
}
