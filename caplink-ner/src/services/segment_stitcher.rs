//! Segment stitcher
//!
//! Merges short caption cues into analysis windows under a token budget and
//! a wall-clock budget, recording which cue every character came from.
//!
//! Admission rule for a cue into the open segment:
//! - the segment is empty (the first cue is always admitted, however long), or
//! - the total whitespace-delimited token count stays `<= max_tokens` AND
//!   `cue.end - segment_start <= max_seconds`.
//!
//! A rejected cue closes the segment and opens the next one.

use caplink_common::{Cue, CueSpan, Segment};

/// Greedy cue stitcher with dual budgets
#[derive(Debug, Clone)]
pub struct SegmentStitcher {
    max_tokens: usize,
    max_seconds: f64,
}

impl SegmentStitcher {
    pub fn new(max_tokens: usize, max_seconds: f64) -> Self {
        Self {
            max_tokens,
            max_seconds,
        }
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn max_seconds(&self) -> f64 {
        self.max_seconds
    }

    /// Stitch `cues` into ordered, non-overlapping segments covering every cue
    pub fn stitch(&self, cues: &[Cue]) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut i = 0;

        while i < cues.len() {
            let start_idx = i;
            let segment_start = cues[i].start;

            let mut text = String::new();
            let mut char_to_cue = Vec::new();
            let mut char_len = 0usize;
            let mut token_count = 0usize;

            while i < cues.len() {
                let cue = &cues[i];
                let cue_tokens = cue.text.split_whitespace().count();

                if i > start_idx {
                    let over_tokens = token_count + cue_tokens > self.max_tokens;
                    let over_seconds = cue.end - segment_start > self.max_seconds;
                    if over_tokens || over_seconds {
                        break;
                    }

                    // Join space belongs to the previous cue
                    char_to_cue.push(CueSpan::new(char_len, char_len + 1, i - 1));
                    text.push(' ');
                    char_len += 1;
                }

                let cue_len = cue.text.chars().count();
                char_to_cue.push(CueSpan::new(char_len, char_len + cue_len, i));
                text.push_str(&cue.text);
                char_len += cue_len;
                token_count += cue_tokens;
                i += 1;
            }

            tracing::trace!(
                start_cue = start_idx,
                end_cue = i - 1,
                tokens = token_count,
                "Closed segment"
            );

            segments.push(Segment {
                text,
                char_to_cue,
                start_cue_idx: start_idx,
                end_cue_idx: i - 1,
            });
        }

        segments
    }
}

/// Stitch with explicit budgets
pub fn stitch(cues: &[Cue], max_tokens: usize, max_seconds: f64) -> Vec<Segment> {
    SegmentStitcher::new(max_tokens, max_seconds).stitch(cues)
}
