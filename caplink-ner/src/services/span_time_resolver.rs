//! Span-to-time resolution
//!
//! Maps a char span inside a stitched segment back to the time range of the
//! cues it overlaps.

use caplink_common::time::render_timestamp;
use caplink_common::{Cue, Segment};

/// Resolved cue range for a span
#[derive(Debug, Clone, PartialEq)]
pub struct SpanTimes {
    pub first_cue: usize,
    pub last_cue: usize,
    pub cue_start: String,
    pub cue_end: String,
    /// True when no interval overlapped and the segment bounds were used
    pub used_segment_bounds: bool,
}

/// First and last cue index overlapped by `[span_start, span_end)`
///
/// `None` when no interval overlaps; [`resolve_span`] then uses the
/// segment's own cue bounds.
pub fn overlapped_cues(span_start: usize, span_end: usize, segment: &Segment) -> Option<(usize, usize)> {
    segment
        .char_to_cue
        .iter()
        .filter(|span| span.overlaps(span_start, span_end))
        .fold(None, |acc, span| match acc {
            None => Some((span.cue_index, span.cue_index)),
            Some((lo, hi)) => Some((lo.min(span.cue_index), hi.max(span.cue_index))),
        })
}

/// Resolve a span to rendered `(start, end)` timestamps
///
/// `cues` must be the list `segment` was stitched from.
pub fn resolve_span(span_start: usize, span_end: usize, segment: &Segment, cues: &[Cue]) -> SpanTimes {
    let (first_cue, last_cue, used_segment_bounds) =
        match overlapped_cues(span_start, span_end, segment) {
            Some((lo, hi)) => (lo, hi, false),
            None => {
                tracing::debug!(
                    span_start,
                    span_end,
                    "Span overlaps no cue interval; using segment bounds"
                );
                (segment.start_cue_idx, segment.end_cue_idx, true)
            }
        };

    SpanTimes {
        first_cue,
        last_cue,
        cue_start: render_timestamp(cues[first_cue].start),
        cue_end: render_timestamp(cues[last_cue].end),
        used_segment_bounds,
    }
}

/// Resolve a span to `(cue_start, cue_end)` timestamp strings
pub fn resolve_span_time(
    span_start: usize,
    span_end: usize,
    segment: &Segment,
    cues: &[Cue],
) -> (String, String) {
    let times = resolve_span(span_start, span_end, segment, cues);
    (times.cue_start, times.cue_end)
}
