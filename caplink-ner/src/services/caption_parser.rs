//! WebVTT caption parser
//!
//! Reads a `.vtt` file into ordered [`Cue`]s with whitespace-normalized,
//! markup-free text. Cues that are empty after cleaning are dropped.

use caplink_common::time::{parse_timestamp, FormatError};
use caplink_common::Cue;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use thiserror::Error;

static INLINE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Caption parsing errors
#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("Missing WEBVTT header")]
    MissingHeader,

    #[error("Malformed timing line {line}: {text}")]
    MalformedTiming { line: usize, text: String },

    #[error("Bad timestamp on line {line}: {source}")]
    Timestamp {
        line: usize,
        #[source]
        source: FormatError,
    },

    #[error("Cannot read {0}: {1}")]
    Io(String, std::io::Error),
}

/// Block kinds that carry no cues
fn is_metadata_block(first_line: &str) -> bool {
    ["NOTE", "STYLE", "REGION"].iter().any(|keyword| {
        first_line
            .strip_prefix(keyword)
            .map(|rest| rest.is_empty() || rest.starts_with([' ', '\t']))
            .unwrap_or(false)
    })
}

fn is_header(line: &str) -> bool {
    line.strip_prefix("WEBVTT")
        .map(|rest| rest.is_empty() || rest.starts_with([' ', '\t']))
        .unwrap_or(false)
}

/// Strip tags, decode basic entities, collapse whitespace
pub fn clean_cue_text(raw: &str) -> String {
    let untagged = INLINE_TAG.replace_all(raw, "");
    let decoded = untagged
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&");
    WHITESPACE_RUN.replace_all(decoded.trim(), " ").into_owned()
}

fn parse_timing(line_no: usize, line: &str) -> Result<(f64, f64), CaptionError> {
    let malformed = || CaptionError::MalformedTiming {
        line: line_no,
        text: line.to_string(),
    };

    let (left, right) = line.split_once("-->").ok_or_else(malformed)?;
    let start_text = left.trim();
    // Cue settings may follow the end timestamp
    let end_text = right.split_whitespace().next().ok_or_else(malformed)?;
    if start_text.is_empty() {
        return Err(malformed());
    }

    let to_error = |source| CaptionError::Timestamp {
        line: line_no,
        source,
    };
    let start = parse_timestamp(start_text).map_err(to_error)?;
    let end = parse_timestamp(end_text).map_err(to_error)?;
    Ok((start, end))
}

/// Parse WebVTT text into cues
pub fn parse_vtt(content: &str) -> Result<Vec<Cue>, CaptionError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let lines: Vec<&str> = content.lines().map(|l| l.trim_end_matches('\r')).collect();

    match lines.first() {
        Some(first) if is_header(first.trim_end()) => {}
        _ => return Err(CaptionError::MissingHeader),
    }

    let mut cues = Vec::new();
    let mut i = 0;
    // Header block runs to the first blank line
    while i < lines.len() && !lines[i].trim().is_empty() {
        i += 1;
    }

    while i < lines.len() {
        if lines[i].trim().is_empty() {
            i += 1;
            continue;
        }

        let block_start = i;
        while i < lines.len() && !lines[i].trim().is_empty() {
            i += 1;
        }
        let block = &lines[block_start..i];

        if is_metadata_block(block[0]) {
            continue;
        }

        // Timing is the first line, or the second after a cue identifier
        let timing_offset = match block.iter().take(2).position(|l| l.contains("-->")) {
            Some(offset) => offset,
            None => {
                tracing::debug!(line = block_start + 1, "Skipping block without timing line");
                continue;
            }
        };

        let line_no = block_start + timing_offset + 1;
        let (start, end) = parse_timing(line_no, block[timing_offset])?;
        let text = clean_cue_text(&block[timing_offset + 1..].join(" "));
        if text.is_empty() {
            continue;
        }
        cues.push(Cue::new(start, end, text));
    }

    Ok(cues)
}

/// Read and parse a `.vtt` file
pub fn load_vtt(path: &Path) -> Result<Vec<Cue>, CaptionError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CaptionError::Io(path.display().to_string(), e))?;
    parse_vtt(&content)
}
