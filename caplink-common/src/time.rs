//! Caption timestamp codec
//!
//! Converts between WebVTT-style timestamps and seconds.
//!
//! - `parse` accepts `HH:MM:SS.mmm` or `MM:SS.mmm` (fraction optional).
//! - `render` always emits the three-part `HH:MM:SS.mmm` form.
//!
//! Rendering rounds the *total* millisecond count half away from zero
//! (`f64::round`) before splitting it into fields, so a value such as
//! `1.9996` renders as `00:00:02.000` rather than carrying a 1000 ms field.

use thiserror::Error;

/// Malformed timestamp text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// Timestamp did not split into two or three colon-separated parts
    #[error("expected 2 or 3 colon-separated parts in {input:?}, found {parts}")]
    PartCount { input: String, parts: usize },

    /// One of the parts is not a number
    #[error("non-numeric {field} {value:?} in timestamp {input:?}")]
    NonNumeric {
        input: String,
        field: &'static str,
        value: String,
    },
}

/// Parse `HH:MM:SS.mmm` or `MM:SS.mmm` into seconds.
///
/// # Examples
///
/// ```
/// use caplink_common::time::parse_timestamp;
///
/// assert_eq!(parse_timestamp("00:01:02.500").unwrap(), 62.5);
/// assert_eq!(parse_timestamp("01:02.500").unwrap(), 62.5);
/// assert!(parse_timestamp("62.5").is_err());
/// ```
pub fn parse_timestamp(text: &str) -> Result<f64, FormatError> {
    let trimmed = text.trim();
    let parts: Vec<&str> = trimmed.split(':').collect();

    let (hours, minutes, seconds) = match parts.as_slice() {
        [mm, ss] => ("0", *mm, *ss),
        [hh, mm, ss] => (*hh, *mm, *ss),
        _ => {
            return Err(FormatError::PartCount {
                input: trimmed.to_string(),
                parts: parts.len(),
            })
        }
    };

    let hours = parse_whole(trimmed, "hours", hours)?;
    let minutes = parse_whole(trimmed, "minutes", minutes)?;
    let seconds = parse_fraction(trimmed, seconds)?;

    Ok(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}

fn parse_whole(input: &str, field: &'static str, value: &str) -> Result<u64, FormatError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FormatError::NonNumeric {
            input: input.to_string(),
            field,
            value: value.to_string(),
        });
    }
    value.parse::<u64>().map_err(|_| FormatError::NonNumeric {
        input: input.to_string(),
        field,
        value: value.to_string(),
    })
}

fn parse_fraction(input: &str, value: &str) -> Result<f64, FormatError> {
    let non_numeric = || FormatError::NonNumeric {
        input: input.to_string(),
        field: "seconds",
        value: value.to_string(),
    };

    // Digits with at most one decimal point; rejects "inf", "1e3", signs
    let mut dots = 0;
    for b in value.bytes() {
        match b {
            b'0'..=b'9' => {}
            b'.' => dots += 1,
            _ => return Err(non_numeric()),
        }
    }
    if dots > 1 || value.is_empty() || value == "." {
        return Err(non_numeric());
    }

    value.parse::<f64>().map_err(|_| non_numeric())
}

/// Render seconds as `HH:MM:SS.mmm`.
///
/// Negative or non-finite inputs render as `00:00:00.000`.
///
/// # Examples
///
/// ```
/// use caplink_common::time::render_timestamp;
///
/// assert_eq!(render_timestamp(62.5), "00:01:02.500");
/// assert_eq!(render_timestamp(3723.0004), "01:02:03.000");
/// ```
pub fn render_timestamp(seconds: f64) -> String {
    let total_ms = if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    };

    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
}
