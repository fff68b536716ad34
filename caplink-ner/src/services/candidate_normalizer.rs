//! Candidate normalizer
//!
//! Produces cleaned search variants of a raw mention for knowledge-base
//! fallback search:
//!
//! ```text
//! "Eleanor Rathbone's"          -> ["Eleanor Rathbone"]
//! "Pankhursts"                  -> ["Pankhursts", "Pankhurst"]
//! "the public assistance board" -> ["public assistance board"]
//! ```
//!
//! Variant order: cleaned, title-cased, minus trailing `s`, minus trailing
//! `es`. Case-insensitive duplicates and empty strings are dropped, so the
//! title-cased form only survives when case mapping changes its letters
//! (e.g. `ß` -> `SS`).

use caplink_common::config::LinkingConfig;
use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

static POSSESSIVE_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:'s|’s|s'|s’)$").expect("valid regex"));

static PLURAL_S: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]s$").expect("valid regex"));

static PLURAL_ES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]es$").expect("valid regex"));

const QUOTE_CHARS: &[char] = &['“', '”', '"', '\'', '`', ' '];

/// Mention text normalizer for fallback search
#[derive(Debug, Clone)]
pub struct CandidateNormalizer {
    stop_prefixes: Vec<String>,
    strip_es_plural: bool,
}

impl Default for CandidateNormalizer {
    fn default() -> Self {
        Self {
            stop_prefixes: vec!["the ".to_string()],
            strip_es_plural: true,
        }
    }
}

impl CandidateNormalizer {
    pub fn new(stop_prefixes: Vec<String>, strip_es_plural: bool) -> Self {
        Self {
            stop_prefixes,
            strip_es_plural,
        }
    }

    pub fn from_config(config: &LinkingConfig) -> Self {
        Self::new(config.stop_prefixes.clone(), config.strip_es_plural)
    }

    /// Cleaned form of `text` (steps 1-4, before variant expansion)
    pub fn clean(&self, text: &str) -> String {
        let collapsed = WHITESPACE_RUN.replace_all(text.trim(), " ");
        let unquoted = collapsed.trim_matches(QUOTE_CHARS);

        let without_possessive = POSSESSIVE_SUFFIX.replace(unquoted, "");

        let mut cleaned: &str = &without_possessive;
        for prefix in &self.stop_prefixes {
            if let Some(rest) = strip_prefix_ignore_case(cleaned, prefix) {
                cleaned = rest;
                break;
            }
        }

        cleaned
            .trim_matches(|c: char| c.is_ascii_punctuation() || c == ' ')
            .to_string()
    }

    /// Ordered, case-insensitively unique search variants for `text`
    pub fn normalize(&self, text: &str) -> Vec<String> {
        let cleaned = self.clean(text);
        let mut variants = vec![cleaned.clone()];

        if !cleaned.is_empty() && !is_all_uppercase(&cleaned) {
            variants.push(title_case(&cleaned));
        }

        if !cleaned.contains(' ') {
            if PLURAL_S.is_match(&cleaned) {
                variants.push(drop_last_chars(&cleaned, 1));
            }
            if self.strip_es_plural && PLURAL_ES.is_match(&cleaned) {
                variants.push(drop_last_chars(&cleaned, 2));
            }
        }

        let mut seen = std::collections::HashSet::new();
        variants
            .into_iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty() && seen.insert(v.to_lowercase()))
            .collect()
    }
}

/// Strip `prefix` from the start of `text` comparing char-by-char case-insensitively
fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let mut chars = text.char_indices();
    for expected in prefix.chars() {
        match chars.next() {
            Some((_, actual)) if actual.to_lowercase().eq(expected.to_lowercase()) => {}
            _ => return None,
        }
    }
    let rest_start = chars.next().map(|(i, _)| i).unwrap_or(text.len());
    Some(&text[rest_start..])
}

/// Has at least one cased char and no lowercase ones
fn is_all_uppercase(text: &str) -> bool {
    text.chars().any(char::is_uppercase) && !text.chars().any(char::is_lowercase)
}

/// Uppercase the first letter of each letter run, lowercase the rest
///
/// "o'brien" becomes "O'Brien", matching conventional title-casing of
/// apostrophe words.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_is_letter = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(c);
            previous_is_letter = false;
        }
    }
    out
}

fn drop_last_chars(text: &str, count: usize) -> String {
    let keep = text.chars().count().saturating_sub(count);
    text.chars().take(keep).collect()
}
