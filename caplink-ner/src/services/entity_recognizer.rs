//! Entity recognition back-ends
//!
//! The recognizer is a capability: given segment text it returns tokens and
//! labelled entity spans with char and token offsets. Three back-ends:
//!
//! - [`PatternRecognizer`]: EntityRuler-style phrase patterns loaded from JSONL
//! - [`HeuristicRecognizer`]: capitalised-run heuristic with small cue lists
//! - [`LayeredRecognizer`]: rules first, later layers fill non-overlapping gaps
//!
//! All offsets are char (Unicode scalar) offsets, matching the stitched
//! segment's `char_to_cue` map.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Recognizer setup errors
#[derive(Debug, Error)]
pub enum RecognizerError {
    #[error("Cannot read patterns {0}: {1}")]
    Io(String, std::io::Error),

    #[error("Invalid pattern on line {line}: {message}")]
    InvalidPattern { line: usize, message: String },
}

/// A token with its char offsets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub char_start: usize,
    pub char_end: usize,
}

impl Token {
    fn is_word(&self) -> bool {
        self.text.chars().next().map(char::is_alphanumeric).unwrap_or(false)
    }

    fn is_capitalized(&self) -> bool {
        self.text.chars().next().map(char::is_uppercase).unwrap_or(false)
    }

    fn lower(&self) -> String {
        self.text.to_lowercase()
    }
}

/// A recognized entity mention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySpan {
    pub text: String,
    /// Entity type, e.g. PERSON, ORG, GPE
    pub label: String,
    pub char_start: usize,
    pub char_end: usize,
    pub token_start: usize,
    /// Exclusive
    pub token_end: usize,
}

/// Recognizer output for one piece of text
#[derive(Debug, Clone, Default)]
pub struct AnalyzedText {
    pub text: String,
    pub tokens: Vec<Token>,
    pub entities: Vec<EntitySpan>,
}

impl AnalyzedText {
    /// Text of tokens `[token_start, token_end)`, including inner whitespace
    pub fn token_text(&self, token_start: usize, token_end: usize) -> &str {
        if token_start >= token_end || token_end > self.tokens.len() {
            return "";
        }
        char_slice(
            &self.text,
            self.tokens[token_start].char_start,
            self.tokens[token_end - 1].char_end,
        )
    }

    /// ± `window` tokens around `entity`, clamped to the text
    pub fn context(&self, entity: &EntitySpan, window: usize) -> &str {
        let left = entity.token_start.saturating_sub(window);
        let right = (entity.token_end + window).min(self.tokens.len());
        self.token_text(left, right)
    }

    fn span(&self, token_start: usize, token_end: usize, label: &str) -> EntitySpan {
        EntitySpan {
            text: self.token_text(token_start, token_end).to_string(),
            label: label.to_string(),
            char_start: self.tokens[token_start].char_start,
            char_end: self.tokens[token_end - 1].char_end,
            token_start,
            token_end,
        }
    }
}

/// Named-entity recognition capability
pub trait EntityRecognizer: Send + Sync {
    /// Short back-end name for logs
    fn name(&self) -> &'static str;

    /// Entity spans over pre-computed `tokens` of `text`
    fn recognize(&self, text: &str, tokens: &[Token]) -> Vec<EntitySpan>;

    /// Tokenize and recognize
    fn analyze(&self, text: &str) -> AnalyzedText {
        let tokens = tokenize(text);
        let mut entities = self.recognize(text, &tokens);
        entities.sort_by_key(|e| (e.char_start, e.char_end));
        AnalyzedText {
            text: text.to_string(),
            tokens,
            entities,
        }
    }
}

/// Slice `text` by char offsets `[start, end)`
pub fn char_slice(text: &str, start: usize, end: usize) -> &str {
    let mut indices = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len()));
    let byte_start = indices.nth(start);
    let byte_end = if end > start {
        indices.nth(end - start - 1)
    } else {
        byte_start
    };
    match (byte_start, byte_end) {
        (Some(s), Some(e)) => &text[s..e],
        (Some(s), None) => &text[s..],
        _ => "",
    }
}

/// Split text into word and punctuation tokens
///
/// Words are alphanumeric runs; an apostrophe or hyphen between two
/// alphanumerics stays inside the word ("Rathbone's", "Mary-le-Bow"). Every
/// other non-space char is a token of its own.
pub fn tokenize(text: &str) -> Vec<Token> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut word_start: Option<usize> = None;

    let flush = |tokens: &mut Vec<Token>, start: usize, end: usize| {
        tokens.push(Token {
            text: chars[start..end].iter().collect(),
            char_start: start,
            char_end: end,
        });
    };

    for (i, &c) in chars.iter().enumerate() {
        if c.is_alphanumeric() {
            if word_start.is_none() {
                word_start = Some(i);
            }
            continue;
        }

        let joins_word = matches!(c, '\'' | '’' | '-')
            && word_start.is_some()
            && chars.get(i + 1).map(|n| n.is_alphanumeric()).unwrap_or(false);
        if joins_word {
            continue;
        }

        if let Some(start) = word_start.take() {
            flush(&mut tokens, start, i);
        }
        if !c.is_whitespace() {
            flush(&mut tokens, i, i + 1);
        }
    }
    if let Some(start) = word_start {
        flush(&mut tokens, start, chars.len());
    }

    tokens
}

// ============================================================================
// Pattern recognizer
// ============================================================================

#[derive(Debug, Deserialize)]
struct PatternRecord {
    label: String,
    pattern: serde_json::Value,
}

/// A phrase pattern: exact token sequence with a label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityPattern {
    pub label: String,
    pub tokens: Vec<String>,
}

impl EntityPattern {
    pub fn new(label: impl Into<String>, phrase: &str) -> Self {
        Self {
            label: label.into(),
            tokens: tokenize(phrase).into_iter().map(|t| t.text).collect(),
        }
    }
}

/// Case-sensitive phrase matcher, longest match first
#[derive(Debug, Clone, Default)]
pub struct PatternRecognizer {
    patterns: Vec<EntityPattern>,
}

impl PatternRecognizer {
    pub fn new(mut patterns: Vec<EntityPattern>) -> Self {
        patterns.retain(|p| !p.tokens.is_empty());
        // Stable sort keeps file order among equal lengths
        patterns.sort_by(|a, b| b.tokens.len().cmp(&a.tokens.len()));
        Self { patterns }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Parse JSONL pattern lines (`{"label": "ORG", "pattern": "Somerville College"}`)
    ///
    /// Token-attribute patterns (JSON arrays) are not supported and are
    /// skipped with a warning.
    pub fn from_jsonl_str(content: &str) -> Result<Self, RecognizerError> {
        let mut patterns = Vec::new();
        let mut skipped = 0usize;

        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record: PatternRecord =
                serde_json::from_str(line).map_err(|e| RecognizerError::InvalidPattern {
                    line: idx + 1,
                    message: e.to_string(),
                })?;

            match record.pattern {
                serde_json::Value::String(phrase) => {
                    patterns.push(EntityPattern::new(record.label, &phrase));
                }
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::warn!(skipped, "Skipped token-attribute patterns (phrase patterns only)");
        }

        Ok(Self::new(patterns))
    }

    pub fn from_jsonl(path: &Path) -> Result<Self, RecognizerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RecognizerError::Io(path.display().to_string(), e))?;
        let recognizer = Self::from_jsonl_str(&content)?;
        tracing::info!(
            patterns = recognizer.len(),
            "Loaded entity patterns from {}",
            path.display()
        );
        Ok(recognizer)
    }

    fn longest_match_at(&self, tokens: &[Token], at: usize) -> Option<&EntityPattern> {
        self.patterns.iter().find(|pattern| {
            let end = at + pattern.tokens.len();
            end <= tokens.len()
                && pattern
                    .tokens
                    .iter()
                    .zip(&tokens[at..end])
                    .all(|(expected, token)| *expected == token.text)
        })
    }
}

impl EntityRecognizer for PatternRecognizer {
    fn name(&self) -> &'static str {
        "patterns"
    }

    fn recognize(&self, text: &str, tokens: &[Token]) -> Vec<EntitySpan> {
        let view = AnalyzedText {
            text: text.to_string(),
            tokens: tokens.to_vec(),
            entities: Vec::new(),
        };

        let mut spans = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            match self.longest_match_at(tokens, i) {
                Some(pattern) => {
                    let end = i + pattern.tokens.len();
                    spans.push(view.span(i, end, &pattern.label));
                    i = end;
                }
                None => i += 1,
            }
        }
        spans
    }
}

// ============================================================================
// Heuristic recognizer
// ============================================================================

const PERSON_PREFIX: &[&str] = &[
    "mr", "mrs", "ms", "miss", "dr", "prof", "professor", "sir", "dame", "lady", "lord",
];

const ORG_SUFFIX: &[&str] = &[
    "university",
    "college",
    "school",
    "museum",
    "library",
    "society",
    "council",
    "board",
    "committee",
    "association",
    "union",
    "party",
    "league",
    "federation",
    "institute",
    "foundation",
    "trust",
    "company",
    "corporation",
    "ltd",
    "inc",
    "bank",
    "hospital",
    "church",
    "press",
    "office",
    "ministry",
];

const LOC_PREPOSITION: &[&str] = &[
    "in", "from", "at", "to", "near", "into", "across", "around", "outside",
];

/// Travel verbs that take a place as direct object in recollections
/// ("we visited Oxford", "she left Leeds")
const TRAVEL_VERBS: &[&str] = &[
    "visited", "visiting", "toured", "left", "leaving", "reached",
];

const CONNECTORS: &[&str] = &["of", "the"];

// Capitalised words that rarely start an entity in conversational speech
const COMMON_SENTENCE_STARTERS: &[&str] = &[
    "the", "a", "an", "this", "that", "these", "those", "it", "he", "she", "we", "they", "i",
    "i'm", "i've", "i'd", "i'll", "you", "my", "our", "your", "his", "her", "their", "in",
    "on", "at", "to", "for", "from", "by", "with", "and", "but", "or", "so", "yet", "if",
    "because", "well", "yes", "no", "oh", "okay", "ok", "um", "uh", "then", "now", "today",
    "yesterday", "tomorrow", "what", "where", "when", "who", "why", "how", "is", "are", "was",
    "were", "there", "here", "after", "before", "actually", "anyway",
];

/// Capitalised-run entity heuristic
#[derive(Debug, Clone, Default)]
pub struct HeuristicRecognizer;

impl HeuristicRecognizer {
    pub fn new() -> Self {
        Self
    }

    /// Previous word token before `idx`, skipping one "." (as in "Dr.")
    fn previous_word(tokens: &[Token], idx: usize) -> Option<&Token> {
        let mut j = idx.checked_sub(1)?;
        if tokens[j].text == "." {
            j = j.checked_sub(1)?;
        }
        tokens.get(j).filter(|t| t.is_word())
    }

    fn classify(tokens: &[Token], start: usize, end: usize, has_person_prefix: bool) -> &'static str {
        if has_person_prefix {
            return "PERSON";
        }

        let words: Vec<String> = tokens[start..end]
            .iter()
            .filter(|t| !CONNECTORS.contains(&t.text.as_str()))
            .map(Token::lower)
            .collect();
        let first = words.first().map(String::as_str).unwrap_or_default();
        let last = words.last().map(String::as_str).unwrap_or_default();

        if ORG_SUFFIX.contains(&last) || (words.len() > 1 && ORG_SUFFIX.contains(&first)) {
            return "ORG";
        }

        // Directly preceding word, no "." skipping
        let locative = start
            .checked_sub(1)
            .and_then(|j| tokens.get(j))
            .map(|t| {
                let word = t.lower();
                LOC_PREPOSITION.contains(&word.as_str()) || TRAVEL_VERBS.contains(&word.as_str())
            })
            .unwrap_or(false);
        if locative {
            return "GPE";
        }

        if words.len() > 1 {
            "PERSON"
        } else {
            "MISC"
        }
    }
}

impl EntityRecognizer for HeuristicRecognizer {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn recognize(&self, text: &str, tokens: &[Token]) -> Vec<EntitySpan> {
        let view = AnalyzedText {
            text: text.to_string(),
            tokens: tokens.to_vec(),
            entities: Vec::new(),
        };

        let mut spans = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            if !token.is_word() || !token.is_capitalized() {
                i += 1;
                continue;
            }
            if COMMON_SENTENCE_STARTERS.contains(&token.lower().as_str()) {
                i += 1;
                continue;
            }

            // Extend over capitalised words and connectors followed by one
            let mut end = i + 1;
            while end < tokens.len() {
                let next = &tokens[end];
                if next.is_word() && next.is_capitalized() {
                    end += 1;
                } else if CONNECTORS.contains(&next.text.as_str())
                    && tokens
                        .get(end + 1)
                        .map(|t| t.is_word() && t.is_capitalized())
                        .unwrap_or(false)
                {
                    end += 1;
                } else {
                    break;
                }
            }

            // "Dr Smith" without the period: drop the honorific from the run
            let mut start = i;
            let mut has_person_prefix = false;
            if PERSON_PREFIX.contains(&tokens[start].lower().as_str()) {
                if end - start == 1 {
                    i = end;
                    continue;
                }
                start += 1;
                has_person_prefix = true;
            } else if let Some(prev) = Self::previous_word(tokens, start) {
                has_person_prefix = PERSON_PREFIX.contains(&prev.lower().as_str());
            }

            let label = Self::classify(tokens, start, end, has_person_prefix);
            spans.push(view.span(start, end, label));
            i = end;
        }
        spans
    }
}

// ============================================================================
// Layered recognizer
// ============================================================================

/// Runs recognizers in order; later layers only add non-overlapping spans
pub struct LayeredRecognizer {
    layers: Vec<Box<dyn EntityRecognizer>>,
}

impl LayeredRecognizer {
    pub fn new(layers: Vec<Box<dyn EntityRecognizer>>) -> Self {
        Self { layers }
    }

    pub fn layer_names(&self) -> Vec<&'static str> {
        self.layers.iter().map(|l| l.name()).collect()
    }
}

impl EntityRecognizer for LayeredRecognizer {
    fn name(&self) -> &'static str {
        "layered"
    }

    fn recognize(&self, text: &str, tokens: &[Token]) -> Vec<EntitySpan> {
        let mut accepted: Vec<EntitySpan> = Vec::new();
        for layer in &self.layers {
            for span in layer.recognize(text, tokens) {
                let overlaps = accepted
                    .iter()
                    .any(|a| a.token_start < span.token_end && span.token_start < a.token_end);
                if !overlaps {
                    accepted.push(span);
                }
            }
        }
        accepted
    }
}
