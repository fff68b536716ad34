//! Link decision engine
//!
//! Picks one identity per mention and decides whether to keep it and whether
//! a person should look at it.
//!
//! Resolution order:
//! 1. Linker top-pick identifier: accepted at 0.70, never flagged
//! 2. First linker candidate: its numeric score, else an alias proxy
//!    (0.75 when the mention equals an alias, 0.55 otherwise)
//! 3. Knowledge-base fallback search
//!
//! Steps 2 and 3 go through two-threshold gating:
//!
//! | Outcome                                       | Resolved | needs_review |
//! |-----------------------------------------------|----------|--------------|
//! | id and (no confidence or >= review)           | yes      | no           |
//! | id and accept <= confidence < review          | yes      | yes          |
//! | no id, or confidence < accept                 | no       | yes          |

use super::fallback_resolver::FallbackResolver;
use super::knowledge_base::KnowledgeBase;
use caplink_common::Candidate;
use tracing::warn;

/// Confidence given to a direct linker top-pick
pub const TOP_PICK_CONFIDENCE: f64 = 0.70;

/// Proxy when the mention equals one of the first candidate's aliases
pub const ALIAS_MATCH_CONFIDENCE: f64 = 0.75;

/// Proxy for an unscored candidate without an alias match
pub const UNMATCHED_CONFIDENCE: f64 = 0.55;

pub const NOTE_BELOW_REVIEW: &str = "Accepted below review threshold";
pub const NOTE_AMBIGUOUS: &str = "Ambiguous or below accept threshold";

/// Accept/review cutoffs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkThresholds {
    pub accept: f64,
    /// Expected to be >= `accept`
    pub review: f64,
}

impl Default for LinkThresholds {
    fn default() -> Self {
        Self {
            accept: 0.60,
            review: 0.75,
        }
    }
}

impl LinkThresholds {
    pub fn new(accept: f64, review: f64) -> Self {
        if review < accept {
            warn!(
                accept,
                review, "Review threshold below accept threshold: accepted links are never flagged"
            );
        }
        Self { accept, review }
    }
}

/// Where a link choice came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSource {
    LinkerTopPick,
    LinkerCandidate,
    Fallback,
}

/// A proposed identity before gating
#[derive(Debug, Clone, PartialEq)]
pub struct LinkChoice {
    pub id: Option<String>,
    pub label: Option<String>,
    pub confidence: Option<f64>,
    pub source: LinkSource,
}

/// Final per-mention link outcome
#[derive(Debug, Clone, PartialEq)]
pub struct LinkDecision {
    pub resolved_id: Option<String>,
    pub resolved_label: Option<String>,
    pub confidence: Option<f64>,
    pub needs_review: bool,
    pub note: String,
    pub source: LinkSource,
    /// Fallback variants searched, if the fallback ran
    pub searched: Vec<String>,
}

impl LinkDecision {
    pub fn is_accepted(&self) -> bool {
        self.resolved_id.is_some()
    }
}

/// Choice from the linker alone (steps 1 and 2), `None` if it offers nothing
pub fn choose_primary(
    mention: &str,
    best_identifier: Option<&str>,
    candidates: &[Candidate],
) -> Option<LinkChoice> {
    if let Some(id) = best_identifier.map(str::trim).filter(|id| !id.is_empty()) {
        return Some(LinkChoice {
            id: Some(id.to_string()),
            label: None,
            confidence: Some(TOP_PICK_CONFIDENCE),
            source: LinkSource::LinkerTopPick,
        });
    }

    let first = candidates.first()?;
    let confidence = match first.score {
        Some(score) => score,
        None if first.has_alias(mention) => ALIAS_MATCH_CONFIDENCE,
        None => UNMATCHED_CONFIDENCE,
    };

    Some(LinkChoice {
        id: first.id.clone().filter(|id| !id.is_empty()),
        label: first.label.clone().filter(|label| !label.is_empty()),
        confidence: Some(confidence),
        source: LinkSource::LinkerCandidate,
    })
}

/// Threshold gating over a link choice
#[derive(Debug, Clone, Default)]
pub struct LinkDecisionEngine {
    thresholds: LinkThresholds,
}

impl LinkDecisionEngine {
    pub fn new(thresholds: LinkThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> LinkThresholds {
        self.thresholds
    }

    /// Apply accept/review gating; top-picks pass through accepted and unflagged
    pub fn gate(&self, choice: LinkChoice) -> LinkDecision {
        let LinkChoice {
            id,
            label,
            confidence,
            source,
        } = choice;

        if source == LinkSource::LinkerTopPick && id.is_some() {
            return LinkDecision {
                resolved_id: id,
                resolved_label: label,
                confidence,
                needs_review: false,
                note: String::new(),
                source,
                searched: Vec::new(),
            };
        }

        let meets_accept = confidence.map_or(true, |c| c >= self.thresholds.accept);
        if id.is_some() && meets_accept {
            let below_review = confidence.map_or(false, |c| c < self.thresholds.review);
            LinkDecision {
                resolved_id: id,
                resolved_label: label,
                confidence,
                needs_review: below_review,
                note: if below_review {
                    NOTE_BELOW_REVIEW.to_string()
                } else {
                    String::new()
                },
                source,
                searched: Vec::new(),
            }
        } else {
            LinkDecision {
                resolved_id: None,
                resolved_label: None,
                confidence,
                needs_review: true,
                note: NOTE_AMBIGUOUS.to_string(),
                source,
                searched: Vec::new(),
            }
        }
    }

    /// Resolve one mention: linker first, then fallback search, then gating
    pub async fn decide<K: KnowledgeBase + ?Sized>(
        &self,
        mention: &str,
        best_identifier: Option<&str>,
        candidates: &[Candidate],
        fallback: &FallbackResolver<K>,
    ) -> LinkDecision {
        if let Some(choice) = choose_primary(mention, best_identifier, candidates) {
            return self.gate(choice);
        }

        let outcome = fallback.resolve(mention).await;
        let choice = match outcome.hit {
            Some(hit) => LinkChoice {
                id: Some(hit.id),
                label: hit.label,
                confidence: Some(hit.score),
                source: LinkSource::Fallback,
            },
            None => LinkChoice {
                id: None,
                label: None,
                confidence: None,
                source: LinkSource::Fallback,
            },
        };

        let mut decision = self.gate(choice);
        decision.searched = outcome.tried;
        decision
    }
}
