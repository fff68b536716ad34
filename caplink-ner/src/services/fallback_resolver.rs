//! Fallback resolver
//!
//! Free-text knowledge-base search over normalized mention variants, used
//! when the linker has nothing to offer.
//!
//! For each variant in order, the first one with any hits decides:
//! - a hit whose label equals the variant (ignoring case) scores 0.85
//! - otherwise the top-ranked hit scores 0.65

use super::candidate_normalizer::CandidateNormalizer;
use super::knowledge_base::KnowledgeBase;
use std::sync::Arc;
use tracing::{debug, warn};

/// Score for a hit whose label matches the searched variant
pub const EXACT_MATCH_SCORE: f64 = 0.85;

/// Score for the top-ranked hit when no label matches
pub const TOP_HIT_SCORE: f64 = 0.65;

pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Resolved fallback identity
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackHit {
    pub id: String,
    pub label: Option<String>,
    pub score: f64,
}

/// Fallback result plus the variants that were searched
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FallbackOutcome {
    pub hit: Option<FallbackHit>,
    pub tried: Vec<String>,
}

/// Search-based resolver over a shared knowledge-base client
pub struct FallbackResolver<K: KnowledgeBase + ?Sized> {
    kb: Arc<K>,
    normalizer: CandidateNormalizer,
    limit: usize,
}

impl<K: KnowledgeBase + ?Sized> FallbackResolver<K> {
    pub fn new(kb: Arc<K>, normalizer: CandidateNormalizer) -> Self {
        Self {
            kb,
            normalizer,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn knowledge_base(&self) -> &Arc<K> {
        &self.kb
    }

    /// Resolve `text` by searching its variants in order
    ///
    /// Search failures are logged and treated as zero hits.
    pub async fn resolve(&self, text: &str) -> FallbackOutcome {
        let variants = self.normalizer.normalize(text);
        let mut tried = Vec::with_capacity(variants.len());

        for variant in variants {
            let hits = match self.kb.search(&variant, self.limit).await {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(query = %variant, "Knowledge-base search failed: {}", e);
                    Vec::new()
                }
            };
            tried.push(variant.clone());

            if hits.is_empty() {
                debug!(query = %variant, "No hits");
                continue;
            }

            let wanted = variant.trim().to_lowercase();
            let exact = hits.iter().find(|hit| {
                hit.label
                    .as_deref()
                    .map(|label| label.trim().to_lowercase() == wanted)
                    .unwrap_or(false)
            });

            let (chosen, score) = match exact {
                Some(hit) => (hit, EXACT_MATCH_SCORE),
                None => (&hits[0], TOP_HIT_SCORE),
            };
            debug!(query = %variant, id = %chosen.id, score, "Fallback hit");

            return FallbackOutcome {
                hit: Some(FallbackHit {
                    id: chosen.id.clone(),
                    label: chosen.label.clone(),
                    score,
                }),
                tried,
            };
        }

        warn!(mention = %text, tried = ?tried, "No knowledge-base hits for any variant");
        FallbackOutcome { hit: None, tried }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::knowledge_base::{EntityRecord, KbError, SearchHit};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedKb {
        results: HashMap<String, Vec<SearchHit>>,
        failing: Vec<String>,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl KnowledgeBase for ScriptedKb {
        async fn search(&self, query: &str, _limit: usize) -> Result<Vec<SearchHit>, KbError> {
            self.queries.lock().unwrap().push(query.to_string());
            if self.failing.iter().any(|q| q == query) {
                return Err(KbError::Network("connection reset".into()));
            }
            Ok(self.results.get(query).cloned().unwrap_or_default())
        }

        async fn fetch_entity(&self, id: &str) -> Result<EntityRecord, KbError> {
            Err(KbError::EntityMissing(id.to_string()))
        }
    }

    fn resolver(kb: ScriptedKb) -> FallbackResolver<ScriptedKb> {
        FallbackResolver::new(Arc::new(kb), CandidateNormalizer::default())
    }

    #[tokio::test]
    async fn test_exact_label_match_scores_high() {
        let mut kb = ScriptedKb::default();
        kb.results.insert(
            "Oxford".into(),
            vec![
                SearchHit::new("Q1", "Oxford University Press"),
                SearchHit::new("Q34217", "oxford"),
            ],
        );

        let outcome = resolver(kb).resolve("Oxford").await;
        let hit = outcome.hit.unwrap();
        assert_eq!(hit.id, "Q34217");
        assert_eq!(hit.score, EXACT_MATCH_SCORE);
    }

    #[tokio::test]
    async fn test_top_hit_when_no_label_matches() {
        let mut kb = ScriptedKb::default();
        kb.results.insert(
            "Somerville".into(),
            vec![SearchHit::new("Q7", "Somerville College"), SearchHit::new("Q8", "Somerville, MA")],
        );

        let outcome = resolver(kb).resolve("Somerville").await;
        let hit = outcome.hit.unwrap();
        assert_eq!(hit.id, "Q7");
        assert_eq!(hit.score, TOP_HIT_SCORE);
    }

    #[tokio::test]
    async fn test_stops_at_first_variant_with_hits() {
        let mut kb = ScriptedKb::default();
        kb.results.insert("Pankhurst".into(), vec![SearchHit::new("Q2", "Pankhurst")]);

        let r = resolver(kb);
        let outcome = r.resolve("Pankhursts").await;
        assert_eq!(outcome.tried, vec!["Pankhursts", "Pankhurst"]);
        assert_eq!(outcome.hit.unwrap().score, EXACT_MATCH_SCORE);
    }

    #[tokio::test]
    async fn test_all_variants_tried_when_nothing_found() {
        let r = resolver(ScriptedKb::default());
        let outcome = r.resolve("Universities").await;
        assert!(outcome.hit.is_none());
        assert_eq!(outcome.tried, vec!["Universities", "Universitie", "Universiti"]);
        assert_eq!(r.knowledge_base().queries.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_search_error_counts_as_no_hits() {
        let mut kb = ScriptedKb::default();
        kb.failing.push("Pankhursts".into());
        kb.results.insert("Pankhurst".into(), vec![SearchHit::new("Q2", "Emmeline Pankhurst")]);

        let outcome = resolver(kb).resolve("Pankhursts").await;
        let hit = outcome.hit.unwrap();
        assert_eq!(hit.id, "Q2");
        assert_eq!(hit.score, TOP_HIT_SCORE);
    }

    #[tokio::test]
    async fn test_empty_mention_searches_nothing() {
        let r = resolver(ScriptedKb::default());
        let outcome = r.resolve("...").await;
        assert_eq!(outcome, FallbackOutcome::default());
        assert!(r.knowledge_base().queries.lock().unwrap().is_empty());
    }
}
