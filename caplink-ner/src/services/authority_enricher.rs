//! Authority identifier enrichment
//!
//! Pulls library and archive cross-references out of a resolved entity.

use super::knowledge_base::{EntityRecord, KnowledgeBase};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Property id → output key
pub const AUTHORITY_PROPERTIES: &[(&str, &str)] = &[
    ("P214", "viaf"),
    ("P244", "lcnaf"),
    ("P496", "orcid"),
    ("P1667", "tgn"),
];

/// Authority ids, English Wikipedia link and entity URL for `id`
pub fn extract_authority_ids(id: &str, record: &EntityRecord) -> BTreeMap<String, String> {
    let mut ids = BTreeMap::new();

    for (property, key) in AUTHORITY_PROPERTIES {
        let value = record
            .claims
            .get(*property)
            .and_then(|statements| statements.iter().find_map(|s| s.scalar_value()));
        if let Some(value) = value {
            ids.insert(key.to_string(), value);
        }
    }

    if let Some(enwiki) = record.sitelinks.get("enwiki") {
        ids.insert(
            "wikipedia_en".to_string(),
            format!("https://en.wikipedia.org/wiki/{}", enwiki.title.replace(' ', "_")),
        );
    }

    ids.insert(
        "wikidata_url".to_string(),
        format!("https://www.wikidata.org/wiki/{}", id),
    );
    ids
}

/// Fetches and extracts authority ids, never failing
pub struct AuthorityEnricher<K: KnowledgeBase + ?Sized> {
    kb: Arc<K>,
}

impl<K: KnowledgeBase + ?Sized> AuthorityEnricher<K> {
    pub fn new(kb: Arc<K>) -> Self {
        Self { kb }
    }

    /// Empty map on any fetch failure
    pub async fn authority_ids(&self, id: &str) -> BTreeMap<String, String> {
        match self.kb.fetch_entity(id).await {
            Ok(record) => extract_authority_ids(id, &record),
            Err(e) => {
                warn!(id = %id, "Authority lookup failed: {}", e);
                BTreeMap::new()
            }
        }
    }
}
