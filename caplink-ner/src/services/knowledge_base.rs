//! Knowledge-base capability
//!
//! Search and entity fetch behind one async trait, so the fallback resolver
//! and authority enrichment can share a client and tests can swap in a fake.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use thiserror::Error;

/// Knowledge-base client errors
#[derive(Debug, Error)]
pub enum KbError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Entity not found: {0}")]
    EntityMissing(String),
}

/// One search result
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchHit {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl SearchHit {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: Some(label.into()),
            description: None,
        }
    }
}

/// Claim statement; only the main snak is read
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Statement {
    pub mainsnak: Snak,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Snak {
    #[serde(default)]
    pub datavalue: Option<DataValue>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DataValue {
    pub value: serde_json::Value,
}

impl Statement {
    /// String or number value of the main snak
    ///
    /// Item-valued and other structured snaks yield `None`.
    pub fn scalar_value(&self) -> Option<String> {
        match &self.mainsnak.datavalue.as_ref()?.value {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Sitelink {
    pub title: String,
}

/// Entity claims and sitelinks
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EntityRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "map_or_empty_array")]
    pub claims: HashMap<String, Vec<Statement>>,
    #[serde(default, deserialize_with = "map_or_empty_array")]
    pub sitelinks: HashMap<String, Sitelink>,
}

/// Entities without claims or sitelinks encode them as `[]`
fn map_or_empty_array<'de, D, V>(deserializer: D) -> Result<HashMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MapOrList<V> {
        Map(HashMap<String, V>),
        List(serde::de::IgnoredAny),
    }

    Ok(match MapOrList::<V>::deserialize(deserializer)? {
        MapOrList::Map(map) => map,
        MapOrList::List(_) => HashMap::new(),
    })
}

/// Free-text search plus entity fetch
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Ranked hits for `query`, at most `limit`
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, KbError>;

    /// Claims and sitelinks for `id`
    async fn fetch_entity(&self, id: &str) -> Result<EntityRecord, KbError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_record_accepts_empty_arrays() {
        let record: EntityRecord =
            serde_json::from_str(r#"{"id": "Q1", "claims": [], "sitelinks": []}"#).unwrap();
        assert!(record.claims.is_empty());
        assert!(record.sitelinks.is_empty());
    }

    #[test]
    fn test_entity_record_reads_claims() {
        let record: EntityRecord = serde_json::from_str(
            r#"{
                "claims": {
                    "P214": [{"mainsnak": {"datavalue": {"value": "12345"}}}],
                    "P31": [{"mainsnak": {"datavalue": {"value": {"id": "Q5"}}}}],
                    "P1667": [{"mainsnak": {"snaktype": "novalue"}}]
                },
                "sitelinks": {"enwiki": {"site": "enwiki", "title": "Eleanor Rathbone"}}
            }"#,
        )
        .unwrap();

        assert_eq!(record.claims["P214"][0].scalar_value().as_deref(), Some("12345"));
        assert_eq!(record.claims["P31"][0].scalar_value(), None);
        assert_eq!(record.claims["P1667"][0].scalar_value(), None);
        assert_eq!(record.sitelinks["enwiki"].title, "Eleanor Rathbone");
    }

    #[test]
    fn test_search_hit_label_optional() {
        let hit: SearchHit = serde_json::from_str(r#"{"id": "Q42"}"#).unwrap();
        assert_eq!(hit.label, None);
    }
}
