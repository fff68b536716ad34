//! Entity linker capability
//!
//! Linking components expose candidates under shifting field names. Everything
//! that reads raw linker output goes through [`candidate_from_raw`] and
//! [`best_identifier_from_raw`], so the decision engine only ever sees
//! [`Candidate`] values.

use crate::services::entity_recognizer::EntitySpan;
use caplink_common::Candidate;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Linker table load errors
#[derive(Debug, Error)]
pub enum LinkerError {
    #[error("Cannot read linker table {0}: {1}")]
    Io(String, std::io::Error),

    #[error("Invalid linker record on line {line}: {message}")]
    InvalidRecord { line: usize, message: String },
}

/// Linker capability over a recognized span
pub trait EntityLinker: Send + Sync {
    /// Direct top-pick identifier, independent of the candidate list
    fn best_identifier(&self, span: &EntitySpan) -> Option<String>;

    /// Ranked candidates, best first
    fn candidates(&self, span: &EntitySpan) -> Vec<Candidate>;
}

/// Linking disabled or unavailable
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLinker;

impl EntityLinker for NoLinker {
    fn best_identifier(&self, _span: &EntitySpan) -> Option<String> {
        None
    }

    fn candidates(&self, _span: &EntitySpan) -> Vec<Candidate> {
        Vec::new()
    }
}

const ID_KEYS: &[&str] = &["entity_id", "kb_id", "id", "qid"];
const LABEL_KEYS: &[&str] = &["label", "title"];
const ALIAS_KEYS: &[&str] = &["aliases", "alias"];
const BEST_ID_KEYS: &[&str] = &["kb_qid", "kb_id_", "kb_id"];

/// First non-empty string (or number) under one of `keys`, in order
fn first_text(record: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match record.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Normalize one raw candidate record
///
/// Fall-through order: id from `entity_id`, `kb_id`, `id`, `qid`; label from
/// `label`, `title`; score only when numeric; aliases from `aliases`, `alias`
/// (array or single string).
pub fn candidate_from_raw(record: &Value) -> Candidate {
    let aliases = ALIAS_KEYS
        .iter()
        .find_map(|key| match record.get(*key)? {
            Value::Array(items) => Some(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            ),
            Value::String(s) => Some(vec![s.clone()]),
            _ => None,
        })
        .unwrap_or_default();

    Candidate {
        id: first_text(record, ID_KEYS),
        label: first_text(record, LABEL_KEYS),
        score: record.get("score").and_then(Value::as_f64),
        aliases,
    }
}

/// Direct best identifier from `kb_qid`, `kb_id_`, `kb_id`
pub fn best_identifier_from_raw(record: &Value) -> Option<String> {
    first_text(record, BEST_ID_KEYS)
}

/// Stable sort by score, highest first, unscored last
pub fn rank_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| match (a.score, b.score) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

#[derive(Debug, Default, Clone)]
struct TableEntry {
    best_identifier: Option<String>,
    candidates: Vec<Candidate>,
}

/// Offline linker backed by a JSONL alias table
///
/// Each line is a JSON object of any of the shapes [`candidate_from_raw`]
/// accepts, plus an optional `mention` key. A record matches a mention whose
/// trimmed text equals `mention`, the label, or any alias, ignoring case.
#[derive(Debug, Default, Clone)]
pub struct AliasTableLinker {
    by_surface: HashMap<String, TableEntry>,
    records: usize,
}

impl AliasTableLinker {
    pub fn from_jsonl_str(content: &str) -> Result<Self, LinkerError> {
        let mut linker = Self::default();

        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record: Value =
                serde_json::from_str(line).map_err(|e| LinkerError::InvalidRecord {
                    line: idx + 1,
                    message: e.to_string(),
                })?;
            if !record.is_object() {
                return Err(LinkerError::InvalidRecord {
                    line: idx + 1,
                    message: "expected a JSON object".to_string(),
                });
            }
            linker.insert(&record);
        }

        for entry in linker.by_surface.values_mut() {
            rank_candidates(&mut entry.candidates);
        }
        Ok(linker)
    }

    pub fn from_jsonl(path: &Path) -> Result<Self, LinkerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LinkerError::Io(path.display().to_string(), e))?;
        let linker = Self::from_jsonl_str(&content)?;
        tracing::info!(
            records = linker.records,
            surfaces = linker.by_surface.len(),
            "Loaded linker table from {}",
            path.display()
        );
        Ok(linker)
    }

    /// Number of records loaded
    pub fn len(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    fn insert(&mut self, record: &Value) {
        let candidate = candidate_from_raw(record);
        let best = best_identifier_from_raw(record);

        let mut surfaces: Vec<String> = Vec::new();
        if let Some(mention) = record.get("mention").and_then(Value::as_str) {
            surfaces.push(surface_key(mention));
        }
        if let Some(label) = &candidate.label {
            surfaces.push(surface_key(label));
        }
        surfaces.extend(candidate.aliases.iter().map(|a| surface_key(a)));
        surfaces.retain(|s| !s.is_empty());
        surfaces.sort();
        surfaces.dedup();

        for surface in surfaces {
            let entry = self.by_surface.entry(surface).or_default();
            if entry.best_identifier.is_none() {
                entry.best_identifier = best.clone();
            }
            entry.candidates.push(candidate.clone());
        }
        self.records += 1;
    }

    fn lookup(&self, span: &EntitySpan) -> Option<&TableEntry> {
        self.by_surface.get(&surface_key(&span.text))
    }
}

fn surface_key(text: &str) -> String {
    text.trim().to_lowercase()
}

impl EntityLinker for AliasTableLinker {
    fn best_identifier(&self, span: &EntitySpan) -> Option<String> {
        self.lookup(span).and_then(|e| e.best_identifier.clone())
    }

    fn candidates(&self, span: &EntitySpan) -> Vec<Candidate> {
        self.lookup(span)
            .map(|e| e.candidates.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn span(text: &str) -> EntitySpan {
        EntitySpan {
            text: text.to_string(),
            label: "PERSON".to_string(),
            char_start: 0,
            char_end: text.chars().count(),
            token_start: 0,
            token_end: 1,
        }
    }

    #[test]
    fn test_candidate_id_fallthrough_order() {
        let c = candidate_from_raw(&json!({"kb_id": "Q2", "id": "Q3", "qid": "Q4"}));
        assert_eq!(c.id.as_deref(), Some("Q2"));

        let c = candidate_from_raw(&json!({"entity_id": "Q1", "kb_id": "Q2"}));
        assert_eq!(c.id.as_deref(), Some("Q1"));

        let c = candidate_from_raw(&json!({"qid": "Q4"}));
        assert_eq!(c.id.as_deref(), Some("Q4"));

        let c = candidate_from_raw(&json!({"entity_id": "", "id": "Q3"}));
        assert_eq!(c.id.as_deref(), Some("Q3"));
    }

    #[test]
    fn test_candidate_label_score_and_aliases() {
        let c = candidate_from_raw(&json!({
            "id": "Q8016",
            "title": "Winston Churchill",
            "score": "0.9",
            "alias": "Winnie"
        }));
        assert_eq!(c.label.as_deref(), Some("Winston Churchill"));
        assert_eq!(c.score, None);
        assert_eq!(c.aliases, vec!["Winnie"]);

        let c = candidate_from_raw(&json!({
            "label": "Oxford",
            "score": 0.81,
            "aliases": ["City of Oxford", 7, "Oxon"]
        }));
        assert_eq!(c.score, Some(0.81));
        assert_eq!(c.aliases, vec!["City of Oxford", "Oxon"]);
    }

    #[test]
    fn test_best_identifier_fallthrough() {
        assert_eq!(
            best_identifier_from_raw(&json!({"kb_id_": "Q9", "kb_id": "Q10"})).as_deref(),
            Some("Q9")
        );
        assert_eq!(
            best_identifier_from_raw(&json!({"kb_qid": "Q8", "kb_id": "Q10"})).as_deref(),
            Some("Q8")
        );
        assert_eq!(best_identifier_from_raw(&json!({"id": "Q1"})), None);
    }

    #[test]
    fn test_rank_candidates_unscored_last_and_stable() {
        let mut list = vec![
            Candidate { id: Some("a".into()), ..Default::default() },
            Candidate { id: Some("b".into()), score: Some(0.4), ..Default::default() },
            Candidate { id: Some("c".into()), ..Default::default() },
            Candidate { id: Some("d".into()), score: Some(0.9), ..Default::default() },
        ];
        rank_candidates(&mut list);
        let order: Vec<&str> = list.iter().filter_map(|c| c.id.as_deref()).collect();
        assert_eq!(order, vec!["d", "b", "a", "c"]);
    }

    #[test]
    fn test_alias_table_matches_mention_label_and_alias() {
        let linker = AliasTableLinker::from_jsonl_str(
            r#"{"mention": "Rathbone", "id": "Q470871", "label": "Eleanor Rathbone", "aliases": ["Miss Rathbone"], "score": 0.7}
{"id": "Q34217", "label": "Oxford", "kb_qid": "Q34217"}
{"id": "Q1000", "label": "Oxford", "score": 0.9}
"#,
        )
        .unwrap();
        assert_eq!(linker.len(), 3);

        let by_mention = linker.candidates(&span("rathbone"));
        assert_eq!(by_mention[0].id.as_deref(), Some("Q470871"));
        assert_eq!(linker.candidates(&span("Miss Rathbone")).len(), 1);
        assert_eq!(linker.candidates(&span(" Eleanor Rathbone ")).len(), 1);
        assert_eq!(linker.best_identifier(&span("Rathbone")), None);

        let oxford = linker.candidates(&span("OXFORD"));
        let ids: Vec<&str> = oxford.iter().filter_map(|c| c.id.as_deref()).collect();
        assert_eq!(ids, vec!["Q1000", "Q34217"]);
        assert_eq!(linker.best_identifier(&span("Oxford")).as_deref(), Some("Q34217"));

        assert!(linker.candidates(&span("Cambridge")).is_empty());
    }

    #[test]
    fn test_alias_table_rejects_non_object_lines() {
        let err = AliasTableLinker::from_jsonl_str("[1, 2]").unwrap_err();
        assert!(matches!(err, LinkerError::InvalidRecord { line: 1, .. }));
    }

    #[test]
    fn test_no_linker_is_empty() {
        assert_eq!(NoLinker.best_identifier(&span("Oxford")), None);
        assert!(NoLinker.candidates(&span("Oxford")).is_empty());
    }
}
