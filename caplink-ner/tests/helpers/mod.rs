//! Shared test helpers
//!
//! - [`FakeKnowledgeBase`]: scripted in-memory search and entity fetch
//! - [`http_stub`]: scripted local HTTP server for client retry tests
//! - [`log_capture`]: tracing capture for asserting on diagnostics
//! - caption file writers

#![allow(dead_code)]

pub mod http_stub;
pub mod log_capture;

use async_trait::async_trait;
use caplink_ner::services::knowledge_base::{EntityRecord, KbError, KnowledgeBase, SearchHit};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// In-memory knowledge base; unknown queries return no hits
#[derive(Default)]
pub struct FakeKnowledgeBase {
    search_results: HashMap<String, Vec<SearchHit>>,
    entities: HashMap<String, EntityRecord>,
    failing_fetches: Vec<String>,
    searches: Mutex<Vec<String>>,
    fetches: Mutex<Vec<String>>,
}

impl FakeKnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hits returned for an exact query string
    pub fn with_hits(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.search_results.insert(query.to_string(), hits);
        self
    }

    /// Entity JSON (`claims`/`sitelinks` object) returned by fetch
    pub fn with_entity(mut self, id: &str, json: &str) -> Self {
        let record: EntityRecord = serde_json::from_str(json).expect("valid entity json");
        self.entities.insert(id.to_string(), record);
        self
    }

    /// Fetching this id fails with a network error
    pub fn with_failing_fetch(mut self, id: &str) -> Self {
        self.failing_fetches.push(id.to_string());
        self
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl KnowledgeBase for FakeKnowledgeBase {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, KbError> {
        self.searches.lock().unwrap().push(query.to_string());
        let mut hits = self.search_results.get(query).cloned().unwrap_or_default();
        hits.truncate(limit);
        Ok(hits)
    }

    async fn fetch_entity(&self, id: &str) -> Result<EntityRecord, KbError> {
        self.fetches.lock().unwrap().push(id.to_string());
        if self.failing_fetches.iter().any(|f| f == id) {
            return Err(KbError::Network("connection reset by peer".to_string()));
        }
        self.entities
            .get(id)
            .cloned()
            .ok_or_else(|| KbError::EntityMissing(id.to_string()))
    }
}

/// WebVTT text for `(start, end, text)` cues
pub fn vtt(cues: &[(&str, &str, &str)]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for (i, (start, end, text)) in cues.iter().enumerate() {
        out.push_str(&format!("{}\n{} --> {}\n{}\n\n", i + 1, start, end, text));
    }
    out
}

/// Write a caption file into `dir`
pub fn write_vtt(dir: &Path, name: &str, cues: &[(&str, &str, &str)]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, vtt(cues)).expect("write vtt");
    path
}

/// Write arbitrary text into `dir`
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write file");
    path
}
