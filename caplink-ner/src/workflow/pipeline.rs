//! Mention pipeline
//!
//! Per file: parse cues, stitch segments, recognize entities, then for each
//! kept entity resolve its time range and its knowledge-base link.
//!
//! # Error Handling
//! - Search and enrichment failures are recovered per mention (logged, no hit)
//! - A file that cannot be parsed is logged and recorded; the run continues
//!
//! # Ordering
//! Rows follow input-file order, then segment order, then entity order within
//! a segment, regardless of how many files run at once.

use super::{BatchOutcome, FileFailure, RunReport};
use crate::config::PipelineSettings;
use crate::error::{PipelineError, PipelineResult};
use crate::export::export_all;
use crate::services::authority_enricher::AuthorityEnricher;
use crate::services::caption_parser::load_vtt;
use crate::services::candidate_normalizer::CandidateNormalizer;
use crate::services::entity_linker::{AliasTableLinker, EntityLinker, NoLinker};
use crate::services::entity_recognizer::{
    EntityRecognizer, HeuristicRecognizer, LayeredRecognizer, PatternRecognizer,
};
use crate::services::fallback_resolver::FallbackResolver;
use crate::services::file_scanner::FileScanner;
use crate::services::knowledge_base::KnowledgeBase;
use crate::services::link_decision::LinkDecisionEngine;
use crate::services::segment_stitcher::SegmentStitcher;
use crate::services::span_time_resolver::resolve_span_time;
use caplink_common::{Cue, MentionRow};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Recognizer for the settings: pattern rules layered over the heuristic
pub fn build_recognizer(settings: &PipelineSettings) -> PipelineResult<Arc<dyn EntityRecognizer>> {
    match &settings.patterns {
        Some(path) => {
            let patterns = PatternRecognizer::from_jsonl(path)?;
            Ok(Arc::new(LayeredRecognizer::new(vec![
                Box::new(patterns),
                Box::new(HeuristicRecognizer::new()),
            ])))
        }
        None => Ok(Arc::new(HeuristicRecognizer::new())),
    }
}

/// Linker for the settings; [`NoLinker`] when disabled or no table is configured
pub fn build_linker(settings: &PipelineSettings) -> PipelineResult<Arc<dyn EntityLinker>> {
    if !settings.linking_enabled {
        info!("Linking disabled; using knowledge-base search only");
        return Ok(Arc::new(NoLinker));
    }
    match &settings.linker_table {
        Some(path) => Ok(Arc::new(AliasTableLinker::from_jsonl(path)?)),
        None => Ok(Arc::new(NoLinker)),
    }
}

/// Caption-to-mention pipeline over a shared knowledge base
pub struct MentionPipeline<K: KnowledgeBase + ?Sized> {
    settings: PipelineSettings,
    stitcher: SegmentStitcher,
    recognizer: Arc<dyn EntityRecognizer>,
    linker: Arc<dyn EntityLinker>,
    engine: LinkDecisionEngine,
    fallback: FallbackResolver<K>,
    enricher: Option<AuthorityEnricher<K>>,
}

impl<K: KnowledgeBase + ?Sized> MentionPipeline<K> {
    pub fn new(
        settings: PipelineSettings,
        recognizer: Arc<dyn EntityRecognizer>,
        linker: Arc<dyn EntityLinker>,
        kb: Arc<K>,
    ) -> Self {
        let normalizer =
            CandidateNormalizer::new(settings.stop_prefixes.clone(), settings.strip_es_plural);
        let fallback =
            FallbackResolver::new(Arc::clone(&kb), normalizer).with_limit(settings.search_limit);
        let enricher = settings
            .enrich_authorities
            .then(|| AuthorityEnricher::new(Arc::clone(&kb)));

        Self {
            stitcher: SegmentStitcher::new(settings.max_tokens, settings.max_seconds),
            engine: LinkDecisionEngine::new(settings.thresholds),
            settings,
            recognizer,
            linker,
            fallback,
            enricher,
        }
    }

    /// Build recognizer and linker from the settings' files
    pub fn from_settings(settings: PipelineSettings, kb: Arc<K>) -> PipelineResult<Self> {
        let recognizer = build_recognizer(&settings)?;
        let linker = build_linker(&settings)?;
        Ok(Self::new(settings, recognizer, linker, kb))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Mention rows for already-parsed cues
    pub async fn process_cues(&self, file_id: &str, cues: &[Cue]) -> Vec<MentionRow> {
        let mut rows = Vec::new();

        for segment in self.stitcher.stitch(cues) {
            let analyzed = self.recognizer.analyze(&segment.text);
            debug!(
                file = %file_id,
                start_cue = segment.start_cue_idx,
                entities = analyzed.entities.len(),
                "Analyzed segment"
            );

            for entity in &analyzed.entities {
                if !self.settings.keeps_label(&entity.label) {
                    continue;
                }

                let context = analyzed.context(entity, self.settings.context_tokens);
                let (cue_start, cue_end) =
                    resolve_span_time(entity.char_start, entity.char_end, &segment, cues);

                let candidates = self.linker.candidates(entity);
                let best = self.linker.best_identifier(entity);
                let decision = self
                    .engine
                    .decide(&entity.text, best.as_deref(), &candidates, &self.fallback)
                    .await;

                let authority_ids = match (&self.enricher, &decision.resolved_id) {
                    (Some(enricher), Some(id)) => enricher.authority_ids(id).await,
                    _ => BTreeMap::new(),
                };

                rows.push(MentionRow {
                    file_id: file_id.to_string(),
                    cue_start,
                    cue_end,
                    mention_text: entity.text.clone(),
                    label: entity.label.clone(),
                    context: context.to_string(),
                    char_start: entity.char_start,
                    char_end: entity.char_end,
                    resolved_id: decision.resolved_id,
                    resolved_label: decision.resolved_label,
                    candidates,
                    authority_ids,
                    confidence: decision.confidence,
                    needs_review: decision.needs_review,
                    note: decision.note,
                });
            }
        }

        rows
    }

    /// Parse one caption file and process its cues
    pub async fn process_file(&self, path: &Path) -> PipelineResult<Vec<MentionRow>> {
        let file_id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let cues = load_vtt(path).map_err(PipelineError::from)?;
        if cues.is_empty() {
            info!(file = %file_id, "No cues");
            return Ok(Vec::new());
        }

        let rows = self.process_cues(&file_id, &cues).await;
        info!(file = %file_id, cues = cues.len(), mentions = rows.len(), "Processed file");
        Ok(rows)
    }

    /// Process every file; failures are recorded, never fatal
    pub async fn run(&self, files: &[PathBuf]) -> RunReport {
        let concurrency = self.settings.concurrency.max(1);
        info!(files = files.len(), concurrency, "Starting run");

        let results: Vec<(PathBuf, PipelineResult<Vec<MentionRow>>)> = stream::iter(files)
            .map(|path| async move { (path.clone(), self.process_file(path).await) })
            .buffered(concurrency)
            .collect()
            .await;

        let mut report = RunReport::default();
        for (path, result) in results {
            match result {
                Ok(rows) => {
                    report.files_processed += 1;
                    report.rows.extend(rows);
                }
                Err(e) => {
                    error!(file = %path.display(), "Error processing file: {}", e);
                    report.failures.push(FileFailure {
                        path,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            files = report.files_processed,
            failed = report.failures.len(),
            mentions = report.rows.len(),
            needs_review = report.needs_review_count(),
            "Run complete"
        );
        report
    }

    /// Scan `input`, run every caption file, then write the exports
    ///
    /// Fails only on an unusable input path or unwritable outputs.
    pub async fn run_and_export(&self, input: &Path) -> PipelineResult<BatchOutcome> {
        let files = FileScanner::new().scan(input)?;
        if files.is_empty() {
            warn!(input = %input.display(), "No .vtt files found");
        }

        let report = self.run(&files).await;
        let export = export_all(&report.rows, &self.settings.out_dir)?;
        Ok(BatchOutcome { report, export })
    }
}
