//! Services for caption entity linking

pub mod authority_enricher;
pub mod candidate_normalizer;
pub mod caption_parser;
pub mod entity_linker;
pub mod entity_recognizer;
pub mod fallback_resolver;
pub mod file_scanner;
pub mod knowledge_base;
pub mod link_decision;
pub mod segment_stitcher;
pub mod span_time_resolver;
pub mod wikidata_client;

pub use authority_enricher::{extract_authority_ids, AuthorityEnricher};
pub use candidate_normalizer::CandidateNormalizer;
pub use caption_parser::{load_vtt, parse_vtt, CaptionError};
pub use entity_linker::{AliasTableLinker, EntityLinker, NoLinker};
pub use entity_recognizer::{
    AnalyzedText, EntityRecognizer, EntitySpan, HeuristicRecognizer, LayeredRecognizer,
    PatternRecognizer, Token,
};
pub use fallback_resolver::{FallbackOutcome, FallbackResolver};
pub use file_scanner::FileScanner;
pub use knowledge_base::{EntityRecord, KbError, KnowledgeBase, SearchHit};
pub use link_decision::{LinkDecision, LinkDecisionEngine, LinkThresholds};
pub use segment_stitcher::{stitch, SegmentStitcher};
pub use span_time_resolver::{resolve_span, resolve_span_time};
pub use wikidata_client::WikidataClient;
