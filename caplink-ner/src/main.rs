//! caplink-ner - caption entity linker
//!
//! Reads WebVTT captions, finds named entities, links them to Wikidata and
//! writes `entities.jsonl`, `entities.csv` and `entities_needs_review.csv`.
//!
//! Exits non-zero only when the input path is unusable, settings are
//! invalid, or outputs cannot be written. Files that fail to parse are
//! logged and skipped.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use caplink_common::config::{load_config_with_source, LoggingConfig};
use caplink_ner::services::WikidataClient;
use caplink_ner::{BatchOutcome, CliOverrides, MentionPipeline, PipelineSettings};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for caplink-ner
#[derive(Parser, Debug)]
#[command(name = "caplink-ner")]
#[command(about = "Extract and link named entities from WebVTT captions")]
#[command(version)]
struct Args {
    /// A .vtt file or a directory searched recursively for .vtt files
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory (created if missing)
    #[arg(short, long, env = "CAPLINK_OUT_DIR")]
    out_dir: Option<PathBuf>,

    /// Config file (default: CAPLINK_CONFIG, then ~/.config/caplink/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Entity pattern rules, JSONL
    #[arg(long)]
    patterns: Option<PathBuf>,

    /// Linker candidate table, JSONL
    #[arg(long)]
    linker_table: Option<PathBuf>,

    /// Comma-separated entity labels to keep
    #[arg(long)]
    labels: Option<String>,

    /// Context tokens on each side of a mention
    #[arg(long)]
    context_tokens: Option<usize>,

    /// Accept a link at or above this confidence
    #[arg(long)]
    accept_threshold: Option<f64>,

    /// Flag accepted links below this confidence for review
    #[arg(long)]
    review_threshold: Option<f64>,

    /// Max seconds per stitched segment
    #[arg(long = "max-seconds-per-seg")]
    max_seconds: Option<f64>,

    /// Max whitespace tokens per stitched segment
    #[arg(long = "max-tokens-per-seg")]
    max_tokens: Option<usize>,

    /// Fetch VIAF/LCNAF/ORCID/TGN ids and Wikipedia/Wikidata URLs for accepted links
    #[arg(long)]
    enrich_authorities: bool,

    /// Ignore the linker table; resolve by knowledge-base search only
    #[arg(long)]
    no_linking: bool,

    /// Files processed at once
    #[arg(long)]
    concurrency: Option<usize>,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            out_dir: self.out_dir.clone(),
            patterns: self.patterns.clone(),
            linker_table: self.linker_table.clone(),
            labels: self.labels.clone().map(|l| vec![l]),
            context_tokens: self.context_tokens,
            accept_threshold: self.accept_threshold,
            review_threshold: self.review_threshold,
            max_seconds: self.max_seconds,
            max_tokens: self.max_tokens,
            concurrency: self.concurrency,
            enrich_authorities: self.enrich_authorities,
            no_linking: self.no_linking,
        }
    }
}

/// Stderr logging, or a log file when configured; `RUST_LOG` wins over the level
fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("caplink_ner={0},caplink_common={0}", config.level)));

    let (stderr_layer, file_layer) = match &config.file {
        Some(path) => {
            let file = open_log_file(path)?;
            (None, Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))))
        }
        None => (Some(fmt::layer().with_writer(std::io::stderr)), None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loaded = load_config_with_source(args.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&loaded.config.logging)?;

    info!("Starting caplink-ner {}", env!("CARGO_PKG_VERSION"));
    match &loaded.source {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => info!("No config file found; using built-in defaults"),
    }
    let config = loaded.config;

    let settings = PipelineSettings::resolve(&config, &args.overrides())
        .context("Invalid settings")?;

    let kb = Arc::new(WikidataClient::new(&config.wikidata).context("Failed to build Wikidata client")?);
    let pipeline = MentionPipeline::from_settings(settings, kb)
        .context("Failed to initialize pipeline")?;

    let BatchOutcome { report, export } = pipeline
        .run_and_export(&args.input)
        .await
        .context("Batch run failed")?;

    info!(
        "Wrote {} mentions to {} and {}",
        export.rows,
        export.jsonl_path.display(),
        export.csv_path.display()
    );
    info!(
        "Wrote {} mentions needing review to {}",
        export.needs_review,
        export.review_csv_path.display()
    );
    if !report.failures.is_empty() {
        warn!("{} file(s) failed; see errors above", report.failures.len());
    }

    Ok(())
}
