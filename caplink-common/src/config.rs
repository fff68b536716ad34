//! Configuration file schema and discovery
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Per-user config file (`~/.config/caplink/config.toml` on Linux)
//! 4. Compiled defaults (no file)
//!
//! Every field carries a serde default, so a partial or empty file is valid.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CAPLINK_CONFIG";

/// Environment variable overriding the HTTP user agent
pub const USER_AGENT_ENV_VAR: &str = "CAPLINK_USER_AGENT";

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub linking: LinkingConfig,
    #[serde(default)]
    pub wikidata: WikidataConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins when set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Cue stitching budgets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_max_seconds")]
    pub max_seconds: f64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            max_seconds: default_max_seconds(),
        }
    }
}

/// Entity filtering and link decision settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkingConfig {
    /// Entity labels kept for linking
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,
    /// Tokens of context on each side of a mention
    #[serde(default = "default_context_tokens")]
    pub context_tokens: usize,
    #[serde(default = "default_accept_threshold")]
    pub accept_threshold: f64,
    /// Expected to be >= accept_threshold
    #[serde(default = "default_review_threshold")]
    pub review_threshold: f64,
    /// Leading words dropped before knowledge-base search
    #[serde(default = "default_stop_prefixes")]
    pub stop_prefixes: Vec<String>,
    /// Also search the form with a trailing "es" removed
    #[serde(default = "default_true")]
    pub strip_es_plural: bool,
    #[serde(default)]
    pub enrich_authorities: bool,
    /// Ignore the linker table even if one is configured
    #[serde(default)]
    pub disabled: bool,
    /// Optional EntityRuler-style pattern file (JSONL)
    #[serde(default)]
    pub patterns: Option<PathBuf>,
    /// Optional linker candidate table (JSONL)
    #[serde(default)]
    pub linker_table: Option<PathBuf>,
}

impl Default for LinkingConfig {
    fn default() -> Self {
        Self {
            labels: default_labels(),
            context_tokens: default_context_tokens(),
            accept_threshold: default_accept_threshold(),
            review_threshold: default_review_threshold(),
            stop_prefixes: default_stop_prefixes(),
            strip_es_plural: true,
            enrich_authorities: false,
            disabled: false,
            patterns: None,
            linker_table: None,
        }
    }
}

/// Knowledge-base HTTP client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikidataConfig {
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

impl Default for WikidataConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            search_limit: default_search_limit(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_factor: default_backoff_factor(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

/// Run output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
    /// Files processed at once; rows are still written in file order
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_tokens() -> usize {
    50
}

fn default_max_seconds() -> f64 {
    10.0
}

fn default_labels() -> Vec<String> {
    ["PERSON", "ORG", "GPE", "LOC"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_context_tokens() -> usize {
    8
}

fn default_accept_threshold() -> f64 {
    0.60
}

fn default_review_threshold() -> f64 {
    0.75
}

fn default_stop_prefixes() -> Vec<String> {
    vec!["the ".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_search_limit() -> usize {
    10
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    4
}

fn default_backoff_factor() -> f64 {
    0.6
}

fn default_requests_per_second() -> u32 {
    5
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("./out")
}

fn default_concurrency() -> usize {
    1
}

/// Standard user agent for knowledge-base requests
///
/// `CAPLINK_USER_AGENT` overrides the configured value, which overrides the
/// compiled default.
pub fn get_user_agent(configured: Option<&str>) -> String {
    if let Ok(agent) = std::env::var(USER_AGENT_ENV_VAR) {
        if !agent.trim().is_empty() {
            return agent;
        }
    }
    match configured {
        Some(agent) if !agent.trim().is_empty() => agent.to_string(),
        _ => format!(
            "caplink/{} (+mailto:ops@example.org)",
            env!("CARGO_PKG_VERSION")
        ),
    }
}

/// Resolve which config file to read, if any
///
/// An explicit path (CLI or environment) is returned even if it does not
/// exist, so that loading reports the problem. The per-user default is only
/// returned when present.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Per-user config file
    let user_config = default_config_path()?;
    if user_config.exists() {
        Some(user_config)
    } else {
        debug!("No config file at {}", user_config.display());
        None
    }
}

/// Per-user config file location for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("caplink").join("config.toml"))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    Ok(config)
}

/// Configuration plus the file it came from (`None` for compiled defaults)
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub config: TomlConfig,
    pub source: Option<PathBuf>,
}

/// Resolve and load configuration, keeping the source path for logging
/// once a subscriber is installed
pub fn load_config_with_source(cli_arg: Option<&Path>) -> Result<LoadedConfig> {
    let source = resolve_config_path(cli_arg);
    let config = match &source {
        Some(path) => load_toml_config(path)?,
        None => TomlConfig::default(),
    };
    Ok(LoadedConfig { config, source })
}

/// Resolve and load configuration, falling back to compiled defaults
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    load_config_with_source(cli_arg).map(|loaded| loaded.config)
}
