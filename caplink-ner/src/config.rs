//! Effective run settings
//!
//! Each field resolves as: command-line flag, then TOML file, then the
//! compiled default carried by [`TomlConfig`].

use crate::error::{PipelineError, PipelineResult};
use crate::services::link_decision::LinkThresholds;
use caplink_common::config::TomlConfig;
use std::path::PathBuf;

/// Values given on the command line; `None` defers to the config file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub out_dir: Option<PathBuf>,
    pub patterns: Option<PathBuf>,
    pub linker_table: Option<PathBuf>,
    pub labels: Option<Vec<String>>,
    pub context_tokens: Option<usize>,
    pub accept_threshold: Option<f64>,
    pub review_threshold: Option<f64>,
    pub max_seconds: Option<f64>,
    pub max_tokens: Option<usize>,
    pub concurrency: Option<usize>,
    /// Flag: only ever turns enrichment on
    pub enrich_authorities: bool,
    /// Flag: only ever turns linking off
    pub no_linking: bool,
}

/// Resolved settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub max_tokens: usize,
    pub max_seconds: f64,
    /// Entity labels kept, uppercase
    pub labels: Vec<String>,
    pub context_tokens: usize,
    pub thresholds: LinkThresholds,
    pub stop_prefixes: Vec<String>,
    pub strip_es_plural: bool,
    pub enrich_authorities: bool,
    pub linking_enabled: bool,
    pub patterns: Option<PathBuf>,
    pub linker_table: Option<PathBuf>,
    pub search_limit: usize,
    pub out_dir: PathBuf,
    pub concurrency: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_toml(&TomlConfig::default())
    }
}

impl PipelineSettings {
    /// Settings from a config file alone
    pub fn from_toml(config: &TomlConfig) -> Self {
        Self {
            max_tokens: config.segmentation.max_tokens,
            max_seconds: config.segmentation.max_seconds,
            labels: normalize_labels(&config.linking.labels),
            context_tokens: config.linking.context_tokens,
            thresholds: LinkThresholds {
                accept: config.linking.accept_threshold,
                review: config.linking.review_threshold,
            },
            stop_prefixes: config.linking.stop_prefixes.clone(),
            strip_es_plural: config.linking.strip_es_plural,
            enrich_authorities: config.linking.enrich_authorities,
            linking_enabled: !config.linking.disabled,
            patterns: config.linking.patterns.clone(),
            linker_table: config.linking.linker_table.clone(),
            search_limit: config.wikidata.search_limit,
            out_dir: config.output.out_dir.clone(),
            concurrency: config.output.concurrency,
        }
    }

    /// Apply command-line overrides over a config file, then validate
    pub fn resolve(config: &TomlConfig, cli: &CliOverrides) -> PipelineResult<Self> {
        let mut settings = Self::from_toml(config);

        if let Some(out_dir) = &cli.out_dir {
            settings.out_dir = out_dir.clone();
        }
        if let Some(patterns) = &cli.patterns {
            settings.patterns = Some(patterns.clone());
        }
        if let Some(table) = &cli.linker_table {
            settings.linker_table = Some(table.clone());
        }
        if let Some(labels) = &cli.labels {
            settings.labels = normalize_labels(labels);
        }
        if let Some(n) = cli.context_tokens {
            settings.context_tokens = n;
        }
        if let Some(accept) = cli.accept_threshold {
            settings.thresholds.accept = accept;
        }
        if let Some(review) = cli.review_threshold {
            settings.thresholds.review = review;
        }
        if let Some(seconds) = cli.max_seconds {
            settings.max_seconds = seconds;
        }
        if let Some(tokens) = cli.max_tokens {
            settings.max_tokens = tokens;
        }
        if let Some(concurrency) = cli.concurrency {
            settings.concurrency = concurrency;
        }
        settings.enrich_authorities |= cli.enrich_authorities;
        if cli.no_linking {
            settings.linking_enabled = false;
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        for (name, value) in [
            ("accept_threshold", self.thresholds.accept),
            ("review_threshold", self.thresholds.review),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PipelineError::InvalidSettings(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.max_tokens == 0 {
            return Err(PipelineError::InvalidSettings(
                "max_tokens must be at least 1".to_string(),
            ));
        }
        if self.max_seconds.is_nan() || self.max_seconds <= 0.0 {
            return Err(PipelineError::InvalidSettings(format!(
                "max_seconds must be positive, got {}",
                self.max_seconds
            )));
        }
        if self.concurrency == 0 {
            return Err(PipelineError::InvalidSettings(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.thresholds.review < self.thresholds.accept {
            tracing::warn!(
                accept = self.thresholds.accept,
                review = self.thresholds.review,
                "Review threshold is below accept threshold; no accepted link will be flagged"
            );
        }
        Ok(())
    }

    /// True if mentions with entity type `label` are kept
    pub fn keeps_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(label))
    }
}

/// Split comma lists, trim, uppercase, drop empties and repeats
pub fn normalize_labels(labels: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for label in labels.iter().flat_map(|l| l.split(',')) {
        let label = label.trim().to_uppercase();
        if !label.is_empty() && !out.contains(&label) {
            out.push(label);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.max_tokens, 50);
        assert_eq!(settings.max_seconds, 10.0);
        assert_eq!(settings.labels, vec!["PERSON", "ORG", "GPE", "LOC"]);
        assert_eq!(settings.context_tokens, 8);
        assert_eq!(settings.thresholds, LinkThresholds::default());
        assert!(settings.linking_enabled);
        assert!(!settings.enrich_authorities);
        assert_eq!(settings.concurrency, 1);
    }

    #[test]
    fn test_cli_overrides_file_values() {
        let mut config = TomlConfig::default();
        config.segmentation.max_tokens = 30;
        config.linking.accept_threshold = 0.5;
        config.output.out_dir = PathBuf::from("/tmp/from-file");

        let cli = CliOverrides {
            max_tokens: Some(12),
            labels: Some(vec!["person, org".into()]),
            enrich_authorities: true,
            no_linking: true,
            ..Default::default()
        };
        let settings = PipelineSettings::resolve(&config, &cli).unwrap();

        assert_eq!(settings.max_tokens, 12);
        assert_eq!(settings.thresholds.accept, 0.5);
        assert_eq!(settings.out_dir, PathBuf::from("/tmp/from-file"));
        assert_eq!(settings.labels, vec!["PERSON", "ORG"]);
        assert!(settings.enrich_authorities);
        assert!(!settings.linking_enabled);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let bad = [
            CliOverrides { accept_threshold: Some(1.5), ..Default::default() },
            CliOverrides { review_threshold: Some(-0.1), ..Default::default() },
            CliOverrides { max_tokens: Some(0), ..Default::default() },
            CliOverrides { max_seconds: Some(0.0), ..Default::default() },
            CliOverrides { max_seconds: Some(f64::NAN), ..Default::default() },
            CliOverrides { concurrency: Some(0), ..Default::default() },
        ];
        for cli in bad {
            let result = PipelineSettings::resolve(&TomlConfig::default(), &cli);
            assert!(
                matches!(result, Err(PipelineError::InvalidSettings(_))),
                "{:?} should be rejected",
                cli
            );
        }
    }

    #[test]
    fn test_inverted_thresholds_are_allowed() {
        let cli = CliOverrides {
            accept_threshold: Some(0.8),
            review_threshold: Some(0.5),
            ..Default::default()
        };
        assert!(PipelineSettings::resolve(&TomlConfig::default(), &cli).is_ok());
    }

    #[test]
    fn test_keeps_label_ignores_case() {
        let settings = PipelineSettings::default();
        assert!(settings.keeps_label("gpe"));
        assert!(!settings.keeps_label("MISC"));
    }
}
