//! Configuration loading and graceful degradation tests
//!
//! Uses serial_test to prevent ENV variable race conditions: tests that
//! touch CAPLINK_CONFIG or CAPLINK_USER_AGENT are marked #[serial].

use caplink_common::config::{
    get_user_agent, load_config, load_config_with_source, load_toml_config, resolve_config_path,
    TomlConfig,
    CONFIG_ENV_VAR, USER_AGENT_ENV_VAR,
};
use caplink_common::Error;
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_full_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[logging]
level = "debug"
file = "/var/log/caplink.log"

[segmentation]
max_tokens = 30
max_seconds = 6.5

[linking]
labels = ["PERSON", "ORG"]
context_tokens = 4
accept_threshold = 0.65
review_threshold = 0.80
stop_prefixes = ["the ", "a "]
enrich_authorities = true

[wikidata]
user_agent = "ArchiveBot/2.0 (+mailto:archive@example.org)"
max_retries = 2

[output]
out_dir = "results"
concurrency = 3
"#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.segmentation.max_tokens, 30);
    assert_eq!(config.segmentation.max_seconds, 6.5);
    assert_eq!(config.linking.labels, vec!["PERSON", "ORG"]);
    assert_eq!(config.linking.stop_prefixes, vec!["the ", "a "]);
    assert!(config.linking.enrich_authorities);
    assert!(config.linking.strip_es_plural, "unset flag keeps default");
    assert_eq!(config.wikidata.max_retries, 2);
    assert_eq!(config.wikidata.backoff_factor, 0.6);
    assert_eq!(config.output.concurrency, 3);
}

#[test]
fn test_malformed_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[linking\naccept_threshold = ").unwrap();

    let err = load_toml_config(&path).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_missing_explicit_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    let err = load_config(Some(&path)).unwrap_err();
    assert!(matches!(err, Error::Config(msg) if msg.contains("absent.toml")));
}

#[test]
#[serial]
fn test_env_var_used_when_no_cli_arg() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("env.toml");
    fs::write(&path, "[segmentation]\nmax_tokens = 12\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &path);
    let resolved = resolve_config_path(None);
    let config = load_config(None);
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved, Some(path));
    assert_eq!(config.unwrap().segmentation.max_tokens, 12);
}

#[test]
#[serial]
fn test_cli_arg_beats_env_var() {
    let dir = TempDir::new().unwrap();
    let cli_path = dir.path().join("cli.toml");
    let env_path = dir.path().join("env.toml");

    env::set_var(CONFIG_ENV_VAR, &env_path);
    let resolved = resolve_config_path(Some(&cli_path));
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved, Some(cli_path));
}

#[test]
#[serial]
fn test_no_overrides_falls_back_to_defaults() {
    env::remove_var(CONFIG_ENV_VAR);

    // Only meaningful when the developer has no per-user config file
    if resolve_config_path(None).is_none() {
        assert_eq!(load_config(None).unwrap(), TomlConfig::default());
    }
}

#[test]
#[serial]
fn test_user_agent_priority() {
    env::remove_var(USER_AGENT_ENV_VAR);
    assert!(get_user_agent(None).starts_with("caplink/"));
    assert_eq!(get_user_agent(Some("Configured/1.0")), "Configured/1.0");
    assert!(get_user_agent(Some("   ")).starts_with("caplink/"));

    env::set_var(USER_AGENT_ENV_VAR, "FromEnv/3.1");
    let agent = get_user_agent(Some("Configured/1.0"));
    env::remove_var(USER_AGENT_ENV_VAR);

    assert_eq!(agent, "FromEnv/3.1");
}

#[test]
fn test_loaded_config_remembers_its_source() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("caplink.toml");
    fs::write(&path, "[output]\nconcurrency = 3\n").unwrap();

    let loaded = load_config_with_source(Some(&path)).unwrap();

    assert_eq!(loaded.source, Some(path));
    assert_eq!(loaded.config.output.concurrency, 3);
}
