//! Config module tests

use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn test_substitute_env_vars_simple() {
    std::env::set_var("TEST_VAR_SIMPLE", "hello");
    let result = substitute_env_vars("value = \"${TEST_VAR_SIMPLE}\"");
    assert_eq!(result, "value = \"hello\"");
    std::env::remove_var("TEST_VAR_SIMPLE");
}

#[test]
fn test_substitute_env_vars_with_default() {
    // Unset var should use default
    std::env::remove_var("TEST_VAR_UNSET");
    let result = substitute_env_vars("value = \"${TEST_VAR_UNSET:-default_value}\"");
    assert_eq!(result, "value = \"default_value\"");

    // Set var should use env value
    std::env::set_var("TEST_VAR_SET", "env_value");
    let result = substitute_env_vars("value = \"${TEST_VAR_SET:-default_value}\"");
    assert_eq!(result, "value = \"env_value\"");
    std::env::remove_var("TEST_VAR_SET");
}

#[test]
fn test_substitute_env_vars_multiple() {
    std::env::set_var("TEST_SITE", "site9");
    std::env::set_var("TEST_REGION", "eu");
    let result = substitute_env_vars("remote_prefix = \"cloud/${TEST_REGION}/${TEST_SITE}\"");
    assert_eq!(result, "remote_prefix = \"cloud/eu/site9\"");
    std::env::remove_var("TEST_SITE");
    std::env::remove_var("TEST_REGION");
}

#[test]
fn test_substitute_env_vars_missing_no_default() {
    std::env::remove_var("TEST_VAR_MISSING");
    let result = substitute_env_vars("value = \"${TEST_VAR_MISSING}\"");
    assert_eq!(result, "value = \"\"");
}

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.log.level, "info");
    assert_eq!(config.pipeline.poll_interval, Duration::from_millis(50));
    assert_eq!(config.pipeline.queue_capacity, 1024);
    assert!(config.topic_rewriter.mappings.is_empty());
    assert!(config.json_message_rewriter.entries.is_empty());
    assert!(config.validate().is_ok());
}

#[test]
fn test_parse_empty_config() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.pipeline.queue_capacity, 1024);
    assert!(config.topic_rewriter.mappings.is_empty());
}

#[test]
fn test_parse_full_config() {
    let toml = r##"
[log]
level = "debug"

[pipeline]
poll_interval = "20ms"
queue_capacity = 16

[[topic_rewriter.topic]]
local_prefix = "local"
pattern = "machine/#"
remote_prefix = "remote"

[[topic_rewriter.topic]]
local = "alerts/#"
remote = "cloud/alerts"

[[json_message_rewriter.entry]]
topic = "machine/+/temp"
append = false
spec_json = '{"temp_c": "readings.temp", "unit": "#C"}'

[[json_message_rewriter.entry]]
topic = "#"
spec = { Site = "#north", meta = { Zone = "=3" } }
"##;

    let config = Config::parse(toml).unwrap();
    assert_eq!(config.log.level, "debug");
    assert_eq!(config.pipeline.poll_interval, Duration::from_millis(20));
    assert_eq!(config.pipeline.queue_capacity, 16);

    let mappings = &config.topic_rewriter.mappings;
    assert_eq!(mappings.len(), 2);
    assert_eq!(mappings[0].resolved_pattern().as_deref(), Some("local/machine/#"));
    assert!(!mappings[0].is_replace_mode());
    assert_eq!(mappings[1].local_prefix(), Some("alerts/#"));
    assert_eq!(mappings[1].remote_prefix(), Some("cloud/alerts"));
    assert!(mappings[1].is_replace_mode());

    let entries = &config.json_message_rewriter.entries;
    assert_eq!(entries.len(), 2);
    assert!(!entries[0].append);
    assert_eq!(
        entries[0].resolve_spec(),
        json!({"temp_c": "readings.temp", "unit": "#C"})
    );
    assert!(entries[1].append);

    // key case and order survive
    let spec = entries[1].resolve_spec();
    let keys: Vec<&str> = spec.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["Site", "meta"]);
    assert_eq!(spec, json!({"Site": "#north", "meta": {"Zone": "=3"}}));
}

#[test]
fn test_entry_without_spec_is_empty() {
    let config = Config::parse(
        r#"
[[json_message_rewriter.entry]]
topic = "a/b"
"#,
    )
    .unwrap();
    assert_eq!(
        config.json_message_rewriter.entries[0].resolve_spec(),
        json!({})
    );
}

#[test]
fn test_spec_and_spec_json_conflict() {
    let result = Config::parse(
        r##"
[[json_message_rewriter.entry]]
topic = "a"
spec = { x = "#1" }
spec_json = '{"x": "#1"}'
"##,
    );
    assert!(matches!(result, Err(ConfigError::Validation(_))));
}

#[test]
fn test_invalid_spec_json_resolves_to_empty_spec() {
    let config = Config::parse(
        r#"
[[json_message_rewriter.entry]]
topic = "a"
spec_json = '{"x": '
"#,
    )
    .unwrap();
    assert_eq!(
        config.json_message_rewriter.entries[0].resolve_spec(),
        json!({})
    );
}

#[test]
fn test_invalid_spec_leaves_do_not_fail_validation() {
    let config = Config::parse(
        r#"
[[json_message_rewriter.entry]]
topic = "a"
spec = { x = 1 }

[[json_message_rewriter.entry]]
topic = "b"
spec = { x = "a[" }
"#,
    )
    .unwrap();
    assert_eq!(config.json_message_rewriter.entries.len(), 2);
}

#[test]
fn test_mapping_without_pattern_or_prefix() {
    let result = Config::parse(
        r#"
[[topic_rewriter.topic]]
remote_prefix = "remote"
"#,
    );
    assert!(matches!(result, Err(ConfigError::Validation(_))));
}

#[test]
fn test_replace_mapping_needs_remote_prefix() {
    let result = Config::parse(
        r#"
[[topic_rewriter.topic]]
local_prefix = "local"
"#,
    );
    assert!(matches!(result, Err(ConfigError::Validation(_))));
}

#[test]
fn test_pattern_with_nul_rejected() {
    let result = Config::parse(
        "[[json_message_rewriter.entry]]\ntopic = \"a/\\u0000\"\n",
    );
    assert!(matches!(result, Err(ConfigError::Validation(_))));
}

#[test]
fn test_misplaced_wildcard_is_only_a_warning() {
    let config = Config::parse(
        r#"
[[topic_rewriter.topic]]
pattern = "a/#/b"
remote_prefix = "remote"
"#,
    );
    assert!(config.is_ok());
}

#[test]
fn test_invalid_pipeline_settings() {
    let result = Config::parse("[pipeline]\nqueue_capacity = 0\n");
    assert!(matches!(result, Err(ConfigError::Validation(_))));

    let result = Config::parse("[pipeline]\npoll_interval = \"0s\"\n");
    assert!(matches!(result, Err(ConfigError::Validation(_))));
}

#[test]
fn test_unparseable_toml() {
    assert!(matches!(
        Config::parse("[pipeline"),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(dir.path().join("absent.toml")).unwrap();
    assert!(config.topic_rewriter.mappings.is_empty());
}

#[test]
fn test_load_config_with_env_substitution() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("relaymq.toml");

    std::env::set_var("TEST_REMOTE_SITE", "site9");

    let config_content = r##"
[[topic_rewriter.topic]]
local_prefix = "local"
pattern = "#"
remote_prefix = "cloud/${TEST_REMOTE_SITE}"

[[json_message_rewriter.entry]]
topic = "#"
spec = { region = "#${TEST_REGION_UNSET:-eu}" }
"##;

    std::fs::write(&config_path, config_content).unwrap();

    let config = Config::load(&config_path).unwrap();
    assert_eq!(
        config.topic_rewriter.mappings[0].remote_prefix(),
        Some("cloud/site9")
    );
    assert_eq!(
        config.json_message_rewriter.entries[0].resolve_spec(),
        json!({"region": "#eu"})
    );

    std::env::remove_var("TEST_REMOTE_SITE");
}

#[test]
fn test_load_env_override() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("relaymq.toml");

    std::fs::write(&config_path, "[log]\nlevel = \"warn\"\n[pipeline]\npoll_interval = \"10ms\"\n").unwrap();
    std::env::set_var("RELAYMQ__PIPELINE__POLL_INTERVAL", "75ms");

    let config = Config::load(&config_path).unwrap();
    assert_eq!(config.log.level, "warn");
    assert_eq!(config.pipeline.poll_interval, Duration::from_millis(75));

    std::env::remove_var("RELAYMQ__PIPELINE__POLL_INTERVAL");
}
