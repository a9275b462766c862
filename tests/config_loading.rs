//! Integration test: Configuration utilities
//!
//! Tests config path selection, YAML parsing and environment overrides.

use std::collections::HashMap;
use std::io::Write;
use tempfile::NamedTempFile;
use wsbus_app::bin_common::{load_config_from_env, ConfigType};
use wsbus_app::config::{AppConfig, ConfigError};

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn test_client_config_default_path() {
    std::env::remove_var("WSBUS_CONFIG_PATH");

    let config_path = load_config_from_env(ConfigType::Client);
    assert_eq!(config_path.to_str().unwrap(), "config/wsbus.yaml");
}

#[test]
fn test_client_config_env_var() {
    assert_eq!(ConfigType::Client.env_var_name(), "WSBUS_CONFIG_PATH");
}

#[test]
fn test_parse_partial_yaml() {
    let config = AppConfig::from_yaml(
        r#"
client:
  host: chat.local
  port: 8080
  path: events
  queue_expiration_ms: -1
log_level: debug
"#,
    )
    .unwrap();

    assert_eq!(config.client.host.as_deref(), Some("chat.local"));
    assert_eq!(config.client.port, Some(8080));
    assert_eq!(config.client.queue_expiration_ms, -1);
    assert!(config.client.reconnect);
    assert!(config.client.queue_enabled);
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.event_name, "message");
    assert!(config.validate().is_ok());
}

#[test]
fn test_empty_yaml_uses_defaults() {
    let config = AppConfig::from_yaml("{}").unwrap();
    assert_eq!(config, AppConfig::default());
    assert_eq!(config.client.queue_expiration_ms, 15_000);

    // No host and no uri
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationError(_))
    ));
}

#[test]
fn test_env_overrides() {
    let mut config = AppConfig::from_yaml("client:\n  host: yaml.local\n").unwrap();

    config
        .apply_overrides(lookup(&[
            ("WSBUS_HOST", "env.local"),
            ("WSBUS_PORT", "9001"),
            ("LOG_LEVEL", "trace"),
        ]))
        .unwrap();

    assert_eq!(config.client.host.as_deref(), Some("env.local"));
    assert_eq!(config.client.port, Some(9001));
    assert_eq!(config.log_level, "trace");
}

#[test]
fn test_env_uri_override() {
    let mut config = AppConfig::default();
    config
        .apply_overrides(lookup(&[("WSBUS_URI", "wss://bus.example.com/socket")]))
        .unwrap();

    assert_eq!(
        config.client.uri.as_deref(),
        Some("wss://bus.example.com/socket")
    );
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_port_override() {
    let mut config = AppConfig::default();
    let result = config.apply_overrides(lookup(&[("WSBUS_PORT", "not-a-port")]));
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}

#[test]
fn test_invalid_scheme_rejected() {
    let config = AppConfig::from_yaml("client:\n  host: a.local\n  scheme: http://\n").unwrap();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationError(_))
    ));
}

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "client:\n  uri: ws://127.0.0.1:9999/\nevent_name: chat").unwrap();

    let config = AppConfig::load_with(file.path(), lookup(&[])).unwrap();
    assert_eq!(config.event_name, "chat");
    assert_eq!(config.client.uri.as_deref(), Some("ws://127.0.0.1:9999/"));
    assert_eq!(config.log_level, "info");
}

#[test]
fn test_load_file_then_overrides() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "client:\n  host: yaml.local\n  port: 8080").unwrap();

    let config = AppConfig::load_with(
        file.path(),
        lookup(&[("WSBUS_HOST", "env.local"), ("LOG_LEVEL", "debug")]),
    )
    .unwrap();
    assert_eq!(config.client.host.as_deref(), Some("env.local"));
    assert_eq!(config.client.port, Some(8080));
    assert_eq!(config.log_level, "debug");
}

#[test]
fn test_load_missing_file_needs_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");

    assert!(matches!(
        AppConfig::load_with(&path, lookup(&[])),
        Err(ConfigError::ValidationError(_))
    ));

    let config = AppConfig::load_with(&path, lookup(&[("WSBUS_HOST", "env.local")])).unwrap();
    assert_eq!(config.client.host.as_deref(), Some("env.local"));
}

#[test]
fn test_malformed_yaml() {
    let result = AppConfig::from_yaml("client: [unterminated");
    assert!(matches!(result, Err(ConfigError::YamlError(_))));
}
