//! Application configuration
//!
//! YAML file first, then environment overrides:
//!
//! | Variable     | Field              |
//! |--------------|--------------------|
//! | `WSBUS_URI`  | `client.uri`       |
//! | `WSBUS_HOST` | `client.host`      |
//! | `WSBUS_PORT` | `client.port`      |
//! | `LOG_LEVEL`  | `log_level`        |

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;
use wsbus::{ClientConfig, Endpoint};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Demo application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub client: ClientConfig,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Event name used for lines typed on stdin
    #[serde(default = "default_event_name")]
    pub event_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_event_name() -> String {
    "message".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            log_level: default_log_level(),
            event_name: default_event_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file, then apply process environment
    /// overrides
    ///
    /// A missing file is not an error: defaults are used and the
    /// environment must then supply at least a host or URI.
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(config_path, |key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::load`], with overrides read through `lookup`
    pub fn load_with<F>(config_path: impl AsRef<Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = config_path.as_ref();

        let mut config = if path.exists() {
            let yaml_content = std::fs::read_to_string(path)?;
            Self::from_yaml(&yaml_content)?
        } else {
            info!("Config file {} not found, using defaults", path.display());
            Self::default()
        };

        config.apply_overrides(lookup)?;
        config.validate()?;

        Ok(config)
    }

    /// Parse a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Apply `WSBUS_*` overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(uri) = lookup("WSBUS_URI") {
            info!("Overriding uri from environment variable");
            self.client.uri = Some(uri);
        }

        if let Some(host) = lookup("WSBUS_HOST") {
            info!("Overriding host from environment variable");
            self.client.host = Some(host);
        }

        if let Some(port) = lookup("WSBUS_PORT") {
            let port = port.trim().parse::<u16>().map_err(|e| {
                ConfigError::ValidationError(format!("WSBUS_PORT '{}': {}", port, e))
            })?;
            self.client.port = Some(port);
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level;
        }

        Ok(())
    }

    /// Check that the client configuration resolves to an endpoint
    pub fn validate(&self) -> Result<()> {
        Endpoint::resolve(&self.client)
            .map(|_| ())
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.event_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "event_name must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Log the configuration
    pub fn log(&self) {
        match Endpoint::resolve(&self.client) {
            Ok(endpoint) => info!("Endpoint: {}", endpoint),
            Err(e) => info!("Endpoint: unresolved ({})", e),
        }
        info!(
            "Reconnect: {}, queue: {} ({} ms)",
            self.client.reconnect, self.client.queue_enabled, self.client.queue_expiration_ms
        );
        info!("Event name: {}", self.event_name);
    }
}
