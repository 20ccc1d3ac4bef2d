//! Configuration Module
//!
//! Provides TOML-based configuration for RelayMQ with support for:
//! - Logging level
//! - Pipeline settings (poll interval, queue capacity)
//! - Topic mapping table
//! - Payload transform table
//! - Environment variable overrides (RELAYMQ__* prefix)
//!
//! Rule tables are read with `toml` directly so that transform spec keys keep
//! their exact case and order. Scalar settings go through the `config` crate
//! so they can be overridden from the environment.

use std::path::Path;
use std::time::Duration;

use config::{Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use crate::topic::{lint_pattern, validate_pattern};

pub use rules::{MessageRewriterConfig, TopicMapping, TopicRewriterConfig, TransformEntryConfig};

mod rules;

/// Substitute environment variables in a string.
/// Supports `${VAR}` and `${VAR:-default}` syntax.
fn substitute_env_vars(content: &str) -> String {
    let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").expect("static regex is valid");
    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var_name).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}

#[cfg(test)]
mod tests;

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// Config crate error
    Config(config::ConfigError),
    /// Validation error
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Config(e) => write!(f, "Config error: {}", e),
            ConfigError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        ConfigError::Config(e)
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,
    /// Pipeline configuration
    pub pipeline: PipelineConfig,
    /// Topic mapping table
    pub topic_rewriter: TopicRewriterConfig,
    /// Payload transform table
    pub json_message_rewriter: MessageRewriterConfig,
}

/// Settings that accept environment overrides
#[derive(Debug, Deserialize)]
struct RuntimeSettings {
    #[serde(default)]
    log: LogConfig,
    #[serde(default)]
    pipeline: PipelineConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level: error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bounded wait of each stage's inbound poll; also the shutdown check interval
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Capacity of each inter-stage queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(50)
}

fn default_queue_capacity() -> usize {
    1024
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file with environment variable overrides.
    ///
    /// Supports two forms of environment variable usage:
    /// 1. In-file substitution: `${VAR}` or `${VAR:-default}` syntax in the TOML file
    /// 2. Override via env vars: `RELAYMQ__` prefix with double underscores for nesting:
    ///    - `RELAYMQ__LOG__LEVEL=debug` overrides `log.level`
    ///    - `RELAYMQ__PIPELINE__POLL_INTERVAL=100ms` overrides `pipeline.poll_interval`
    ///    - `RELAYMQ__PIPELINE__QUEUE_CAPACITY=4096` overrides `pipeline.queue_capacity`
    ///
    /// Rule tables are not overridable from the environment.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => substitute_env_vars(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File doesn't exist, use defaults
                String::new()
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let mut config: Config = toml::from_str(&content)?;

        let settings: RuntimeSettings = config::Config::builder()
            .set_default("log.level", "info")?
            .set_default("pipeline.poll_interval", "50ms")?
            .set_default("pipeline.queue_capacity", 1024)?
            .add_source(File::from_str(&content, FileFormat::Toml))
            .add_source(
                Environment::with_prefix("RELAYMQ")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.log = settings.log;
        config.pipeline = settings.pipeline;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a string (for testing, no env var support)
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Checks the table shapes and patterns. Transform specs are compiled by
    /// the stage itself, where a broken spec only affects its own topics.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.queue_capacity == 0 {
            return Err(ConfigError::Validation(
                "pipeline.queue_capacity must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.poll_interval.is_zero() {
            return Err(ConfigError::Validation(
                "pipeline.poll_interval must be greater than 0".to_string(),
            ));
        }

        for (id, mapping) in self.topic_rewriter.mappings.iter().enumerate() {
            let Some(pattern) = mapping.resolved_pattern() else {
                return Err(ConfigError::Validation(format!(
                    "Topic mapping {} needs at least 'local_prefix' or 'pattern'",
                    id
                )));
            };

            if mapping.is_replace_mode() && mapping.remote_prefix().is_none() {
                return Err(ConfigError::Validation(format!(
                    "Topic mapping {} ('{}') has no pattern and no 'remote_prefix' to replace with",
                    id, pattern
                )));
            }

            check_pattern("Topic mapping", id, &pattern)?;
        }

        for (id, entry) in self.json_message_rewriter.entries.iter().enumerate() {
            check_pattern("Transform entry", id, &entry.topic)?;

            if entry.has_conflicting_spec() {
                return Err(ConfigError::Validation(format!(
                    "Transform entry {} ('{}') cannot have both 'spec' and 'spec_json'",
                    id, entry.topic
                )));
            }
        }

        Ok(())
    }
}

fn check_pattern(kind: &str, id: usize, pattern: &str) -> Result<(), ConfigError> {
    validate_pattern(pattern).map_err(|reason| {
        ConfigError::Validation(format!("{} {} ('{}'): {}", kind, id, pattern, reason))
    })?;

    if let Some(reason) = lint_pattern(pattern) {
        warn!("{} {} ('{}'): {}", kind, id, pattern, reason);
    }

    Ok(())
}
