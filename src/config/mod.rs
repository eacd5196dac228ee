pub mod validation;

use serde::{Deserialize, Serialize};
use std::fmt;

use self::validation::validate_config;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Agent runtime backend the event stream comes from.
///
/// Only surfaces as a label in message metadata; the chunk schema is the same
/// for every provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeProvider {
    #[default]
    Anthropic,
    Bedrock,
    Vertex,
}

impl RuntimeProvider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeProvider::Anthropic => "anthropic",
            RuntimeProvider::Bedrock => "bedrock",
            RuntimeProvider::Vertex => "vertex",
        }
    }
}

impl fmt::Display for RuntimeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens to still-open blocks when the event source ends before `result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CancelPolicy {
    /// Emit nothing more; open blocks stay open for the consumer.
    #[default]
    LeaveOpen,
    /// Close every open block and emit an `abort` chunk.
    Flush,
}

impl fmt::Display for CancelPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelPolicy::LeaveOpen => write!(f, "leave_open"),
            CancelPolicy::Flush => write!(f, "flush"),
        }
    }
}

/// Wire framing for the chunk stream written by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Sse,
    Ndjson,
}

/// Transformer construction options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformConfig {
    #[serde(default)]
    pub provider: RuntimeProvider,
    #[serde(default)]
    pub cancel_policy: CancelPolicy,
}

/// Output framing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default = "default_true")]
    pub emit_done_marker: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            emit_done_marker: true,
        }
    }
}

/// Feature flags and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub transform: TransformConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

/// Load configuration from a YAML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Like [`load_config`], but a missing file yields the built-in defaults.
///
/// # Errors
///
/// Same as [`load_config`], except that `NotFound` is not an error.
pub fn load_config_or_default(path: &str) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_config(&contents),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(err) => Err(err.into()),
    }
}

/// Parse and validate configuration from YAML text.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] or [`ConfigError::Validation`].
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = serde_yaml::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_example_config() {
        // The example config should load and validate successfully
        let config = load_config("config.example.yaml");
        assert!(
            config.is_ok(),
            "Failed to load example config: {:?}",
            config.err()
        );
        let config = config.unwrap();
        assert_eq!(config.transform.provider, RuntimeProvider::Anthropic);
        assert_eq!(config.transform.cancel_policy, CancelPolicy::Flush);
        assert_eq!(config.output.format, OutputFormat::Sse);
        assert!(config.output.emit_done_marker);
        assert_eq!(config.features.log_level, "INFO");
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let config = load_config_or_default("does-not-exist.chunkify.yaml").unwrap();
        assert_eq!(config.transform.cancel_policy, CancelPolicy::LeaveOpen);
        assert_eq!(config.output.format, OutputFormat::Sse);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config = parse_config("output:\n  format: ndjson\n").unwrap();
        assert_eq!(config.output.format, OutputFormat::Ndjson);
        assert!(config.output.emit_done_marker);
        assert_eq!(config.transform.provider, RuntimeProvider::Anthropic);
        assert_eq!(config.features.log_level, "INFO");
    }

    #[test]
    fn test_cancel_policy_serde() {
        let json = serde_json::to_string(&CancelPolicy::LeaveOpen).unwrap();
        assert_eq!(json, "\"leave_open\"");
        let policy: CancelPolicy = serde_json::from_str("\"flush\"").unwrap();
        assert_eq!(policy, CancelPolicy::Flush);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        assert!(matches!(
            parse_config("transform:\n  provider: openai\n"),
            Err(ConfigError::Yaml(_))
        ));
    }
}
