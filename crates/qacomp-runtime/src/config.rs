//! Runtime configuration.
//!
//! Loaded from YAML (or JSON, by `.json` extension). Every field has a
//! default, so an empty file is a valid configuration:
//!
//! ```yaml
//! provider: anthropic
//! provider_config:
//!   base_url: https://api.anthropic.com/v1   # api_key falls back to ANTHROPIC_API_KEY
//! completion:
//!   model: claude-sonnet-4-5-20250514
//!   max_tokens: 512
//!   temperature: 0.0
//!   timeout: 30s
//!   prompt_caching: true
//! keys:
//!   question_key: query
//!   answer_key: answer
//!   prediction_key: result
//! output_key: text
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::Path;
use thiserror::Error;

use qacomp_core::EvaluationKeys;

use crate::chain::ChainOptions;
use crate::providers::CompletionConfig;

/// Names `output_key` cannot take: the comparison input fields it is stored
/// next to, and the per-result fields of the CLI report.
pub const RESERVED_OUTPUT_KEYS: &[&str] = &[
    "query",
    "answer",
    "student_a",
    "student_b",
    "index",
    "preference",
];

/// Errors from loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid timeout '{value}': {source}")]
    InvalidDuration {
        value: String,
        source: humantime::DurationError,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Completion settings as written in a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,

    /// Human-readable duration, e.g. "15s" or "1m 30s"
    pub timeout: String,

    pub prompt_caching: bool,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        let defaults = CompletionConfig::default();
        Self {
            model: defaults.model,
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
            timeout: humantime::format_duration(defaults.timeout).to_string(),
            prompt_caching: defaults.prompt_caching,
        }
    }
}

/// Top-level configuration for a comparison run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Provider type name in the [`ProviderRegistry`](crate::providers::ProviderRegistry)
    pub provider: String,

    /// Provider-specific block handed to the factory
    pub provider_config: JsonValue,

    pub completion: CompletionSettings,

    pub keys: EvaluationKeys,

    pub output_key: String,

    pub verbose: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            provider_config: JsonValue::Object(Default::default()),
            completion: CompletionSettings::default(),
            keys: EvaluationKeys::default(),
            output_key: ChainOptions::default().output_key,
            verbose: false,
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file; `.json` files are parsed as JSON, anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content)?,
            _ => Self::from_yaml(&content)?,
        };
        tracing::debug!(path = %path.display(), provider = %config.provider, "Loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.trim().is_empty() {
            return Err(ConfigError::Invalid("provider must not be empty".to_string()));
        }
        if !self.provider_config.is_object() {
            return Err(ConfigError::Invalid(
                "provider_config must be a mapping".to_string(),
            ));
        }
        if self.completion.model.trim().is_empty() {
            return Err(ConfigError::Invalid("completion.model must not be empty".to_string()));
        }
        if self.completion.max_tokens == 0 {
            return Err(ConfigError::Invalid(
                "completion.max_tokens must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.completion.temperature) {
            return Err(ConfigError::Invalid(format!(
                "completion.temperature must be within [0, 1], got {}",
                self.completion.temperature
            )));
        }
        for (name, value) in [
            ("keys.question_key", &self.keys.question_key),
            ("keys.answer_key", &self.keys.answer_key),
            ("keys.prediction_key", &self.keys.prediction_key),
            ("output_key", &self.output_key),
        ] {
            if value.is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", name)));
            }
        }
        if RESERVED_OUTPUT_KEYS.contains(&self.output_key.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "output_key '{}' is reserved; choose a name other than {:?}",
                self.output_key, RESERVED_OUTPUT_KEYS
            )));
        }
        self.completion_config().map(|_| ())
    }

    pub fn completion_config(&self) -> Result<CompletionConfig, ConfigError> {
        let timeout = humantime::parse_duration(&self.completion.timeout).map_err(|source| {
            ConfigError::InvalidDuration {
                value: self.completion.timeout.clone(),
                source,
            }
        })?;

        Ok(CompletionConfig {
            model: self.completion.model.clone(),
            max_tokens: self.completion.max_tokens,
            temperature: self.completion.temperature,
            timeout,
            prompt_caching: self.completion.prompt_caching,
        })
    }

    pub fn chain_options(&self) -> Result<ChainOptions, ConfigError> {
        Ok(ChainOptions {
            completion: self.completion_config()?,
            output_key: self.output_key.clone(),
            verbose: self.verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_yaml_is_default() {
        let config = RuntimeConfig::from_yaml("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());

        let completion = config.completion_config().unwrap();
        assert_eq!(completion, CompletionConfig::default());
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
provider: anthropic
provider_config:
  base_url: https://proxy.example.com/v1
completion:
  model: claude-haiku-4-5
  max_tokens: 256
  timeout: 1m 30s
  prompt_caching: false
keys:
  question_key: question
  prediction_key: output
output_key: grade
verbose: true
"#;
        let config = RuntimeConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.provider_config["base_url"], "https://proxy.example.com/v1");
        assert_eq!(config.keys.question_key, "question");
        assert_eq!(config.keys.answer_key, "answer");
        assert_eq!(config.keys.prediction_key, "output");

        let options = config.chain_options().unwrap();
        assert_eq!(options.completion.model, "claude-haiku-4-5");
        assert_eq!(options.completion.timeout, Duration::from_secs(90));
        assert_eq!(options.completion.temperature, 0.0);
        assert!(!options.completion.prompt_caching);
        assert_eq!(options.output_key, "grade");
        assert!(options.verbose);
    }

    #[test]
    fn test_json_config() {
        let config = RuntimeConfig::from_json(r#"{"completion": {"timeout": "5s"}}"#).unwrap();
        assert_eq!(
            config.completion_config().unwrap().timeout,
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_invalid_timeout() {
        let err = RuntimeConfig::from_yaml("completion:\n  timeout: soon\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDuration { value, .. } if value == "soon"));
    }

    #[test]
    fn test_validation_errors() {
        let err = RuntimeConfig::from_yaml("completion:\n  temperature: 1.5\n").unwrap_err();
        assert!(err.to_string().contains("temperature"));

        let err = RuntimeConfig::from_yaml("completion:\n  max_tokens: 0\n").unwrap_err();
        assert!(err.to_string().contains("max_tokens"));

        let err = RuntimeConfig::from_yaml("keys:\n  answer_key: ''\n").unwrap_err();
        assert!(err.to_string().contains("keys.answer_key"));

        let err = RuntimeConfig::from_yaml("provider_config: [1, 2]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_reserved_output_key_rejected() {
        for key in ["index", "preference", "student_a"] {
            let err = RuntimeConfig::from_yaml(&format!("output_key: {}\n", key)).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)));
            assert!(err.to_string().contains("reserved"), "{}", err);
        }

        let config = RuntimeConfig::from_yaml("output_key: verdict\n").unwrap();
        assert_eq!(config.output_key, "verdict");
    }

    #[test]
    fn test_missing_file() {
        let err = RuntimeConfig::from_file("/nonexistent/qacomp.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
