//! Runtime configuration.
//!
//! Loaded from YAML. Every section is optional and durations are written
//! as human strings (`30s`, `1h`, `2m 30s`).
//!
//! ```yaml
//! provider:
//!   kind: anthropic
//!   settings:
//!     base_url: https://api.anthropic.com/v1
//! completion:
//!   model: claude-sonnet-4-5-20250514
//!   timeout: 60s
//! coordinator:
//!   max_concurrency: 5
//!   agent_timeout: 30s
//! budget:
//!   global_max_tokens: 200000
//!   per_stage:
//!     evaluation: 120000
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use underwrite_core::{AggregatorConfig, ChunkerConfig, RelevanceConfig};

use crate::coordinator::CoordinatorConfig;
use crate::inference::Stage;
use crate::providers::CompletionConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Serde adapter for `Duration` as a humantime string.
pub(crate) mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

/// Which backend to build and its JSON settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Registry name, e.g. `anthropic` or `openai`
    pub kind: String,
    /// Passed verbatim to the provider factory; may hold `api_key` and `base_url`
    pub settings: JsonValue,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: "anthropic".to_string(),
            settings: JsonValue::Object(Default::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: u64,
    #[serde(with = "duration_str")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1000,
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Token limits for one run. Absent limits are unlimited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub global_max_tokens: Option<u32>,
    pub per_stage: BTreeMap<Stage, u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub provider: ProviderConfig,
    pub completion: CompletionConfig,
    pub coordinator: CoordinatorConfig,
    pub chunker: ChunkerConfig,
    pub relevance: RelevanceConfig,
    pub aggregation: AggregatorConfig,
    pub cache: CacheConfig,
    pub budget: BudgetConfig,
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.coordinator.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "coordinator.max_concurrency must be at least 1".into(),
            ));
        }
        if self.coordinator.agent_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "coordinator.agent_timeout must be positive".into(),
            ));
        }
        if self.chunker.target_size == 0 {
            return Err(ConfigError::Invalid("chunker.target_size must be positive".into()));
        }
        if self.chunker.min_size > self.chunker.target_size {
            return Err(ConfigError::Invalid(format!(
                "chunker.min_size ({}) exceeds chunker.target_size ({})",
                self.chunker.min_size, self.chunker.target_size
            )));
        }
        if !(0.0..=1.0).contains(&self.relevance.threshold) {
            return Err(ConfigError::Invalid(format!(
                "relevance.threshold must be within [0, 1], got {}",
                self.relevance.threshold
            )));
        }
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid(
                "cache.max_entries must be positive when the cache is enabled".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = RuntimeConfig::from_yaml("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.coordinator.max_concurrency, 5);
        assert_eq!(config.coordinator.agent_timeout, Duration::from_secs(30));
        assert_eq!(config.relevance.threshold, 0.6);
        assert_eq!(config.aggregation.max_high_failures, 2);
        assert_eq!(config.cache.ttl, Duration::from_secs(3600));
        assert_eq!(config.chunker.target_size, 400);
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
provider:
  kind: openai
  settings:
    base_url: http://localhost:8000/v1
completion:
  model: gpt-4o
  timeout: 90s
coordinator:
  max_concurrency: 8
  agent_timeout: 2m
relevance:
  threshold: 0.5
aggregation:
  max_high_failures: 3
cache:
  max_entries: 50
  ttl: 10m
budget:
  global_max_tokens: 100000
  per_stage:
    evaluation: 60000
    extraction: 30000
"#;
        let config = RuntimeConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.provider.kind, "openai");
        assert_eq!(config.provider.settings["base_url"], "http://localhost:8000/v1");
        assert_eq!(config.completion.timeout, Duration::from_secs(90));
        assert_eq!(config.coordinator.agent_timeout, Duration::from_secs(120));
        assert_eq!(config.aggregation.max_high_failures, 3);
        assert_eq!(config.cache.ttl, Duration::from_secs(600));
        assert_eq!(config.budget.global_max_tokens, Some(100_000));
        assert_eq!(config.budget.per_stage[&Stage::Evaluation], 60_000);
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let err = RuntimeConfig::from_yaml("coordinator:\n  max_concurrency: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_bad_duration() {
        let err = RuntimeConfig::from_yaml("coordinator:\n  agent_timeout: soon\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_round_trip_keeps_human_durations() {
        let yaml = serde_yaml::to_string(&RuntimeConfig::default()).unwrap();
        assert!(yaml.contains("agent_timeout: 30s"));
        assert!(yaml.contains("ttl: 1h"));
    }
}
