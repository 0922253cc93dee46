//! API credential handling.
//!
//! Keys are wrapped in [`secrecy::SecretString`] as soon as they are read,
//! print as `[REDACTED]`, and are only exposed when a request header is
//! built.

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::ProviderError;

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Config,
    Environment,
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CredentialSource::Config => "config",
            CredentialSource::Environment => "environment",
            CredentialSource::Programmatic => "programmatic",
        })
    }
}

pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    pub fn from_env(env_var: &str, name: &'static str) -> Result<Self, ProviderError> {
        std::env::var(env_var)
            .map(|v| Self::new(v, CredentialSource::Environment, name))
            .map_err(|_| {
                ProviderError::NotConfigured(format!("{name} not set: export {env_var}"))
            })
    }

    /// `config[config_key]` if present, else the `env_var` environment variable.
    pub fn from_config_or_env(
        config: &JsonValue,
        config_key: &str,
        env_var: &str,
        name: &'static str,
    ) -> Result<Self, ProviderError> {
        if let Some(value) = config.get(config_key).and_then(JsonValue::as_str) {
            return Ok(Self::new(value, CredentialSource::Config, name));
        }

        if let Ok(value) = std::env::var(env_var) {
            return Ok(Self::new(value, CredentialSource::Environment, name));
        }

        Err(ProviderError::NotConfigured(format!(
            "{name} required: set '{config_key}' in provider config or {env_var}"
        )))
    }

    /// Whether a credential could be loaded, without loading it.
    pub fn is_available(config: &JsonValue, config_key: &str, env_var: &str) -> bool {
        config.get(config_key).and_then(JsonValue::as_str).is_some()
            || std::env::var(env_var).is_ok()
    }

    /// The raw value. Call only where the header is set.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_debug_and_display_redact() {
        let cred = ApiCredential::new("sk-very-secret", CredentialSource::Programmatic, "Test key");
        let debug = format!("{cred:?}");
        let display = cred.to_string();
        assert!(!debug.contains("sk-very-secret"));
        assert!(!display.contains("sk-very-secret"));
        assert!(debug.contains("[REDACTED]"));
        assert_eq!(cred.expose(), "sk-very-secret");
    }

    #[test]
    fn test_config_takes_precedence() {
        let config = json!({"api_key": "from-config"});
        let cred = ApiCredential::from_config_or_env(
            &config,
            "api_key",
            "UNDERWRITE_TEST_UNSET_KEY",
            "Test key",
        )
        .unwrap();
        assert_eq!(cred.source(), CredentialSource::Config);
        assert_eq!(cred.expose(), "from-config");
    }

    #[test]
    fn test_missing_credential() {
        let result = ApiCredential::from_config_or_env(
            &json!({}),
            "api_key",
            "UNDERWRITE_TEST_UNSET_KEY",
            "Test key",
        );
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
        assert!(!ApiCredential::is_available(
            &json!({}),
            "api_key",
            "UNDERWRITE_TEST_UNSET_KEY"
        ));
    }
}
