//! Anthropic Messages API backend.
//!
//! System prompts travel as separate blocks. Each pipeline stage reuses one
//! system prompt for every call, so with prompt caching on that block is
//! marked `ephemeral` and is billed as a cache read after the first call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

use super::factory::ProviderFactory;
use super::http::{post_json, validate_base_url, Endpoint};
use super::secrets::{ApiCredential, CredentialSource};
use super::{ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, Role, TokenUsage};

pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    credential: ApiCredential,
    endpoint: Endpoint,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.endpoint.base_url())
            .finish()
    }
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            credential: ApiCredential::new(api_key, CredentialSource::Programmatic, "Anthropic API key"),
            endpoint: Endpoint::new(DEFAULT_BASE_URL)?,
        })
    }

    /// `api_key` and `base_url` from the config; the key falls back to
    /// `ANTHROPIC_API_KEY`.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        Ok(Self {
            credential: ApiCredential::from_config_or_env(
                config,
                "api_key",
                ANTHROPIC_API_KEY_ENV,
                "Anthropic API key",
            )?,
            endpoint: Endpoint::from_config(config, DEFAULT_BASE_URL)?,
        })
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<SystemBlock>,
    messages: Vec<Turn>,
}

#[derive(Debug, Serialize)]
struct SystemBlock {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_control: Option<JsonValue>,
}

/// A user or assistant turn. Plain string content is accepted by the API.
#[derive(Debug, Serialize)]
struct Turn {
    role: Role,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ReplyBlock>,
    stop_reason: Option<String>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ReplyBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
    #[serde(default)]
    cache_creation_input_tokens: u32,
    #[serde(default)]
    cache_read_input_tokens: u32,
}

impl From<Usage> for TokenUsage {
    fn from(usage: Usage) -> Self {
        TokenUsage {
            prompt_tokens: usage.input_tokens,
            completion_tokens: usage.output_tokens,
            cache_read_tokens: usage.cache_read_input_tokens,
            cache_creation_tokens: usage.cache_creation_input_tokens,
        }
    }
}

fn messages_request<'a>(messages: Vec<ChatMessage>, config: &'a CompletionConfig) -> MessagesRequest<'a> {
    let (system, turns): (Vec<_>, Vec<_>) = messages.into_iter().partition(|m| m.role == Role::System);
    MessagesRequest {
        model: &config.model,
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        system: system
            .into_iter()
            .map(|m| SystemBlock {
                kind: "text",
                text: m.content,
                cache_control: config
                    .prompt_caching
                    .then(|| serde_json::json!({"type": "ephemeral"})),
            })
            .collect(),
        messages: turns
            .into_iter()
            .map(|m| Turn {
                role: m.role,
                content: m.content,
            })
            .collect(),
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = self
            .endpoint
            .post("messages")
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", API_VERSION);
        let body: MessagesResponse =
            post_json(request, &messages_request(messages, config), config.timeout).await?;

        Ok(CompletionResponse {
            content: body.content.into_iter().filter_map(|block| block.text).collect(),
            usage: body.usage.into(),
            model: body.model,
            stop_reason: body.stop_reason,
        })
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

/// Config keys: `api_key` (else `ANTHROPIC_API_KEY`) and `base_url`.
pub struct AnthropicProviderFactory;

impl ProviderFactory for AnthropicProviderFactory {
    fn provider_type(&self) -> &'static str {
        "anthropic"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(AnthropicProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(config, "api_key", ANTHROPIC_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "Anthropic API key required: set 'api_key' in config or {ANTHROPIC_API_KEY_ENV}"
            )));
        }
        validate_base_url(config)
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({ "base_url": DEFAULT_BASE_URL })
    }

    fn description(&self) -> &'static str {
        "Anthropic Messages API with prompt caching"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_is_cache_marked() {
        let config = CompletionConfig::default();
        let request = messages_request(
            vec![
                ChatMessage::system("You extract compliance checks."),
                ChatMessage::user("Policy text"),
            ],
            &config,
        );
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["system"][0]["type"], "text");
        assert_eq!(json["system"][0]["cache_control"]["type"], "ephemeral");
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Policy text");
    }

    #[test]
    fn test_caching_disabled() {
        let config = CompletionConfig {
            prompt_caching: false,
            ..Default::default()
        };
        let request = messages_request(vec![ChatMessage::system("s")], &config);
        let json = serde_json::to_value(&request).unwrap();
        assert!(json["system"][0].get("cache_control").is_none());
    }

    #[test]
    fn test_no_system_block_when_absent() {
        let config = CompletionConfig::default();
        let request = messages_request(vec![ChatMessage::user("only text")], &config);
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_usage_counts_cache_tokens() {
        let usage: Usage = serde_json::from_value(serde_json::json!({
            "input_tokens": 1200,
            "output_tokens": 80,
            "cache_read_input_tokens": 1024
        }))
        .unwrap();
        let usage = TokenUsage::from(usage);
        assert_eq!(usage.total(), 1280);
        assert_eq!(usage.cache_read_tokens, 1024);
        assert_eq!(usage.cache_creation_tokens, 0);
    }

    #[test]
    fn test_debug_hides_key() {
        let provider = AnthropicProvider::new("sk-ant-secret").unwrap();
        assert!(!format!("{provider:?}").contains("sk-ant-secret"));
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn test_factory_rejects_bad_url() {
        let factory = AnthropicProviderFactory;
        let config = serde_json::json!({"api_key": "k", "base_url": "ftp://nope"});
        assert!(factory.validate_config(&config).is_err());
        let config = serde_json::json!({"api_key": "k"});
        assert!(factory.validate_config(&config).is_ok());
    }
}
