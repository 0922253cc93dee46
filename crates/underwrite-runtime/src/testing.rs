//! Scripted provider for tests. Never touches the network.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::providers::{
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Text(String),
    Error(String),
    Panic,
    Delay(Duration, String),
}

/// Replies chosen by substring rules over the whole conversation.
///
/// Rules are tried in insertion order; the first whose needles all occur in
/// the prompt wins. Unmatched prompts get an API error.
#[derive(Default)]
pub(crate) struct ScriptedProvider {
    rules: Vec<(Vec<String>, Reply)>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn rule(mut self, needles: &[&str], reply: Reply) -> Self {
        self.rules
            .push((needles.iter().map(|n| n.to_string()).collect(), reply));
        self
    }

    pub(crate) fn reply(self, needle: &str, text: impl Into<String>) -> Self {
        self.rule(&[needle], Reply::Text(text.into()))
    }

    pub(crate) fn fail(self, needle: &str) -> Self {
        self.rule(&[needle], Reply::Error("scripted failure".into()))
    }

    pub(crate) fn panic_on(self, needle: &str) -> Self {
        self.rule(&[needle], Reply::Panic)
    }

    pub(crate) fn delay(self, needle: &str, after: Duration, text: impl Into<String>) -> Self {
        self.rule(&[needle], Reply::Delay(after, text.into()))
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    fn pick(&self, prompt: &str) -> Option<Reply> {
        self.rules
            .iter()
            .find(|(needles, _)| needles.iter().all(|n| prompt.contains(n.as_str())))
            .map(|(_, reply)| reply.clone())
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().push(prompt.clone());

        let content = match self.pick(&prompt) {
            Some(Reply::Text(text)) => text,
            Some(Reply::Delay(after, text)) => {
                tokio::time::sleep(after).await;
                text
            }
            Some(Reply::Error(message)) => {
                return Err(ProviderError::ApiError {
                    status: 500,
                    message,
                })
            }
            Some(Reply::Panic) => panic!("scripted provider panic"),
            None => {
                return Err(ProviderError::ApiError {
                    status: 404,
                    message: "no scripted reply".into(),
                })
            }
        };

        Ok(CompletionResponse {
            usage: TokenUsage {
                prompt_tokens: self.estimate_tokens(&prompt),
                completion_tokens: self.estimate_tokens(&content),
                ..Default::default()
            },
            content,
            model: config.model.clone(),
            stop_reason: Some("end_turn".into()),
        })
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
