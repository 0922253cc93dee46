//! The single path every model call takes.
//!
//! [`Inference`] pairs a provider with completion settings and the run's
//! [`BudgetTracker`]. Components never talk to a provider directly, so
//! every call is budget-checked and accounted to a [`Stage`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError};
use crate::resilience::{BudgetTracker, LlmUsage};

/// Pipeline stage a model call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extraction,
    Classification,
    DataExtraction,
    Applicability,
    Evaluation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extraction => "extraction",
            Stage::Classification => "classification",
            Stage::DataExtraction => "data_extraction",
            Stage::Applicability => "applicability",
            Stage::Evaluation => "evaluation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Token budget exhausted for {stage} stage")]
    BudgetExceeded { stage: Stage },
}

#[derive(Clone)]
pub struct Inference {
    provider: Arc<dyn LlmProvider>,
    completion: CompletionConfig,
    budget: Arc<BudgetTracker>,
}

impl fmt::Debug for Inference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inference")
            .field("provider", &self.provider.name())
            .field("model", &self.completion.model)
            .finish()
    }
}

impl Inference {
    /// Inference with an unlimited budget.
    pub fn new(provider: Arc<dyn LlmProvider>, completion: CompletionConfig) -> Self {
        Self {
            provider,
            completion,
            budget: Arc::new(BudgetTracker::unlimited()),
        }
    }

    pub fn with_budget(mut self, budget: Arc<BudgetTracker>) -> Self {
        self.budget = budget;
        self
    }

    /// Same provider and settings, accounted to a fresh tracker.
    pub fn for_run(&self, budget: BudgetTracker) -> Self {
        self.clone().with_budget(Arc::new(budget))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn completion(&self) -> &CompletionConfig {
        &self.completion
    }

    pub fn usage(&self) -> LlmUsage {
        self.budget.usage()
    }

    pub async fn health_check(&self) -> bool {
        self.provider.health_check().await
    }

    /// Send one system + user exchange and return the raw reply text.
    pub async fn infer(
        &self,
        stage: Stage,
        system: &str,
        prompt: &str,
    ) -> Result<String, InferenceError> {
        let estimated = self
            .provider
            .estimate_tokens(system)
            .saturating_add(self.provider.estimate_tokens(prompt));
        if !self.budget.can_afford(stage, estimated) {
            tracing::warn!(%stage, estimated, "Token budget exhausted");
            return Err(InferenceError::BudgetExceeded { stage });
        }

        let messages = vec![ChatMessage::system(system), ChatMessage::user(prompt)];
        let response = self.provider.complete(messages, &self.completion).await?;

        self.budget
            .record_usage(stage, &response.usage, &response.model);
        tracing::debug!(
            %stage,
            provider = self.provider.name(),
            model = %response.model,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            "Model call completed"
        );

        Ok(response.content)
    }
}
