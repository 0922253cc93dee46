//! Per-run token budgets and usage accounting.
//!
//! A run owns one [`BudgetTracker`]. Every inference call checks the
//! global budget and its stage budget first and records its usage after.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::BudgetConfig;
use crate::inference::Stage;
use crate::providers::TokenUsage;

/// Token allowance for one scope.
pub struct TokenBudget {
    pub max_tokens: u32,
    used: AtomicU32,
}

impl TokenBudget {
    pub fn new(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            used: AtomicU32::new(0),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(u32::MAX)
    }

    pub fn can_afford(&self, tokens: u32) -> bool {
        self.remaining() >= tokens
    }

    pub fn record(&self, tokens: u32) {
        // Saturate rather than wrap for unlimited budgets.
        let _ = self
            .used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                Some(used.saturating_add(tokens))
            });
    }

    pub fn remaining(&self) -> u32 {
        self.max_tokens.saturating_sub(self.used())
    }

    pub fn used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }
}

/// Accumulated model usage for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub total_tokens: u32,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub llm_calls: u32,

    /// Estimated cost in USD
    pub estimated_cost: f64,

    /// Calls that read from the provider's prompt cache
    pub cache_hits: u32,
    pub cache_creation_tokens: u32,
    pub cache_read_tokens: u32,

    /// Total tokens per pipeline stage
    #[serde(default)]
    pub by_stage: BTreeMap<Stage, u32>,
}

impl LlmUsage {
    pub fn add(&mut self, stage: Stage, usage: &TokenUsage, model: &str) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens += usage.total();
        self.llm_calls += 1;
        self.cache_creation_tokens += usage.cache_creation_tokens;
        self.cache_read_tokens += usage.cache_read_tokens;
        if usage.cache_read_tokens > 0 {
            self.cache_hits += 1;
        }
        *self.by_stage.entry(stage).or_default() += usage.total();
        self.estimated_cost += Self::estimate_cost(usage, model);
    }

    fn estimate_cost(usage: &TokenUsage, model: &str) -> f64 {
        // USD per million tokens: input, output, cache write, cache read
        let (input_rate, output_rate, cache_write_rate, cache_read_rate) = match model {
            m if m.contains("sonnet") => (3.0, 15.0, 3.75, 0.3),
            m if m.contains("opus") => (5.0, 25.0, 6.25, 0.5),
            m if m.contains("haiku") => (1.0, 5.0, 1.25, 0.1),
            m if m.contains("gpt-4o-mini") => (0.15, 0.6, 0.0, 0.075),
            m if m.contains("gpt-4o") => (2.5, 10.0, 0.0, 1.25),
            _ => (3.0, 15.0, 3.75, 0.3),
        };

        let per_million = |tokens: u32, rate: f64| tokens as f64 / 1_000_000.0 * rate;
        per_million(usage.prompt_tokens, input_rate)
            + per_million(usage.completion_tokens, output_rate)
            + per_million(usage.cache_creation_tokens, cache_write_rate)
            + per_million(usage.cache_read_tokens, cache_read_rate)
    }
}

pub struct BudgetTracker {
    stage_budgets: BTreeMap<Stage, TokenBudget>,
    global_budget: TokenBudget,
    usage: RwLock<LlmUsage>,
}

impl BudgetTracker {
    pub fn new(global_max: Option<u32>, per_stage: &BTreeMap<Stage, u32>) -> Self {
        Self {
            stage_budgets: per_stage
                .iter()
                .map(|(stage, max)| (*stage, TokenBudget::new(*max)))
                .collect(),
            global_budget: global_max.map_or_else(TokenBudget::unlimited, TokenBudget::new),
            usage: RwLock::new(LlmUsage::default()),
        }
    }

    pub fn from_config(config: &BudgetConfig) -> Self {
        Self::new(config.global_max_tokens, &config.per_stage)
    }

    pub fn unlimited() -> Self {
        Self::new(None, &BTreeMap::new())
    }

    /// Whether a call estimated at `estimated_tokens` fits both budgets.
    pub fn can_afford(&self, stage: Stage, estimated_tokens: u32) -> bool {
        let stage_ok = self
            .stage_budgets
            .get(&stage)
            .map_or(true, |b| b.can_afford(estimated_tokens));
        stage_ok && self.global_budget.can_afford(estimated_tokens)
    }

    pub fn record_usage(&self, stage: Stage, usage: &TokenUsage, model: &str) {
        let total = usage.total();
        if let Some(budget) = self.stage_budgets.get(&stage) {
            budget.record(total);
        }
        self.global_budget.record(total);
        self.usage.write().add(stage, usage, model);
    }

    pub fn usage(&self) -> LlmUsage {
        self.usage.read().clone()
    }

    pub fn remaining_global(&self) -> u32 {
        self.global_budget.remaining()
    }

    /// Remaining tokens for `stage`; `None` when the stage has no limit.
    pub fn remaining_stage(&self, stage: Stage) -> Option<u32> {
        self.stage_budgets.get(&stage).map(TokenBudget::remaining)
    }
}

impl Default for BudgetTracker {
    fn default() -> Self {
        Self::unlimited()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(prompt: u32, completion: u32) -> TokenUsage {
        TokenUsage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            ..Default::default()
        }
    }

    #[test]
    fn test_budget_enforcement() {
        let budget = TokenBudget::new(100);
        assert!(budget.can_afford(100));
        assert!(!budget.can_afford(101));

        budget.record(60);
        assert_eq!(budget.remaining(), 40);
        assert!(!budget.can_afford(50));
    }

    #[test]
    fn test_unlimited_budget_saturates() {
        let budget = TokenBudget::unlimited();
        budget.record(u32::MAX);
        budget.record(10);
        assert_eq!(budget.used(), u32::MAX);
    }

    #[test]
    fn test_stage_and_global_limits() {
        let per_stage = BTreeMap::from([(Stage::Evaluation, 100)]);
        let tracker = BudgetTracker::new(Some(500), &per_stage);

        tracker.record_usage(Stage::Evaluation, &usage(30, 20), "claude-sonnet-4-5");

        assert_eq!(tracker.remaining_stage(Stage::Evaluation), Some(50));
        assert_eq!(tracker.remaining_stage(Stage::Extraction), None);
        assert_eq!(tracker.remaining_global(), 450);
        assert!(!tracker.can_afford(Stage::Evaluation, 60));
        assert!(tracker.can_afford(Stage::Extraction, 400));
        assert!(!tracker.can_afford(Stage::Extraction, 451));
    }

    #[test]
    fn test_usage_by_stage() {
        let tracker = BudgetTracker::unlimited();
        tracker.record_usage(Stage::Extraction, &usage(1000, 500), "claude-sonnet-4-5");
        tracker.record_usage(Stage::Evaluation, &usage(200, 50), "claude-sonnet-4-5");

        let usage = tracker.usage();
        assert_eq!(usage.llm_calls, 2);
        assert_eq!(usage.total_tokens, 1750);
        assert_eq!(usage.by_stage[&Stage::Extraction], 1500);
        // 1000 * $3/M + 500 * $15/M = $0.0105, plus the small second call
        assert!(usage.estimated_cost > 0.0105 && usage.estimated_cost < 0.02);
    }
}
