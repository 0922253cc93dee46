//! Concurrent check evaluation.
//!
//! The coordinator fans checks out to one fresh agent each, bounded by a
//! semaphore, and fans their results back in. Every unique input check
//! yields exactly one [`CheckResult`]: agent errors, timeouts and panics
//! all become `error` results carrying the check's id and priority.

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use underwrite_core::check::requirement_hash;
use underwrite_core::{Check, CheckResult, DataContext};

use crate::agents::AgentRegistry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Agents running at once
    pub max_concurrency: usize,

    /// Wall-clock limit per agent, excluding time queued for a slot
    #[serde(with = "crate::config::duration_str")]
    pub agent_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            agent_timeout: Duration::from_secs(30),
        }
    }
}

pub struct EvaluationCoordinator {
    registry: AgentRegistry,
    config: CoordinatorConfig,
}

impl EvaluationCoordinator {
    pub fn new(registry: AgentRegistry, config: CoordinatorConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Drop repeats of the same id with the same requirement text.
    pub fn dedup(checks: Vec<Check>) -> Vec<Check> {
        let mut seen = BTreeSet::new();
        let mut unique = Vec::with_capacity(checks.len());
        for check in checks {
            let key = format!("{}:{:016x}", check.id, requirement_hash(&check.requirement));
            if seen.insert(key) {
                unique.push(check);
            } else {
                tracing::warn!(check_id = %check.id, "Skipping duplicate check");
            }
        }
        unique
    }

    /// Evaluate `checks` against the shared read-only `context`.
    ///
    /// Results come back in input order.
    pub async fn run(&self, checks: Vec<Check>, context: Arc<DataContext>) -> Vec<CheckResult> {
        let checks = Self::dedup(checks);
        if checks.is_empty() {
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let timeout = self.config.agent_timeout;
        let mut tasks = JoinSet::new();
        let mut pending: BTreeMap<usize, Check> = BTreeMap::new();

        tracing::info!(
            checks = checks.len(),
            max_concurrency = self.config.max_concurrency,
            "Dispatching checks"
        );

        for (index, check) in checks.into_iter().enumerate() {
            let agent = self.registry.create(&check);
            let view = context.view(&check.required_fields());
            let semaphore = semaphore.clone();
            pending.insert(index, check.clone());

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome =
                    AssertUnwindSafe(tokio::time::timeout(timeout, agent.evaluate(&check, &view)))
                        .catch_unwind()
                        .await;

                let result = match outcome {
                    Ok(Ok(Ok(result))) => result,
                    Ok(Ok(Err(e))) => {
                        tracing::warn!(check_id = %check.id, error = %e, "Agent evaluation failed");
                        CheckResult::error(&check, format!("Agent error: {e}"))
                    }
                    Ok(Err(_)) => {
                        tracing::warn!(check_id = %check.id, timeout = ?timeout, "Agent timed out");
                        CheckResult::error(
                            &check,
                            format!(
                                "Agent timed out after {}",
                                humantime::format_duration(timeout)
                            ),
                        )
                    }
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        tracing::warn!(check_id = %check.id, %message, "Agent panicked");
                        CheckResult::error(&check, format!("Agent panicked: {message}"))
                    }
                };
                (index, result)
            });
        }

        let mut results: BTreeMap<usize, CheckResult> = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    pending.remove(&index);
                    results.insert(index, result);
                }
                Err(e) => tracing::warn!(error = %e, "Agent task did not complete"),
            }
        }

        for (index, check) in pending {
            results.insert(
                index,
                CheckResult::error(&check, "Agent task was cancelled before producing a result"),
            );
        }

        let results: Vec<CheckResult> = results.into_values().collect();
        tracing::info!(results = results.len(), "Collected check results");
        results
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
