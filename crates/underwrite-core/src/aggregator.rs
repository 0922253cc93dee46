//! Aggregator: folds per-check results into one assessment.
//!
//! Decision rules, applied in order:
//! 1. Any failed critical check → DENY
//! 2. More than `max_high_failures` failed high checks → DENY
//! 3. Any failed high check → MANUAL_REVIEW
//! 4. Any failed medium/low check → APPROVE_WITH_CONDITIONS
//! 5. Otherwise → APPROVE
//!
//! `not_applicable` and `error` results never count as failures. A run in
//! which nothing reached a judgement is inconclusive and goes to manual
//! review. The output does not depend on the order of the input.

use serde::{Deserialize, Serialize};

use crate::check::{CheckKind, Priority};
use crate::result::{CheckResult, CheckStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    Pass,
    PassWithConditions,
    ReviewRequired,
    FailHighPriority,
    FailCritical,
    Inconclusive,
    NoChecksEvaluated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approve,
    ApproveWithConditions,
    ManualReview,
    Deny,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub not_applicable: usize,
    pub errors: usize,
    /// passed / (passed + failed); 0 when nothing was judged
    pub pass_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureBreakdown {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// One result surfaced in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub check_id: String,
    pub check_name: String,
    pub reason: String,
}

impl From<&CheckResult> for Issue {
    fn from(result: &CheckResult) -> Self {
        Self {
            check_id: result.check_id.clone(),
            check_name: result.check_name.clone(),
            reason: result.reason.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub status: OverallStatus,
    pub decision: Decision,
    /// Mean confidence over results that carry one
    pub confidence: f64,
    pub statistics: Statistics,
    pub failure_breakdown: FailureBreakdown,
    pub critical_issues: Vec<Issue>,
    pub not_applicable: Vec<Issue>,
    pub errors: Vec<Issue>,
    pub recommendations: Vec<String>,
    pub next_steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// High-priority failures tolerated before the decision becomes DENY
    pub max_high_failures: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_high_failures: 2,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    config: AggregatorConfig,
}

impl Aggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    pub fn aggregate(&self, results: &[CheckResult]) -> Assessment {
        // Canonical order makes every derived list and the float sum
        // independent of completion order.
        let mut sorted: Vec<&CheckResult> = results.iter().collect();
        sorted.sort_by(|a, b| {
            a.check_id
                .cmp(&b.check_id)
                .then_with(|| a.status.as_str().cmp(b.status.as_str()))
                .then_with(|| a.reason.cmp(&b.reason))
                .then_with(|| a.priority.cmp(&b.priority))
                .then_with(|| a.kind.cmp(&b.kind))
                .then_with(|| a.check_name.cmp(&b.check_name))
                .then_with(|| {
                    let (x, y) = (a.confidence.unwrap_or(-1.0), b.confidence.unwrap_or(-1.0));
                    x.total_cmp(&y)
                })
        });

        let by_status = |status: CheckStatus| -> Vec<&CheckResult> {
            sorted.iter().copied().filter(|r| r.status == status).collect()
        };
        let failures = by_status(CheckStatus::Failed);
        let passed = by_status(CheckStatus::Passed).len();
        let not_applicable = by_status(CheckStatus::NotApplicable);
        let errors = by_status(CheckStatus::Error);

        let failed_at = |priority: Priority| -> Vec<&CheckResult> {
            failures
                .iter()
                .copied()
                .filter(|r| r.priority == priority)
                .collect()
        };
        let critical = failed_at(Priority::Critical);
        let high = failed_at(Priority::High);
        let medium = failed_at(Priority::Medium);
        let low = failed_at(Priority::Low);

        let judged = passed + failures.len();
        let statistics = Statistics {
            total: sorted.len(),
            passed,
            failed: failures.len(),
            not_applicable: not_applicable.len(),
            errors: errors.len(),
            pass_rate: if judged > 0 {
                passed as f64 / judged as f64
            } else {
                0.0
            },
        };

        let (status, decision) = if sorted.is_empty() {
            (OverallStatus::NoChecksEvaluated, Decision::ManualReview)
        } else if !critical.is_empty() {
            (OverallStatus::FailCritical, Decision::Deny)
        } else if high.len() > self.config.max_high_failures {
            (OverallStatus::FailHighPriority, Decision::Deny)
        } else if !high.is_empty() {
            (OverallStatus::ReviewRequired, Decision::ManualReview)
        } else if !medium.is_empty() || !low.is_empty() {
            (OverallStatus::PassWithConditions, Decision::ApproveWithConditions)
        } else if judged == 0 {
            (OverallStatus::Inconclusive, Decision::ManualReview)
        } else {
            (OverallStatus::Pass, Decision::Approve)
        };

        let confidences: Vec<f64> = sorted.iter().filter_map(|r| r.confidence).collect();
        let confidence = if confidences.is_empty() {
            0.0
        } else {
            confidences.iter().sum::<f64>() / confidences.len() as f64
        };

        let recommendations = recommendations(&critical, &high, medium.len() + low.len(), &errors);
        let next_steps = next_steps(decision, status, !critical.is_empty());

        tracing::debug!(
            ?status,
            ?decision,
            passed,
            failed = failures.len(),
            "Aggregated check results"
        );

        Assessment {
            status,
            decision,
            confidence,
            statistics,
            failure_breakdown: FailureBreakdown {
                critical: critical.len(),
                high: high.len(),
                medium: medium.len(),
                low: low.len(),
            },
            critical_issues: critical.iter().map(|r| Issue::from(*r)).collect(),
            not_applicable: not_applicable.iter().map(|r| Issue::from(*r)).collect(),
            errors: errors.iter().map(|r| Issue::from(*r)).collect(),
            recommendations,
            next_steps,
        }
    }
}

/// Aggregate with default configuration.
pub fn aggregate(results: &[CheckResult]) -> Assessment {
    Aggregator::default().aggregate(results)
}

fn kind_hint(result: &CheckResult) -> Option<String> {
    match result.kind {
        CheckKind::Threshold | CheckKind::Score => {
            Some(format!("Review threshold calculations for {}", result.check_id))
        }
        CheckKind::Criteria => Some(format!(
            "Obtain required documentation for {}",
            result.check_id
        )),
        _ => None,
    }
}

fn recommendations(
    critical: &[&CheckResult],
    high: &[&CheckResult],
    lower_failures: usize,
    errors: &[&CheckResult],
) -> Vec<String> {
    let mut out = Vec::new();

    if !critical.is_empty() {
        out.push("Address all critical policy violations before proceeding".to_string());
        out.extend(critical.iter().filter_map(|r| kind_hint(r)));
    }

    if !high.is_empty() {
        out.push("Review high-priority policy requirements".to_string());
        out.extend(high.iter().filter_map(|r| kind_hint(r)));
        if high.len() > 1 {
            out.push("Consider if compensating factors can address multiple issues".to_string());
        }
    }

    if lower_failures > 0 {
        out.push("Monitor warning conditions during loan lifecycle".to_string());
    }

    if !errors.is_empty() {
        let ids: Vec<&str> = errors.iter().map(|r| r.check_id.as_str()).collect();
        out.push(format!(
            "Re-run checks that could not be evaluated: {}",
            ids.join(", ")
        ));
    }

    out
}

fn next_steps(decision: Decision, status: OverallStatus, has_critical: bool) -> Vec<String> {
    let steps: &[&str] = match (decision, status) {
        (Decision::Deny, _) if has_critical => &[
            "Document denial reasons",
            "Provide adverse action notice if required",
            "Inform applicant of specific policy violations",
        ],
        (Decision::Deny, _) => &[
            "Document denial reasons",
            "Provide adverse action notice if required",
        ],
        (Decision::ManualReview, OverallStatus::Inconclusive)
        | (Decision::ManualReview, OverallStatus::NoChecksEvaluated) => &[
            "Escalate to senior underwriter",
            "Collect missing data and re-run the evaluation",
        ],
        (Decision::ManualReview, _) => &[
            "Escalate to senior underwriter",
            "Review compensating factors",
            "Consider policy exceptions if applicable",
        ],
        (Decision::ApproveWithConditions, _) => &[
            "Document approval conditions",
            "Set up monitoring for warning conditions",
        ],
        (Decision::Approve, _) => &[
            "Proceed with standard approval process",
            "Document compliance verification",
        ],
    };
    steps.iter().map(|s| s.to_string()).collect()
}
