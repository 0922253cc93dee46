//! Per-check evaluation results.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::check::{Check, CheckKind, Priority};

/// Outcome of evaluating one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Failed,
    /// The check does not apply to this document
    NotApplicable,
    /// The evaluator itself failed; the check was not judged
    Error,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Passed => "passed",
            CheckStatus::Failed => "failed",
            CheckStatus::NotApplicable => "not_applicable",
            CheckStatus::Error => "error",
        }
    }

    /// Passed or failed: the check reached a judgement.
    pub fn is_judged(&self) -> bool {
        matches!(self, CheckStatus::Passed | CheckStatus::Failed)
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check_id: String,
    #[serde(default)]
    pub check_name: String,
    pub kind: CheckKind,
    pub priority: Priority,
    pub status: CheckStatus,
    /// None for `error` results
    #[serde(default)]
    pub confidence: Option<f64>,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_value: Option<f64>,
}

impl CheckResult {
    fn base(check: &Check, status: CheckStatus, confidence: Option<f64>, reason: String) -> Self {
        Self {
            check_id: check.id.clone(),
            check_name: check.display_name().to_string(),
            kind: check.kind,
            priority: check.priority,
            status,
            confidence: confidence.map(|c| if c.is_nan() { 0.0 } else { c.clamp(0.0, 1.0) }),
            reason,
            missing_fields: Vec::new(),
            calculation: None,
            actual_value: None,
            threshold_value: None,
        }
    }

    pub fn passed(check: &Check, confidence: f64, reason: impl Into<String>) -> Self {
        Self::base(check, CheckStatus::Passed, Some(confidence), reason.into())
    }

    pub fn failed(check: &Check, confidence: f64, reason: impl Into<String>) -> Self {
        Self::base(check, CheckStatus::Failed, Some(confidence), reason.into())
    }

    pub fn judged(check: &Check, passed: bool, confidence: f64, reason: impl Into<String>) -> Self {
        if passed {
            Self::passed(check, confidence, reason)
        } else {
            Self::failed(check, confidence, reason)
        }
    }

    pub fn not_applicable(
        check: &Check,
        confidence: f64,
        reason: impl Into<String>,
        missing: Vec<String>,
    ) -> Self {
        Self {
            missing_fields: missing,
            ..Self::base(check, CheckStatus::NotApplicable, Some(confidence), reason.into())
        }
    }

    /// Failure because required data is absent.
    pub fn missing_data(check: &Check, missing: Vec<String>) -> Self {
        let reason = format!("Missing required data: {}", missing.join(", "));
        Self {
            missing_fields: missing,
            ..Self::base(check, CheckStatus::Failed, Some(1.0), reason)
        }
    }

    /// The evaluator failed. Carries the check's id and priority, no confidence.
    pub fn error(check: &Check, reason: impl Into<String>) -> Self {
        Self::base(check, CheckStatus::Error, None, reason.into())
    }

    pub fn with_calculation(mut self, calculation: impl Into<String>) -> Self {
        self.calculation = Some(calculation.into());
        self
    }

    pub fn with_values(mut self, actual: f64, threshold: f64) -> Self {
        self.actual_value = Some(actual);
        self.threshold_value = Some(threshold);
        self
    }
}
