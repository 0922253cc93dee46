//! Scored checks.

use async_trait::async_trait;

use underwrite_core::{Check, CheckKind, CheckResult, FieldView};

use super::judgement::judge_with_model;
use super::{compute_formula, AgentDeps, AgentError, CheckAgent};

/// Scores with a known limit never get here; they are compared in
/// [`CheckAgent::evaluate`]. The model judges the rest, given the computed
/// score when a formula exists.
#[derive(Debug, Clone)]
pub struct ScoreAgent {
    deps: AgentDeps,
}

impl ScoreAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl CheckAgent for ScoreAgent {
    fn kind(&self) -> CheckKind {
        CheckKind::Score
    }

    fn deps(&self) -> &AgentDeps {
        &self.deps
    }

    async fn judge(&self, check: &Check, view: &FieldView) -> Result<CheckResult, AgentError> {
        match &check.formula {
            Some(formula) => {
                let value = compute_formula(formula, view)?;
                let result =
                    judge_with_model(&self.deps, check, view, &[], Some((formula.as_str(), value))).await?;
                Ok(result.with_calculation(format!("{formula} = {value}")))
            }
            None => judge_with_model(&self.deps, check, view, &[], None).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::{deps, view};
    use crate::testing::ScriptedProvider;
    use serde_json::json;
    use underwrite_core::{Bound, CheckStatus, Threshold};

    #[tokio::test]
    async fn test_score_with_threshold_is_deterministic() {
        let (deps, provider) = deps(ScriptedProvider::new());
        let check = Check::new("SC01", CheckKind::Score, "FICO score must be at least 620")
            .with_fields(["credit_score"])
            .with_threshold(Threshold {
                field: "credit_score".into(),
                bound: Bound::Lower,
                value: 620.0,
                inclusive: true,
                unit: None,
            });
        let view = view(json!({"credit_score": 612}), &["credit_score"]);

        let result = ScoreAgent::new(deps).evaluate(&check, &view).await.unwrap();

        assert_eq!(result.status, CheckStatus::Failed);
        assert!(result.reason.contains("612"));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_formula_value_goes_to_model() {
        let (deps, provider) = deps(ScriptedProvider::new().reply(
            "Check ID: SC02",
            r#"{"passed": true, "confidence": 0.85, "reason": "Reserves are adequate"}"#,
        ));
        let check = Check::new("SC02", CheckKind::Score, "Reserve coverage adequate for the loan")
            .with_fields(["reserves", "monthly_payment"])
            .with_formula("reserves / monthly_payment");
        let view = view(
            json!({"reserves": 12000, "monthly_payment": 2000}),
            &["reserves", "monthly_payment"],
        );

        let result = ScoreAgent::new(deps).evaluate(&check, &view).await.unwrap();

        assert_eq!(result.status, CheckStatus::Passed);
        assert_eq!(result.calculation.as_deref(), Some("reserves / monthly_payment = 6"));
        assert!(provider.prompts()[0].contains("Calculated value: reserves / monthly_payment = 6"));
    }

    #[tokio::test]
    async fn test_division_by_zero_is_error() {
        let (deps, _) = deps(ScriptedProvider::new());
        let check = Check::new("SC03", CheckKind::Score, "Coverage ratio")
            .with_fields(["reserves", "monthly_payment"])
            .with_formula("reserves / monthly_payment");
        let view = view(
            json!({"reserves": 12000, "monthly_payment": 0}),
            &["reserves", "monthly_payment"],
        );

        let err = ScoreAgent::new(deps).evaluate(&check, &view).await.unwrap_err();
        assert!(matches!(err, AgentError::Formula(_)));
    }
}
