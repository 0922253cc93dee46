//! Missing-field triage.

use underwrite_core::schema::SchemaKind;
use underwrite_core::{Check, CheckResult, FieldView};

use crate::inference::{Inference, Stage};
use crate::prompts::{applicability_prompt, APPLICABILITY_SYSTEM};
use crate::response::{parse_response, ApplicabilityResponse};

const NOT_APPLICABLE_CONFIDENCE: f64 = 0.95;

/// Decide what missing fields mean for `check`.
///
/// The model judges whether the fields are structurally inapplicable to
/// this document (`not_applicable`) or simply absent (missing-data
/// failure). If the call or its reply fails, the fields count as missing.
pub async fn resolve_missing(inference: &Inference, check: &Check, view: &FieldView) -> CheckResult {
    let missing = view.missing.clone();
    let prompt = applicability_prompt(check, view);

    let verdict = match inference
        .infer(Stage::Applicability, APPLICABILITY_SYSTEM, &prompt)
        .await
    {
        Ok(text) => parse_response::<ApplicabilityResponse>(&text, SchemaKind::Applicability)
            .map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    match verdict {
        Ok(reply) if !reply.applicable => {
            tracing::debug!(check_id = %check.id, missing = ?missing, "Check not applicable to document");
            CheckResult::not_applicable(
                check,
                NOT_APPLICABLE_CONFIDENCE,
                format!("Check not applicable: {}", reply.reason),
                missing,
            )
        }
        Ok(_) => CheckResult::missing_data(check, missing),
        Err(error) => {
            tracing::warn!(check_id = %check.id, %error, "Applicability check failed, treating fields as missing");
            CheckResult::missing_data(check, missing)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::{deps, view};
    use serde_json::json;
    use underwrite_core::{CheckKind, CheckStatus};

    use crate::testing::ScriptedProvider;

    fn check() -> Check {
        Check::new("CR03", CheckKind::Criteria, "Combined LTV including home equity loan below 90%")
            .with_fields(["ltv_ratio", "home_equity_loan_amount"])
    }

    #[tokio::test]
    async fn test_inapplicable_field_is_not_applicable() {
        let (deps, provider) = deps(ScriptedProvider::new().reply(
            "TASK: applicability",
            r#"{"applicable": false, "reason": "No home equity loan on a primary mortgage"}"#,
        ));
        let view = view(json!({"ltv_ratio": 90.59}), &["ltv_ratio", "home_equity_loan_amount"]);

        let result = resolve_missing(&deps.inference, &check(), &view).await;

        assert_eq!(result.status, CheckStatus::NotApplicable);
        assert_eq!(result.missing_fields, vec!["home_equity_loan_amount"]);
        assert!(result.reason.starts_with("Check not applicable: No home equity"));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_applicable_field_is_missing_data() {
        let (deps, _) = deps(ScriptedProvider::new().reply(
            "TASK: applicability",
            r#"{"applicable": true, "reason": "Should have been provided"}"#,
        ));
        let view = view(json!({"ltv_ratio": 90.59}), &["ltv_ratio", "home_equity_loan_amount"]);

        let result = resolve_missing(&deps.inference, &check(), &view).await;

        assert_eq!(result.status, CheckStatus::Failed);
        assert_eq!(result.missing_fields, vec!["home_equity_loan_amount"]);
    }

    #[tokio::test]
    async fn test_failed_call_is_conservative() {
        let (deps, _) = deps(ScriptedProvider::new().fail("TASK: applicability"));
        let view = view(json!({}), &["ltv_ratio", "home_equity_loan_amount"]);

        let result = resolve_missing(&deps.inference, &check(), &view).await;

        assert_eq!(result.status, CheckStatus::Failed);
        assert_eq!(result.missing_fields.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_reply_is_conservative() {
        let (deps, _) = deps(
            ScriptedProvider::new().reply("TASK: applicability", r#"{"applicable": "no"}"#),
        );
        let view = view(json!({}), &["home_equity_loan_amount"]);

        let result = resolve_missing(&deps.inference, &check(), &view).await;
        assert_eq!(result.status, CheckStatus::Failed);
    }
}
