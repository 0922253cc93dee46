//! Numeric limit checks.

use async_trait::async_trait;

use underwrite_core::schema::SchemaKind;
use underwrite_core::{Check, CheckKind, CheckResult, FieldView, Threshold};

use super::{measured_value, AgentDeps, AgentError, CheckAgent};
use crate::inference::Stage;
use crate::prompts::{measurement_prompt, MEASUREMENT_SYSTEM};
use crate::response::{parse_response, MeasurementResponse};

/// Compares a measured value against a limit.
///
/// With an explicit threshold on the check no model call is made. Without
/// one the model reads the limit off the requirement. The measured value is
/// taken from the data when it is numeric there, and pass/fail is always
/// recomputed here.
#[derive(Debug, Clone)]
pub struct ThresholdAgent {
    deps: AgentDeps,
}

impl ThresholdAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }

    async fn measure(&self, check: &Check, view: &FieldView) -> Result<CheckResult, AgentError> {
        let linked = self.deps.linked(check).await;
        let prompt = measurement_prompt(check, view, &linked);
        let text = self
            .deps
            .inference
            .infer(Stage::Evaluation, MEASUREMENT_SYSTEM, &prompt)
            .await?;
        let reply: MeasurementResponse = parse_response(&text, SchemaKind::Measurement)?;

        let field = reply
            .field
            .clone()
            .or_else(|| check.data_fields.first().cloned())
            .unwrap_or_else(|| "value".to_string());
        // The model supplies the limit. The value comes from the data
        // whenever the data has it.
        let actual = match measured_value(check, &field, view) {
            Ok(value) => {
                if value != reply.actual_value {
                    tracing::warn!(
                        check_id = %check.id,
                        field = %field,
                        model_actual = reply.actual_value,
                        data_actual = value,
                        "Model read a different value than the data holds"
                    );
                }
                value
            }
            Err(_) => reply.actual_value,
        };
        let threshold = Threshold {
            field,
            bound: reply.bound,
            value: reply.threshold_value,
            inclusive: reply.inclusive,
            unit: reply.unit.clone(),
        };
        let cmp = threshold.compare(actual);

        if let Some(claimed) = reply.passed {
            if claimed != cmp.passed {
                tracing::warn!(
                    check_id = %check.id,
                    model_passed = claimed,
                    computed_passed = cmp.passed,
                    actual,
                    limit = reply.threshold_value,
                    "Model verdict disagrees with computed comparison"
                );
            }
        }

        let mut result = CheckResult::judged(check, cmp.passed, reply.confidence, cmp.reason)
            .with_values(cmp.actual, cmp.limit);
        if let Some(calculation) = reply.calculation {
            result = result.with_calculation(calculation);
        }
        Ok(result)
    }
}

/// Deterministic comparison against the check's own threshold.
pub(crate) fn compare_explicit(
    check: &Check,
    threshold: &Threshold,
    view: &FieldView,
) -> Result<CheckResult, AgentError> {
    let actual = measured_value(check, &threshold.field, view)?;
    let cmp = threshold.compare(actual);
    let mut result =
        CheckResult::judged(check, cmp.passed, 1.0, cmp.reason).with_values(cmp.actual, cmp.limit);
    if let Some(formula) = &check.formula {
        result = result.with_calculation(format!("{formula} = {actual}"));
    }
    Ok(result)
}

#[async_trait]
impl CheckAgent for ThresholdAgent {
    fn kind(&self) -> CheckKind {
        CheckKind::Threshold
    }

    fn deps(&self) -> &AgentDeps {
        &self.deps
    }

    async fn judge(&self, check: &Check, view: &FieldView) -> Result<CheckResult, AgentError> {
        self.measure(check, view).await
    }
}
