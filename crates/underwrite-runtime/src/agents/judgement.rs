//! Model-judged checks: criteria, qualitative and generic.

use async_trait::async_trait;

use underwrite_core::schema::SchemaKind;
use underwrite_core::{Check, CheckKind, CheckResult, FieldView};

use super::{AgentDeps, AgentError, CheckAgent};
use crate::inference::Stage;
use crate::prompts::{evaluation_prompt, EVALUATION_SYSTEM};
use crate::response::{parse_response, EvaluationResponse};

/// One pass/fail judgement from the model.
pub(crate) async fn judge_with_model(
    deps: &AgentDeps,
    check: &Check,
    view: &FieldView,
    linked: &[String],
    calculated: Option<(&str, f64)>,
) -> Result<CheckResult, AgentError> {
    let prompt = evaluation_prompt(check, view, linked, calculated);
    let text = deps
        .inference
        .infer(Stage::Evaluation, EVALUATION_SYSTEM, &prompt)
        .await?;
    let reply: EvaluationResponse = parse_response(&text, SchemaKind::Evaluation)?;

    let reason = if reply.findings.is_empty() {
        reply.reason
    } else {
        format!("{} Findings: {}", reply.reason, reply.findings.join("; "))
    };
    Ok(CheckResult::judged(check, reply.passed, reply.confidence, reason))
}

/// Conditions that hold or do not. Sees linked requirements.
#[derive(Debug, Clone)]
pub struct CriteriaAgent {
    deps: AgentDeps,
}

impl CriteriaAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl CheckAgent for CriteriaAgent {
    fn kind(&self) -> CheckKind {
        CheckKind::Criteria
    }

    fn deps(&self) -> &AgentDeps {
        &self.deps
    }

    async fn judge(&self, check: &Check, view: &FieldView) -> Result<CheckResult, AgentError> {
        let linked = self.deps.linked(check).await;
        judge_with_model(&self.deps, check, view, &linked, None).await
    }
}

#[derive(Debug, Clone)]
pub struct QualitativeAgent {
    deps: AgentDeps,
}

impl QualitativeAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl CheckAgent for QualitativeAgent {
    fn kind(&self) -> CheckKind {
        CheckKind::Qualitative
    }

    fn deps(&self) -> &AgentDeps {
        &self.deps
    }

    async fn judge(&self, check: &Check, view: &FieldView) -> Result<CheckResult, AgentError> {
        judge_with_model(&self.deps, check, view, &[], None).await
    }
}

/// Fallback for anything without a dedicated agent.
#[derive(Debug, Clone)]
pub struct GenericAgent {
    deps: AgentDeps,
}

impl GenericAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl CheckAgent for GenericAgent {
    fn kind(&self) -> CheckKind {
        CheckKind::Generic
    }

    fn deps(&self) -> &AgentDeps {
        &self.deps
    }

    async fn judge(&self, check: &Check, view: &FieldView) -> Result<CheckResult, AgentError> {
        judge_with_model(&self.deps, check, view, &[], None).await
    }
}
