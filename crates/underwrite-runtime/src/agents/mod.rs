//! Check agents.
//!
//! One agent per [`CheckKind`]. An agent receives a single check and the
//! [`FieldView`] holding only that check's fields, and returns exactly one
//! [`CheckResult`]. Failures come back as [`AgentError`]; the coordinator
//! turns them into `error` results.
//!
//! # Isolation Contract
//! - No agent sees another check's field values
//! - No shared mutable state between agents
//! - Numeric limits are compared deterministically, never by the model

mod applicability;
mod judgement;
mod registry;
mod score;
mod threshold;

pub use applicability::resolve_missing;
pub use judgement::{CriteriaAgent, GenericAgent, QualitativeAgent};
pub use registry::{AgentBuilder, AgentRegistry};
pub use score::ScoreAgent;
pub use threshold::ThresholdAgent;

use threshold::compare_explicit;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use underwrite_core::{Check, CheckKind, CheckResult, FieldView, FormulaError};

use crate::collaborators::{GraphContext, NoGraph};
use crate::inference::{Inference, InferenceError};
use crate::response::ResponseError;

/// Errors from check agents.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Model call failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("Invalid model reply: {0}")]
    InvalidResponse(#[from] ResponseError),

    #[error("Formula evaluation failed: {0}")]
    Formula(#[from] FormulaError),

    #[error("Field {field} is not numeric")]
    NonNumeric { field: String },
}

/// What every agent is built from.
#[derive(Clone)]
pub struct AgentDeps {
    pub inference: Inference,
    pub graph: Arc<dyn GraphContext>,
}

impl AgentDeps {
    pub fn new(inference: Inference) -> Self {
        Self {
            inference,
            graph: Arc::new(NoGraph),
        }
    }

    pub fn with_graph(mut self, graph: Arc<dyn GraphContext>) -> Self {
        self.graph = graph;
        self
    }

    /// Linked requirements for `check`. A failing graph only costs context.
    pub(crate) async fn linked(&self, check: &Check) -> Vec<String> {
        match self.graph.linked_requirements(check).await {
            Ok(linked) => linked,
            Err(e) => {
                tracing::warn!(check_id = %check.id, error = %e, "Graph lookup failed, continuing without links");
                Vec::new()
            }
        }
    }
}

impl fmt::Debug for AgentDeps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentDeps")
            .field("inference", &self.inference)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait CheckAgent: Send + Sync {
    /// The check kind this agent evaluates.
    fn kind(&self) -> CheckKind;

    fn deps(&self) -> &AgentDeps;

    /// Kind-specific evaluation. Only called with a complete view and a
    /// check without an explicit threshold.
    async fn judge(&self, check: &Check, view: &FieldView) -> Result<CheckResult, AgentError>;

    /// Evaluate one check.
    ///
    /// Missing fields never reach [`CheckAgent::judge`]: they go through
    /// the applicability sub-check instead, which decides between
    /// `not_applicable` and a missing-data failure. A check carrying an
    /// explicit threshold is compared here, whatever its kind.
    async fn evaluate(&self, check: &Check, view: &FieldView) -> Result<CheckResult, AgentError> {
        if !view.is_complete() {
            return Ok(resolve_missing(&self.deps().inference, check, view).await);
        }
        if let Some(threshold) = &check.threshold {
            return compare_explicit(check, threshold, view);
        }
        self.judge(check, view).await
    }
}

/// Value of `check.formula` over the view.
pub(crate) fn compute_formula(formula: &str, view: &FieldView) -> Result<f64, AgentError> {
    Ok(underwrite_core::formula::evaluate(formula, |name| view.number(name))?)
}

/// The number a threshold compares against: the formula's value when there
/// is one, otherwise the threshold field (or the sole data field).
pub(crate) fn measured_value(check: &Check, field: &str, view: &FieldView) -> Result<f64, AgentError> {
    if let Some(formula) = &check.formula {
        return compute_formula(formula, view);
    }
    let field = if view.get(field).is_some() {
        field
    } else {
        match check.data_fields.as_slice() {
            [only] => only.as_str(),
            _ => field,
        }
    };
    view.number(field).ok_or_else(|| AgentError::NonNumeric {
        field: field.to_string(),
    })
}
