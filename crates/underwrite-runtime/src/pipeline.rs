//! End-to-end compliance evaluation.
//!
//! ```text
//! policy text ─► CheckExtractor ─► checks ─┐
//!                                          ▼
//! document ─► DocumentClassifier ─► partition ─► DataExtractor ─► DataContext
//!                                                                     │
//!                      Aggregator ◄─ EvaluationCoordinator ◄──────────┘
//! ```
//!
//! Each call to [`CompliancePipeline::evaluate`] owns a fresh budget
//! tracker, data context and set of agents. Only the extraction cache is
//! shared between runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use underwrite_core::{
    Aggregator, Assessment, Check, CheckResult, Chunker, Classification, DataContext,
    ExtractionMetadata, FieldMap, SkippedCheck,
};

use crate::agents::{AgentDeps, AgentRegistry};
use crate::cache::ExtractionCache;
use crate::classifier::DocumentClassifier;
use crate::collaborators::{GraphContext, NoGraph};
use crate::config::RuntimeConfig;
use crate::coordinator::EvaluationCoordinator;
use crate::data_extractor::DataExtractor;
use crate::extractor::{CheckExtractor, ExtractionOutcome};
use crate::inference::Inference;
use crate::providers::{LlmProvider, ProviderRegistry};
use crate::resilience::{BudgetTracker, LlmUsage};
use crate::RuntimeError;

/// A document to evaluate against a set of checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub document_text: String,
    pub checks: Vec<Check>,
    /// Values supplied by the applicant; these win over document values
    #[serde(default)]
    pub applicant_fields: FieldMap,
}

/// Where the evaluated values came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSources {
    pub document_fields: Vec<String>,
    pub applicant_fields: Vec<String>,
    /// Present in both; the applicant value was used
    pub override_fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplianceReport {
    pub assessment: Assessment,
    pub results: Vec<CheckResult>,
    pub skipped: Vec<SkippedCheck>,
    pub classification: Classification,
    pub data_sources: DataSources,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_metadata: Option<ExtractionMetadata>,
    pub usage: LlmUsage,
    pub evaluated_at: DateTime<Utc>,
}

pub struct CompliancePipeline {
    config: RuntimeConfig,
    inference: Inference,
    graph: Arc<dyn GraphContext>,
    cache: Option<Arc<ExtractionCache>>,
}

impl CompliancePipeline {
    pub fn new(provider: Arc<dyn LlmProvider>, config: RuntimeConfig) -> Self {
        let inference = Inference::new(provider, config.completion.clone());
        let cache = config
            .cache
            .enabled
            .then(|| Arc::new(ExtractionCache::from_config(&config.cache)));
        Self {
            config,
            inference,
            graph: Arc::new(NoGraph),
            cache,
        }
    }

    /// Build the provider named in `config` from the default registry.
    pub fn from_config(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        let registry = ProviderRegistry::with_defaults();
        let provider = registry.create(&config.provider.kind, &config.provider.settings)?;
        tracing::info!(
            provider = %config.provider.kind,
            model = %config.completion.model,
            "Compliance pipeline configured"
        );
        Ok(Self::new(provider, config))
    }

    pub fn with_graph(mut self, graph: Arc<dyn GraphContext>) -> Self {
        self.graph = graph;
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&ExtractionCache> {
        self.cache.as_deref()
    }

    fn run_inference(&self) -> Inference {
        self.inference
            .for_run(BudgetTracker::from_config(&self.config.budget))
    }

    /// Extract the checks stated in a policy document.
    pub async fn extract_checks(
        &self,
        policy_text: &str,
        domain_hint: Option<&str>,
    ) -> Result<ExtractionOutcome, RuntimeError> {
        let extractor = CheckExtractor::new(
            self.run_inference(),
            Chunker::new(self.config.chunker.clone()),
        );
        let extractor = match &self.cache {
            Some(cache) => extractor.with_cache(cache.clone()),
            None => extractor.without_cache(),
        };
        Ok(extractor.extract_document(policy_text, domain_hint).await?)
    }

    /// Evaluate a document against `request.checks`.
    ///
    /// Never fails as a whole: classification, data extraction and agent
    /// failures all degrade into fields of the report.
    pub async fn evaluate(&self, request: EvaluationRequest) -> ComplianceReport {
        let inference = self.run_inference();
        let EvaluationRequest {
            document_text,
            checks,
            applicant_fields,
        } = request;

        let classifier = DocumentClassifier::new(inference.clone(), self.config.relevance.clone());
        let classification = classifier.classify(&document_text).await;
        let (applicable, skipped) = classifier.partition(&classification, checks);

        let wanted = required_fields(&applicable);
        let document = if applicable.is_empty() {
            Default::default()
        } else {
            DataExtractor::new(inference.clone())
                .extract(&document_text, &wanted)
                .await
        };

        let context = Arc::new(
            DataContext::builder()
                .document_fields(document.fields)
                .applicant_fields(applicant_fields)
                .extraction_metadata(document.metadata)
                .document_category(classification.category)
                .build(),
        );
        let data_sources = DataSources {
            document_fields: context.document_fields(),
            applicant_fields: context.applicant_fields(),
            override_fields: context.overridden_fields(),
        };
        if !data_sources.override_fields.is_empty() {
            tracing::info!(fields = ?data_sources.override_fields, "Applicant values override document values");
        }

        let deps = AgentDeps::new(inference.clone()).with_graph(self.graph.clone());
        let coordinator =
            EvaluationCoordinator::new(AgentRegistry::builtins(deps), self.config.coordinator.clone());
        let results = coordinator.run(applicable, context.clone()).await;

        let assessment = Aggregator::new(self.config.aggregation.clone()).aggregate(&results);
        tracing::info!(
            status = ?assessment.status,
            decision = ?assessment.decision,
            evaluated = results.len(),
            skipped = skipped.len(),
            "Evaluation complete"
        );

        ComplianceReport {
            assessment,
            results,
            skipped,
            classification,
            data_sources,
            extraction_metadata: context.extraction_metadata().cloned(),
            usage: inference.usage(),
            evaluated_at: Utc::now(),
        }
    }
}

/// Union of every check's fields, first-seen order.
fn required_fields(checks: &[Check]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    checks
        .iter()
        .flat_map(|c| c.required_fields())
        .filter(|f| seen.insert(f.clone()))
        .collect()
}
