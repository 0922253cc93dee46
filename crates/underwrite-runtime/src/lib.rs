//! # underwrite-runtime
//!
//! Model-assisted stages of policy compliance evaluation.
//!
//! `underwrite-core` decides everything that can be decided without a
//! model. This crate owns every inference call:
//! - Extracting checks from policy text, chunk by chunk, with an LRU cache
//! - Classifying the document and filtering checks by relevance
//! - Reading the needed field values out of the document
//! - Evaluating each check with an agent chosen by its kind
//!
//! ## Failure model
//!
//! A run never fails because one check did. Agent errors, timeouts and
//! panics become `error` results; a failed classification falls back to
//! keywords; a failed data extraction leaves the fields missing.
//!
//! ## Example
//!
//! ```rust,ignore
//! use underwrite_runtime::{CompliancePipeline, EvaluationRequest, RuntimeConfig};
//!
//! let pipeline = CompliancePipeline::from_config(RuntimeConfig::from_file("underwrite.yaml")?)?;
//! let outcome = pipeline.extract_checks(&policy_text, Some("mortgage")).await?;
//!
//! let report = pipeline
//!     .evaluate(EvaluationRequest {
//!         document_text: application_text,
//!         checks: outcome.checks,
//!         applicant_fields: Default::default(),
//!     })
//!     .await;
//! println!("{:?}", report.assessment.decision);
//! ```

use thiserror::Error;

pub mod agents;
pub mod cache;
pub mod classifier;
pub mod collaborators;
pub mod config;
pub mod coordinator;
pub mod data_extractor;
pub mod extractor;
pub mod inference;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod resilience;
pub mod response;

#[cfg(test)]
mod testing;

pub use agents::{AgentDeps, AgentError, AgentRegistry, CheckAgent};
pub use cache::ExtractionCache;
pub use classifier::DocumentClassifier;
pub use collaborators::{
    CheckStore, DocumentParser, GraphContext, JsonFileStore, NoGraph, ParsedDocument,
    PlainTextParser, StaticGraph,
};
pub use config::{ConfigError, RuntimeConfig};
pub use coordinator::{CoordinatorConfig, EvaluationCoordinator};
pub use data_extractor::{DataExtractor, DocumentData};
pub use extractor::{CheckExtractor, ExtractionError, ExtractionOutcome};
pub use inference::{Inference, InferenceError, Stage};
pub use pipeline::{ComplianceReport, CompliancePipeline, DataSources, EvaluationRequest};
pub use providers::{LlmProvider, ProviderError, ProviderRegistry};
pub use resilience::{BudgetTracker, LlmUsage};

/// Errors from the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Check extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Storage error: {0}")]
    Storage(#[from] collaborators::StorageError),

    #[error("Document parsing failed: {0}")]
    Parse(#[from] collaborators::ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_provider_is_config_error() {
        let mut config = RuntimeConfig::default();
        config.provider.kind = "nonexistent".into();

        let err = CompliancePipeline::from_config(config).err().unwrap();
        assert!(matches!(err, RuntimeError::Provider(ProviderError::NotConfigured(_))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = RuntimeConfig::default();
        config.coordinator.max_concurrency = 0;

        let err = CompliancePipeline::from_config(config).err().unwrap();
        assert!(matches!(err, RuntimeError::Config(ConfigError::Invalid(_))));
    }
}
