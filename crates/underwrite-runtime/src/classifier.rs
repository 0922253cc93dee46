//! Document classification and check relevance filtering.
//!
//! The model proposes a category; keyword scores from the core can
//! override a weak answer and stand in entirely when the model call fails.
//! Classification only decides which checks run, never how they are judged.

use thiserror::Error;

use underwrite_core::schema::SchemaKind;
use underwrite_core::{
    Check, Classification, DocumentCategory, RelevanceConfig, RelevanceScorer, SkippedCheck,
};

use crate::inference::{Inference, InferenceError, Stage};
use crate::prompts::{classification_prompt, CLASSIFICATION_SYSTEM};
use crate::response::{parse_response, ClassificationResponse, ResponseError};

#[derive(Error, Debug)]
enum ClassifyError {
    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Response(#[from] ResponseError),
}

pub struct DocumentClassifier {
    inference: Inference,
    scorer: RelevanceScorer,
}

impl DocumentClassifier {
    pub fn new(inference: Inference, config: RelevanceConfig) -> Self {
        Self {
            inference,
            scorer: RelevanceScorer::new(config),
        }
    }

    pub fn scorer(&self) -> &RelevanceScorer {
        &self.scorer
    }

    /// Classify a document. Never fails: falls back to keywords.
    pub async fn classify(&self, text: &str) -> Classification {
        if text.trim().is_empty() {
            return Classification::unknown();
        }

        match self.classify_with_model(text).await {
            Ok(response) => {
                let category = DocumentCategory::from(response.category);
                let classification =
                    self.scorer
                        .combine(category, response.confidence, response.purpose, text);
                tracing::info!(
                    category = %classification.category,
                    confidence = classification.confidence,
                    method = ?classification.method,
                    "Document classified"
                );
                classification
            }
            Err(e) => {
                tracing::warn!(error = %e, "Model classification failed, using keyword scores");
                self.scorer.classify_by_keywords(text)
            }
        }
    }

    /// Split checks into those to evaluate and those skipped, with reasons.
    pub fn partition(
        &self,
        classification: &Classification,
        checks: Vec<Check>,
    ) -> (Vec<Check>, Vec<SkippedCheck>) {
        self.scorer.partition(classification, checks)
    }

    async fn classify_with_model(&self, text: &str) -> Result<ClassificationResponse, ClassifyError> {
        let reply = self
            .inference
            .infer(
                Stage::Classification,
                CLASSIFICATION_SYSTEM,
                &classification_prompt(text),
            )
            .await?;
        Ok(parse_response(&reply, SchemaKind::Classification)?)
    }
}
