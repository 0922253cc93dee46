//! Check extraction from policy documents.
//!
//! Each chunk goes to the model once (or comes from the cache); per-chunk
//! results are merged and deduplicated by the core. A chunk whose call
//! fails or whose reply does not validate is dropped with a warning. The
//! extraction as a whole fails only when every chunk failed.

use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use underwrite_core::schema::SchemaKind;
use underwrite_core::{ensure_domain, infer_threshold, merge_checks, Check, CheckKind, Chunker};

use crate::cache::{CacheKey, ExtractionCache};
use crate::inference::{Inference, InferenceError, Stage};
use crate::prompts::{extraction_prompt, EXTRACTION_SYSTEM};
use crate::response::{parse_response, ExtractionResponse, PolicyMetadata, RawCheck, ResponseError};

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Document has no text to extract from")]
    EmptyDocument,

    #[error("All {chunks} chunks failed extraction (last error: {last_error})")]
    AllChunksFailed { chunks: usize, last_error: String },

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Response(#[from] ResponseError),
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    /// Merged, deduplicated checks in document order
    pub checks: Vec<Check>,
    pub chunks_total: usize,
    pub chunks_failed: usize,
    pub title: Option<String>,
    pub domain: Option<String>,
}

struct ChunkExtraction {
    checks: Vec<Check>,
    metadata: Option<PolicyMetadata>,
}

pub struct CheckExtractor {
    inference: Inference,
    chunker: Chunker,
    cache: Option<Arc<ExtractionCache>>,
    concurrency: usize,
}

impl CheckExtractor {
    pub fn new(inference: Inference, chunker: Chunker) -> Self {
        Self {
            inference,
            chunker,
            cache: Some(Arc::new(ExtractionCache::default())),
            concurrency: 4,
        }
    }

    pub fn with_cache(mut self, cache: Arc<ExtractionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    /// Chunks in flight at once. Results keep document order regardless.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn cache(&self) -> Option<&ExtractionCache> {
        self.cache.as_deref()
    }

    /// Checks stated in one chunk.
    pub async fn extract(
        &self,
        chunk: &str,
        domain_hint: Option<&str>,
    ) -> Result<Vec<Check>, ExtractionError> {
        Ok(self.extract_chunk(chunk, domain_hint).await?.checks)
    }

    /// Merge per-chunk results: first occurrence of each normalized
    /// requirement wins, colliding ids get a numeric suffix.
    pub fn merge(&self, batches: Vec<Vec<Check>>) -> Vec<Check> {
        merge_checks(batches)
    }

    /// Chunk `text`, extract every chunk and merge.
    pub async fn extract_document(
        &self,
        text: &str,
        domain_hint: Option<&str>,
    ) -> Result<ExtractionOutcome, ExtractionError> {
        let chunks = self.chunker.chunk(text);
        if chunks.is_empty() {
            return Err(ExtractionError::EmptyDocument);
        }
        tracing::info!(chunks = chunks.len(), "Extracting checks");

        let results: Vec<(usize, Result<ChunkExtraction, ExtractionError>)> =
            stream::iter(chunks.iter().enumerate())
                .map(|(idx, chunk)| async move {
                    (idx, self.extract_chunk(chunk, domain_hint).await)
                })
                .buffered(self.concurrency)
                .collect()
                .await;

        let mut outcome = ExtractionOutcome {
            chunks_total: chunks.len(),
            ..Default::default()
        };
        let mut batches = Vec::with_capacity(chunks.len());
        let mut last_error = None;

        for (idx, result) in results {
            match result {
                Ok(extraction) => {
                    if let Some(metadata) = extraction.metadata {
                        outcome.title = outcome.title.or(metadata.title);
                        outcome.domain = outcome.domain.or(metadata.domain);
                    }
                    batches.push(extraction.checks);
                }
                Err(e) => {
                    tracing::warn!(chunk = idx, error = %e, "Dropping chunk after failed extraction");
                    outcome.chunks_failed += 1;
                    last_error = Some(e.to_string());
                }
            }
        }

        if outcome.chunks_failed == outcome.chunks_total {
            return Err(ExtractionError::AllChunksFailed {
                chunks: outcome.chunks_total,
                last_error: last_error.unwrap_or_default(),
            });
        }

        let extracted: usize = batches.iter().map(Vec::len).sum();
        outcome.checks = self.merge(batches);
        tracing::info!(
            extracted,
            unique = outcome.checks.len(),
            chunks_failed = outcome.chunks_failed,
            "Check extraction complete"
        );
        Ok(outcome)
    }

    async fn extract_chunk(
        &self,
        chunk: &str,
        domain_hint: Option<&str>,
    ) -> Result<ChunkExtraction, ExtractionError> {
        let key = CacheKey::new(chunk, domain_hint);
        if let Some(cache) = &self.cache {
            if let Some(checks) = cache.get(&key).await {
                tracing::debug!(checks = checks.len(), "Extraction cache hit");
                return Ok(ChunkExtraction {
                    checks,
                    metadata: None,
                });
            }
        }

        let reply = self
            .inference
            .infer(
                Stage::Extraction,
                EXTRACTION_SYSTEM,
                &extraction_prompt(chunk, domain_hint),
            )
            .await?;
        let response: ExtractionResponse = parse_response(&reply, SchemaKind::Extraction)?;

        let checks = build_checks(response.checks, domain_hint);
        if let Some(cache) = &self.cache {
            cache.insert(key, checks.clone()).await;
        }

        Ok(ChunkExtraction {
            checks,
            metadata: response.policy_metadata,
        })
    }
}

/// Turn model output into checks: fill ids, domain, and a threshold
/// inferred from the requirement text when the model gave none.
fn build_checks(raw: Vec<RawCheck>, domain_hint: Option<&str>) -> Vec<Check> {
    let mut sequence: BTreeMap<CheckKind, usize> = BTreeMap::new();

    raw.into_iter()
        .map(|raw| {
            let seq = sequence.entry(raw.kind).or_insert(0);
            *seq += 1;
            let id = match raw.id.as_deref().map(str::trim) {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => format!("{}{:02}", raw.kind.id_prefix(), seq),
            };
            build_check(raw, id, domain_hint)
        })
        .collect()
}

fn build_check(raw: RawCheck, id: String, domain_hint: Option<&str>) -> Check {
    let mut check = Check::new(id, raw.kind, raw.requirement.trim())
        .with_name(raw.name)
        .with_description(raw.description)
        .with_fields(raw.data_fields)
        .with_priority(raw.priority)
        .with_products(raw.applicable_products);
    check.exceptions = raw.exceptions;
    check.formula = raw.formula.filter(|f| !f.trim().is_empty());
    check.threshold = raw.threshold;

    if let Some(domain) = domain_hint.map(str::trim).filter(|d| !d.is_empty()) {
        check.domain = domain.to_lowercase();
    }
    ensure_domain(&mut check);
    check.normalize_fields();

    if check.threshold.is_none() && matches!(check.kind, CheckKind::Threshold | CheckKind::Score)
    {
        if let Some(field) = threshold_field(&check) {
            check.threshold = infer_threshold(&check.requirement, &field);
        }
        if check.threshold.is_none() {
            tracing::debug!(check_id = %check.id, "No explicit threshold; the model will measure it");
        }
    }

    check
}

/// Name the compared value: the formula's target, or the only data field.
fn threshold_field(check: &Check) -> Option<String> {
    match (&check.formula, check.data_fields.as_slice()) {
        (Some(formula), _) => Some(
            formula
                .split_once('=')
                .map(|(lhs, _)| lhs.trim().to_string())
                .filter(|lhs| !lhs.is_empty())
                .unwrap_or_else(|| "calculated_value".to_string()),
        ),
        (None, [only]) => Some(only.clone()),
        _ => None,
    }
}
