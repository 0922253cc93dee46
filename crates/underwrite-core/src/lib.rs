//! # underwrite-core
//!
//! Deterministic building blocks for policy compliance evaluation.
//!
//! This crate owns everything that can be decided without a model:
//! - Splitting policy text into extraction-sized chunks
//! - The check model, batch files and deduplication
//! - Keyword relevance scoring of checks against a document category
//! - Numeric threshold comparison and formula evaluation
//! - Folding per-check results into an overall assessment
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input always produces same output
//! 2. **No LLM calls**: Model-assisted stages live in `underwrite-runtime`
//! 3. **Numeric correctness**: pass/fail on a numeric limit is computed here, never inferred
//! 4. **Order-independent**: aggregation does not depend on result order
//!
//! ## Example
//!
//! ```rust,ignore
//! use underwrite_core::{aggregate, Bound, Check, CheckKind, CheckResult, Threshold};
//!
//! let check = Check::new("TH01", CheckKind::Threshold, "LTV must not exceed 80%")
//!     .with_threshold(Threshold {
//!         field: "ltv_ratio".into(),
//!         bound: Bound::Upper,
//!         value: 80.0,
//!         inclusive: true,
//!         unit: Some("%".into()),
//!     });
//!
//! let cmp = check.threshold.as_ref().unwrap().compare(90.59);
//! let result = CheckResult::judged(&check, cmp.passed, 1.0, cmp.reason);
//! let assessment = aggregate(&[result]);
//! ```

pub mod aggregator;
pub mod check;
pub mod chunker;
pub mod context;
pub mod formula;
pub mod keywords;
pub mod patterns;
pub mod relevance;
pub mod result;
pub mod schema;
pub mod threshold;

// Re-export main types at crate root
pub use aggregator::{
    aggregate, Aggregator, AggregatorConfig, Assessment, Decision, FailureBreakdown, Issue,
    OverallStatus, Statistics,
};
pub use check::{
    dedup_checks, detect_domain, ensure_domain, merge_checks, normalize_text, validate_checks,
    Bound, Check, CheckBatch, CheckError, CheckKind, CheckSummary, Priority, Threshold,
    ValidationReport,
};
pub use chunker::{chunk, Chunker, ChunkerConfig, SizeMetric};
pub use context::{
    numeric_value, DataContext, DataContextBuilder, ExtractionMetadata, FieldMap, FieldView,
    Provenance,
};
pub use formula::FormulaError;
pub use relevance::{
    Classification, ClassificationMethod, DocumentCategory, RelevanceConfig, RelevanceScorer,
    SkippedCheck,
};
pub use result::{CheckResult, CheckStatus};
pub use schema::{SchemaError, SchemaKind};
pub use threshold::{format_quantity, infer_threshold, Comparison};
