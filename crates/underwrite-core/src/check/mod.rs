//! Policy checks: model, batch files, normalization and reporting.

mod domain;
mod model;
mod normalize;
mod parser;
mod summary;
mod validate;

pub use domain::{detect_domain, ensure_domain};
pub use model::{Bound, Check, CheckKind, Priority, Threshold};
pub use normalize::{content_hash, dedup_checks, merge_checks, normalize_text, requirement_hash};
pub use parser::{CheckBatch, CheckError};
pub use summary::CheckSummary;
pub use validate::{validate_checks, ValidationReport};
