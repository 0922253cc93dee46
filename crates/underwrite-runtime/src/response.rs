//! Strict parsing of model replies.
//!
//! A reply is located (bare JSON, a fenced block, or the outermost object
//! in surrounding prose), validated against its JSON Schema, and only then
//! deserialized. Anything that fails is a [`ResponseError`]; nothing is
//! partially read.

use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use underwrite_core::schema::{self, SchemaKind};
use underwrite_core::{Bound, CheckKind, FieldMap, Priority, Threshold};

lazy_static! {
    static ref FENCED: Regex = Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").unwrap();
}

#[derive(Error, Debug)]
pub enum ResponseError {
    #[error("Reply is not JSON: {0}")]
    NotJson(String),

    #[error("Reply does not match {schema}: {}", .errors.join("; "))]
    SchemaViolation {
        schema: &'static str,
        errors: Vec<String>,
    },

    #[error("Reply has unexpected shape: {0}")]
    Shape(String),
}

/// Find the JSON value in a model reply.
pub fn extract_json(text: &str) -> Result<Value, ResponseError> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    if let Some(inner) = FENCED.captures(trimmed).and_then(|c| c.get(1)) {
        if let Ok(value) = serde_json::from_str(inner.as_str().trim()) {
            return Ok(value);
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return serde_json::from_str(&trimmed[start..=end])
                .map_err(|e| ResponseError::NotJson(e.to_string()));
        }
    }

    Err(ResponseError::NotJson(format!(
        "no JSON object in {} chars of reply",
        trimmed.len()
    )))
}

/// Locate, validate against `kind`, then deserialize.
pub fn parse_response<T: DeserializeOwned>(text: &str, kind: SchemaKind) -> Result<T, ResponseError> {
    let value = extract_json(text)?;
    schema::validate(kind, &value).map_err(|errors| ResponseError::SchemaViolation {
        schema: kind.name(),
        errors,
    })?;
    serde_json::from_value(value).map_err(|e| ResponseError::Shape(e.to_string()))
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionResponse {
    pub checks: Vec<RawCheck>,
    #[serde(default)]
    pub policy_metadata: Option<PolicyMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

/// A check as the model reports it, before ids and defaults are filled in.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCheck {
    #[serde(default)]
    pub id: Option<String>,
    pub kind: CheckKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub requirement: String,
    #[serde(default)]
    pub data_fields: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub applicable_products: Vec<String>,
    #[serde(default)]
    pub exceptions: Vec<String>,
    #[serde(default)]
    pub threshold: Option<Threshold>,
    #[serde(default)]
    pub formula: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationResponse {
    pub category: String,
    pub confidence: f64,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub key_identifiers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicabilityResponse {
    pub applicable: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationResponse {
    pub passed: bool,
    pub confidence: f64,
    pub reason: String,
    #[serde(default)]
    pub findings: Vec<String>,
}

/// Numbers the model read off the document for a threshold check.
#[derive(Debug, Clone, Deserialize)]
pub struct MeasurementResponse {
    #[serde(default)]
    pub field: Option<String>,
    pub actual_value: f64,
    pub threshold_value: f64,
    pub bound: Bound,
    pub inclusive: bool,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub calculation: Option<String>,
    /// The model's own verdict; only compared against, never used
    #[serde(default)]
    pub passed: Option<bool>,
    pub confidence: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataExtractionResponse {
    pub extracted_fields: FieldMap,
    #[serde(default)]
    pub missing_fields: Vec<String>,
    #[serde(default)]
    pub additional_data: FieldMap,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub extraction_notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bare_fenced_and_embedded() {
        assert_eq!(extract_json(r#"{"a": 1}"#).unwrap()["a"], 1);
        assert_eq!(
            extract_json("```json\n{\"a\": 2}\n```").unwrap()["a"],
            2
        );
        assert_eq!(
            extract_json("Here is the result: {\"a\": 3} Hope this helps.").unwrap()["a"],
            3
        );
    }

    #[test]
    fn test_not_json() {
        assert!(matches!(
            extract_json("I cannot determine this."),
            Err(ResponseError::NotJson(_))
        ));
        assert!(matches!(
            extract_json("{ broken"),
            Err(ResponseError::NotJson(_))
        ));
    }

    #[test]
    fn test_schema_violation_is_rejected_whole() {
        // confidence out of range and reason missing
        let err = parse_response::<EvaluationResponse>(
            r#"{"passed": true, "confidence": 1.7}"#,
            SchemaKind::Evaluation,
        )
        .unwrap_err();
        match err {
            ResponseError::SchemaViolation { schema, errors } => {
                assert_eq!(schema, "evaluation_response");
                assert!(!errors.is_empty());
            }
            other => panic!("expected schema violation, got {other}"),
        }
    }

    #[test]
    fn test_mistyped_field_is_rejected() {
        let err = parse_response::<EvaluationResponse>(
            r#"{"passed": "yes", "confidence": 0.9, "reason": "ok"}"#,
            SchemaKind::Evaluation,
        )
        .unwrap_err();
        assert!(matches!(err, ResponseError::SchemaViolation { .. }));
    }

    #[test]
    fn test_extraction_response() {
        let reply = r#"{
            "checks": [
                {"kind": "threshold_agent", "requirement": "LTV must not exceed 80%",
                 "data_fields": ["ltv_ratio"], "priority": "CRITICAL",
                 "threshold": {"field": "ltv_ratio", "bound": "upper", "value": 80, "inclusive": true, "unit": "%"}}
            ]
        }"#;
        let parsed: ExtractionResponse = parse_response(reply, SchemaKind::Extraction).unwrap();
        let check = &parsed.checks[0];
        assert_eq!(check.kind, CheckKind::Threshold);
        assert_eq!(check.priority, Priority::Critical);
        assert!(check.id.is_none());
        assert!(check.threshold.as_ref().unwrap().inclusive);
    }

    #[test]
    fn test_threshold_without_inclusive_is_rejected() {
        let reply = r#"{"checks": [{"kind": "threshold", "requirement": "LTV below 80%",
            "threshold": {"field": "ltv_ratio", "bound": "upper", "value": 80}}]}"#;
        assert!(parse_response::<ExtractionResponse>(reply, SchemaKind::Extraction).is_err());
    }
}
