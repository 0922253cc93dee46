//! JSON Schema validation for check batches and model responses.
//!
//! Schemas live in `schema/` and are embedded at compile time. Every model
//! response is validated before it is deserialized; a response that does
//! not match is rejected outright rather than partially read.

use std::sync::OnceLock;
use thiserror::Error;

/// Documents with an embedded schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    CheckBatch,
    Extraction,
    Classification,
    Applicability,
    Evaluation,
    Measurement,
    DataExtraction,
}

impl SchemaKind {
    const COUNT: usize = 7;

    fn index(self) -> usize {
        match self {
            SchemaKind::CheckBatch => 0,
            SchemaKind::Extraction => 1,
            SchemaKind::Classification => 2,
            SchemaKind::Applicability => 3,
            SchemaKind::Evaluation => 4,
            SchemaKind::Measurement => 5,
            SchemaKind::DataExtraction => 6,
        }
    }

    fn source(self) -> &'static str {
        match self {
            SchemaKind::CheckBatch => include_str!("../schema/check_batch.schema.json"),
            SchemaKind::Extraction => include_str!("../schema/extraction_response.schema.json"),
            SchemaKind::Classification => {
                include_str!("../schema/classification_response.schema.json")
            }
            SchemaKind::Applicability => {
                include_str!("../schema/applicability_response.schema.json")
            }
            SchemaKind::Evaluation => include_str!("../schema/evaluation_response.schema.json"),
            SchemaKind::Measurement => include_str!("../schema/measurement_response.schema.json"),
            SchemaKind::DataExtraction => {
                include_str!("../schema/data_extraction_response.schema.json")
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SchemaKind::CheckBatch => "check_batch",
            SchemaKind::Extraction => "extraction_response",
            SchemaKind::Classification => "classification_response",
            SchemaKind::Applicability => "applicability_response",
            SchemaKind::Evaluation => "evaluation_response",
            SchemaKind::Measurement => "measurement_response",
            SchemaKind::DataExtraction => "data_extraction_response",
        }
    }
}

type CompiledSchema = OnceLock<Result<jsonschema::Validator, String>>;

/// Compiled validators, one slot per schema, initialized on first use.
static COMPILED: [CompiledSchema; SchemaKind::COUNT] = [
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
];

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema {0}: {1}")]
    LoadError(&'static str, String),
}

fn get_validator(kind: SchemaKind) -> Result<&'static jsonschema::Validator, SchemaError> {
    let result = COMPILED[kind.index()].get_or_init(|| {
        let schema_value: serde_json::Value = serde_json::from_str(kind.source())
            .map_err(|e| format!("Invalid schema JSON: {}", e))?;

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result
        .as_ref()
        .map_err(|e| SchemaError::LoadError(kind.name(), e.clone()))
}

/// Validate `instance` against the schema for `kind`.
///
/// Returns every violation, each formatted with its instance path.
pub fn validate(kind: SchemaKind, instance: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator(kind).map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(instance)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn is_valid(kind: SchemaKind, instance: &serde_json::Value) -> bool {
    get_validator(kind)
        .map(|v| v.is_valid(instance))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ALL: [SchemaKind; SchemaKind::COUNT] = [
        SchemaKind::CheckBatch,
        SchemaKind::Extraction,
        SchemaKind::Classification,
        SchemaKind::Applicability,
        SchemaKind::Evaluation,
        SchemaKind::Measurement,
        SchemaKind::DataExtraction,
    ];

    #[test]
    fn test_all_schemas_compile() {
        for kind in ALL {
            assert!(get_validator(kind).is_ok(), "{} failed to compile", kind.name());
        }
    }

    #[test]
    fn test_valid_batch_passes() {
        let batch = json!({
            "checks": [{
                "id": "TH01",
                "kind": "threshold",
                "requirement": "LTV must not exceed 80%",
                "data_fields": ["ltv_ratio"],
                "threshold": {"field": "ltv_ratio", "bound": "upper", "value": 80, "inclusive": true}
            }]
        });
        assert!(validate(SchemaKind::CheckBatch, &batch).is_ok());
    }

    #[test]
    fn test_threshold_without_inclusive_fails() {
        let batch = json!({
            "checks": [{
                "id": "TH01",
                "kind": "threshold",
                "requirement": "LTV must not exceed 80%",
                "threshold": {"field": "ltv_ratio", "bound": "upper", "value": 80}
            }]
        });
        assert!(validate(SchemaKind::CheckBatch, &batch).is_err());
    }

    #[test]
    fn test_evaluation_response_requires_fields() {
        assert!(is_valid(
            SchemaKind::Evaluation,
            &json!({"passed": true, "confidence": 0.9, "reason": "ok"})
        ));

        let errors = validate(SchemaKind::Evaluation, &json!({"passed": "yes"})).unwrap_err();
        assert!(!errors.is_empty());

        assert!(!is_valid(
            SchemaKind::Evaluation,
            &json!({"passed": true, "confidence": 1.5, "reason": "too sure"})
        ));
    }

    #[test]
    fn test_applicability_response() {
        assert!(is_valid(
            SchemaKind::Applicability,
            &json!({"applicable": false, "reason": "No home equity on a purchase"})
        ));
        assert!(!is_valid(SchemaKind::Applicability, &json!({"applicable": false})));
    }
}
