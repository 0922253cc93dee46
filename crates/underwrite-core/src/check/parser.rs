//! Check batch loading from YAML/JSON.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::check::Check;
use crate::schema::{self, SchemaKind};

/// Errors that can occur when loading check batches.
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("Failed to read check file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Check batch validation failed: {0}")]
    ValidationError(String),
}

/// A named list of checks, as persisted or exchanged between stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckBatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    pub checks: Vec<Check>,
}

impl CheckBatch {
    pub fn new(checks: Vec<Check>) -> Self {
        Self {
            checks,
            ..Default::default()
        }
    }

    /// Parse from YAML. A bare list of checks is accepted too.
    pub fn from_yaml(yaml: &str) -> Result<Self, CheckError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse from JSON. A bare list of checks is accepted too.
    pub fn from_json(json: &str) -> Result<Self, CheckError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Load from a file, picking the format by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CheckError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    fn from_value(value: serde_json::Value) -> Result<Self, CheckError> {
        let value = match value {
            serde_json::Value::Array(checks) => serde_json::json!({ "checks": checks }),
            other => other,
        };

        schema::validate(SchemaKind::CheckBatch, &value)
            .map_err(|errors| CheckError::ValidationError(errors.join("; ")))?;

        let batch: CheckBatch = serde_json::from_value(value)?;
        batch.validate()?;
        Ok(batch)
    }

    /// Structural checks the schema cannot express.
    pub fn validate(&self) -> Result<(), CheckError> {
        let mut seen = std::collections::HashSet::new();
        for check in &self.checks {
            if check.id.trim().is_empty() {
                return Err(CheckError::ValidationError("check id must not be blank".into()));
            }
            if !seen.insert(check.id.as_str()) {
                return Err(CheckError::ValidationError(format!(
                    "duplicate check id: {}",
                    check.id
                )));
            }
            if let Some(t) = &check.threshold {
                if !t.value.is_finite() {
                    return Err(CheckError::ValidationError(format!(
                        "check {} has a non-finite threshold",
                        check.id
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String, CheckError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_json(&self) -> Result<String, CheckError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
