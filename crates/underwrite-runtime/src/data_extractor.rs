//! Document data extraction.
//!
//! One model call reads every field the selected checks need. A failed
//! call is not fatal: the run continues with an empty document map and the
//! failure is noted in the extraction metadata.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use underwrite_core::schema::SchemaKind;
use underwrite_core::{ExtractionMetadata, FieldMap};

use crate::inference::{Inference, InferenceError, Stage};
use crate::prompts::{data_extraction_prompt, DATA_EXTRACTION_SYSTEM};
use crate::response::{parse_response, DataExtractionResponse, ResponseError};

#[derive(Error, Debug)]
enum DataExtractionError {
    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Response(#[from] ResponseError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentData {
    pub fields: FieldMap,
    pub metadata: ExtractionMetadata,
}

pub struct DataExtractor {
    inference: Inference,
}

impl DataExtractor {
    pub fn new(inference: Inference) -> Self {
        Self { inference }
    }

    /// Values for `fields` found in `text`.
    pub async fn extract(&self, text: &str, fields: &[String]) -> DocumentData {
        if fields.is_empty() || text.trim().is_empty() {
            return DocumentData {
                fields: FieldMap::new(),
                metadata: ExtractionMetadata {
                    missing_fields: fields.to_vec(),
                    ..Default::default()
                },
            };
        }

        match self.request(text, fields).await {
            Ok(response) => {
                let data = into_document_data(response, fields);
                tracing::info!(
                    extracted = data.fields.len(),
                    missing = data.metadata.missing_fields.len(),
                    "Document data extracted"
                );
                data
            }
            Err(e) => {
                tracing::warn!(error = %e, "Document data extraction failed, continuing without document data");
                DocumentData {
                    fields: FieldMap::new(),
                    metadata: ExtractionMetadata {
                        missing_fields: fields.to_vec(),
                        document_type: None,
                        notes: Some(format!("Data extraction failed: {e}")),
                    },
                }
            }
        }
    }

    async fn request(
        &self,
        text: &str,
        fields: &[String],
    ) -> Result<DataExtractionResponse, DataExtractionError> {
        let reply = self
            .inference
            .infer(
                Stage::DataExtraction,
                DATA_EXTRACTION_SYSTEM,
                &data_extraction_prompt(text, fields),
            )
            .await?;
        Ok(parse_response(&reply, SchemaKind::DataExtraction)?)
    }
}

/// Placeholder strings models use for "absent".
fn is_placeholder(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => matches!(
            s.trim().to_lowercase().as_str(),
            "" | "not_found" | "not found" | "n/a" | "na" | "unknown" | "none" | "null"
        ),
        _ => false,
    }
}

/// `{"value": x, "source": ...}` becomes `x`.
fn unwrap_value(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("value") => {
            map.remove("value").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn into_document_data(response: DataExtractionResponse, requested: &[String]) -> DocumentData {
    let mut fields = FieldMap::new();
    for (key, value) in response.extracted_fields {
        let value = unwrap_value(value);
        if !key.starts_with('_') && !is_placeholder(&value) {
            fields.insert(key, value);
        }
    }
    for (key, value) in response.additional_data {
        let value = unwrap_value(value);
        if !key.starts_with('_') && !is_placeholder(&value) {
            fields.entry(key).or_insert(value);
        }
    }

    let mut missing = response.missing_fields;
    for field in requested {
        if !fields.contains_key(field) && !missing.contains(field) {
            missing.push(field.clone());
        }
    }
    missing.retain(|f| !fields.contains_key(f));

    DocumentData {
        fields,
        metadata: ExtractionMetadata {
            missing_fields: missing,
            document_type: response.document_type,
            notes: response.extraction_notes,
        },
    }
}
