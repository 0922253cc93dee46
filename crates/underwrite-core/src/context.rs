//! The read-only data an evaluation run is judged against.
//!
//! A [`DataContext`] is assembled once per run from document-extracted and
//! applicant-supplied fields, then shared immutably between agents. Agents
//! never see the whole context: each gets a [`FieldView`] holding only the
//! fields its check names.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::relevance::DocumentCategory;

pub type FieldMap = BTreeMap<String, Value>;

/// Where a field value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Document,
    Applicant,
    /// Applicant value replaced a document value
    Override,
}

/// Advisory notes from document data extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    #[serde(default)]
    pub missing_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DataContext {
    fields: FieldMap,
    provenance: BTreeMap<String, Provenance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extraction_metadata: Option<ExtractionMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    document_category: Option<DocumentCategory>,
}

impl DataContext {
    pub fn builder() -> DataContextBuilder {
        DataContextBuilder::default()
    }

    /// Context from applicant-supplied fields only.
    pub fn from_fields(fields: FieldMap) -> Self {
        Self::builder().applicant_fields(fields).build()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Present and not null.
    pub fn is_present(&self, key: &str) -> bool {
        matches!(self.fields.get(key), Some(v) if !v.is_null())
    }

    pub fn missing(&self, fields: &[String]) -> Vec<String> {
        fields
            .iter()
            .filter(|f| !self.is_present(f))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn provenance(&self, key: &str) -> Option<Provenance> {
        self.provenance.get(key).copied()
    }

    fn keys_with(&self, wanted: &[Provenance]) -> Vec<String> {
        self.provenance
            .iter()
            .filter(|(_, p)| wanted.contains(*p))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Fields that came from the document and were not overridden.
    pub fn document_fields(&self) -> Vec<String> {
        self.keys_with(&[Provenance::Document])
    }

    /// Fields supplied by the applicant, including overrides.
    pub fn applicant_fields(&self) -> Vec<String> {
        self.keys_with(&[Provenance::Applicant, Provenance::Override])
    }

    pub fn overridden_fields(&self) -> Vec<String> {
        self.keys_with(&[Provenance::Override])
    }

    pub fn extraction_metadata(&self) -> Option<&ExtractionMetadata> {
        self.extraction_metadata.as_ref()
    }

    pub fn document_category(&self) -> Option<DocumentCategory> {
        self.document_category
    }

    /// The slice of this context an agent for a check naming `fields` sees.
    pub fn view(&self, fields: &[String]) -> FieldView {
        let mut present = FieldMap::new();
        let mut missing = Vec::new();
        for name in fields {
            match self.fields.get(name) {
                Some(v) if !v.is_null() => {
                    present.insert(name.clone(), v.clone());
                }
                _ => missing.push(name.clone()),
            }
        }

        let other_available = self
            .fields
            .iter()
            .filter(|(k, v)| !v.is_null() && !present.contains_key(*k))
            .map(|(k, _)| k.clone())
            .collect();

        FieldView {
            fields: present,
            missing,
            other_available,
            document_category: self.document_category,
        }
    }
}

/// Builder applying the documented precedence: applicant over document.
#[derive(Debug, Default)]
pub struct DataContextBuilder {
    document: FieldMap,
    applicant: FieldMap,
    extraction_metadata: Option<ExtractionMetadata>,
    document_category: Option<DocumentCategory>,
}

impl DataContextBuilder {
    /// Fields extracted from the document. Keys starting with `_` are
    /// bookkeeping and are not evaluation data.
    pub fn document_fields(mut self, fields: FieldMap) -> Self {
        self.document = fields;
        self
    }

    pub fn applicant_fields(mut self, fields: FieldMap) -> Self {
        self.applicant = fields;
        self
    }

    pub fn extraction_metadata(mut self, metadata: ExtractionMetadata) -> Self {
        self.extraction_metadata = Some(metadata);
        self
    }

    pub fn document_category(mut self, category: DocumentCategory) -> Self {
        self.document_category = Some(category);
        self
    }

    pub fn build(self) -> DataContext {
        let mut fields = FieldMap::new();
        let mut provenance = BTreeMap::new();

        for (key, value) in self.document {
            if key.starts_with('_') {
                continue;
            }
            provenance.insert(key.clone(), Provenance::Document);
            fields.insert(key, value);
        }

        for (key, value) in self.applicant {
            let source = if fields.contains_key(&key) {
                Provenance::Override
            } else {
                Provenance::Applicant
            };
            provenance.insert(key.clone(), source);
            fields.insert(key, value);
        }

        let overridden = provenance
            .values()
            .filter(|p| **p == Provenance::Override)
            .count();
        if overridden > 0 {
            tracing::debug!(overridden, "Applicant data overrides document fields");
        }

        DataContext {
            fields,
            provenance,
            extraction_metadata: self.extraction_metadata,
            document_category: self.document_category,
        }
    }
}

/// Fields one agent may read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldView {
    /// Requested fields that are present and non-null
    pub fields: FieldMap,
    /// Requested fields that are absent or null
    pub missing: Vec<String>,
    /// Names (not values) of other populated context fields
    pub other_available: Vec<String>,
    pub document_category: Option<DocumentCategory>,
}

impl FieldView {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Numeric value of `field`, accepting strings like "$385,000" or "90.59%".
    pub fn number(&self, field: &str) -> Option<f64> {
        self.fields.get(field).and_then(numeric_value)
    }
}

/// Interpret a JSON value as a number.
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !c.is_whitespace() && !matches!(c, '$' | ',' | '%'))
                .collect();
            cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        Value::Object(map) => map.get("value").and_then(numeric_value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> FieldMap {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_applicant_overrides_document() {
        let ctx = DataContext::builder()
            .document_fields(map(json!({
                "credit_score": 700,
                "loan_amount": 385000,
                "_extraction_metadata": {"notes": "ok"}
            })))
            .applicant_fields(map(json!({"credit_score": 720, "annual_income": 95000})))
            .build();

        assert_eq!(ctx.get("credit_score"), Some(&json!(720)));
        assert_eq!(ctx.provenance("credit_score"), Some(Provenance::Override));
        assert_eq!(ctx.provenance("loan_amount"), Some(Provenance::Document));
        assert_eq!(ctx.overridden_fields(), vec!["credit_score"]);
        assert_eq!(ctx.document_fields(), vec!["loan_amount"]);
        assert_eq!(ctx.applicant_fields(), vec!["annual_income", "credit_score"]);
        assert!(ctx.get("_extraction_metadata").is_none());
    }

    #[test]
    fn test_null_counts_as_missing() {
        let ctx = DataContext::from_fields(map(json!({"a": 1, "b": null})));
        assert!(ctx.is_present("a"));
        assert!(!ctx.is_present("b"));
        assert_eq!(
            ctx.missing(&["a".to_string(), "b".to_string(), "c".to_string()]),
            vec!["b", "c"]
        );
    }

    #[test]
    fn test_view_exposes_only_requested_values() {
        let ctx = DataContext::builder()
            .applicant_fields(map(json!({
                "ltv_ratio": 90.59,
                "loan_amount": 385000,
                "ssn": "123-45-6789"
            })))
            .document_category(DocumentCategory::Mortgage)
            .build();

        let view = ctx.view(&[
            "ltv_ratio".to_string(),
            "home_equity_loan_amount".to_string(),
        ]);
        assert_eq!(view.fields.len(), 1);
        assert_eq!(view.missing, vec!["home_equity_loan_amount"]);
        assert_eq!(view.other_available, vec!["loan_amount", "ssn"]);
        assert!(!view.is_complete());
        assert_eq!(view.document_category, Some(DocumentCategory::Mortgage));
    }

    #[test]
    fn test_numeric_value() {
        assert_eq!(numeric_value(&json!(90.59)), Some(90.59));
        assert_eq!(numeric_value(&json!("$385,000")), Some(385000.0));
        assert_eq!(numeric_value(&json!(" 90.59 % ")), Some(90.59));
        assert_eq!(numeric_value(&json!({"value": 12, "unit": "months"})), Some(12.0));
        assert_eq!(numeric_value(&json!("n/a")), None);
        assert_eq!(numeric_value(&json!(true)), None);
    }
}
