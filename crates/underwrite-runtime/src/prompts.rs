//! Prompts for every model call.
//!
//! System prompts are constants so providers can cache them. Each user
//! prompt opens with a `TASK:` line naming the call site, and prompts about
//! a single check carry a `Check ID:` line.


use underwrite_core::{Check, CheckKind, FieldView};

/// Characters of document text sent for classification.
pub const CLASSIFY_SAMPLE_CHARS: usize = 4000;

/// Characters of document text sent for data extraction.
pub const EXTRACT_SAMPLE_CHARS: usize = 24_000;

pub const EXTRACTION_SYSTEM: &str = r#"
You turn policy text into atomic, machine-checkable compliance checks.

Rules:
1. One check per requirement. Never merge two requirements into one check.
2. Quote limits exactly as written. Do not invent limits that are not stated.
3. Use snake_case data field names that an application would carry
   (ltv_ratio, credit_score, debt_to_income_ratio, annual_income).
4. kind is one of: threshold, criteria, score, qualitative, generic.
   - threshold: a numeric limit on one value
   - criteria: a condition that is met or not (documents present, status)
   - score: a value computed by a formula and compared to a limit
   - qualitative: a judgement over narrative content
5. For threshold and score checks give a threshold object. inclusive is
   REQUIRED: true when the limit value itself passes ("at most", "no more
   than", "not exceed", "at least", "minimum"), false when it fails
   ("below", "less than", "under", "above", "greater than").
6. priority is one of: critical, high, medium, low.

Reply with JSON only:
{
  "policy_metadata": {"title": "string or null", "domain": "string or null"},
  "checks": [
    {
      "id": "optional string",
      "kind": "threshold",
      "name": "short name",
      "description": "one sentence",
      "requirement": "the requirement as stated",
      "data_fields": ["field_name"],
      "priority": "high",
      "applicable_products": ["mortgage"],
      "exceptions": ["stated exceptions"],
      "threshold": {"field": "ltv_ratio", "bound": "upper", "value": 80, "inclusive": true, "unit": "%"},
      "formula": "loan_amount / property_value * 100"
    }
  ]
}
Return {"checks": []} when the text states no requirement.
"#;

pub const CLASSIFICATION_SYSTEM: &str = r#"
You classify financial application documents.

Categories: mortgage, auto_loan, credit_card, personal_loan, business_loan,
student_loan, unknown.

Reply with JSON only:
{
  "category": "mortgage",
  "confidence": 0.0-1.0,
  "purpose": "what the applicant is applying for",
  "key_identifiers": ["phrases that decided the category"]
}
"#;

pub const DATA_EXTRACTION_SYSTEM: &str = r#"
You extract field values from an application document.

Rules:
1. Extract only the requested fields. Use exactly the requested names.
2. Numbers are numbers: 385000 not "$385,000", 90.59 not "90.59%".
3. If a value can be computed directly from stated values (a ratio of two
   stated amounts) compute it and say so in extraction_notes.
4. A field that is not in the document goes in missing_fields. Never guess.

Reply with JSON only:
{
  "extracted_fields": {"field_name": value},
  "missing_fields": ["field_name"],
  "additional_data": {},
  "document_type": "string or null",
  "extraction_notes": "string or null"
}
"#;

pub const APPLICABILITY_SYSTEM: &str = r#"
You decide whether a compliance check applies to a document when some of
the data it needs is missing.

The missing fields are either:
1. MISSING: the document should contain them but they were not extracted.
2. NOT APPLICABLE: they do not exist for this kind of document or product.

Examples:
- "home_equity_loan_amount" on a primary mortgage application: NOT APPLICABLE.
- "credit_score" on any credit application: MISSING.

When unsure, answer applicable = true.

Reply with JSON only:
{"applicable": true, "reason": "why the check does or does not apply"}
"#;

pub const EVALUATION_SYSTEM: &str = r#"
You are a focused compliance checker for exactly one requirement.

Rules:
1. Evaluate ONLY the requirement you are given. Do not assess anything else.
2. Use ONLY the data provided. Do not assume values that are not there.
3. Consider stated exceptions before failing a check.
4. When a calculated value is provided it is authoritative. Do not redo it.
5. Confidence reflects how clearly the data settles the requirement.

Reply with JSON only:
{
  "passed": true,
  "confidence": 0.0-1.0,
  "reason": "explanation about this requirement only",
  "findings": ["observations about this requirement only"]
}
"#;

pub const MEASUREMENT_SYSTEM: &str = r#"
You read the numbers a threshold requirement needs. You do not decide
whether the requirement passes.

Rules:
1. actual_value is the applicant's value, computed from the data if the
   requirement is about a ratio or total. Show the arithmetic in calculation.
2. threshold_value is the limit stated in the requirement.
3. bound is "upper" when the value must stay at or below the limit and
   "lower" when it must stay at or above it.
4. inclusive is true when the limit value itself is acceptable.
5. Percentages are plain numbers: 80 for 80%.

Reply with JSON only:
{
  "field": "ltv_ratio",
  "actual_value": 90.59,
  "threshold_value": 80,
  "bound": "upper",
  "inclusive": false,
  "unit": "%",
  "calculation": "385000 / 425000 * 100 = 90.59",
  "confidence": 0.0-1.0,
  "reason": "what was measured"
}
"#;

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn pretty(value: &impl serde::Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

pub fn extraction_prompt(chunk: &str, domain_hint: Option<&str>) -> String {
    let hint = domain_hint
        .map(|d| format!("Policy domain: {d}\n"))
        .unwrap_or_default();
    format!("TASK: extract_checks\n{hint}\nPOLICY TEXT:\n{chunk}\n")
}

pub fn classification_prompt(text: &str) -> String {
    format!(
        "TASK: classify_document\n\nDOCUMENT (first {CLASSIFY_SAMPLE_CHARS} characters):\n{}\n",
        truncate(text, CLASSIFY_SAMPLE_CHARS)
    )
}

pub fn data_extraction_prompt(text: &str, fields: &[String]) -> String {
    format!(
        "TASK: extract_data\n\nFIELDS TO EXTRACT:\n{}\n\nDOCUMENT:\n{}\n",
        fields
            .iter()
            .map(|f| format!("- {f}"))
            .collect::<Vec<_>>()
            .join("\n"),
        truncate(text, EXTRACT_SAMPLE_CHARS)
    )
}

fn check_header(check: &Check) -> String {
    let mut header = format!(
        "Check ID: {}\nName: {}\nKind: {}\nPriority: {}\nRequirement: {}\n",
        check.id,
        check.display_name(),
        check.kind,
        check.priority,
        check.requirement
    );
    if !check.description.is_empty() && check.description != check.requirement {
        header.push_str(&format!("Description: {}\n", check.description));
    }
    if !check.exceptions.is_empty() {
        header.push_str(&format!("Exceptions: {}\n", check.exceptions.join("; ")));
    }
    header
}

pub fn applicability_prompt(check: &Check, view: &FieldView) -> String {
    let category = view
        .document_category
        .map(|c| c.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "TASK: applicability\n{}Document category: {}\nMissing fields: {}\nFields present for this check:\n{}\nOther fields available in the document: {}\n",
        check_header(check),
        category,
        view.missing.join(", "),
        pretty(&view.fields),
        list_or_none(&view.other_available),
    )
}

fn kind_guidance(kind: CheckKind) -> &'static str {
    match kind {
        CheckKind::Threshold => "Compare the value against the stated limit exactly.",
        CheckKind::Criteria => {
            "Decide whether the stated condition is met. Missing evidence means not met."
        }
        CheckKind::Score => "Judge the score against the stated scale and limit.",
        CheckKind::Qualitative => {
            "Judge the narrative content against the requirement. Cite what you relied on in findings."
        }
        CheckKind::Generic => "Decide whether the requirement is satisfied by the data.",
    }
}

/// Prompt for a pass/fail judgement.
///
/// `calculated` is a value the agent already computed, with its formula.
pub fn evaluation_prompt(
    check: &Check,
    view: &FieldView,
    linked: &[String],
    calculated: Option<(&str, f64)>,
) -> String {
    let mut prompt = format!(
        "TASK: evaluate_check\n{}Guidance: {}\n\nDATA:\n{}\n",
        check_header(check),
        kind_guidance(check.kind),
        pretty(&view.fields)
    );
    if let Some((formula, value)) = calculated {
        prompt.push_str(&format!("\nCalculated value: {formula} = {value}\n"));
    }
    if !linked.is_empty() {
        prompt.push_str("\nRelated requirements (context only):\n");
        for requirement in linked {
            prompt.push_str(&format!("- {requirement}\n"));
        }
    }
    prompt
}

pub fn measurement_prompt(check: &Check, view: &FieldView, linked: &[String]) -> String {
    let mut prompt = format!(
        "TASK: measure_threshold\n{}Data fields: {}\n\nDATA:\n{}\n",
        check_header(check),
        list_or_none(&check.data_fields),
        pretty(&view.fields)
    );
    if !linked.is_empty() {
        prompt.push_str("\nRelated requirements (context only):\n");
        for requirement in linked {
            prompt.push_str(&format!("- {requirement}\n"));
        }
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use underwrite_core::{DataContext, DocumentCategory, FieldMap};

    fn view() -> FieldView {
        let mut fields = FieldMap::new();
        fields.insert("ltv_ratio".into(), json!(90.59));
        fields.insert("loan_amount".into(), json!(385000));
        DataContext::builder()
            .document_fields(fields)
            .document_category(DocumentCategory::Mortgage)
            .build()
            .view(&["ltv_ratio".to_string(), "home_equity_loan_amount".to_string()])
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn test_check_prompts_carry_markers() {
        let check = Check::new("TH01", CheckKind::Threshold, "LTV must be below 80%")
            .with_fields(["ltv_ratio", "home_equity_loan_amount"]);
        let prompt = applicability_prompt(&check, &view());

        assert!(prompt.starts_with("TASK: applicability"));
        assert!(prompt.contains("Check ID: TH01"));
        assert!(prompt.contains("Missing fields: home_equity_loan_amount"));
        assert!(prompt.contains("Document category: mortgage"));
        assert!(prompt.contains("loan_amount"));
        // only the check's own values are shown
        assert!(!prompt.contains("385000"));
    }

    #[test]
    fn test_evaluation_prompt_includes_calculation_and_links() {
        let check = Check::new("SC01", CheckKind::Score, "Score must be at least 70");
        let prompt = evaluation_prompt(
            &check,
            &view(),
            &["Scores below 60 require manual review".to_string()],
            Some(("a + b", 72.5)),
        );
        assert!(prompt.contains("Calculated value: a + b = 72.5"));
        assert!(prompt.contains("- Scores below 60 require manual review"));
    }

    #[test]
    fn test_classification_prompt_is_bounded() {
        let text = "x".repeat(CLASSIFY_SAMPLE_CHARS * 2);
        let prompt = classification_prompt(&text);
        assert!(prompt.len() < CLASSIFY_SAMPLE_CHARS + 200);
    }
}
