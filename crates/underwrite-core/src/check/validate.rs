//! Quality checks over an extracted check list.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::check::{Check, CheckKind};

/// Batches smaller than this suggest the extraction missed requirements.
const LOW_COUNT: usize = 8;
/// Batches larger than this suggest similar requirements were not consolidated.
const HIGH_COUNT: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
    pub counts: BTreeMap<CheckKind, usize>,
}

/// Validate a check list for completeness and consistency.
///
/// Errors make the batch invalid; warnings and suggestions are advisory.
pub fn validate_checks(checks: &[Check]) -> ValidationReport {
    let mut report = ValidationReport {
        is_valid: true,
        ..Default::default()
    };

    for kind in CheckKind::ALL {
        report.counts.insert(kind, 0);
    }

    let mut seen = HashSet::new();
    for (i, check) in checks.iter().enumerate() {
        *report.counts.entry(check.kind).or_insert(0) += 1;

        let label = if check.id.trim().is_empty() {
            format!("#{i}")
        } else {
            check.id.clone()
        };

        let required = [
            ("id", check.id.as_str()),
            ("name", check.name.as_str()),
            ("description", check.description.as_str()),
            ("requirement", check.requirement.as_str()),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                report
                    .errors
                    .push(format!("Check {label} missing required field: {field}"));
            }
        }

        if check.data_fields.is_empty() {
            report
                .warnings
                .push(format!("Check {label} has empty data_fields list"));
        }

        if check.kind == CheckKind::Threshold && check.threshold.is_none() {
            report.warnings.push(format!(
                "Check {label} has no structured threshold; comparison values will come from the model"
            ));
        }

        if !check.id.trim().is_empty() && !seen.insert(check.id.as_str()) {
            report
                .errors
                .push(format!("Duplicate check ID found: {}", check.id));
        }
    }

    let total = checks.len();
    if total < LOW_COUNT {
        report
            .suggestions
            .push("Low check count - consider extracting more policy requirements".to_string());
    }
    if total > HIGH_COUNT {
        report
            .suggestions
            .push("High check count - consider consolidating similar requirements".to_string());
    }
    if report.counts.get(&CheckKind::Threshold).copied().unwrap_or(0) == 0 {
        report.suggestions.push(
            "No threshold checks found - check for numeric limits, percentages, or ratios"
                .to_string(),
        );
    }
    if report.counts.get(&CheckKind::Criteria).copied().unwrap_or(0) == 0 {
        report.suggestions.push(
            "No criteria checks found - check for yes/no conditions or categorical requirements"
                .to_string(),
        );
    }

    report.is_valid = report.errors.is_empty();
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(id: &str, kind: CheckKind) -> Check {
        Check::new(id, kind, "requirement text")
            .with_name("Name")
            .with_description("Description")
            .with_fields(["field"])
    }

    #[test]
    fn test_missing_fields_are_errors() {
        let report = validate_checks(&[Check::new("C1", CheckKind::Criteria, "req")]);
        assert!(!report.is_valid);
        assert!(report
            .errors
            .contains(&"Check C1 missing required field: name".to_string()));
        assert!(report
            .warnings
            .contains(&"Check C1 has empty data_fields list".to_string()));
    }

    #[test]
    fn test_duplicate_ids() {
        let report = validate_checks(&[
            complete("C1", CheckKind::Criteria),
            complete("C1", CheckKind::Threshold),
        ]);
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("Duplicate check ID")));
    }

    #[test]
    fn test_suggestions() {
        let report = validate_checks(&[complete("Q1", CheckKind::Qualitative)]);
        assert!(report.is_valid);
        assert_eq!(report.suggestions.len(), 3);
        assert_eq!(report.counts[&CheckKind::Qualitative], 1);
        assert_eq!(report.counts[&CheckKind::Threshold], 0);
    }
}
