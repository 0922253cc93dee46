//! Counts and data requirements across a check list.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::check::{Check, CheckKind, Priority};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckSummary {
    pub total: usize,
    pub by_kind: BTreeMap<CheckKind, usize>,
    pub by_priority: BTreeMap<Priority, usize>,
    pub by_domain: BTreeMap<String, usize>,
    /// Union of every check's required fields
    pub data_requirements: BTreeSet<String>,
    pub applicable_products: BTreeSet<String>,
}

impl CheckSummary {
    pub fn from_checks(checks: &[Check]) -> Self {
        let mut summary = CheckSummary {
            total: checks.len(),
            ..Default::default()
        };

        for check in checks {
            *summary.by_kind.entry(check.kind).or_default() += 1;
            *summary.by_priority.entry(check.priority).or_default() += 1;
            *summary.by_domain.entry(check.domain.clone()).or_default() += 1;
            summary.data_requirements.extend(check.required_fields());
            summary
                .applicable_products
                .extend(check.applicable_products.iter().cloned());
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let checks = vec![
            Check::new("TH01", CheckKind::Threshold, "LTV <= 80%")
                .with_fields(["ltv_ratio"])
                .with_priority(Priority::Critical)
                .with_products(["mortgage"]),
            Check::new("CR01", CheckKind::Criteria, "Citizen")
                .with_fields(["citizenship_status", "ltv_ratio"]),
        ];
        let summary = CheckSummary::from_checks(&checks);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.by_kind[&CheckKind::Threshold], 1);
        assert_eq!(summary.by_priority[&Priority::Medium], 1);
        assert_eq!(summary.by_domain["general"], 2);
        assert_eq!(summary.data_requirements.len(), 2);
        assert!(summary.applicable_products.contains("mortgage"));
    }
}
