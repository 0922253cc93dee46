//! Check data model.
//!
//! A [`Check`] is one atomic, verifiable policy requirement. Checks are
//! produced by extraction (or loaded from a batch file) and are immutable
//! once constructed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::formula;

/// Evaluation strategy for a check.
///
/// Unknown tags deserialize to [`CheckKind::Generic`] so a batch with a
/// novel kind still evaluates instead of being rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum CheckKind {
    /// Numeric comparison against a bound
    Threshold,
    /// Yes/no qualification against listed criteria
    Criteria,
    /// Computed quantity compared or judged
    Score,
    /// Judgment-based assessment
    Qualitative,
    /// Free-form fallback
    Generic,
}

impl CheckKind {
    pub const ALL: [CheckKind; 5] = [
        CheckKind::Threshold,
        CheckKind::Criteria,
        CheckKind::Score,
        CheckKind::Qualitative,
        CheckKind::Generic,
    ];

    /// Strict parse. Returns `None` for unrecognized tags.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().replace('-', "_").as_str() {
            "threshold" | "threshold_agent" => Some(CheckKind::Threshold),
            "criteria" | "criteria_agent" => Some(CheckKind::Criteria),
            "score" | "score_agent" => Some(CheckKind::Score),
            "qualitative" | "qualitative_agent" => Some(CheckKind::Qualitative),
            "generic" | "free_form" | "freeform" => Some(CheckKind::Generic),
            _ => None,
        }
    }

    /// Lenient parse: unknown tags fall back to `Generic` with a warning.
    pub fn from_tag(tag: &str) -> Self {
        Self::parse(tag).unwrap_or_else(|| {
            tracing::warn!(tag, "Unknown check kind, evaluating as generic");
            CheckKind::Generic
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::Threshold => "threshold",
            CheckKind::Criteria => "criteria",
            CheckKind::Score => "score",
            CheckKind::Qualitative => "qualitative",
            CheckKind::Generic => "generic",
        }
    }

    /// Short id prefix used when a check arrives without an id.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            CheckKind::Threshold => "TH",
            CheckKind::Criteria => "CR",
            CheckKind::Score => "SC",
            CheckKind::Qualitative => "QL",
            CheckKind::Generic => "GN",
        }
    }
}

impl From<String> for CheckKind {
    fn from(tag: String) -> Self {
        CheckKind::from_tag(&tag)
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much a failing check weighs in the overall assessment.
///
/// Ordered from most to least severe.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl From<String> for Priority {
    fn from(tag: String) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "critical" => Priority::Critical,
            "high" => Priority::High,
            "medium" | "moderate" => Priority::Medium,
            "low" => Priority::Low,
            other => {
                tracing::warn!(priority = other, "Unknown priority, using medium");
                Priority::Medium
            }
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the limit is acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    /// Value must stay below (or at) the limit
    Upper,
    /// Value must stay above (or at) the limit
    Lower,
}

/// Structured numeric limit attached to a threshold or score check.
///
/// `inclusive` has no default: a threshold that does not say whether the
/// boundary value passes is rejected at parse time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    /// Context field (or formula result) that is compared
    pub field: String,
    pub bound: Bound,
    pub value: f64,
    pub inclusive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// One atomic policy requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    /// Unique within a batch
    pub id: String,

    pub kind: CheckKind,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// The requirement text as stated by the policy
    pub requirement: String,

    /// Context fields the check needs
    #[serde(default)]
    pub data_fields: Vec<String>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default = "default_domain")]
    pub domain: String,

    /// Product categories this check is limited to (empty = all)
    #[serde(default)]
    pub applicable_products: BTreeSet<String>,

    /// Exceptions stated alongside the requirement
    #[serde(default)]
    pub exceptions: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<Threshold>,

    /// Arithmetic expression over context fields, e.g. `loan_amount / property_value * 100`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

pub(crate) fn default_domain() -> String {
    "general".to_string()
}

impl Check {
    pub fn new(id: impl Into<String>, kind: CheckKind, requirement: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: String::new(),
            description: String::new(),
            requirement: requirement.into(),
            data_fields: Vec::new(),
            priority: Priority::default(),
            domain: default_domain(),
            applicable_products: BTreeSet::new(),
            exceptions: Vec::new(),
            threshold: None,
            formula: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_threshold(mut self, threshold: Threshold) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = Some(formula.into());
        self
    }

    pub fn with_products<I, S>(mut self, products: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.applicable_products = products.into_iter().map(Into::into).collect();
        self
    }

    /// Name for display; falls back to the id.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Text used for keyword matching and dedup: description if present,
    /// otherwise the requirement.
    pub fn match_text(&self) -> &str {
        if self.description.trim().is_empty() {
            &self.requirement
        } else {
            &self.description
        }
    }

    /// Every context field an evaluator may read.
    ///
    /// This is `data_fields`, plus the identifiers of the formula, plus the
    /// threshold field when no formula can produce it. Order is stable and
    /// duplicates are removed.
    pub fn required_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = Vec::with_capacity(self.data_fields.len() + 2);
        let mut push = |name: &str| {
            if !name.is_empty() && !fields.iter().any(|f| f == name) {
                fields.push(name.to_string());
            }
        };

        for field in &self.data_fields {
            push(field);
        }

        match &self.formula {
            Some(expr) => {
                if let Ok(idents) = formula::identifiers(expr) {
                    for ident in &idents {
                        push(ident);
                    }
                }
            }
            None => {
                if let Some(threshold) = &self.threshold {
                    push(&threshold.field);
                }
            }
        }

        fields
    }

    /// Trim data field names and drop blanks and duplicates, keeping
    /// first-seen order.
    pub fn normalize_fields(&mut self) {
        let mut seen = BTreeSet::new();
        self.data_fields = std::mem::take(&mut self.data_fields)
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty() && seen.insert(f.clone()))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_kind_is_generic() {
        let yaml = r#"
id: "X1"
kind: "probabilistic"
requirement: "Something odd"
"#;
        let check: Check = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(check.kind, CheckKind::Generic);
        assert_eq!(check.priority, Priority::Medium);
        assert_eq!(check.domain, "general");
    }

    #[test]
    fn test_kind_aliases() {
        assert_eq!(CheckKind::parse("threshold_agent"), Some(CheckKind::Threshold));
        assert_eq!(CheckKind::parse(" Criteria "), Some(CheckKind::Criteria));
        assert_eq!(CheckKind::parse("free-form"), Some(CheckKind::Generic));
        assert_eq!(CheckKind::parse("nope"), None);
    }

    #[test]
    fn test_threshold_requires_inclusive() {
        let missing = r#"{"field": "ltv_ratio", "bound": "upper", "value": 80}"#;
        assert!(serde_json::from_str::<Threshold>(missing).is_err());

        let present = r#"{"field": "ltv_ratio", "bound": "upper", "value": 80, "inclusive": true}"#;
        let threshold: Threshold = serde_json::from_str(present).unwrap();
        assert_eq!(threshold.bound, Bound::Upper);
        assert!(threshold.inclusive);
    }

    #[test]
    fn test_required_fields_include_formula_identifiers() {
        let check = Check::new("TH01", CheckKind::Threshold, "LTV must not exceed 80%")
            .with_fields(["loan_amount"])
            .with_formula("loan_amount / property_value * 100")
            .with_threshold(Threshold {
                field: "ltv_ratio".into(),
                bound: Bound::Upper,
                value: 80.0,
                inclusive: true,
                unit: Some("%".into()),
            });

        assert_eq!(check.required_fields(), vec!["loan_amount", "property_value"]);
    }

    #[test]
    fn test_required_fields_include_threshold_field() {
        let check = Check::new("TH02", CheckKind::Threshold, "FICO at least 620").with_threshold(
            Threshold {
                field: "credit_score".into(),
                bound: Bound::Lower,
                value: 620.0,
                inclusive: true,
                unit: None,
            },
        );
        assert_eq!(check.required_fields(), vec!["credit_score"]);
    }

    #[test]
    fn test_normalize_fields() {
        let mut check = Check::new("C1", CheckKind::Criteria, "r")
            .with_fields(["a", "b", "a", " ", "c", "b"]);
        check.normalize_fields();
        assert_eq!(check.data_fields, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_normalize_fields_stores_trimmed_names() {
        let mut check = Check::new("C2", CheckKind::Threshold, "r")
            .with_fields([" ltv_ratio ", "ltv_ratio", "\tdti_ratio"]);
        check.normalize_fields();
        assert_eq!(check.data_fields, vec!["ltv_ratio", "dti_ratio"]);
        assert_eq!(check.required_fields(), vec!["ltv_ratio", "dti_ratio"]);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical < Priority::High);
        assert!(Priority::High < Priority::Low);
    }
}
