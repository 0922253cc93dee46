//! Deterministic threshold comparison and inference.
//!
//! Numeric pass/fail is always decided here, never by a model. Models may
//! supply the numbers; the comparison is recomputed.

use serde::{Deserialize, Serialize};

use crate::check::{Bound, Threshold};
use crate::patterns::{canonical_operator, OPERATOR_VALUE};

/// Outcome of comparing an actual value against a threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub passed: bool,
    pub actual: f64,
    pub limit: f64,
    pub reason: String,
}

impl Threshold {
    /// Exact comparison honoring `inclusive`. NaN never passes.
    pub fn is_satisfied_by(&self, actual: f64) -> bool {
        match (self.bound, self.inclusive) {
            (Bound::Upper, true) => actual <= self.value,
            (Bound::Upper, false) => actual < self.value,
            (Bound::Lower, true) => actual >= self.value,
            (Bound::Lower, false) => actual > self.value,
        }
    }

    /// Human-readable rule, e.g. "must not exceed 80%".
    pub fn describe(&self) -> String {
        let limit = format_quantity(self.value, self.unit.as_deref());
        match (self.bound, self.inclusive) {
            (Bound::Upper, true) => format!("must not exceed {limit}"),
            (Bound::Upper, false) => format!("must be below {limit}"),
            (Bound::Lower, true) => format!("must be at least {limit}"),
            (Bound::Lower, false) => format!("must be above {limit}"),
        }
    }

    pub fn compare(&self, actual: f64) -> Comparison {
        let passed = self.is_satisfied_by(actual);
        let shown = format_quantity(actual, self.unit.as_deref());
        let limit = format_quantity(self.value, self.unit.as_deref());

        let reason = if passed {
            format!("{} is {}, within the limit of {} ({})", self.field, shown, limit, self.describe())
        } else {
            let verb = match self.bound {
                Bound::Upper if actual == self.value => "reaches",
                Bound::Upper => "exceeds",
                Bound::Lower if actual == self.value => "only reaches",
                Bound::Lower => "falls short of",
            };
            format!(
                "{} is {}, which {} the limit of {} ({})",
                self.field,
                shown,
                verb,
                limit,
                self.describe()
            )
        };

        Comparison {
            passed,
            actual,
            limit: self.value,
            reason,
        }
    }
}

/// Render a number without trailing zeros, with an optional unit.
pub fn format_quantity(value: f64, unit: Option<&str>) -> String {
    let number = format_number(value);
    match unit.map(str::trim) {
        None | Some("") => number,
        Some("%") | Some("percent") => format!("{number}%"),
        Some("$") | Some("usd") | Some("USD") => format!("${number}"),
        Some(other) => format!("{number} {other}"),
    }
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let text = format!("{value:.4}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Best-effort threshold from requirement text.
///
/// Looks for the first comparison phrase followed by a number. Returns
/// `None` when the text has no such phrase; callers then fall back to
/// model-supplied numbers.
pub fn infer_threshold(requirement: &str, field: &str) -> Option<Threshold> {
    let text = requirement.to_lowercase();
    let caps = OPERATOR_VALUE.captures(&text)?;

    let op = canonical_operator(caps.name("op")?.as_str())?;
    let value: f64 = caps.name("num")?.as_str().replace(',', "").parse().ok()?;

    let (bound, inclusive) = match op {
        "<=" => (Bound::Upper, true),
        "<" => (Bound::Upper, false),
        ">=" => (Bound::Lower, true),
        ">" => (Bound::Lower, false),
        _ => return None,
    };

    let unit = if caps.name("cur").is_some() {
        Some("$".to_string())
    } else {
        caps.name("unit").map(|u| match u.as_str() {
            "percent" => "%".to_string(),
            other => other.to_string(),
        })
    };

    Some(Threshold {
        field: field.to_string(),
        bound,
        value,
        inclusive,
        unit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ltv(inclusive: bool) -> Threshold {
        Threshold {
            field: "ltv_ratio".into(),
            bound: Bound::Upper,
            value: 80.0,
            inclusive,
            unit: Some("%".into()),
        }
    }

    #[test]
    fn test_upper_bound_boundaries() {
        let t = ltv(true);
        assert!(!t.is_satisfied_by(80.01));
        assert!(t.is_satisfied_by(79.99));
        assert!(t.is_satisfied_by(80.0));

        let t = ltv(false);
        assert!(!t.is_satisfied_by(80.0));
        assert!(t.is_satisfied_by(79.99));
    }

    #[test]
    fn test_lower_bound_boundaries() {
        let t = Threshold {
            field: "credit_score".into(),
            bound: Bound::Lower,
            value: 620.0,
            inclusive: true,
            unit: None,
        };
        assert!(t.is_satisfied_by(620.0));
        assert!(t.is_satisfied_by(740.0));
        assert!(!t.is_satisfied_by(619.0));

        let strict = Threshold { inclusive: false, ..t };
        assert!(!strict.is_satisfied_by(620.0));
    }

    #[test]
    fn test_nan_never_passes() {
        assert!(!ltv(true).is_satisfied_by(f64::NAN));
    }

    #[test]
    fn test_failure_reason_mentions_both_values() {
        let cmp = ltv(true).compare(90.59);
        assert!(!cmp.passed);
        assert!(cmp.reason.contains("90.59%"));
        assert!(cmp.reason.contains("80%"));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(80.0), "80");
        assert_eq!(format_number(90.59), "90.59");
        assert_eq!(format_number(0.125), "0.125");
        assert_eq!(format_quantity(5000.0, Some("$")), "$5000");
        assert_eq!(format_quantity(24.0, Some("months")), "24 months");
    }

    #[test]
    fn test_infer_upper_inclusive() {
        let t = infer_threshold("LTV ratio must not exceed 80%", "ltv_ratio").unwrap();
        assert_eq!(t.bound, Bound::Upper);
        assert!(t.inclusive);
        assert_eq!(t.value, 80.0);
        assert_eq!(t.unit.as_deref(), Some("%"));
    }

    #[test]
    fn test_infer_lower_and_exclusive() {
        let t = infer_threshold("Minimum FICO score of 620", "credit_score").unwrap();
        assert_eq!(t.bound, Bound::Lower);
        assert!(t.inclusive);
        assert_eq!(t.value, 620.0);

        let t = infer_threshold("DTI must be below 43 percent", "dti").unwrap();
        assert_eq!(t.bound, Bound::Upper);
        assert!(!t.inclusive);
        assert_eq!(t.unit.as_deref(), Some("%"));

        let t = infer_threshold("Reserves greater than $10,000", "reserves").unwrap();
        assert_eq!(t.bound, Bound::Lower);
        assert!(!t.inclusive);
        assert_eq!(t.value, 10_000.0);
        assert_eq!(t.unit.as_deref(), Some("$"));
    }

    #[test]
    fn test_infer_none_without_number() {
        assert!(infer_threshold("Borrower must provide two pay stubs", "docs").is_none());
    }
}
