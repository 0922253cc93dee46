//! Keyword relevance scoring and check partitioning.
//!
//! This is a volume filter, not a correctness gate: it decides only
//! whether a check runs, never how it is judged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::check::Check;
use crate::keywords::{
    check_keywords, contains_phrase, document_keywords, match_ratio, normalize_words, UNIVERSAL,
};

/// Coarse document category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum DocumentCategory {
    Mortgage,
    AutoLoan,
    CreditCard,
    PersonalLoan,
    BusinessLoan,
    StudentLoan,
    Unknown,
}

impl DocumentCategory {
    /// Every known category, excluding `Unknown`.
    pub const KNOWN: [DocumentCategory; 6] = [
        DocumentCategory::Mortgage,
        DocumentCategory::AutoLoan,
        DocumentCategory::CreditCard,
        DocumentCategory::PersonalLoan,
        DocumentCategory::BusinessLoan,
        DocumentCategory::StudentLoan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentCategory::Mortgage => "mortgage",
            DocumentCategory::AutoLoan => "auto_loan",
            DocumentCategory::CreditCard => "credit_card",
            DocumentCategory::PersonalLoan => "personal_loan",
            DocumentCategory::BusinessLoan => "business_loan",
            DocumentCategory::StudentLoan => "student_loan",
            DocumentCategory::Unknown => "unknown",
        }
    }
}

impl From<String> for DocumentCategory {
    fn from(tag: String) -> Self {
        match tag.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "mortgage" | "home_loan" => DocumentCategory::Mortgage,
            "auto_loan" | "auto" | "vehicle_loan" => DocumentCategory::AutoLoan,
            "credit_card" => DocumentCategory::CreditCard,
            "personal_loan" => DocumentCategory::PersonalLoan,
            "business_loan" | "commercial_loan" => DocumentCategory::BusinessLoan,
            "student_loan" => DocumentCategory::StudentLoan,
            _ => DocumentCategory::Unknown,
        }
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a classification was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMethod {
    /// Model answer accepted as is
    Model,
    /// Model answer overridden by a stronger keyword signal
    Combined,
    /// Keywords only (no model, or the model call failed)
    Keyword,
}

/// Coarse category of a document plus confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: DocumentCategory,
    pub confidence: f64,
    pub method: ClassificationMethod,
    #[serde(default)]
    pub keyword_scores: BTreeMap<DocumentCategory, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

impl Classification {
    pub fn unknown() -> Self {
        Self {
            category: DocumentCategory::Unknown,
            confidence: 0.0,
            method: ClassificationMethod::Keyword,
            keyword_scores: BTreeMap::new(),
            purpose: None,
        }
    }
}

/// A check filtered out before evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCheck {
    pub check: Check,
    pub relevance: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceConfig {
    /// Minimum score for a check to run
    pub threshold: f64,
    /// Score for checks mentioning a universal term
    pub universal_score: f64,
    /// Score when no keyword signal either way
    pub neutral_score: f64,
    /// Score for every check when the document category is unknown
    pub unknown_category_score: f64,
    /// Model confidence below which a keyword signal may override it
    pub model_override_below: f64,
    /// Keyword score required to override the model
    pub keyword_override_above: f64,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            universal_score: 0.9,
            neutral_score: 0.5,
            unknown_category_score: 0.6,
            model_override_below: 0.7,
            keyword_override_above: 0.3,
        }
    }
}

/// Deterministic keyword scorer.
#[derive(Debug, Clone, Default)]
pub struct RelevanceScorer {
    config: RelevanceConfig,
}

impl RelevanceScorer {
    pub fn new(config: RelevanceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RelevanceConfig {
        &self.config
    }

    /// Relevance of `check` for a document of `category`, in [0, 1].
    pub fn score(&self, check: &Check, category: DocumentCategory) -> f64 {
        let text = check_text(check);

        if UNIVERSAL.iter().any(|k| contains_phrase(&text, k)) {
            return self.config.universal_score;
        }

        if category == DocumentCategory::Unknown {
            return self.config.unknown_category_score;
        }

        let specific = match_ratio(&text, check_keywords(category));
        let other = DocumentCategory::KNOWN
            .iter()
            .filter(|c| **c != category)
            .map(|c| match_ratio(&text, check_keywords(*c)))
            .fold(0.0_f64, f64::max);

        if specific > 0.1 && other < 0.1 {
            0.7 + 0.3 * specific
        } else if other > 0.2 {
            0.2 - 0.2 * other
        } else {
            self.config.neutral_score
        }
    }

    /// Split `checks` into those that should run and those skipped.
    ///
    /// Checks restricted to other products via `applicable_products` are
    /// skipped regardless of keywords. Input order is preserved on both
    /// sides.
    pub fn partition(
        &self,
        classification: &Classification,
        checks: Vec<Check>,
    ) -> (Vec<Check>, Vec<SkippedCheck>) {
        let category = classification.category;
        let mut applicable = Vec::with_capacity(checks.len());
        let mut skipped = Vec::new();

        for check in checks {
            if let Some(reason) = product_mismatch(&check, category) {
                skipped.push(SkippedCheck {
                    check,
                    relevance: 0.0,
                    reason,
                });
                continue;
            }

            let relevance = self.score(&check, category);
            if relevance >= self.config.threshold {
                applicable.push(check);
            } else {
                let reason = skip_reason(&check, category);
                tracing::debug!(check_id = %check.id, relevance, %reason, "Skipping check");
                skipped.push(SkippedCheck {
                    check,
                    relevance,
                    reason,
                });
            }
        }

        tracing::info!(
            category = %category,
            applicable = applicable.len(),
            skipped = skipped.len(),
            "Partitioned checks by relevance"
        );

        (applicable, skipped)
    }

    /// Fraction of each category's document keywords found in `text`.
    pub fn keyword_scores(&self, text: &str) -> BTreeMap<DocumentCategory, f64> {
        let normalized = normalize_words(text);
        DocumentCategory::KNOWN
            .iter()
            .map(|c| (*c, match_ratio(&normalized, document_keywords(*c))))
            .collect()
    }

    /// Classification from keywords alone.
    pub fn classify_by_keywords(&self, text: &str) -> Classification {
        let scores = self.keyword_scores(text);
        let (category, confidence) = best_category(&scores);
        Classification {
            category,
            confidence,
            method: ClassificationMethod::Keyword,
            keyword_scores: scores,
            purpose: None,
        }
    }

    /// Reconcile a model classification with the keyword signal.
    ///
    /// A weak model answer (below `model_override_below`) is replaced by the
    /// best keyword category when that category scores above
    /// `keyword_override_above`; confidence becomes the mean of the two.
    pub fn combine(
        &self,
        category: DocumentCategory,
        confidence: f64,
        purpose: Option<String>,
        text: &str,
    ) -> Classification {
        let scores = self.keyword_scores(text);
        let (best, best_score) = best_category(&scores);
        let confidence = confidence.clamp(0.0, 1.0);

        if confidence < self.config.model_override_below
            && best_score > self.config.keyword_override_above
        {
            return Classification {
                category: best,
                confidence: (confidence + best_score) / 2.0,
                method: ClassificationMethod::Combined,
                keyword_scores: scores,
                purpose,
            };
        }

        Classification {
            category,
            confidence,
            method: ClassificationMethod::Model,
            keyword_scores: scores,
            purpose,
        }
    }
}

fn check_text(check: &Check) -> String {
    normalize_words(&format!(
        "{} {} {} {}",
        check.name, check.description, check.requirement, check.kind
    ))
}

fn best_category(scores: &BTreeMap<DocumentCategory, f64>) -> (DocumentCategory, f64) {
    let mut best = (DocumentCategory::Unknown, 0.0);
    for (category, score) in scores {
        if *score > best.1 {
            best = (*category, *score);
        }
    }
    best
}

fn product_mismatch(check: &Check, category: DocumentCategory) -> Option<String> {
    if check.applicable_products.is_empty() || category == DocumentCategory::Unknown {
        return None;
    }
    let matches = check
        .applicable_products
        .iter()
        .any(|p| DocumentCategory::from(p.clone()) == category || p.eq_ignore_ascii_case("all"));
    if matches {
        None
    } else {
        Some(format!(
            "Check limited to {} products, document is {}",
            check
                .applicable_products
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
            category
        ))
    }
}

/// Human-readable reason for skipping `check` on a `category` document.
pub fn skip_reason(check: &Check, category: DocumentCategory) -> String {
    let text = normalize_words(check.match_text());
    let mentions = |terms: &[&str]| terms.iter().any(|t| contains_phrase(&text, t));

    let specific = if mentions(&["property", "ltv", "appraisal"]) {
        (category != DocumentCategory::Mortgage).then_some("Property-related check")
    } else if mentions(&["vehicle", "car", "auto"]) {
        (category != DocumentCategory::AutoLoan).then_some("Vehicle-related check")
    } else if mentions(&["revolving", "credit limit"]) {
        (category != DocumentCategory::CreditCard).then_some("Credit card-specific check")
    } else if mentions(&["business", "commercial", "dscr"]) {
        (category != DocumentCategory::BusinessLoan).then_some("Business loan check")
    } else if mentions(&["education", "enrollment"]) {
        (category != DocumentCategory::StudentLoan).then_some("Student loan check")
    } else {
        None
    };

    match specific {
        Some(what) => format!("{what} not applicable to {category}"),
        None => format!("Check not relevant for {category} application"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::CheckKind;

    fn check(desc: &str) -> Check {
        Check::new("X", CheckKind::Criteria, desc)
    }

    #[test]
    fn test_universal_checks_score_high() {
        let scorer = RelevanceScorer::default();
        let c = check("Minimum credit score of 620 required");
        assert_eq!(scorer.score(&c, DocumentCategory::AutoLoan), 0.9);
        assert_eq!(scorer.score(&c, DocumentCategory::Mortgage), 0.9);
    }

    #[test]
    fn test_other_category_scores_low() {
        let scorer = RelevanceScorer::default();
        let c = check("Vehicle mileage must be under 100000 and dealer must provide VIN");
        let score = scorer.score(&c, DocumentCategory::Mortgage);
        assert!(score < 0.6, "score {score}");
        assert!(scorer.score(&c, DocumentCategory::AutoLoan) >= 0.7);
    }

    #[test]
    fn test_neutral_and_unknown() {
        let scorer = RelevanceScorer::default();
        let c = check("Applicant must sign the disclosure form");
        assert_eq!(scorer.score(&c, DocumentCategory::Mortgage), 0.5);
        assert_eq!(scorer.score(&c, DocumentCategory::Unknown), 0.6);
    }

    #[test]
    fn test_partition_records_reasons() {
        let scorer = RelevanceScorer::default();
        let classification = Classification {
            category: DocumentCategory::AutoLoan,
            confidence: 0.9,
            method: ClassificationMethod::Model,
            keyword_scores: BTreeMap::new(),
            purpose: None,
        };
        let checks = vec![
            Check::new("TH01", CheckKind::Threshold, "FICO score at least 620"),
            Check::new("TH02", CheckKind::Threshold, "Property appraisal and title and escrow complete"),
        ];

        let (applicable, skipped) = scorer.partition(&classification, checks);
        assert_eq!(applicable.len(), 1);
        assert_eq!(applicable[0].id, "TH01");
        assert_eq!(skipped.len(), 1);
        assert_eq!(
            skipped[0].reason,
            "Property-related check not applicable to auto_loan"
        );
    }

    #[test]
    fn test_product_restriction() {
        let scorer = RelevanceScorer::default();
        let classification = Classification {
            category: DocumentCategory::CreditCard,
            ..Classification::unknown()
        };
        let c = check("FICO at least 700").with_products(["mortgage"]);
        let (applicable, skipped) = scorer.partition(&classification, vec![c]);
        assert!(applicable.is_empty());
        assert!(skipped[0].reason.contains("mortgage"));
    }

    #[test]
    fn test_keyword_classification() {
        let scorer = RelevanceScorer::default();
        let text = "Mortgage application: property appraisal, title insurance, escrow account, LTV 80%";
        let c = scorer.classify_by_keywords(text);
        assert_eq!(c.category, DocumentCategory::Mortgage);
        assert_eq!(c.method, ClassificationMethod::Keyword);
        assert!(c.confidence > 0.3);
    }

    #[test]
    fn test_combine_prefers_confident_model() {
        let scorer = RelevanceScorer::default();
        let text = "Mortgage application: property appraisal, title, escrow, LTV, deed, homeowner";
        let confident = scorer.combine(DocumentCategory::PersonalLoan, 0.95, None, text);
        assert_eq!(confident.category, DocumentCategory::PersonalLoan);
        assert_eq!(confident.method, ClassificationMethod::Model);

        let weak = scorer.combine(DocumentCategory::PersonalLoan, 0.4, None, text);
        assert_eq!(weak.category, DocumentCategory::Mortgage);
        assert_eq!(weak.method, ClassificationMethod::Combined);
    }

    #[test]
    fn test_category_lenient_parse() {
        let c: DocumentCategory = serde_json::from_str("\"Auto Loan\"").unwrap();
        assert_eq!(c, DocumentCategory::AutoLoan);
        let c: DocumentCategory = serde_json::from_str("\"other\"").unwrap();
        assert_eq!(c, DocumentCategory::Unknown);
    }
}
