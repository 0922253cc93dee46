//! Keyword tables and whole-word phrase matching.
//!
//! Matching is done on a normalized word stream (lowercase, punctuation and
//! hyphens turned into spaces, padded with a space on each side) so that
//! "car" matches "car loan" but not "card".

use crate::relevance::DocumentCategory;

/// Lowercase, replace non-alphanumerics with spaces, collapse, pad.
pub fn normalize_words(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(' ');
    let mut last_space = true;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            out.push(c);
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    if !last_space {
        out.push(' ');
    }
    out
}

/// Whether `phrase` occurs as whole words in already-normalized `haystack`.
pub fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    let needle = normalize_words(phrase);
    if needle.trim().is_empty() {
        return false;
    }
    haystack.contains(&needle)
}

/// Number of `phrases` present in normalized `haystack`.
pub fn count_matches(haystack: &str, phrases: &[&str]) -> usize {
    phrases.iter().filter(|p| contains_phrase(haystack, p)).count()
}

/// Fraction of `phrases` present, 0.0 for an empty table.
pub fn match_ratio(haystack: &str, phrases: &[&str]) -> f64 {
    if phrases.is_empty() {
        return 0.0;
    }
    count_matches(haystack, phrases) as f64 / phrases.len() as f64
}

/// Terms that apply to every product; a check mentioning any is relevant.
pub const UNIVERSAL: &[&str] = &[
    "credit score",
    "fico",
    "income",
    "employment",
    "debt",
    "dti",
    "identification",
    "fraud",
    "compliance",
    "eligibility",
    "age",
    "citizenship",
    "residence",
    "bankruptcy",
    "default",
];

/// Terms identifying a document of a given category.
pub fn document_keywords(category: DocumentCategory) -> &'static [&'static str] {
    match category {
        DocumentCategory::Mortgage => &[
            "mortgage",
            "home loan",
            "property",
            "real estate",
            "house",
            "dwelling",
            "residence",
            "ltv",
            "loan to value",
            "appraisal",
            "title",
            "deed",
            "escrow",
            "homeowner",
            "property tax",
        ],
        DocumentCategory::AutoLoan => &[
            "auto loan",
            "vehicle",
            "car",
            "automobile",
            "truck",
            "motorcycle",
            "vin",
            "make",
            "model",
            "mileage",
            "vehicle identification",
            "dealer",
            "trade in",
            "vehicle value",
        ],
        DocumentCategory::CreditCard => &[
            "credit card",
            "revolving",
            "credit limit",
            "apr",
            "cash advance",
            "balance transfer",
            "minimum payment",
            "grace period",
            "annual fee",
            "rewards",
            "cashback",
            "credit line",
        ],
        DocumentCategory::PersonalLoan => &[
            "personal loan",
            "unsecured",
            "signature loan",
            "installment",
            "consolidation",
            "fixed rate",
            "term loan",
        ],
        DocumentCategory::BusinessLoan => &[
            "business loan",
            "commercial",
            "sba",
            "working capital",
            "equipment finance",
            "business credit",
            "revenue",
            "cash flow",
            "dscr",
            "business plan",
            "financial statements",
            "tax returns",
        ],
        DocumentCategory::StudentLoan => &[
            "student loan",
            "education",
            "tuition",
            "school",
            "university",
            "college",
            "degree",
            "enrollment",
            "cosigner",
            "deferment",
        ],
        DocumentCategory::Unknown => &[],
    }
}

/// Terms that tie a check to one category.
pub fn check_keywords(category: DocumentCategory) -> &'static [&'static str] {
    match category {
        DocumentCategory::Mortgage => &[
            "ltv",
            "property",
            "appraisal",
            "title",
            "home",
            "dwelling",
            "escrow",
            "pmi",
            "hazard insurance",
            "flood",
            "hoa",
        ],
        DocumentCategory::AutoLoan => &[
            "vehicle",
            "car",
            "auto",
            "vin",
            "mileage",
            "make",
            "model",
            "dealer",
            "trade in",
            "gap insurance",
            "vehicle value",
        ],
        DocumentCategory::CreditCard => &[
            "credit limit",
            "apr",
            "revolving",
            "minimum payment",
            "cash advance",
            "balance transfer",
            "annual fee",
        ],
        DocumentCategory::BusinessLoan => &[
            "business",
            "commercial",
            "revenue",
            "cash flow",
            "dscr",
            "business credit",
            "financial statements",
            "sba",
        ],
        DocumentCategory::PersonalLoan => &["personal", "unsecured", "signature", "installment"],
        DocumentCategory::StudentLoan => &["student", "education", "school", "enrollment", "degree"],
        DocumentCategory::Unknown => &[],
    }
}

/// Policy domains and the terms that suggest them.
pub const DOMAINS: &[(&str, &[&str])] = &[
    (
        "financial",
        &["financial", "ratio", "revenue", "profit", "cash", "debt", "equity", "balance", "income", "credit", "loan"],
    ),
    (
        "esg",
        &["esg", "environmental", "social", "governance", "sustainability", "carbon", "emission", "diversity", "ethics"],
    ),
    (
        "regulatory",
        &["regulatory", "compliance", "legal", "law", "regulation", "audit", "requirement", "standard"],
    ),
    (
        "risk",
        &["risk", "volatility", "exposure", "hedge", "var", "stress", "scenario", "probability"],
    ),
    (
        "operational",
        &["operational", "process", "efficiency", "productivity", "quality", "performance", "kpi"],
    ),
    (
        "market",
        &["market", "competitive", "industry", "peer", "benchmark", "analysis", "comparison"],
    ),
    (
        "strategic",
        &["strategic", "business", "growth", "investment", "merger", "acquisition", "partnership"],
    ),
    (
        "hr",
        &["hr", "human", "employee", "staff", "training", "talent", "compensation", "benefits"],
    ),
    (
        "technology",
        &["technology", "tech", "it", "digital", "cyber", "security", "data", "system"],
    ),
    (
        "supply_chain",
        &["supply", "chain", "vendor", "supplier", "procurement", "logistics", "inventory"],
    ),
];
