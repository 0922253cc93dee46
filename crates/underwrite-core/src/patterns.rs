//! Shared text patterns.
//!
//! Used by the chunker (structure detection), dedup normalization and
//! threshold inference.

use lazy_static::lazy_static;
use regex::Regex;

/// Comparison phrases, longest first so alternation picks the full phrase.
///
/// Each entry maps a phrase to the canonical operator it denotes.
pub const OPERATOR_PHRASES: &[(&str, &str)] = &[
    ("greater than or equal to", ">="),
    ("less than or equal to", "<="),
    ("must not exceed", "<="),
    ("shall not exceed", "<="),
    ("may not exceed", "<="),
    ("cannot exceed", "<="),
    ("not to exceed", "<="),
    ("does not exceed", "<="),
    ("not exceed", "<="),
    ("no greater than", "<="),
    ("no more than", "<="),
    ("not more than", "<="),
    ("no less than", ">="),
    ("not less than", ">="),
    ("no lower than", ">="),
    ("no higher than", "<="),
    ("a maximum of", "<="),
    ("a minimum of", ">="),
    ("maximum of", "<="),
    ("minimum of", ">="),
    ("at most", "<="),
    ("at least", ">="),
    ("up to", "<="),
    ("maximum", "<="),
    ("minimum", ">="),
    ("less than", "<"),
    ("lower than", "<"),
    ("greater than", ">"),
    ("higher than", ">"),
    ("more than", ">"),
    ("exceeds", ">"),
    ("exceed", ">"),
    ("below", "<"),
    ("under", "<"),
    ("above", ">"),
    ("over", ">"),
    ("max", "<="),
    ("min", ">="),
    ("<=", "<="),
    (">=", ">="),
    ("≤", "<="),
    ("≥", ">="),
    ("<", "<"),
    (">", ">"),
];

fn operator_alternation() -> String {
    OPERATOR_PHRASES
        .iter()
        .map(|(phrase, _)| regex::escape(phrase))
        .collect::<Vec<_>>()
        .join("|")
}

lazy_static! {
    // =========================================================================
    // DOCUMENT STRUCTURE
    // =========================================================================

    /// Numbered headings: "1.", "2.3", "(a)", "IV." followed by a capitalized title
    pub static ref NUMBERED_HEADING: Regex = Regex::new(
        r"(?m)^[ \t]*(?:\d+(?:\.\d+)*[.)]?|\([a-z0-9]{1,3}\)|[IVX]{1,5}\.)[ \t]+[A-Z][^\n]{0,120}$"
    ).unwrap();

    /// ALL CAPS header lines
    pub static ref CAPS_HEADING: Regex = Regex::new(
        r"(?m)^[ \t]*[A-Z][A-Z0-9 &/,\-]{2,80}:?[ \t]*$"
    ).unwrap();

    /// Title lines naming a requirement block ("Credit Requirements:")
    pub static ref TITLE_HEADING: Regex = Regex::new(
        r"(?m)^[ \t]*[A-Z][A-Za-z ]{0,60}(?:Requirements?|Policy|Guidelines?|Limits?|Criteria|Standards?)[ \t]*(?::|$)"
    ).unwrap();

    /// Blank line between paragraphs
    pub static ref PARAGRAPH_BREAK: Regex = Regex::new(r"\n[ \t]*\n").unwrap();

    /// Start of a bullet or enumerated list item
    pub static ref LIST_ITEM: Regex = Regex::new(
        r"(?m)^[ \t]*(?:[-*•]|\d+[.)]|\([a-z0-9]{1,3}\))[ \t]+"
    ).unwrap();

    /// Sentence terminator followed by whitespace
    pub static ref SENTENCE_END: Regex = Regex::new(r#"[.!?]["')\]]*\s+"#).unwrap();

    // =========================================================================
    // REQUIREMENT TEXT
    // =========================================================================

    /// Any comparison phrase, bounded so "min" does not match inside "admin"
    pub static ref OPERATOR: Regex = Regex::new(&format!(
        r"(?:^|[^a-z0-9_])(?P<op>{})(?:$|[^a-z0-9_])",
        operator_alternation()
    )).unwrap();

    /// Comparison phrase followed by a number, allowing a few words between:
    /// "must not exceed 80%", "minimum FICO score of 620"
    pub static ref OPERATOR_VALUE: Regex = Regex::new(&format!(
        r"(?:^|[^a-z0-9_])(?P<op>{})(?:\s+[a-z][a-z/\-]*){{0,4}}?\s*(?:of\s+)?(?:to\s+)?(?P<cur>\$)?\s*(?P<num>\d[\d,]*(?:\.\d+)?)\s*(?P<unit>%|percent\b|months?\b|years?\b|days?\b)?",
        operator_alternation()
    )).unwrap();

    /// Runs of whitespace
    pub static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Canonical operator for a matched phrase.
pub fn canonical_operator(phrase: &str) -> Option<&'static str> {
    OPERATOR_PHRASES
        .iter()
        .find(|(p, _)| *p == phrase)
        .map(|(_, op)| *op)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_prefers_longest_phrase() {
        let caps = OPERATOR.captures("ltv must not exceed 80%").unwrap();
        assert_eq!(&caps["op"], "must not exceed");

        let caps = OPERATOR.captures("score not less than 620").unwrap();
        assert_eq!(&caps["op"], "not less than");
    }

    #[test]
    fn test_operator_respects_word_boundaries() {
        assert!(OPERATOR.captures("the administrator reviews").is_none());
        assert!(OPERATOR.captures("minimum score").is_some());
    }

    #[test]
    fn test_operator_value() {
        let caps = OPERATOR_VALUE.captures("loan amount of at least $5,000.50 required").unwrap();
        assert_eq!(&caps["op"], "at least");
        assert_eq!(&caps["num"], "5,000.50");
        assert!(caps.name("cur").is_some());
    }

    #[test]
    fn test_headings() {
        assert!(NUMBERED_HEADING.is_match("2.1 Credit Score"));
        assert!(CAPS_HEADING.is_match("DEBT TO INCOME"));
        assert!(TITLE_HEADING.is_match("Property Requirements:"));
        assert!(!CAPS_HEADING.is_match("Borrowers must be employed."));
    }

    #[test]
    fn test_canonical_operator() {
        assert_eq!(canonical_operator("at least"), Some(">="));
        assert_eq!(canonical_operator("below"), Some("<"));
        assert_eq!(canonical_operator("sideways"), None);
    }
}
