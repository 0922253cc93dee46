//! Policy domain detection for checks that arrive without one.

use crate::check::Check;
use crate::keywords::{count_matches, normalize_words, DOMAINS};

/// Best-matching domain for `check`, or "general" when nothing matches.
///
/// Ties go to the domain listed first.
pub fn detect_domain(check: &Check) -> String {
    let text = normalize_words(&format!(
        "{} {} {} {}",
        check.kind, check.name, check.description, check.requirement
    ));

    let mut best = ("general", 0usize);
    for (domain, keywords) in DOMAINS {
        let matches = count_matches(&text, keywords);
        if matches > best.1 {
            best = (*domain, matches);
        }
    }
    best.0.to_string()
}

/// Fill in the domain when it is missing or left as "general".
pub fn ensure_domain(check: &mut Check) {
    if check.domain.trim().is_empty() || check.domain == "general" {
        check.domain = detect_domain(check);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::CheckKind;

    #[test]
    fn test_financial_domain() {
        let check = Check::new("T", CheckKind::Threshold, "Debt to income ratio below 43%");
        assert_eq!(detect_domain(&check), "financial");
    }

    #[test]
    fn test_esg_domain() {
        let check = Check::new("Q", CheckKind::Qualitative, "Carbon emission disclosures follow sustainability guidance");
        assert_eq!(detect_domain(&check), "esg");
    }

    #[test]
    fn test_general_fallback() {
        let check = Check::new("G", CheckKind::Generic, "Signed by the applicant");
        assert_eq!(detect_domain(&check), "general");
    }

    #[test]
    fn test_ensure_domain_keeps_explicit() {
        let mut check = Check::new("T", CheckKind::Threshold, "Debt ratio").with_domain("mortgage");
        ensure_domain(&mut check);
        assert_eq!(check.domain, "mortgage");

        let mut check = Check::new("T", CheckKind::Threshold, "Debt ratio");
        ensure_domain(&mut check);
        assert_eq!(check.domain, "financial");
    }
}
