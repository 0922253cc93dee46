//! Check normalization and deduplication.
//!
//! Two checks are duplicates when their match text (description, or the
//! requirement when there is no description) normalizes to the same
//! string: lowercase, comparison phrases mapped to operators, whitespace
//! collapsed, trailing punctuation dropped.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use crate::check::Check;
use crate::patterns::{canonical_operator, OPERATOR, WHITESPACE};

/// Normalized form of a requirement or description.
pub fn normalize_text(text: &str) -> String {
    let lower = text.to_lowercase();
    let collapsed = WHITESPACE.replace_all(lower.trim(), " ");

    let with_ops = OPERATOR.replace_all(&collapsed, |caps: &regex::Captures<'_>| {
        let whole = &caps[0];
        let phrase = &caps["op"];
        match canonical_operator(phrase) {
            Some(op) => whole.replacen(phrase, op, 1),
            None => whole.to_string(),
        }
    });

    with_ops
        .replace(" percent", "%")
        .replace("percent", "%")
        .trim_end_matches(['.', ';', ',', ' '])
        .to_string()
}

/// Stable content hash of a check's normalized match text.
pub fn content_hash(check: &Check) -> u64 {
    let mut hasher = DefaultHasher::new();
    normalize_text(check.match_text()).hash(&mut hasher);
    hasher.finish()
}

/// Hash of the raw requirement, used to tell apart checks sharing an id.
pub fn requirement_hash(requirement: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    requirement.hash(&mut hasher);
    hasher.finish()
}

/// Drop content duplicates and make ids unique.
///
/// The first occurrence of each normalized text wins. A surviving check
/// whose id was already taken gets a `-2`, `-3`, ... suffix. Data fields
/// are deduplicated. Running this on its own output changes nothing.
pub fn dedup_checks(checks: Vec<Check>) -> Vec<Check> {
    let total = checks.len();
    let mut seen_content: HashSet<u64> = HashSet::with_capacity(total);
    let mut unique: Vec<Check> = Vec::with_capacity(total);

    for mut check in checks {
        if !seen_content.insert(content_hash(&check)) {
            tracing::debug!(check_id = %check.id, "Dropping duplicate check");
            continue;
        }
        check.normalize_fields();
        unique.push(check);
    }

    // Ids already present are reserved before any renaming so that a
    // suffix never collides with a later check's original id.
    let mut taken: HashSet<String> = HashSet::with_capacity(unique.len());
    let mut collisions = Vec::new();
    for (idx, check) in unique.iter().enumerate() {
        if !taken.insert(check.id.clone()) {
            collisions.push(idx);
        }
    }
    for idx in collisions {
        let base = unique[idx].id.clone();
        let mut n = 2;
        let renamed = loop {
            let candidate = format!("{base}-{n}");
            if !taken.contains(&candidate) {
                break candidate;
            }
            n += 1;
        };
        tracing::debug!(from = %base, to = %renamed, "Renaming colliding check id");
        taken.insert(renamed.clone());
        unique[idx].id = renamed;
    }

    if unique.len() < total {
        tracing::info!(
            before = total,
            after = unique.len(),
            "Removed duplicate checks"
        );
    }

    unique
}

/// Concatenate per-chunk check lists and deduplicate.
pub fn merge_checks<I>(batches: I) -> Vec<Check>
where
    I: IntoIterator<Item = Vec<Check>>,
{
    dedup_checks(batches.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::CheckKind;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_maps_synonyms() {
        assert_eq!(
            normalize_text("LTV must not exceed 80 percent."),
            normalize_text("ltv   <= 80%")
        );
        assert_eq!(
            normalize_text("Credit score at least 620"),
            normalize_text("credit score minimum 620")
        );
        assert_ne!(
            normalize_text("DTI below 43%"),
            normalize_text("DTI at most 43%")
        );
    }

    #[test]
    fn test_merge_drops_duplicates_across_chunks() {
        let a = Check::new("TH01", CheckKind::Threshold, "LTV must not exceed 80%");
        let b = Check::new("TH05", CheckKind::Threshold, "LTV  must not exceed 80 percent");
        let c = Check::new("TH02", CheckKind::Threshold, "FICO at least 620");

        let merged = merge_checks(vec![vec![a, c], vec![b]]);
        let ids: Vec<_> = merged.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["TH01", "TH02"]);
    }

    #[test]
    fn test_colliding_ids_get_suffixes() {
        let merged = dedup_checks(vec![
            Check::new("CR01", CheckKind::Criteria, "Borrower must be employed"),
            Check::new("CR01", CheckKind::Criteria, "Borrower must be a citizen"),
            Check::new("CR01", CheckKind::Criteria, "Borrower must have ID"),
            Check::new("CR01-2", CheckKind::Criteria, "Borrower must be 18"),
        ]);
        let ids: Vec<_> = merged.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["CR01", "CR01-3", "CR01-4", "CR01-2"]);
    }

    #[test]
    fn test_description_preferred_over_requirement() {
        let a = Check::new("A", CheckKind::Criteria, "one wording").with_description("Same thing");
        let b = Check::new("B", CheckKind::Criteria, "other wording").with_description("same thing.");
        assert_eq!(dedup_checks(vec![a, b]).len(), 1);
    }

    fn arb_check() -> impl Strategy<Value = Check> {
        (
            prop::sample::select(vec!["TH01", "TH02", "CR01", "SC01"]),
            prop::sample::select(vec![
                "LTV must not exceed 80%",
                "ltv <= 80%",
                "FICO at least 620",
                "Credit score minimum 620",
                "DTI below 43%",
                "Borrower must be employed",
            ]),
            prop::collection::vec(prop::sample::select(vec!["a", "b", "c"]), 0..4),
        )
            .prop_map(|(id, req, fields)| {
                Check::new(id, CheckKind::Criteria, req).with_fields(fields)
            })
    }

    proptest! {
        #[test]
        fn prop_dedup_is_idempotent(checks in prop::collection::vec(arb_check(), 0..20)) {
            let once = dedup_checks(checks);
            let twice = dedup_checks(once.clone());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_dedup_ids_unique(checks in prop::collection::vec(arb_check(), 0..20)) {
            let out = dedup_checks(checks);
            let ids: HashSet<_> = out.iter().map(|c| c.id.clone()).collect();
            prop_assert_eq!(ids.len(), out.len());
        }
    }
}
