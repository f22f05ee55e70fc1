//! Near-duplicate detection via 3-gram character shingle Jaccard similarity
//! (spec.md §4.8). Advisory only; never blocks ingestion.

use std::collections::HashSet;

use crate::model::ClosedItemRef;

pub const SIMILARITY_THRESHOLD: f64 = 0.7;
const SHINGLE_LEN: usize = 3;

/// Build the 3-gram character shingle set of `text`. Text shorter than 3
/// characters yields an empty set.
fn shingles(text: &str) -> HashSet<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    if chars.len() < SHINGLE_LEN {
        return HashSet::new();
    }
    let mut set = HashSet::new();
    for window in chars.windows(SHINGLE_LEN) {
        let start = window[0].0;
        let end_char = window[SHINGLE_LEN - 1];
        let end = end_char.0 + end_char.1.len_utf8();
        set.insert(&text[start..end]);
    }
    set
}

fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// IDs of closed items whose normalized text is near-duplicate (Jaccard ≥
/// `threshold`) of `normalized_text`. Only meaningful for new root items.
pub fn compute_similarity_warn(
    normalized_text: &str,
    closed_items: &[ClosedItemRef],
    threshold: f64,
) -> Vec<String> {
    let target = shingles(normalized_text);
    if target.is_empty() {
        return Vec::new();
    }
    closed_items
        .iter()
        .filter(|closed| jaccard(&target, &shingles(&closed.normalized_text)) >= threshold)
        .map(|closed| closed.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed(id: &str, text: &str) -> ClosedItemRef {
        ClosedItemRef {
            id: id.to_string(),
            normalized_text: text.to_string(),
        }
    }

    #[test]
    fn identical_text_is_similar() {
        let warns = compute_similarity_warn(
            "sql injection in login form",
            &[closed("blk_a", "sql injection in login form")],
            SIMILARITY_THRESHOLD,
        );
        assert_eq!(warns, vec!["blk_a".to_string()]);
    }

    #[test]
    fn near_duplicate_with_minor_edit_is_similar() {
        let warns = compute_similarity_warn(
            "sql injection in the login form",
            &[closed("blk_a", "sql injection in login form")],
            SIMILARITY_THRESHOLD,
        );
        assert_eq!(warns, vec!["blk_a".to_string()]);
    }

    #[test]
    fn unrelated_text_is_not_similar() {
        let warns = compute_similarity_warn(
            "missing rate limiting on api",
            &[closed("blk_a", "sql injection in login form")],
            SIMILARITY_THRESHOLD,
        );
        assert!(warns.is_empty());
    }

    #[test]
    fn short_text_yields_no_warnings() {
        let warns = compute_similarity_warn("ab", &[closed("blk_a", "ab")], SIMILARITY_THRESHOLD);
        assert!(warns.is_empty());
    }

    #[test]
    fn empty_text_yields_no_warnings() {
        let warns = compute_similarity_warn("", &[closed("blk_a", "")], SIMILARITY_THRESHOLD);
        assert!(warns.is_empty());
    }
}
