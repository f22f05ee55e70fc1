//! Synthesis gap detection (spec.md §4.10). The canonical anti-fraud check:
//! every blocking active item must be addressed in the synthesis plan.

use std::collections::HashMap;

use crate::model::{CritiqueItem, Severity, SynthesisPlan};

const TITLE_PREFIX_LEN: usize = 50;
const MIN_NORMALIZED_TITLE_LEN: usize = 8;

/// Blocking active items not addressed (by display_id or normalized title
/// prefix) in `plan`. Matching runs against canonical item text only.
pub fn compute_synthesis_gaps<'a>(
    active_set: &[String],
    items: &'a [CritiqueItem],
    plan: &SynthesisPlan,
) -> Vec<&'a CritiqueItem> {
    let items_by_id: HashMap<&str, &CritiqueItem> =
        items.iter().map(|i| (i.id.as_str(), i)).collect();

    let concatenation: String = plan
        .accepted_suggestions
        .iter()
        .chain(plan.rejected_suggestions.iter())
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    // Literal match (display_id): case-insensitive, underscores preserved.
    let literal_haystack = concatenation.to_lowercase();
    // Normalized match (title prefix): same lowercase+alphanumeric-filter
    // normalization applied to both sides, per spec.md §4.10 rule 2. No
    // length truncation here — only the item's own title is capped to its
    // first 50 characters before normalizing.
    let normalized_haystack = strip_to_alnum_lower(&concatenation);

    active_set
        .iter()
        .filter_map(|id| items_by_id.get(id.as_str()).copied())
        .filter(|item| item.severity == Severity::Blocking)
        .filter(|item| !is_addressed(item, &literal_haystack, &normalized_haystack))
        .collect()
}

fn is_addressed(item: &CritiqueItem, literal_haystack: &str, normalized_haystack: &str) -> bool {
    if literal_haystack.contains(&item.display_id.to_lowercase()) {
        return true;
    }
    let normalized_title = normalize_title_prefix(&item.title);
    if normalized_title.len() > MIN_NORMALIZED_TITLE_LEN && normalized_haystack.contains(&normalized_title) {
        return true;
    }
    false
}

fn normalize_title_prefix(title: &str) -> String {
    let prefix: String = title.chars().take(TITLE_PREFIX_LEN).collect();
    strip_to_alnum_lower(&prefix)
}

fn strip_to_alnum_lower(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .trim()
        .to_string()
}
