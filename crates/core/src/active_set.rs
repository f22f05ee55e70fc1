//! Active set and round convergence (spec.md §4.7).

use std::collections::{HashMap, HashSet};

use crate::disposition::{effective_disposition, is_terminal};
use crate::model::{ConvergenceState, CritiqueItem, Decision, DispositionRecord, Severity};

/// Map from item id to the ids of its children (items whose `derived_from`
/// includes it). Kept as a separately derived structure rather than a field
/// on `CritiqueItem`, to preserve item immutability (spec.md §9).
pub fn build_children_map(items: &[CritiqueItem]) -> HashMap<String, Vec<String>> {
    let mut children: HashMap<String, Vec<String>> = HashMap::new();
    for item in items {
        if let Some(parents) = &item.derived_from {
            for parent in parents {
                children.entry(parent.clone()).or_default().push(item.id.clone());
            }
        }
    }
    children
}

/// Non-terminal leaves: items that are not terminal and have no non-terminal
/// child (an item with no children at all is a leaf).
pub fn compute_active_set(
    items: &[CritiqueItem],
    records: &[DispositionRecord],
    children_map: &HashMap<String, Vec<String>>,
) -> Vec<String> {
    let mut memo = HashMap::new();
    items
        .iter()
        .filter(|item| {
            if is_terminal(&item.id, records, &mut memo) {
                return false;
            }
            match children_map.get(&item.id) {
                None => true,
                Some(children) => children
                    .iter()
                    .all(|child| is_terminal(child, records, &mut memo)),
            }
        })
        .map(|item| item.id.clone())
        .collect()
}

/// Closed iff no item in `active_set` has blocking severity.
pub fn compute_convergence_state(active_set: &[String], items: &[CritiqueItem]) -> ConvergenceState {
    let active: HashSet<&str> = active_set.iter().map(String::as_str).collect();
    let any_blocking = items
        .iter()
        .any(|item| active.contains(item.id.as_str()) && item.severity == Severity::Blocking);
    if any_blocking {
        ConvergenceState::Open
    } else {
        ConvergenceState::Closed
    }
}

/// Items whose effective disposition is `pending_transformation` — the open
/// ⚑ gates.
pub fn compute_pending_flags(items: &[CritiqueItem], records: &[DispositionRecord]) -> Vec<String> {
    items
        .iter()
        .filter(|item| {
            matches!(
                effective_disposition(&item.id, records).map(|r| r.decision),
                Some(Decision::PendingTransformation)
            )
        })
        .map(|item| item.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DecidedBy, Role, Transformation};

    fn item(id: &str, severity: Severity, derived_from: Option<Vec<&str>>) -> CritiqueItem {
        CritiqueItem {
            id: id.to_string(),
            display_id: id.chars().take(12).collect(),
            proposal_id: "p1".to_string(),
            role: Role::A,
            round: 1,
            severity,
            title: "t".to_string(),
            detail: "d".to_string(),
            normalized_text: "t d".to_string(),
            normalization_spec_version: "v1".to_string(),
            derived_from: derived_from.map(|v| v.into_iter().map(String::from).collect()),
            root_ids: vec![id.to_string()],
            root_severity: Some(severity),
            similarity_warn: None,
            minted_at: "2026-01-01T00:00:00Z".to_string(),
            minted_by: "host".to_string(),
        }
    }

    fn record(item_id: &str, decision: Decision, children: Option<Vec<&str>>) -> DispositionRecord {
        DispositionRecord {
            disposition_id: format!("disp_{item_id}"),
            item_id: item_id.to_string(),
            round: 1,
            decided_by: DecidedBy::Host,
            decision,
            rationale: "r".to_string(),
            transformation: children.map(|c| Transformation {
                child_ids: c.into_iter().map(String::from).collect(),
                rationale: "t".to_string(),
                proposed_severity_downgrade: None,
            }),
            proposed_at: "2026-01-01T00:00:00Z".to_string(),
            terminal_at: None,
        }
    }

    #[test]
    fn s4_transformed_chain_terminality() {
        let items = vec![
            item("R", Severity::Blocking, None),
            item("C1", Severity::Blocking, Some(vec!["R"])),
            item("C2", Severity::Blocking, Some(vec!["R"])),
        ];
        let records = vec![
            record("R", Decision::Transformed, Some(vec!["C1", "C2"])),
            record("C1", Decision::Accepted, None),
            record("C2", Decision::Accepted, None),
        ];
        let children = build_children_map(&items);
        let active = compute_active_set(&items, &records, &children);
        assert!(active.is_empty());
        let convergence = compute_convergence_state(&active, &items);
        assert_eq!(convergence, ConvergenceState::Closed);
    }

    #[test]
    fn leaf_with_no_children_and_no_record_is_active() {
        let items = vec![item("A", Severity::Minor, None)];
        let children = build_children_map(&items);
        let active = compute_active_set(&items, &[], &children);
        assert_eq!(active, vec!["A".to_string()]);
    }

    #[test]
    fn blocking_active_item_keeps_round_open() {
        let items = vec![item("A", Severity::Blocking, None)];
        let children = build_children_map(&items);
        let active = compute_active_set(&items, &[], &children);
        assert_eq!(compute_convergence_state(&active, &items), ConvergenceState::Open);
    }

    #[test]
    fn minor_active_item_does_not_block_convergence() {
        let items = vec![item("A", Severity::Minor, None)];
        let children = build_children_map(&items);
        let active = compute_active_set(&items, &[], &children);
        assert_eq!(compute_convergence_state(&active, &items), ConvergenceState::Closed);
    }

    #[test]
    fn pending_transformation_flags() {
        let items = vec![item("A", Severity::Blocking, None)];
        let records = vec![record("A", Decision::PendingTransformation, None)];
        let flags = compute_pending_flags(&items, &records);
        assert_eq!(flags, vec!["A".to_string()]);
    }

    #[test]
    fn non_terminal_child_keeps_parent_out_of_active_set() {
        let items = vec![item("P", Severity::Minor, None), item("C", Severity::Minor, Some(vec!["P"]))];
        let children = build_children_map(&items);
        // no dispositions: C is a leaf (no children) and active; P has a
        // non-terminal child so P is not a leaf and thus not active.
        let active = compute_active_set(&items, &[], &children);
        assert_eq!(active, vec!["C".to_string()]);
    }
}
