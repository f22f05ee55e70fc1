//! Authority-ranked disposition resolution and terminality (spec.md §4.5, §4.6).

use std::collections::{HashMap, HashSet};

use crate::model::{DecidedBy, Decision, DispositionRecord};

/// Human outranks Host outranks either model. Ties within a rank are broken
/// by latest `proposed_at` (lexical comparison; callers use RFC3339 strings,
/// which sort correctly as text).
pub fn authority_rank(decided_by: DecidedBy) -> u8 {
    match decided_by {
        DecidedBy::Human => 3,
        DecidedBy::Host => 2,
        DecidedBy::A | DecidedBy::B => 1,
    }
}

/// Pick the disposition record that "wins" for an item: highest authority
/// rank, ties broken by latest `proposed_at`. Returns `None` if no record
/// exists for this item (meaning it is implicitly `pending_transformation`-
/// like: open, undecided).
pub fn effective_disposition<'a>(
    item_id: &str,
    records: &'a [DispositionRecord],
) -> Option<&'a DispositionRecord> {
    records
        .iter()
        .filter(|r| r.item_id == item_id)
        .max_by(|a, b| {
            authority_rank(a.decided_by)
                .cmp(&authority_rank(b.decided_by))
                .then_with(|| a.proposed_at.cmp(&b.proposed_at))
        })
}

/// `Accepted`/`Rejected`/`Deferred` are always terminal. `Transformed` is
/// terminal iff it has at least one child and every child is itself
/// terminal (memoized to avoid recomputation across a DAG walk).
/// `PendingTransformation` is never terminal — this is the convergence gate.
pub fn is_terminal(
    item_id: &str,
    all_records: &[DispositionRecord],
    memo: &mut HashMap<String, bool>,
) -> bool {
    is_terminal_inner(item_id, all_records, memo, &mut HashSet::new())
}

fn is_terminal_inner(
    item_id: &str,
    all_records: &[DispositionRecord],
    memo: &mut HashMap<String, bool>,
    visiting: &mut HashSet<String>,
) -> bool {
    if let Some(cached) = memo.get(item_id) {
        return *cached;
    }
    // A cycle here means malformed transformation chains; treat as non-terminal
    // rather than infinite-looping. validate_dag is the real cycle guard.
    if visiting.contains(item_id) {
        return false;
    }

    let Some(record) = effective_disposition(item_id, all_records) else {
        memo.insert(item_id.to_string(), false);
        return false;
    };

    let result = match record.decision {
        Decision::Accepted | Decision::Rejected | Decision::Deferred => true,
        Decision::PendingTransformation => false,
        Decision::Transformed => {
            visiting.insert(item_id.to_string());
            let children = record
                .transformation
                .as_ref()
                .map(|t| t.child_ids.as_slice())
                .unwrap_or(&[]);
            let result = !children.is_empty()
                && children
                    .iter()
                    .all(|child| is_terminal_inner(child, all_records, memo, visiting));
            visiting.remove(item_id);
            result
        }
    };

    memo.insert(item_id.to_string(), result);
    result
}

/// Convenience: true if an item has no disposition record at all, or its
/// effective one is `pending_transformation`.
pub fn is_pending(item_id: &str, records: &[DispositionRecord]) -> bool {
    match effective_disposition(item_id, records) {
        None => true,
        Some(r) => r.decision == Decision::PendingTransformation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Transformation;

    fn record(
        item_id: &str,
        decided_by: DecidedBy,
        decision: Decision,
        proposed_at: &str,
        children: Option<Vec<&str>>,
    ) -> DispositionRecord {
        DispositionRecord {
            disposition_id: format!("disp_{item_id}_{proposed_at}"),
            item_id: item_id.to_string(),
            round: 1,
            decided_by,
            decision,
            rationale: "r".to_string(),
            transformation: children.map(|c| Transformation {
                child_ids: c.into_iter().map(String::from).collect(),
                rationale: "t".to_string(),
                proposed_severity_downgrade: None,
            }),
            proposed_at: proposed_at.to_string(),
            terminal_at: None,
        }
    }

    #[test]
    fn human_outranks_model_regardless_of_time() {
        let records = vec![
            record("x", DecidedBy::A, Decision::Accepted, "2026-01-01T00:00:02Z", None),
            record("x", DecidedBy::Human, Decision::Rejected, "2026-01-01T00:00:01Z", None),
        ];
        let eff = effective_disposition("x", &records).unwrap();
        assert_eq!(eff.decided_by, DecidedBy::Human);
    }

    #[test]
    fn tie_in_rank_breaks_on_latest_time() {
        let records = vec![
            record("x", DecidedBy::A, Decision::Accepted, "2026-01-01T00:00:01Z", None),
            record("x", DecidedBy::B, Decision::Rejected, "2026-01-01T00:00:02Z", None),
        ];
        let eff = effective_disposition("x", &records).unwrap();
        assert_eq!(eff.decided_by, DecidedBy::B);
    }

    #[test]
    fn pending_transformation_never_terminal() {
        let records = vec![record(
            "x",
            DecidedBy::A,
            Decision::PendingTransformation,
            "2026-01-01T00:00:00Z",
            None,
        )];
        let mut memo = HashMap::new();
        assert!(!is_terminal("x", &records, &mut memo));
    }

    #[test]
    fn transformed_terminal_iff_all_children_terminal() {
        let records = vec![
            record("x", DecidedBy::A, Decision::Transformed, "t0", Some(vec!["c1", "c2"])),
            record("c1", DecidedBy::Host, Decision::Accepted, "t1", None),
            record("c2", DecidedBy::Host, Decision::PendingTransformation, "t2", None),
        ];
        let mut memo = HashMap::new();
        assert!(!is_terminal("x", &records, &mut memo));

        let records2 = vec![
            record("x", DecidedBy::A, Decision::Transformed, "t0", Some(vec!["c1", "c2"])),
            record("c1", DecidedBy::Host, Decision::Accepted, "t1", None),
            record("c2", DecidedBy::Host, Decision::Rejected, "t2", None),
        ];
        let mut memo2 = HashMap::new();
        assert!(is_terminal("x", &records2, &mut memo2));
    }

    #[test]
    fn transformed_with_no_children_is_not_terminal() {
        let records = vec![record("x", DecidedBy::A, Decision::Transformed, "t0", Some(vec![]))];
        let mut memo = HashMap::new();
        assert!(!is_terminal("x", &records, &mut memo));
    }

    #[test]
    fn no_record_means_not_terminal() {
        let mut memo = HashMap::new();
        assert!(!is_terminal("ghost", &[], &mut memo));
    }
}
