//! Lineage card assembly for the synthesis prompt (spec.md §4.9).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::disposition::effective_disposition;
use crate::model::{CritiqueItem, DecidedBy, Decision, DispositionRecord, Role, Severity};

const MAX_CHAIN_HOPS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupersededModelRecord {
    pub disposition_id: String,
    pub decided_by: DecidedBy,
    pub decision: Decision,
    pub rationale: String,
    pub proposed_at: String,
    pub superseded_by: DecidedBy,
    pub superseded_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageEntry {
    pub id: String,
    pub display_id: String,
    pub round: u64,
    pub role: Role,
    pub title: String,
    pub decision: Option<Decision>,
    pub rationale: Option<String>,
    pub superseded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_model_records: Option<Vec<SupersededModelRecord>>,
    pub deferred_count: u64,
    pub rounds_active: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootLineage {
    pub root_id: String,
    pub chain: Vec<LineageEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageCard {
    pub item_id: String,
    pub display_id: String,
    pub proposal_id: String,
    pub round: u64,
    pub role: Role,
    pub title: String,
    pub severity: Severity,
    pub lineages: Vec<RootLineage>,
}

pub fn build_lineage_cards(
    proposal_id: &str,
    current_round: u64,
    active_set: &[String],
    items: &[CritiqueItem],
    records: &[DispositionRecord],
) -> Vec<LineageCard> {
    let items_by_id: HashMap<&str, &CritiqueItem> =
        items.iter().map(|i| (i.id.as_str(), i)).collect();
    let children_map = crate::active_set::build_children_map(items);

    active_set
        .iter()
        .filter_map(|id| items_by_id.get(id.as_str()).copied())
        .map(|item| {
            let lineages = item
                .root_ids
                .iter()
                .map(|root_id| {
                    let chain_ids = lineage_chain_for_root(item, root_id, &items_by_id, &children_map);
                    let chain = chain_ids
                        .iter()
                        .filter_map(|chain_id| items_by_id.get(chain_id.as_str()).copied())
                        .map(|chain_item| build_entry(chain_item, current_round, records))
                        .collect();
                    RootLineage {
                        root_id: root_id.clone(),
                        chain,
                    }
                })
                .collect();
            LineageCard {
                item_id: item.id.clone(),
                display_id: item.display_id.clone(),
                proposal_id: proposal_id.to_string(),
                round: item.round,
                role: item.role,
                title: item.title.clone(),
                severity: item.severity,
                lineages,
            }
        })
        .collect()
}

fn build_entry(item: &CritiqueItem, current_round: u64, records: &[DispositionRecord]) -> LineageEntry {
    let effective = effective_disposition(&item.id, records);
    let deferred_count = records
        .iter()
        .filter(|r| r.item_id == item.id && r.decision == Decision::Deferred)
        .count() as u64;
    let rounds_active = current_round.saturating_sub(item.round);

    let superseded_model_records = effective.and_then(|eff| {
        if !matches!(eff.decided_by, DecidedBy::Human | DecidedBy::Host) {
            return None;
        }
        let superseded: Vec<SupersededModelRecord> = records
            .iter()
            .filter(|r| r.item_id == item.id && r.decided_by.is_model() && r.disposition_id != eff.disposition_id)
            .map(|r| SupersededModelRecord {
                disposition_id: r.disposition_id.clone(),
                decided_by: r.decided_by,
                decision: r.decision,
                rationale: r.rationale.clone(),
                proposed_at: r.proposed_at.clone(),
                superseded_by: eff.decided_by,
                superseded_at: eff.proposed_at.clone(),
            })
            .collect();
        if superseded.is_empty() {
            None
        } else {
            Some(superseded)
        }
    });

    LineageEntry {
        id: item.id.clone(),
        display_id: item.display_id.clone(),
        round: item.round,
        role: item.role,
        title: item.title.clone(),
        decision: effective.map(|r| r.decision),
        rationale: effective.map(|r| r.rationale.clone()),
        superseded: false,
        superseded_model_records,
        deferred_count,
        rounds_active,
    }
}

/// Resolve the lineage chain for `item` along the ancestry that shares
/// `root_id`, falling back to the minimum two-entry rule when the chain
/// can't be traced unambiguously or is branched.
fn lineage_chain_for_root(
    item: &CritiqueItem,
    root_id: &str,
    items_by_id: &HashMap<&str, &CritiqueItem>,
    children_map: &HashMap<String, Vec<String>>,
) -> Vec<String> {
    if let Some(chain) = trace_full_chain(&item.id, root_id, items_by_id) {
        if chain_is_unbranched(&chain, children_map) {
            return chain;
        }
    }
    minimal_chain(item, root_id)
}

/// Walk backward from `leaf_id` to `root_id` along `derived_from` edges
/// restricted to parents that themselves carry `root_id` in their
/// `root_ids` (or are `root_id` itself). Fails (returns `None`) on a dead
/// end, an ambiguous branch (more than one relevant parent), a cycle, or
/// exceeding the hop cap.
fn trace_full_chain(
    leaf_id: &str,
    root_id: &str,
    items_by_id: &HashMap<&str, &CritiqueItem>,
) -> Option<Vec<String>> {
    let mut chain = vec![leaf_id.to_string()];
    let mut visited: HashSet<String> = HashSet::from([leaf_id.to_string()]);
    let mut current = leaf_id.to_string();
    let mut hops = 0;

    while current != root_id {
        hops += 1;
        if hops > MAX_CHAIN_HOPS {
            return None;
        }
        let item = items_by_id.get(current.as_str())?;
        let parents = item.derived_from.as_ref()?;
        let relevant: Vec<&String> = parents
            .iter()
            .filter(|p| {
                p.as_str() == root_id
                    || items_by_id
                        .get(p.as_str())
                        .map(|pi| pi.root_ids.iter().any(|r| r == root_id))
                        .unwrap_or(false)
            })
            .collect();
        if relevant.len() != 1 {
            return None;
        }
        let next = relevant[0].clone();
        if visited.contains(&next) {
            return None;
        }
        visited.insert(next.clone());
        chain.push(next.clone());
        current = next;
    }

    chain.reverse();
    Some(chain)
}

fn chain_is_unbranched(chain: &[String], children_map: &HashMap<String, Vec<String>>) -> bool {
    let chain_set: HashSet<&str> = chain.iter().map(String::as_str).collect();
    chain.iter().all(|id| {
        let count = children_map
            .get(id)
            .map(|children| children.iter().filter(|c| chain_set.contains(c.as_str())).count())
            .unwrap_or(0);
        count <= 1
    })
}

fn minimal_chain(item: &CritiqueItem, root_id: &str) -> Vec<String> {
    if item.id == root_id {
        return vec![item.id.clone()];
    }
    match item.derived_from.as_ref().and_then(|p| p.first()) {
        None => vec![root_id.to_string(), item.id.clone()],
        Some(parent) => {
            let mut chain = vec![root_id.to_string(), parent.clone(), item.id.clone()];
            chain.dedup();
            chain
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, round: u64, derived_from: Option<Vec<&str>>, root_ids: Vec<&str>) -> CritiqueItem {
        CritiqueItem {
            id: id.to_string(),
            display_id: id.chars().take(12).collect(),
            proposal_id: "p1".to_string(),
            role: Role::A,
            round,
            severity: Severity::Blocking,
            title: format!("title {id}"),
            detail: "d".to_string(),
            normalized_text: "t d".to_string(),
            normalization_spec_version: "v1".to_string(),
            derived_from: derived_from.map(|v| v.into_iter().map(String::from).collect()),
            root_ids: root_ids.into_iter().map(String::from).collect(),
            root_severity: Some(Severity::Blocking),
            similarity_warn: None,
            minted_at: "2026-01-01T00:00:00Z".to_string(),
            minted_by: "host".to_string(),
        }
    }

    fn record(
        item_id: &str,
        decided_by: DecidedBy,
        decision: Decision,
        proposed_at: &str,
    ) -> DispositionRecord {
        DispositionRecord {
            disposition_id: format!("disp_{item_id}_{decided_by:?}_{proposed_at}"),
            item_id: item_id.to_string(),
            round: 1,
            decided_by,
            decision,
            rationale: format!("rationale from {decided_by:?}"),
            transformation: None,
            proposed_at: proposed_at.to_string(),
            terminal_at: None,
        }
    }

    #[test]
    fn straight_chain_traces_fully() {
        let items = vec![
            item("root", 1, None, vec!["root"]),
            item("mid", 2, Some(vec!["root"]), vec!["root"]),
            item("leaf", 3, Some(vec!["mid"]), vec!["root"]),
        ];
        let cards = build_lineage_cards("p1", 3, &["leaf".to_string()], &items, &[]);
        assert_eq!(cards.len(), 1);
        let chain: Vec<&str> = cards[0].lineages[0].chain.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(chain, vec!["root", "mid", "leaf"]);
    }

    #[test]
    fn leaf_is_its_own_root() {
        let items = vec![item("leaf", 1, None, vec!["leaf"])];
        let cards = build_lineage_cards("p1", 1, &["leaf".to_string()], &items, &[]);
        let chain: Vec<&str> = cards[0].lineages[0].chain.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(chain, vec!["leaf"]);
    }

    #[test]
    fn branched_chain_falls_back_to_minimum_rule() {
        // root has two chain-member children (mid1, mid2), both feeding leaf's
        // ancestry only through mid1 -> branch at root disqualifies the full trace.
        let items = vec![
            item("root", 1, None, vec!["root"]),
            item("mid1", 2, Some(vec!["root"]), vec!["root"]),
            item("mid2", 2, Some(vec!["root"]), vec!["root"]),
            item("leaf", 3, Some(vec!["mid1"]), vec!["root"]),
        ];
        let cards = build_lineage_cards("p1", 3, &["leaf".to_string()], &items, &[]);
        let chain: Vec<&str> = cards[0].lineages[0].chain.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(chain, vec!["root", "mid1", "leaf"]);
    }

    #[test]
    fn s6_supersession_labeling() {
        let items = vec![item("x", 1, None, vec!["x"])];
        let records = vec![
            record("x", DecidedBy::A, Decision::Deferred, "2026-01-01T00:00:01Z"),
            record("x", DecidedBy::B, Decision::Deferred, "2026-01-01T00:00:02Z"),
            record("x", DecidedBy::Human, Decision::Accepted, "2026-01-01T00:00:03Z"),
        ];
        let cards = build_lineage_cards("p1", 1, &["x".to_string()], &items, &records);
        let entry = &cards[0].lineages[0].chain[0];
        assert_eq!(entry.decision, Some(Decision::Accepted));
        assert!(!entry.superseded);
        let superseded = entry.superseded_model_records.as_ref().unwrap();
        assert_eq!(superseded.len(), 2);
        assert!(superseded.iter().all(|s| s.superseded_by == DecidedBy::Human));
    }

    #[test]
    fn deferred_count_and_rounds_active() {
        let items = vec![item("x", 2, None, vec!["x"])];
        let records = vec![
            record("x", DecidedBy::A, Decision::Deferred, "t1"),
            record("x", DecidedBy::Host, Decision::Accepted, "t2"),
        ];
        let cards = build_lineage_cards("p1", 5, &["x".to_string()], &items, &records);
        let entry = &cards[0].lineages[0].chain[0];
        assert_eq!(entry.deferred_count, 1);
        assert_eq!(entry.rounds_active, 3);
    }
}
