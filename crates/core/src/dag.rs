//! DAG validation over `derived_from` edges (spec.md §4.3, §4.12).
//!
//! Three-color DFS. Edges point from a child item to its parents
//! (`derived_from`), so a cycle here would mean an item is its own ancestor.

use std::collections::{HashMap, HashSet};

use crate::error::DagValidation;
use crate::model::CritiqueItem;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Grey,
    Black,
}

/// Validate that `derived_from` edges across `items` form a DAG.
///
/// `items` is the full canonical item set the round is being checked
/// against (including items from prior rounds). Dangling `derived_from`
/// references (pointing outside `items`) are not this function's concern —
/// that is [`crate::ingest`]'s job at mint time — so they are simply
/// ignored here.
pub fn validate_dag(items: &[CritiqueItem]) -> DagValidation {
    let by_id: HashMap<&str, &CritiqueItem> =
        items.iter().map(|item| (item.id.as_str(), item)).collect();
    let mut color: HashMap<&str, Color> =
        items.iter().map(|item| (item.id.as_str(), Color::White)).collect();

    for item in items {
        if color[item.id.as_str()] == Color::White {
            let mut path = Vec::new();
            if let Some(cycle) = visit(item.id.as_str(), &by_id, &mut color, &mut path) {
                return DagValidation::Cycle { cycle };
            }
        }
    }
    DagValidation::Valid
}

fn visit<'a>(
    id: &'a str,
    by_id: &HashMap<&'a str, &'a CritiqueItem>,
    color: &mut HashMap<&'a str, Color>,
    path: &mut Vec<String>,
) -> Option<Vec<String>> {
    color.insert(id, Color::Grey);
    path.push(id.to_string());

    if let Some(item) = by_id.get(id) {
        if let Some(parents) = &item.derived_from {
            for parent in parents {
                match color.get(parent.as_str()) {
                    Some(Color::Grey) => {
                        let start = path.iter().position(|p| p == parent).unwrap_or(0);
                        let mut cycle = path[start..].to_vec();
                        cycle.push(parent.clone());
                        return Some(cycle);
                    }
                    Some(Color::White) => {
                        if let Some(cycle) = visit(parent.as_str(), by_id, color, path) {
                            return Some(cycle);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    path.pop();
    color.insert(id, Color::Black);
    None
}

/// True if every id appearing in some `derived_from` list is present in `items`.
pub fn all_parents_resolvable(items: &[CritiqueItem]) -> bool {
    let ids: HashSet<&str> = items.iter().map(|i| i.id.as_str()).collect();
    items.iter().all(|item| {
        item.derived_from
            .as_ref()
            .map(|parents| parents.iter().all(|p| ids.contains(p.as_str())))
            .unwrap_or(true)
    })
}
