//! The central write path: `process_critique_round` (spec.md §4.5).
//!
//! Parse order is preserved throughout. No partial writes: the append
//! callbacks are invoked only when `errors` is empty.

use std::collections::HashMap;

use uuid::Uuid;

use crate::disposition::{effective_disposition, is_terminal};
use crate::error::CoreError;
use crate::ids::mint_id;
use crate::model::{
    ClosedItemRef, CritiqueItem, Decision, DispositionRecord, RawCritique, Role, Severity,
    Transformation,
};
use crate::normalize::normalize;
use crate::similarity::{compute_similarity_warn, SIMILARITY_THRESHOLD};

pub struct IngestInput<'a> {
    pub proposal_id: &'a str,
    pub role: Role,
    pub round: u64,
    pub raw_critiques: &'a [RawCritique],
    pub existing_items: &'a [CritiqueItem],
    pub existing_records: &'a [DispositionRecord],
    pub closed_items: &'a [ClosedItemRef],
    /// Timestamp for every item/disposition minted by this call. The core
    /// has no clock of its own.
    pub ingested_at: &'a str,
}

#[derive(Debug, Default)]
pub struct IngestOutcome {
    pub minted_items: Vec<CritiqueItem>,
    pub disposition_records: Vec<DispositionRecord>,
    pub warnings: Vec<String>,
    pub errors: Vec<CoreError>,
}

pub fn process_critique_round(
    input: IngestInput,
    insert_items: &mut dyn FnMut(&[CritiqueItem]),
    insert_dispositions: &mut dyn FnMut(&[DispositionRecord]),
) -> IngestOutcome {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let existing_items_by_id: HashMap<&str, &CritiqueItem> = input
        .existing_items
        .iter()
        .map(|item| (item.id.as_str(), item))
        .collect();
    let mut existing_terminal: HashMap<&str, bool> = HashMap::new();
    let mut memo = HashMap::new();
    for item in input.existing_items {
        let terminal = is_terminal(&item.id, input.existing_records, &mut memo);
        existing_terminal.insert(item.id.as_str(), terminal);
    }

    // Pass A: mint every id up front. mint_id depends only on
    // (proposal_id, role, round, normalized_text), never on derived_from or
    // parse position, so this can run before any validation.
    let ids: Vec<String> = input
        .raw_critiques
        .iter()
        .map(|raw| {
            let normalized_text = normalize(&format!("{} {}", raw.title, raw.detail));
            mint_id(input.proposal_id, input.role, input.round, &normalized_text)
        })
        .collect();
    let response_positions: HashMap<&str, usize> =
        ids.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();

    // Pass B: validate derived_from and compose each item.
    let mut minted_so_far: HashMap<String, CritiqueItem> = HashMap::new();
    let mut minted_items: Vec<CritiqueItem> = Vec::with_capacity(input.raw_critiques.len());

    for (i, raw) in input.raw_critiques.iter().enumerate() {
        let id = ids[i].clone();
        let normalized_text = normalize(&format!("{} {}", raw.title, raw.detail));

        let parents: Vec<String> = raw.derived_from.clone().unwrap_or_default();
        for parent in &parents {
            if let Some(parent_item) = existing_items_by_id.get(parent.as_str()) {
                if *existing_terminal.get(parent.as_str()).unwrap_or(&false) {
                    if let Some(eff) = effective_disposition(parent, input.existing_records) {
                        errors.push(CoreError::ClosedIdReactivation {
                            parent_id: parent.clone(),
                            decision: eff.decision,
                            round: parent_item.round,
                        });
                    }
                }
            } else if let Some(&pos) = response_positions.get(parent.as_str()) {
                if pos >= i {
                    errors.push(CoreError::ForwardReferenceInResponse {
                        parent_id: parent.clone(),
                    });
                }
            } else {
                errors.push(CoreError::DerivedFromMissing {
                    parent_id: parent.clone(),
                });
            }
        }

        let root_ids = compute_root_ids(&parents, &id, &existing_items_by_id, &minted_so_far);
        let root_severity =
            compute_root_severity(&root_ids, &id, raw.severity, &existing_items_by_id, &minted_so_far);

        let similarity_warn = if parents.is_empty() {
            let warns = compute_similarity_warn(&normalized_text, input.closed_items, SIMILARITY_THRESHOLD);
            if warns.is_empty() {
                None
            } else {
                warnings.push(format!(
                    "item {id} resembles {} closed item(s); possible re-raise",
                    warns.len()
                ));
                Some(warns)
            }
        } else {
            None
        };

        let item = CritiqueItem {
            id: id.clone(),
            display_id: crate::ids::display_id(&id),
            proposal_id: input.proposal_id.to_string(),
            role: input.role,
            round: input.round,
            severity: raw.severity,
            title: raw.title.clone(),
            detail: raw.detail.clone(),
            normalized_text,
            normalization_spec_version: crate::model::NORMALIZATION_SPEC_VERSION.to_string(),
            derived_from: if parents.is_empty() { None } else { Some(parents) },
            root_ids,
            root_severity,
            similarity_warn,
            minted_at: input.ingested_at.to_string(),
            minted_by: "host".to_string(),
        };

        minted_so_far.insert(item.id.clone(), item.clone());
        minted_items.push(item);
    }

    // Step 6: child_ids are host-computed, scoped to this response only.
    let mut children_in_response: HashMap<String, Vec<String>> = HashMap::new();
    for item in &minted_items {
        if let Some(parents) = &item.derived_from {
            for parent in parents {
                children_in_response.entry(parent.clone()).or_default().push(item.id.clone());
            }
        }
    }

    // Pass C: validate and build disposition records.
    let mut disposition_records = Vec::new();
    for (i, raw) in input.raw_critiques.iter().enumerate() {
        let Some(raw_disp) = &raw.disposition else { continue };
        let item_id = &ids[i];
        let item_severity = minted_items[i].severity;

        let Some(orig_decision) = Decision::from_str_enum(&raw_disp.decision) else {
            errors.push(CoreError::UnknownDisposition {
                decision: raw_disp.decision.clone(),
            });
            continue;
        };

        let child_ids = children_in_response.get(item_id).cloned().unwrap_or_default();

        if orig_decision == Decision::Transformed && child_ids.is_empty() {
            errors.push(CoreError::TransformedWithoutChildren {
                item_id: item_id.clone(),
            });
        }
        if orig_decision == Decision::Deferred && item_severity == Severity::Blocking {
            errors.push(CoreError::BlockingCannotDefer {
                item_id: item_id.clone(),
            });
        }

        let downgrade_target = raw_disp
            .severity_downgrade_to
            .filter(|&target| target < item_severity);

        let (decision, transformation) = if downgrade_target.is_some() {
            warnings.push(format!(
                "item {item_id} severity downgrade pending host/human resolution (\u{2691} gate)"
            ));
            (
                Decision::PendingTransformation,
                Some(Transformation {
                    child_ids: child_ids.clone(),
                    rationale: raw_disp.rationale.clone(),
                    proposed_severity_downgrade: Some(true),
                }),
            )
        } else if orig_decision == Decision::Transformed {
            (
                orig_decision,
                Some(Transformation {
                    child_ids: child_ids.clone(),
                    rationale: raw_disp.rationale.clone(),
                    proposed_severity_downgrade: None,
                }),
            )
        } else {
            (orig_decision, None)
        };

        let terminal_at = match decision {
            Decision::Accepted | Decision::Rejected | Decision::Deferred => {
                Some(input.ingested_at.to_string())
            }
            Decision::Transformed | Decision::PendingTransformation => None,
        };

        disposition_records.push(DispositionRecord {
            disposition_id: format!("disp_{}", Uuid::new_v4()),
            item_id: item_id.clone(),
            round: input.round,
            decided_by: raw_disp.decided_by,
            decision,
            rationale: raw_disp.rationale.clone(),
            transformation,
            proposed_at: input.ingested_at.to_string(),
            terminal_at,
        });
    }

    if errors.is_empty() {
        if !minted_items.is_empty() {
            insert_items(&minted_items);
        }
        if !disposition_records.is_empty() {
            insert_dispositions(&disposition_records);
        }
        IngestOutcome {
            minted_items,
            disposition_records,
            warnings,
            errors,
        }
    } else {
        IngestOutcome {
            minted_items: Vec::new(),
            disposition_records: Vec::new(),
            warnings,
            errors,
        }
    }
}

fn compute_root_ids(
    parents: &[String],
    self_id: &str,
    existing_items_by_id: &HashMap<&str, &CritiqueItem>,
    minted_so_far: &HashMap<String, CritiqueItem>,
) -> Vec<String> {
    if parents.is_empty() {
        return vec![self_id.to_string()];
    }
    let mut roots = Vec::new();
    for parent in parents {
        let parent_roots = existing_items_by_id
            .get(parent.as_str())
            .map(|item| item.root_ids.clone())
            .or_else(|| minted_so_far.get(parent.as_str()).map(|item| item.root_ids.clone()))
            .unwrap_or_else(|| vec![parent.clone()]);
        for root in parent_roots {
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
    }
    if roots.is_empty() {
        roots.push(self_id.to_string());
    }
    roots
}

fn compute_root_severity(
    root_ids: &[String],
    self_id: &str,
    self_severity: Severity,
    existing_items_by_id: &HashMap<&str, &CritiqueItem>,
    minted_so_far: &HashMap<String, CritiqueItem>,
) -> Option<Severity> {
    root_ids
        .iter()
        .filter_map(|root| {
            if root == self_id {
                Some(self_severity)
            } else {
                existing_items_by_id
                    .get(root.as_str())
                    .map(|item| item.severity)
                    .or_else(|| minted_so_far.get(root.as_str()).map(|item| item.severity))
            }
        })
        .max()
}
