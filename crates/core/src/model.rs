//! Data model for the critique & disposition pipeline (spec.md §3).
//!
//! Every type here is a plain value type: no I/O, no interior mutability,
//! no clock. Timestamps are strings the host hands in.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const NORMALIZATION_SPEC_VERSION: &str = "v1";

/// Which of the two debating model agents raised or decided something.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "A")]
    A,
    #[serde(rename = "B")]
    B,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::A => write!(f, "A"),
            Role::B => write!(f, "B"),
        }
    }
}

/// Severity ordering is load-bearing: declaration order is ascending, so
/// `Severity::Blocking > Severity::Important > Severity::Minor` falls out
/// of the derived `Ord` for free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Important,
    Blocking,
}

/// Who authored a disposition record. Authority rank lives in
/// [`crate::disposition::authority_rank`], not here — this is just identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecidedBy {
    #[serde(rename = "A")]
    A,
    #[serde(rename = "B")]
    B,
    Human,
    Host,
}

impl DecidedBy {
    pub fn from_role(role: Role) -> Self {
        match role {
            Role::A => DecidedBy::A,
            Role::B => DecidedBy::B,
        }
    }

    pub fn is_model(&self) -> bool {
        matches!(self, DecidedBy::A | DecidedBy::B)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accepted,
    Rejected,
    Deferred,
    Transformed,
    PendingTransformation,
}

impl Decision {
    pub fn from_str_enum(s: &str) -> Option<Self> {
        match s {
            "accepted" => Some(Decision::Accepted),
            "rejected" => Some(Decision::Rejected),
            "deferred" => Some(Decision::Deferred),
            "transformed" => Some(Decision::Transformed),
            "pending_transformation" => Some(Decision::PendingTransformation),
            _ => None,
        }
    }
}

/// Sub-record present only for `transformed`/`pending_transformation` decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transformation {
    pub child_ids: Vec<String>,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_severity_downgrade: Option<bool>,
}

/// An immutable concern raised by a model, content-addressed by
/// `(proposal_id, role, round, normalized_text)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritiqueItem {
    pub id: String,
    pub display_id: String,
    pub proposal_id: String,
    pub role: Role,
    pub round: u64,
    pub severity: Severity,
    pub title: String,
    pub detail: String,
    pub normalized_text: String,
    pub normalization_spec_version: String,
    pub derived_from: Option<Vec<String>>,
    pub root_ids: Vec<String>,
    pub root_severity: Option<Severity>,
    pub similarity_warn: Option<Vec<String>>,
    pub minted_at: String,
    pub minted_by: String,
}

/// Append-only decision about an item. Multiple records may exist per item;
/// see [`crate::disposition::effective_disposition`] for which one "wins".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispositionRecord {
    pub disposition_id: String,
    pub item_id: String,
    pub round: u64,
    pub decided_by: DecidedBy,
    pub decision: Decision,
    pub rationale: String,
    pub transformation: Option<Transformation>,
    pub proposed_at: String,
    pub terminal_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceState {
    Open,
    Closed,
}

/// Per-round derived snapshot, written once and immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundArtifact {
    pub proposal_id: String,
    pub round: u64,
    pub artifact_id: String,
    pub produced_at: String,
    pub raw_plan_text: RolePair<String>,
    pub emitted_item_ids: RolePair<Vec<String>>,
    pub disposition_records_by_item: Vec<(String, Vec<String>)>,
    pub normalization_spec_version: String,
    pub active_set: Vec<String>,
    pub pending_flags: Vec<String>,
    pub convergence_state: ConvergenceState,
    pub dag_validated: bool,
    pub dag_validated_at: String,
}

/// A value present once for each debating role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolePair<T> {
    pub a: T,
    pub b: T,
}

// ---------------------------------------------------------------------
// Host-supplied inputs to the ingestor
// ---------------------------------------------------------------------

/// One raw critique as parsed by the host from model text, before minting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCritique {
    pub severity: Severity,
    pub title: String,
    pub detail: String,
    #[serde(default)]
    pub derived_from: Option<Vec<String>>,
    #[serde(default)]
    pub disposition: Option<RawDisposition>,
}

/// A disposition the host parsed alongside a raw critique. `decision` is a
/// raw string here because validating it is the ingestor's job
/// ([`crate::error::CoreError::UnknownDisposition`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDisposition {
    #[serde(default = "default_decided_by")]
    pub decided_by: DecidedBy,
    pub decision: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub severity_downgrade_to: Option<Severity>,
}

fn default_decided_by() -> DecidedBy {
    DecidedBy::Host
}

/// An already-closed item, as the host's similarity-warn feed supplies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedItemRef {
    pub id: String,
    pub normalized_text: String,
}

/// A structured synthesis plan, for gap detection (spec.md §4.10).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesisPlan {
    #[serde(default)]
    pub accepted_suggestions: Vec<String>,
    #[serde(default)]
    pub rejected_suggestions: Vec<String>,
}
