//! Error taxonomy (spec.md §7). Each variant is fatal to the ingest call
//! that produced it; ingestion never partially writes (see
//! [`crate::ingest::process_critique_round`]).

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("derived_from references unknown item {parent_id} (not in canonical store or same-response mints)")]
    DerivedFromMissing { parent_id: String },

    #[error("derived_from references {parent_id}, minted later in this same response (forward reference)")]
    ForwardReferenceInResponse { parent_id: String },

    #[error(
        "derived_from references closed item {parent_id} (decision: {decision:?}, round: {round}); \
         mint a new root item if the concern re-emerges"
    )]
    ClosedIdReactivation {
        parent_id: String,
        decision: crate::model::Decision,
        round: u64,
    },

    #[error("unknown disposition decision: {decision}")]
    UnknownDisposition { decision: String },

    #[error("item {item_id} has decision `transformed` but no host-computable child ids")]
    TransformedWithoutChildren { item_id: String },

    #[error("item {item_id} is blocking severity and cannot be deferred")]
    BlockingCannotDefer { item_id: String },
}

/// Returned by [`crate::dag::validate_dag`] rather than thrown (spec.md §4.3, §4.12).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DagValidation {
    Valid,
    Cycle { cycle: Vec<String> },
}

impl DagValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, DagValidation::Valid)
    }
}
