//! crucible_core — the Critique & Disposition Pipeline.
//!
//! Pure state machine over three append-only stores (items, dispositions,
//! round artifacts) plus derived computations. No I/O, no network, no
//! clock, no global state: every operation here is a function of its
//! inputs, and the host supplies timestamps and append callbacks.

pub mod active_set;
pub mod dag;
pub mod disposition;
pub mod error;
pub mod gap;
pub mod ids;
pub mod ingest;
pub mod lineage;
pub mod model;
pub mod normalize;
pub mod similarity;

pub use active_set::{build_children_map, compute_active_set, compute_convergence_state, compute_pending_flags};
pub use dag::validate_dag;
pub use disposition::{effective_disposition, is_terminal};
pub use error::{CoreError, DagValidation};
pub use gap::compute_synthesis_gaps;
pub use ids::{display_id, mint_artifact_id, mint_id};
pub use ingest::{process_critique_round, IngestInput, IngestOutcome};
pub use lineage::build_lineage_cards;
pub use model::*;
pub use normalize::normalize;
pub use similarity::compute_similarity_warn;
