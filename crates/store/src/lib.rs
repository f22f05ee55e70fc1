//! crucible_store — host-side persistence for the critique pipeline: JSONL
//! stores with deterministic indexes for items, dispositions, and round
//! artifacts, plus a hash-chained host event log.

pub mod artifact_store;
pub mod disposition_store;
pub mod error;
pub mod hostlog;
pub mod item_store;

pub use artifact_store::RoundArtifactStore;
pub use disposition_store::DispositionStore;
pub use error::StoreError;
pub use hostlog::{HostEvent, HostLogAppender};
pub use item_store::ItemStore;
