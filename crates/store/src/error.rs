use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("canonical json error: {0}")]
    Canon(#[from] crucible_common::CanonError),
    #[error("store corruption: {0}")]
    Corrupt(String),
    #[error("round {round} already has a recorded artifact for proposal {proposal_id}")]
    RoundArtifactAlreadyExists { proposal_id: String, round: u64 },
    #[error("hash mismatch at line {line}: expected {expected}, got {got}")]
    HashMismatch { line: usize, expected: String, got: String },
}
