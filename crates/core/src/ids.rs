//! Content-addressed ID minting (spec.md §4.2).

use crate::model::Role;
use crucible_common::sha256_bytes;

const ID_PREFIX: &str = "blk_";
const DISPLAY_ID_LEN: usize = 12;

/// SHA-256 over `"{proposal_id}|{role}|{round}|{normalized_text}"`, prefixed
/// `blk_`. Deterministic; collision probability is cryptographic.
pub fn mint_id(proposal_id: &str, role: Role, round: u64, normalized_text: &str) -> String {
    let scope = format!("{proposal_id}|{role}|{round}|{normalized_text}");
    let hashed = sha256_bytes(scope.as_bytes());
    // sha256_bytes returns "sha256:<hex>"; we want our own "blk_<hex>" form.
    let hex = hashed.trim_start_matches("sha256:");
    format!("{ID_PREFIX}{hex}")
}

/// First 12 characters of an item id (`"blk_"` + 8 hex chars).
pub fn display_id(id: &str) -> String {
    id.chars().take(DISPLAY_ID_LEN).collect()
}

const ARTIFACT_ID_PREFIX: &str = "art_";

/// SHA-256 over `"{proposal_id}|{round}|{produced_at}"`, prefixed `art_`.
pub fn mint_artifact_id(proposal_id: &str, round: u64, produced_at: &str) -> String {
    let scope = format!("{proposal_id}|{round}|{produced_at}");
    let hashed = sha256_bytes(scope.as_bytes());
    let hex = hashed.trim_start_matches("sha256:");
    format!("{ARTIFACT_ID_PREFIX}{hex}")
}
