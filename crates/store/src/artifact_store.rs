//! Round-artifact store. A `RoundArtifact` is written once per
//! `(proposal_id, round)` and never rewritten.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use crucible_common::canonical_json_bytes;
use crucible_core::model::RoundArtifact;

use crate::error::StoreError;

pub struct RoundArtifactStore {
    proposal_dir: PathBuf,
    proposal_id: String,
}

impl RoundArtifactStore {
    pub fn new(repo_root: impl Into<PathBuf>, proposal_id: &str) -> Self {
        Self {
            proposal_dir: repo_root.into().join("crucible").join(proposal_id).join("rounds"),
            proposal_id: proposal_id.to_string(),
        }
    }

    pub fn artifacts_path(&self) -> PathBuf {
        self.proposal_dir.join("rounds.jsonl")
    }

    fn ensure_dirs(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.proposal_dir)?;
        Ok(())
    }

    pub fn load_all(&self) -> Result<Vec<RoundArtifact>, StoreError> {
        self.ensure_dirs()?;
        let path = self.artifacts_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        BufReader::new(fs::File::open(path)?)
            .lines()
            .filter(|l| l.as_ref().map(|s| !s.trim().is_empty()).unwrap_or(true))
            .map(|line| Ok(serde_json::from_str(&line?)?))
            .collect()
    }

    pub fn get_round(&self, round: u64) -> Result<Option<RoundArtifact>, StoreError> {
        Ok(self.load_all()?.into_iter().find(|a| a.round == round))
    }

    /// Append `artifact`, refusing if one already exists for its round.
    pub fn append_once(&self, artifact: &RoundArtifact) -> Result<(), StoreError> {
        if self.get_round(artifact.round)?.is_some() {
            return Err(StoreError::RoundArtifactAlreadyExists {
                proposal_id: self.proposal_id.clone(),
                round: artifact.round,
            });
        }
        self.ensure_dirs()?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.artifacts_path())?;
        file.write_all(&canonical_json_bytes(artifact)?)?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crucible_core::model::{ConvergenceState, RolePair};
    use tempfile::TempDir;

    fn artifact(round: u64) -> RoundArtifact {
        RoundArtifact {
            proposal_id: "p1".to_string(),
            round,
            artifact_id: format!("art_{round}"),
            produced_at: "2026-01-01T00:00:00Z".to_string(),
            raw_plan_text: RolePair { a: "a".to_string(), b: "b".to_string() },
            emitted_item_ids: RolePair { a: vec![], b: vec![] },
            disposition_records_by_item: vec![],
            normalization_spec_version: "v1".to_string(),
            active_set: vec![],
            pending_flags: vec![],
            convergence_state: ConvergenceState::Closed,
            dag_validated: true,
            dag_validated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn append_once_then_reject_same_round() {
        let dir = TempDir::new().unwrap();
        let store = RoundArtifactStore::new(dir.path(), "p1");
        store.append_once(&artifact(1)).unwrap();
        let err = store.append_once(&artifact(1)).unwrap_err();
        assert!(matches!(err, StoreError::RoundArtifactAlreadyExists { .. }));
        assert_eq!(store.load_all().unwrap().len(), 1);
    }

    #[test]
    fn different_rounds_both_persist() {
        let dir = TempDir::new().unwrap();
        let store = RoundArtifactStore::new(dir.path(), "p1");
        store.append_once(&artifact(1)).unwrap();
        store.append_once(&artifact(2)).unwrap();
        assert_eq!(store.load_all().unwrap().len(), 2);
    }
}
