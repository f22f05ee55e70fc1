//! Append-only JSONL disposition store. Multiple records per item are
//! expected; identity for dedup purposes is `disposition_id`.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use crucible_common::canonical_json_bytes;
use crucible_core::model::DispositionRecord;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispositionIndexEntry {
    pub disposition_id: String,
    pub item_id: String,
    pub line_no: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DispositionIndex {
    pub entries: Vec<DispositionIndexEntry>,
}

pub struct DispositionStore {
    proposal_dir: PathBuf,
}

impl DispositionStore {
    pub fn new(repo_root: impl Into<PathBuf>, proposal_id: &str) -> Self {
        Self {
            proposal_dir: repo_root.into().join("crucible").join(proposal_id).join("dispositions"),
        }
    }

    pub fn records_path(&self) -> PathBuf {
        self.proposal_dir.join("dispositions.jsonl")
    }

    pub fn index_path(&self) -> PathBuf {
        self.proposal_dir.join("index.json")
    }

    fn ensure_dirs(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.proposal_dir)?;
        Ok(())
    }

    pub fn load_index(&self) -> Result<DispositionIndex, StoreError> {
        self.ensure_dirs()?;
        let path = self.index_path();
        if !path.exists() {
            return Ok(DispositionIndex::default());
        }
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }

    fn write_index(&self, index: &DispositionIndex) -> Result<(), StoreError> {
        self.ensure_dirs()?;
        fs::write(self.index_path(), canonical_json_bytes(index)?)?;
        Ok(())
    }

    fn line_count(&self) -> Result<u64, StoreError> {
        let path = self.records_path();
        if !path.exists() {
            return Ok(0);
        }
        Ok(BufReader::new(fs::File::open(path)?).lines().count() as u64)
    }

    pub fn append(&self, records: &[DispositionRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        self.ensure_dirs()?;
        let mut index = self.load_index()?;
        let known: std::collections::HashSet<String> =
            index.entries.iter().map(|e| e.disposition_id.clone()).collect();

        let mut file = fs::OpenOptions::new().create(true).append(true).open(self.records_path())?;
        let mut line_no = self.line_count()?;

        for record in records {
            if known.contains(record.disposition_id.as_str()) {
                continue;
            }
            let bytes = canonical_json_bytes(record)?;
            file.write_all(&bytes)?;
            file.write_all(b"\n")?;
            index.entries.push(DispositionIndexEntry {
                disposition_id: record.disposition_id.clone(),
                item_id: record.item_id.clone(),
                line_no,
            });
            line_no += 1;
        }
        file.flush()?;
        self.write_index(&index)
    }

    pub fn load_all(&self) -> Result<Vec<DispositionRecord>, StoreError> {
        self.ensure_dirs()?;
        let path = self.records_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        BufReader::new(fs::File::open(path)?)
            .lines()
            .filter(|l| l.as_ref().map(|s| !s.trim().is_empty()).unwrap_or(true))
            .map(|line| Ok(serde_json::from_str(&line?)?))
            .collect()
    }

    pub fn for_item(&self, item_id: &str) -> Result<Vec<DispositionRecord>, StoreError> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|record| record.item_id == item_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crucible_core::model::{DecidedBy, Decision};
    use tempfile::TempDir;

    fn record(id: &str, item_id: &str) -> DispositionRecord {
        DispositionRecord {
            disposition_id: id.to_string(),
            item_id: item_id.to_string(),
            round: 1,
            decided_by: DecidedBy::Host,
            decision: Decision::Accepted,
            rationale: "r".to_string(),
            transformation: None,
            proposed_at: "2026-01-01T00:00:00Z".to_string(),
            terminal_at: Some("2026-01-01T00:00:00Z".to_string()),
        }
    }

    #[test]
    fn append_and_load_roundtrips() {
        let dir = TempDir::new().unwrap();
        let store = DispositionStore::new(dir.path(), "p1");
        store.append(&[record("disp_1", "blk_a"), record("disp_2", "blk_a")]).unwrap();
        assert_eq!(store.load_all().unwrap().len(), 2);
        assert_eq!(store.for_item("blk_a").unwrap().len(), 2);
    }

    #[test]
    fn duplicate_disposition_id_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let store = DispositionStore::new(dir.path(), "p1");
        store.append(&[record("disp_1", "blk_a")]).unwrap();
        store.append(&[record("disp_1", "blk_a")]).unwrap();
        assert_eq!(store.load_all().unwrap().len(), 1);
    }
}
