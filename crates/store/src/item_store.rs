//! Append-only JSONL item store plus a deterministic index, one per
//! proposal. Items are content-addressed and immutable, so the store never
//! rewrites a line — only appends and re-derives `index.json`.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use crucible_common::canonical_json_bytes;
use crucible_core::model::CritiqueItem;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemIndexEntry {
    pub id: String,
    pub display_id: String,
    pub round: u64,
    pub line_no: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ItemIndex {
    pub entries: Vec<ItemIndexEntry>,
}

pub struct ItemStore {
    proposal_dir: PathBuf,
}

impl ItemStore {
    pub fn new(repo_root: impl Into<PathBuf>, proposal_id: &str) -> Self {
        Self {
            proposal_dir: repo_root.into().join("crucible").join(proposal_id).join("items"),
        }
    }

    pub fn items_path(&self) -> PathBuf {
        self.proposal_dir.join("items.jsonl")
    }

    pub fn index_path(&self) -> PathBuf {
        self.proposal_dir.join("index.json")
    }

    fn ensure_dirs(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.proposal_dir)?;
        Ok(())
    }

    pub fn load_index(&self) -> Result<ItemIndex, StoreError> {
        self.ensure_dirs()?;
        let path = self.index_path();
        if !path.exists() {
            return Ok(ItemIndex::default());
        }
        Ok(serde_json::from_slice(&fs::read(path)?)?)
    }

    fn write_index(&self, index: &ItemIndex) -> Result<(), StoreError> {
        self.ensure_dirs()?;
        fs::write(self.index_path(), canonical_json_bytes(index)?)?;
        Ok(())
    }

    fn line_count(&self) -> Result<u64, StoreError> {
        let path = self.items_path();
        if !path.exists() {
            return Ok(0);
        }
        Ok(BufReader::new(fs::File::open(path)?).lines().count() as u64)
    }

    /// Append a batch of newly-minted items, skipping any already present
    /// (content-addressing means a duplicate mint is a no-op, not an error).
    pub fn append(&self, items: &[CritiqueItem]) -> Result<(), StoreError> {
        if items.is_empty() {
            return Ok(());
        }
        self.ensure_dirs()?;
        let mut index = self.load_index()?;
        let mut known: std::collections::HashSet<String> =
            index.entries.iter().map(|e| e.id.clone()).collect();

        let mut file = fs::OpenOptions::new().create(true).append(true).open(self.items_path())?;
        let mut line_no = self.line_count()?;

        for item in items {
            if known.contains(item.id.as_str()) {
                continue;
            }
            let bytes = canonical_json_bytes(item)?;
            file.write_all(&bytes)?;
            file.write_all(b"\n")?;
            index.entries.push(ItemIndexEntry {
                id: item.id.clone(),
                display_id: item.display_id.clone(),
                round: item.round,
                line_no,
            });
            known.insert(item.id.clone());
            line_no += 1;
        }
        file.flush()?;
        self.write_index(&index)
    }

    /// Load the full canonical item set — the snapshot crucible_core's pure
    /// functions expect.
    pub fn load_all(&self) -> Result<Vec<CritiqueItem>, StoreError> {
        self.ensure_dirs()?;
        let path = self.items_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        BufReader::new(fs::File::open(path)?)
            .lines()
            .filter(|l| l.as_ref().map(|s| !s.trim().is_empty()).unwrap_or(true))
            .map(|line| Ok(serde_json::from_str(&line?)?))
            .collect()
    }

    pub fn get(&self, id: &str) -> Result<Option<CritiqueItem>, StoreError> {
        Ok(self.load_all()?.into_iter().find(|item| item.id == id))
    }
}
