//! Hash-chained append-only host event log. Structured logging for the
//! pipeline's lifecycle, not the core's own concern (the core has no
//! logger): each record includes `prev_hash`/`hash` so the whole log can
//! be replayed and verified end to end.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crucible_common::sha256_canonical_json;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum HostEvent {
    RoundIngested(RoundIngested),
    DagValidated(DagValidated),
    GateOpened(GateOpened),
    GateResolved(GateResolved),
    SynthesisGapsDetected(SynthesisGapsDetected),
    SynthesisFinalized(SynthesisFinalized),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundIngested {
    pub proposal_id: String,
    pub round: u64,
    pub role: String,
    pub ts: String,
    pub minted_item_count: u64,
    pub disposition_count: u64,
    pub warning_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DagValidated {
    pub proposal_id: String,
    pub ts: String,
    pub valid: bool,
    pub cycle: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateOpened {
    pub proposal_id: String,
    pub item_id: String,
    pub ts: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateResolved {
    pub proposal_id: String,
    pub item_id: String,
    pub ts: String,
    pub resolved_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisGapsDetected {
    pub proposal_id: String,
    pub round: u64,
    pub ts: String,
    pub gap_item_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisFinalized {
    pub proposal_id: String,
    pub round: u64,
    pub ts: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostLogRecord {
    pub prev_hash: String,
    pub hash: String,
    pub event: HostEvent,
}

#[derive(Debug, Clone, Serialize)]
struct HashPayload<'a> {
    prev_hash: &'a str,
    event: &'a HostEvent,
}

pub fn genesis_hash() -> String {
    "sha256:0000000000000000000000000000000000000000000000000000000000000000".to_string()
}

pub fn compute_record_hash(prev_hash: &str, event: &HostEvent) -> Result<String, StoreError> {
    Ok(sha256_canonical_json(&HashPayload { prev_hash, event })?)
}

pub struct HostLogAppender {
    file: File,
    last_hash: String,
}

impl HostLogAppender {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let last_hash = tail_hash(path)?.unwrap_or_else(genesis_hash);
        Ok(Self { file, last_hash })
    }

    pub fn append(&mut self, event: HostEvent) -> Result<HostLogRecord, StoreError> {
        let prev_hash = self.last_hash.clone();
        let hash = compute_record_hash(&prev_hash, &event)?;
        let record = HostLogRecord { prev_hash, hash: hash.clone(), event };
        let line = serde_json::to_string(&record)?;
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.file.flush()?;
        self.last_hash = hash;
        Ok(record)
    }
}

fn tail_hash(path: &Path) -> Result<Option<String>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let mut last = None;
    for line in BufReader::new(File::open(path)?).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: HostLogRecord = serde_json::from_str(&line)?;
        last = Some(record.hash);
    }
    Ok(last)
}

/// Replay the full chain, verifying each `prev_hash`/`hash` link. Returns
/// the final hash on success.
pub fn verify_log(path: impl AsRef<Path>) -> Result<String, StoreError> {
    let reader = BufReader::new(File::open(path)?);
    let mut expected_prev = genesis_hash();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: HostLogRecord = serde_json::from_str(&line)?;
        if record.prev_hash != expected_prev {
            return Err(StoreError::HashMismatch {
                line: line_no,
                expected: expected_prev,
                got: record.prev_hash,
            });
        }
        let computed = compute_record_hash(&record.prev_hash, &record.event)?;
        if computed != record.hash {
            return Err(StoreError::HashMismatch {
                line: line_no,
                expected: computed,
                got: record.hash,
            });
        }
        expected_prev = record.hash;
    }
    Ok(expected_prev)
}
