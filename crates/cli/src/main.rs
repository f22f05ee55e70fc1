use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use dotenvy::from_path as dotenv_from_path;
use serde_json::json;
use thiserror::Error;

use crucible_core::ingest::{process_critique_round, IngestInput};
use crucible_core::model::{
    ClosedItemRef, RawCritique, Role, RolePair, RoundArtifact, SynthesisPlan,
};
use crucible_core::{active_set, dag, gap, lineage, mint_artifact_id};
use crucible_store::hostlog::{
    DagValidated, GateOpened, HostEvent, HostLogAppender, RoundIngested, SynthesisFinalized,
    SynthesisGapsDetected,
};
use crucible_store::{DispositionStore, ItemStore, RoundArtifactStore, StoreError};

#[derive(Debug, Error)]
enum CliError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("unknown role: {0} (expected A or B)")]
    UnknownRole(String),
}

#[derive(Parser)]
#[command(name = "crucible", version, about = "Critique & Disposition Pipeline utilities")]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest one role's raw critiques for a round, minting items and
    /// recording dispositions.
    IngestRound {
        #[arg(long)]
        repo_root: PathBuf,

        #[arg(long)]
        proposal_id: String,

        /// "A" or "B"
        #[arg(long)]
        role: String,

        #[arg(long)]
        round: u64,

        /// Path to a JSON array of raw critique objects.
        #[arg(long)]
        raw_json: PathBuf,

        /// Path to a JSON array of closed-item refs for similarity warn.
        #[arg(long)]
        closed_items_json: Option<PathBuf>,

        /// Host log JSONL path.
        #[arg(long)]
        host_log: PathBuf,

        /// Timestamp to stamp on minted items and dispositions.
        #[arg(long)]
        ts: String,
    },

    /// Validate the DAG of `derived_from` edges across the canonical store.
    VerifyDag {
        #[arg(long)]
        repo_root: PathBuf,

        #[arg(long)]
        proposal_id: String,

        #[arg(long)]
        host_log: PathBuf,

        #[arg(long)]
        ts: String,
    },

    /// Build lineage cards for the active set, for the synthesis prompt.
    Lineage {
        #[arg(long)]
        repo_root: PathBuf,

        #[arg(long)]
        proposal_id: String,

        #[arg(long)]
        round: u64,
    },

    /// Audit a synthesis plan against the active blocking set.
    Gaps {
        #[arg(long)]
        repo_root: PathBuf,

        #[arg(long)]
        proposal_id: String,

        #[arg(long)]
        round: u64,

        /// Path to a JSON SynthesisPlan object.
        #[arg(long)]
        synthesis_plan_json: PathBuf,

        #[arg(long)]
        host_log: PathBuf,

        #[arg(long)]
        ts: String,
    },

    /// Assemble and persist the write-once round artifact: DAG validation,
    /// active set, convergence state, and ⚑ flags as of this round.
    FinalizeRound {
        #[arg(long)]
        repo_root: PathBuf,

        #[arg(long)]
        proposal_id: String,

        #[arg(long)]
        round: u64,

        /// Raw plan text submitted by role A this round.
        #[arg(long)]
        plan_a: PathBuf,

        /// Raw plan text submitted by role B this round.
        #[arg(long)]
        plan_b: PathBuf,

        #[arg(long)]
        host_log: PathBuf,

        #[arg(long)]
        ts: String,
    },

    /// Verify a hash-chained host event log and print its final hash.
    VerifyLog {
        #[arg(long)]
        host_log: PathBuf,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    }
}

fn load_dotenv(repo_root: &Path) {
    let repo_env = repo_root.join(".env");
    if repo_env.exists() {
        let _ = dotenv_from_path(&repo_env);
        eprintln!("loaded env from {}", repo_env.display());
    } else if Path::new(".env").exists() {
        let _ = dotenv_from_path(".env");
        eprintln!("loaded env from ./.env");
    }
}

fn parse_role(s: &str) -> Result<Role, CliError> {
    match s {
        "A" | "a" => Ok(Role::A),
        "B" | "b" => Ok(Role::B),
        other => Err(CliError::UnknownRole(other.to_string())),
    }
}

fn run() -> Result<(), CliError> {
    let args = Args::parse();
    match args.cmd {
        Command::IngestRound {
            repo_root,
            proposal_id,
            role,
            round,
            raw_json,
            closed_items_json,
            host_log,
            ts,
        } => {
            load_dotenv(&repo_root);
            let role = parse_role(&role)?;

            let raw_critiques: Vec<RawCritique> = serde_json::from_slice(&fs::read(&raw_json)?)?;
            let closed_items: Vec<ClosedItemRef> = match &closed_items_json {
                Some(path) => serde_json::from_slice(&fs::read(path)?)?,
                None => Vec::new(),
            };

            let item_store = ItemStore::new(&repo_root, &proposal_id);
            let disposition_store = DispositionStore::new(&repo_root, &proposal_id);
            let existing_items = item_store.load_all()?;
            let existing_records = disposition_store.load_all()?;

            let input = IngestInput {
                proposal_id: &proposal_id,
                role,
                round,
                raw_critiques: &raw_critiques,
                existing_items: &existing_items,
                existing_records: &existing_records,
                closed_items: &closed_items,
                ingested_at: &ts,
            };

            let item_write_err = std::cell::RefCell::new(None);
            let disp_write_err = std::cell::RefCell::new(None);
            let outcome = process_critique_round(
                input,
                &mut |items| {
                    if let Err(e) = item_store.append(items) {
                        *item_write_err.borrow_mut() = Some(e);
                    }
                },
                &mut |records| {
                    // Items must durably land before dispositions referencing
                    // them do; skip this write if the item write already failed,
                    // so a store I/O error can't leave orphaned dispositions.
                    if item_write_err.borrow().is_some() {
                        return;
                    }
                    if let Err(e) = disposition_store.append(records) {
                        *disp_write_err.borrow_mut() = Some(e);
                    }
                },
            );
            if let Some(e) = item_write_err.into_inner().or(disp_write_err.into_inner()) {
                return Err(e.into());
            }

            if outcome.errors.is_empty() {
                let mut log = HostLogAppender::open(&host_log)?;
                log.append(HostEvent::RoundIngested(RoundIngested {
                    proposal_id: proposal_id.clone(),
                    round,
                    role: role.to_string(),
                    ts: ts.clone(),
                    minted_item_count: outcome.minted_items.len() as u64,
                    disposition_count: outcome.disposition_records.len() as u64,
                    warning_count: outcome.warnings.len() as u64,
                }))?;
                for record in &outcome.disposition_records {
                    if record.decision == crucible_core::model::Decision::PendingTransformation {
                        log.append(HostEvent::GateOpened(GateOpened {
                            proposal_id: proposal_id.clone(),
                            item_id: record.item_id.clone(),
                            ts: ts.clone(),
                        }))?;
                    }
                }
            }

            let out = json!({
                "minted_item_ids": outcome.minted_items.iter().map(|i| i.id.clone()).collect::<Vec<_>>(),
                "disposition_count": outcome.disposition_records.len(),
                "warnings": outcome.warnings,
                "errors": outcome.errors.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string(&out)?);
            Ok(())
        }

        Command::VerifyDag { repo_root, proposal_id, host_log, ts } => {
            load_dotenv(&repo_root);
            let item_store = ItemStore::new(&repo_root, &proposal_id);
            let items = item_store.load_all()?;
            let result = dag::validate_dag(&items);

            let mut log = HostLogAppender::open(&host_log)?;
            let (valid, cycle) = match &result {
                crucible_core::DagValidation::Valid => (true, None),
                crucible_core::DagValidation::Cycle { cycle } => (false, Some(cycle.clone())),
            };
            log.append(HostEvent::DagValidated(DagValidated {
                proposal_id: proposal_id.clone(),
                ts,
                valid,
                cycle: cycle.clone(),
            }))?;

            println!("{}", serde_json::to_string(&json!({ "valid": valid, "cycle": cycle }))?);
            Ok(())
        }

        Command::Lineage { repo_root, proposal_id, round } => {
            load_dotenv(&repo_root);
            let item_store = ItemStore::new(&repo_root, &proposal_id);
            let disposition_store = DispositionStore::new(&repo_root, &proposal_id);
            let items = item_store.load_all()?;
            let records = disposition_store.load_all()?;

            let children = active_set::build_children_map(&items);
            let active = active_set::compute_active_set(&items, &records, &children);
            let cards = lineage::build_lineage_cards(&proposal_id, round, &active, &items, &records);

            println!("{}", serde_json::to_string(&cards)?);
            Ok(())
        }

        Command::Gaps {
            repo_root,
            proposal_id,
            round,
            synthesis_plan_json,
            host_log,
            ts,
        } => {
            load_dotenv(&repo_root);
            let item_store = ItemStore::new(&repo_root, &proposal_id);
            let disposition_store = DispositionStore::new(&repo_root, &proposal_id);
            let items = item_store.load_all()?;
            let records = disposition_store.load_all()?;
            let plan: SynthesisPlan = serde_json::from_slice(&fs::read(&synthesis_plan_json)?)?;

            let children = active_set::build_children_map(&items);
            let active = active_set::compute_active_set(&items, &records, &children);
            let gaps = gap::compute_synthesis_gaps(&active, &items, &plan);
            let gap_ids: Vec<String> = gaps.iter().map(|item| item.id.clone()).collect();

            let mut log = HostLogAppender::open(&host_log)?;
            if gap_ids.is_empty() {
                log.append(HostEvent::SynthesisFinalized(SynthesisFinalized {
                    proposal_id: proposal_id.clone(),
                    round,
                    ts,
                }))?;
            } else {
                log.append(HostEvent::SynthesisGapsDetected(SynthesisGapsDetected {
                    proposal_id: proposal_id.clone(),
                    round,
                    ts,
                    gap_item_ids: gap_ids.clone(),
                }))?;
            }

            println!("{}", serde_json::to_string(&json!({ "gaps": gap_ids }))?);
            Ok(())
        }

        Command::FinalizeRound {
            repo_root,
            proposal_id,
            round,
            plan_a,
            plan_b,
            host_log,
            ts,
        } => {
            load_dotenv(&repo_root);
            let item_store = ItemStore::new(&repo_root, &proposal_id);
            let disposition_store = DispositionStore::new(&repo_root, &proposal_id);
            let round_store = RoundArtifactStore::new(&repo_root, &proposal_id);

            let items = item_store.load_all()?;
            let records = disposition_store.load_all()?;

            let dag_result = dag::validate_dag(&items);
            let children = active_set::build_children_map(&items);
            let active = active_set::compute_active_set(&items, &records, &children);
            let convergence = active_set::compute_convergence_state(&active, &items);
            let pending_flags = active_set::compute_pending_flags(&items, &records);

            let emitted_item_ids = RolePair {
                a: items.iter().filter(|i| i.round == round && i.role == Role::A).map(|i| i.id.clone()).collect(),
                b: items.iter().filter(|i| i.round == round && i.role == Role::B).map(|i| i.id.clone()).collect(),
            };

            let mut disposition_records_by_item: Vec<(String, Vec<String>)> = Vec::new();
            for record in records.iter().filter(|r| r.round == round) {
                match disposition_records_by_item.iter_mut().find(|(item_id, _)| *item_id == record.item_id) {
                    Some((_, ids)) => ids.push(record.disposition_id.clone()),
                    None => disposition_records_by_item
                        .push((record.item_id.clone(), vec![record.disposition_id.clone()])),
                }
            }

            let artifact = RoundArtifact {
                proposal_id: proposal_id.clone(),
                round,
                artifact_id: mint_artifact_id(&proposal_id, round, &ts),
                produced_at: ts.clone(),
                raw_plan_text: RolePair { a: fs::read_to_string(&plan_a)?, b: fs::read_to_string(&plan_b)? },
                emitted_item_ids,
                disposition_records_by_item,
                normalization_spec_version: crucible_core::model::NORMALIZATION_SPEC_VERSION.to_string(),
                active_set: active,
                pending_flags,
                convergence_state: convergence,
                dag_validated: dag_result.is_valid(),
                dag_validated_at: ts.clone(),
            };
            round_store.append_once(&artifact)?;

            let mut log = HostLogAppender::open(&host_log)?;
            log.append(HostEvent::DagValidated(DagValidated {
                proposal_id: proposal_id.clone(),
                ts,
                valid: dag_result.is_valid(),
                cycle: match dag_result {
                    crucible_core::DagValidation::Cycle { cycle } => Some(cycle),
                    crucible_core::DagValidation::Valid => None,
                },
            }))?;

            println!("{}", serde_json::to_string(&artifact)?);
            Ok(())
        }

        Command::VerifyLog { host_log } => {
            let last = crucible_store::hostlog::verify_log(&host_log)?;
            println!("{last}");
            Ok(())
        }
    }
}
