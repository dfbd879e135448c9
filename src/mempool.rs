//! Transaction pool loading and candidate selection
//!
//! The pool is a directory of JSON records, one transaction per file. Records
//! are independent, so their derived fields and script checks are computed in
//! parallel; selection then walks them in file-name order.

use crate::error::{MinerError, Result};
use crate::hashing::to_display_hex;
use crate::record::TransactionRecord;
use crate::script::verify_transaction;
use crate::transaction::check_transaction;
use crate::types::*;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// One pool record and the file it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MempoolEntry {
    pub name: String,
    pub record: TransactionRecord,
}

/// Outcome of processing one entry
#[derive(Debug)]
pub struct Preprocessed {
    pub name: String,
    pub result: Result<ProcessedTransaction>,
}

/// Read every `*.json` file in `dir`, sorted by file name
///
/// Files that cannot be read or parsed are logged and skipped; failing to
/// list the directory is an error.
pub fn load_mempool_dir(dir: impl AsRef<Path>) -> Result<Vec<MempoolEntry>> {
    let dir = dir.as_ref();
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut entries = Vec::with_capacity(paths.len());
    for path in paths {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parsed = std::fs::read_to_string(&path)
            .map_err(MinerError::from)
            .and_then(|json| TransactionRecord::from_json(&json));
        match parsed {
            Ok(record) => entries.push(MempoolEntry { name, record }),
            Err(e) => warn!("skipping {}: {}", path.display(), e),
        }
    }

    info!("loaded {} records from {}", entries.len(), dir.display());
    Ok(entries)
}

/// Decode, derive fields, check structure and verify scripts for one entry
pub fn preprocess(entry: &MempoolEntry) -> Result<ProcessedTransaction> {
    let processed = ProcessedTransaction::from_record(&entry.record)?;
    if let ValidationResult::Invalid(reason) = check_transaction(&processed.tx)? {
        return Err(MinerError::InvalidTransaction(reason));
    }
    verify_transaction(&processed.tx)?;
    debug!(
        "{}: weight {} fee {}",
        processed.display_txid(),
        processed.weight,
        processed.fee
    );
    Ok(processed)
}

/// [`preprocess`] every entry in parallel, keeping input order
pub fn preprocess_all(entries: &[MempoolEntry]) -> Vec<Preprocessed> {
    entries
        .par_iter()
        .map(|entry| Preprocessed {
            name: entry.name.clone(),
            result: preprocess(entry),
        })
        .collect()
}

/// Select up to `max_transactions` includable transactions, in order
///
/// Entries that failed preprocessing, duplicates, transactions spending an
/// outpoint already spent by an earlier candidate, and transactions that
/// would push the summed fees above `max_fees` are dropped with a warning.
pub fn take_candidates(
    preprocessed: Vec<Preprocessed>,
    max_transactions: usize,
    max_fees: u64,
) -> Vec<ProcessedTransaction> {
    let mut seen_txids = HashSet::new();
    let mut spent = HashSet::new();
    let mut candidates = Vec::new();
    let mut total_fees = 0u64;
    let mut rejected = 0usize;

    for Preprocessed { name, result } in preprocessed {
        if candidates.len() == max_transactions {
            break;
        }
        let tx = match result {
            Ok(tx) => tx,
            Err(e) => {
                warn!("rejecting {}: {}", name, e);
                rejected += 1;
                continue;
            }
        };
        if seen_txids.contains(&tx.txid) {
            debug!("{}: duplicate of {}", name, to_display_hex(&tx.txid));
            continue;
        }
        if tx.tx.inputs.iter().any(|input| spent.contains(&input.prevout)) {
            warn!("rejecting {}: conflicts with an earlier candidate", name);
            rejected += 1;
            continue;
        }

        let Some(fees) = total_fees.checked_add(tx.fee).filter(|&fees| fees <= max_fees) else {
            warn!("rejecting {}: fee {} exceeds the remaining fee budget", name, tx.fee);
            rejected += 1;
            continue;
        };

        total_fees = fees;
        seen_txids.insert(tx.txid);
        spent.extend(tx.tx.inputs.iter().map(|input| input.prevout));
        candidates.push(tx);
    }

    info!("selected {} candidates, rejected {}", candidates.len(), rejected);
    candidates
}
