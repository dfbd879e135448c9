//! Block assembly and the proof-of-work search

use crate::coinbase::CoinbaseTransaction;
use crate::config::MinerConfig;
use crate::error::{MinerError, Result};
use crate::hashing::{to_display_hex, ByteOrder};
use crate::merkle::merkle_root_with_rounds;
use crate::pow::{hash_meets_target, header_hash, serialize_header, validate_header, U256};
use crate::segwit::{check_block_weight, witness_commitment};
use crate::serialization::calculate_weight;
use crate::types::*;
use rayon::prelude::*;
use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Everything fixed before the nonce search begins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTemplate {
    /// Header with nonce 0
    pub header: BlockHeader,
    pub coinbase: CoinbaseTransaction,
    pub transactions: Vec<ProcessedTransaction>,
    pub target: U256,
    /// Coinbase plus transaction weight
    pub total_weight: u64,
    pub total_fees: u64,
}

/// A header that met the target, with the block contents it commits to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinedBlock {
    pub header: BlockHeader,
    pub header_bytes: [u8; 80],
    /// Header hash, internal order
    pub hash: Hash,
    pub coinbase: CoinbaseTransaction,
    /// Included transaction ids after the coinbase, internal order
    pub txids: Vec<Hash>,
}

/// Seconds since the Unix epoch, saturating into the 32-bit header field
pub fn current_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().min(u32::MAX as u64) as u32)
        .unwrap_or(0)
}

/// AssembleBlock: 𝒯𝒳* × Config × ℕ → Template
///
/// 1. fees = Σ tx.fee, paid to the coinbase on top of the subsidy
/// 2. commitment = WitnessCommitment(txs, reserved value)
/// 3. coinbase = BuildCoinbase(commitment)
/// 4. Weight(coinbase) + Σ Weight(tx) ≤ max block weight
/// 5. root = MerkleRoot([coinbase.txid] ++ txids)
/// 6. header = (version, 0³², root, timestamp, bits, 0)
pub fn assemble_block(
    transactions: Vec<ProcessedTransaction>,
    config: &MinerConfig,
    timestamp: u32,
) -> Result<BlockTemplate> {
    let target = config.target_value()?;

    // 1. Collect fees
    let total_fees = transactions
        .iter()
        .try_fold(0u64, |acc, tx| acc.checked_add(tx.fee))
        .ok_or_else(|| MinerError::InvalidBlock("total fees overflow".to_string()))?;

    // 2-3. Commit to witness data from the coinbase
    let commitment = witness_commitment(&transactions, &config.reserved_value()?);
    let coinbase = config.coinbase_template(total_fees)?.build(&commitment);

    // 4. Hard weight cap
    let total_weight = check_block_weight(
        std::iter::once(calculate_weight(&coinbase.tx)).chain(transactions.iter().map(|tx| tx.weight)),
        config.max_block_weight,
    )?;

    // 5. Transaction merkle root
    let txids: Vec<Hash> = std::iter::once(coinbase.txid)
        .chain(transactions.iter().map(|tx| tx.txid))
        .collect();
    let (merkle_root, rounds) = merkle_root_with_rounds(&txids, ByteOrder::Internal)
        .ok_or_else(|| MinerError::InvalidBlock("no transactions".to_string()))?;
    debug!("merkle root {} after {} rounds", to_display_hex(&merkle_root), rounds);

    // 6. Header, nonce still zero
    let header = BlockHeader {
        version: config.block_version,
        prev_block_hash: [0u8; 32],
        merkle_root,
        timestamp,
        bits: config.bits,
        nonce: 0,
    };

    info!(
        "assembled block template: {} transactions, weight {}, fees {}",
        transactions.len(),
        total_weight,
        total_fees
    );

    Ok(BlockTemplate {
        header,
        coinbase,
        transactions,
        target,
        total_weight,
        total_fees,
    })
}

impl BlockTemplate {
    /// Finish the block with `nonce`, checking the header against the target
    pub fn complete(&self, nonce: u32) -> Result<MinedBlock> {
        let header = BlockHeader { nonce, ..self.header };
        let header_bytes = serialize_header(&header);
        let hash = validate_header(&header_bytes, &self.target)?;
        Ok(MinedBlock {
            header,
            header_bytes,
            hash,
            coinbase: self.coinbase.clone(),
            txids: self.transactions.iter().map(|tx| tx.txid).collect(),
        })
    }
}

fn meets_target_with_nonce(base: &[u8; 80], nonce: u32, target: &U256) -> bool {
    let mut header = *base;
    header[76..].copy_from_slice(&nonce.to_le_bytes());
    hash_meets_target(&header_hash(&header), target)
}

/// Serial search over `nonces`, in order
///
/// Only the last four header bytes change between attempts.
pub fn mine_nonce_range(template: &BlockTemplate, nonces: RangeInclusive<u32>) -> Result<MinedBlock> {
    let base = serialize_header(&template.header);
    for nonce in nonces {
        if meets_target_with_nonce(&base, nonce, &template.target) {
            let mined = template.complete(nonce)?;
            info!("found nonce {} for block {}", nonce, to_display_hex(&mined.hash));
            return Ok(mined);
        }
    }
    Err(MinerError::ExhaustedNonceSpace)
}

/// MineBlock: search the full 32-bit nonce space serially
pub fn mine_block(template: &BlockTemplate) -> Result<MinedBlock> {
    mine_nonce_range(template, 0..=u32::MAX)
}

/// Search the nonce space on `workers` threads
///
/// The first nonce any worker finds wins and the rest stop. Every worker
/// polls `cancel`; once it is set the search ends with `SearchCancelled`.
pub fn mine_block_parallel(
    template: &BlockTemplate,
    workers: usize,
    cancel: &AtomicBool,
) -> Result<MinedBlock> {
    if workers == 0 {
        return Err(MinerError::Config("workers must be at least 1".to_string()));
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| MinerError::Config(format!("worker pool: {}", e)))?;

    let base = serialize_header(&template.header);
    let target = template.target;

    // Some(None) marks a cancelled search
    let outcome = pool.install(|| {
        (0..=u32::MAX).into_par_iter().find_map_any(|nonce| {
            if cancel.load(Ordering::Relaxed) {
                return Some(None);
            }
            meets_target_with_nonce(&base, nonce, &target).then_some(Some(nonce))
        })
    });

    match outcome {
        Some(Some(nonce)) => {
            let mined = template.complete(nonce)?;
            info!(
                "found nonce {} for block {} on {} workers",
                nonce,
                to_display_hex(&mined.hash),
                workers
            );
            Ok(mined)
        }
        Some(None) => Err(MinerError::SearchCancelled),
        None => Err(MinerError::ExhaustedNonceSpace),
    }
}

impl MinedBlock {
    /// Text record: header hex, coinbase hex, coinbase txid, then one
    /// txid per included transaction; ids in display order, one per line
    pub fn artifact(&self) -> String {
        let mut lines = Vec::with_capacity(self.txids.len() + 3);
        lines.push(hex::encode(self.header_bytes));
        lines.push(hex::encode(&self.coinbase.encoded));
        lines.push(to_display_hex(&self.coinbase.txid));
        lines.extend(self.txids.iter().map(to_display_hex));

        let mut artifact = lines.join("\n");
        artifact.push('\n');
        artifact
    }

    pub fn write_artifact(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.artifact())?;
        Ok(())
    }

    pub fn display_hash(&self) -> String {
        to_display_hex(&self.hash)
    }
}
