//! Validation of a mined block against the transactions it claims to include

use crate::coinbase::is_coinbase_shape;
use crate::config::MinerConfig;
use crate::error::{MinerError, Result};
use crate::hashing::{to_display_hex, ByteOrder};
use crate::merkle::merkle_root;
use crate::mining::MinedBlock;
use crate::pow::{serialize_header, validate_header};
use crate::script::verify_transaction;
use crate::segwit::{check_block_weight, verify_witness_commitment, witness_commitment};
use crate::serialization::{calculate_weight, compute_txid, serialize_witness};
use crate::types::*;
use rayon::prelude::*;

/// ValidateMinedBlock: MinedBlock × 𝒯𝒳* × Config → {valid, error}
///
/// For mined block b over transactions txs:
/// 1. b.coinbase has one null-prevout input and two outputs, and its
///    encoding and txid agree with its fields
/// 2. b.txids = [tx.txid | tx ∈ txs]
/// 3. Weight(b.coinbase) + Σ Weight(tx) ≤ max block weight
/// 4. payout ≤ subsidy + Σ tx.fee
/// 5. b.coinbase commits to WitnessCommitment(txs, reserved value)
/// 6. header.merkle_root = MerkleRoot([b.coinbase.txid] ++ b.txids)
/// 7. header hash ≤ target
/// 8. every input of every tx verifies
pub fn validate_mined_block(
    block: &MinedBlock,
    transactions: &[ProcessedTransaction],
    config: &MinerConfig,
) -> Result<()> {
    let coinbase = &block.coinbase;

    // 1. Coinbase shape and consistency
    if !is_coinbase_shape(&coinbase.tx) {
        return Err(MinerError::InvalidBlock("malformed coinbase".to_string()));
    }
    if compute_txid(&coinbase.tx) != coinbase.txid || serialize_witness(&coinbase.tx) != coinbase.encoded {
        return Err(MinerError::InvalidBlock(
            "coinbase encoding does not match its fields".to_string(),
        ));
    }

    // 2. Transaction ids
    if block.txids.len() != transactions.len()
        || block.txids.iter().zip(transactions).any(|(id, tx)| *id != tx.txid)
    {
        return Err(MinerError::InvalidBlock(
            "transaction ids do not match the transaction set".to_string(),
        ));
    }

    // 3. Weight
    check_block_weight(
        std::iter::once(calculate_weight(&coinbase.tx)).chain(transactions.iter().map(|tx| tx.weight)),
        config.max_block_weight,
    )?;

    // 4. Payout
    let allowed = transactions
        .iter()
        .try_fold(config.coinbase.block_subsidy, |acc, tx| acc.checked_add(tx.fee))
        .ok_or_else(|| MinerError::InvalidBlock("total fees overflow".to_string()))?;
    let payout = coinbase
        .tx
        .outputs
        .iter()
        .try_fold(0u64, |acc, output| acc.checked_add(output.value))
        .ok_or_else(|| MinerError::InvalidBlock("coinbase payout overflows".to_string()))?;
    if payout > allowed {
        return Err(MinerError::InvalidBlock(format!(
            "coinbase pays {} but subsidy plus fees is {}",
            payout, allowed
        )));
    }

    // 5. Witness commitment
    let reserved_value = config.reserved_value()?;
    if coinbase.tx.inputs[0].witness.as_slice() != [reserved_value.to_vec()] {
        return Err(MinerError::CommitmentMismatch(
            "coinbase witness is not the reserved value".to_string(),
        ));
    }
    let expected = witness_commitment(transactions, &reserved_value);
    if !verify_witness_commitment(&coinbase.tx, &expected) {
        return Err(MinerError::CommitmentMismatch(format!(
            "coinbase does not commit to {}",
            hex::encode(expected)
        )));
    }

    // 6. Merkle root
    let ids: Vec<Hash> = std::iter::once(coinbase.txid).chain(block.txids.iter().copied()).collect();
    if merkle_root(&ids, ByteOrder::Internal) != Some(block.header.merkle_root) {
        return Err(MinerError::InvalidBlock(format!(
            "merkle root {} does not match transactions",
            to_display_hex(&block.header.merkle_root)
        )));
    }

    // 7. Header
    if serialize_header(&block.header) != block.header_bytes {
        return Err(MinerError::InvalidBlock("header bytes do not match header".to_string()));
    }
    let hash = validate_header(&block.header_bytes, &config.target_value()?)?;
    if hash != block.hash {
        return Err(MinerError::InvalidBlock("recorded hash does not match header".to_string()));
    }

    // 8. Scripts, each transaction independently
    transactions.par_iter().try_for_each(|tx| {
        verify_transaction(&tx.tx).map_err(|e| match e {
            MinerError::ScriptFailure(msg) => {
                MinerError::ScriptFailure(format!("{}: {}", to_display_hex(&tx.txid), msg))
            }
            other => other,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mining::{assemble_block, mine_block};
    use crate::segwit::commitment_script;

    fn easy_config() -> MinerConfig {
        MinerConfig {
            target: format!("7fffff{}", "00".repeat(29)),
            bits: 0x207fffff,
            ..MinerConfig::default()
        }
    }

    // spends an output type without a verifier, so scripts are skipped
    fn unchecked(n: u8, fee: u64) -> ProcessedTransaction {
        let tx = Transaction {
            version: 2,
            inputs: vec![TransactionInput {
                prevout: OutPoint { hash: [n; 32], index: 0 },
                script_sig: vec![],
                sequence: 0xffffffff,
                witness: vec![vec![n; 64]],
                spent_output: Some(SpentOutput {
                    value: 10_000 + fee,
                    script_pubkey: vec![0x51, 0x20],
                    script_pubkey_asm: String::new(),
                    script_type: ScriptType::V1P2tr,
                }),
            }],
            outputs: vec![TransactionOutput {
                value: 10_000,
                script_pubkey: vec![0x51],
            }],
            lock_time: 0,
        };
        ProcessedTransaction::new(tx).unwrap()
    }

    fn mined() -> (MinedBlock, Vec<ProcessedTransaction>, MinerConfig) {
        let config = easy_config();
        let txs = vec![unchecked(1, 300), unchecked(2, 400), unchecked(3, 500)];
        let template = assemble_block(txs.clone(), &config, 1_700_000_000).unwrap();
        (mine_block(&template).unwrap(), txs, config)
    }

    #[test]
    fn test_valid_block() {
        let (block, txs, config) = mined();
        assert!(validate_mined_block(&block, &txs, &config).is_ok());
    }

    #[test]
    fn test_reordered_transactions_rejected() {
        let (block, mut txs, config) = mined();
        txs.swap(0, 1);
        assert!(matches!(
            validate_mined_block(&block, &txs, &config),
            Err(MinerError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_wrong_commitment_rejected() {
        let (mut block, txs, config) = mined();
        block.coinbase.tx.outputs[1].script_pubkey = commitment_script(&[0xee; 32]);
        block.coinbase.encoded = serialize_witness(&block.coinbase.tx);
        block.coinbase.txid = compute_txid(&block.coinbase.tx);
        assert!(matches!(
            validate_mined_block(&block, &txs, &config),
            Err(MinerError::CommitmentMismatch(_))
        ));
    }

    #[test]
    fn test_stale_coinbase_txid_rejected() {
        let (mut block, txs, config) = mined();
        block.coinbase.txid[0] ^= 1;
        assert!(matches!(
            validate_mined_block(&block, &txs, &config),
            Err(MinerError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_overpaying_coinbase_rejected() {
        let (mut block, txs, config) = mined();
        block.coinbase.tx.outputs[0].value += 1;
        block.coinbase.encoded = serialize_witness(&block.coinbase.tx);
        block.coinbase.txid = compute_txid(&block.coinbase.tx);
        assert!(matches!(
            validate_mined_block(&block, &txs, &config),
            Err(MinerError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_overflowing_fees_rejected() {
        let (block, mut txs, config) = mined();
        txs[0].fee = u64::MAX;
        assert!(matches!(
            validate_mined_block(&block, &txs, &config),
            Err(MinerError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_overflowing_payout_rejected() {
        let (mut block, txs, config) = mined();
        block.coinbase.tx.outputs[1].value = u64::MAX;
        block.coinbase.encoded = serialize_witness(&block.coinbase.tx);
        block.coinbase.txid = compute_txid(&block.coinbase.tx);
        assert!(matches!(
            validate_mined_block(&block, &txs, &config),
            Err(MinerError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_tampered_merkle_root_rejected() {
        let (mut block, txs, config) = mined();
        block.header.merkle_root[5] ^= 0x80;
        block.header_bytes = serialize_header(&block.header);
        assert!(matches!(
            validate_mined_block(&block, &txs, &config),
            Err(MinerError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_stricter_target_rejects_header() {
        let (block, txs, mut config) = mined();
        config.target = "00".repeat(32);
        assert!(matches!(
            validate_mined_block(&block, &txs, &config),
            Err(MinerError::HeaderRejected(_))
        ));
    }

    #[test]
    fn test_lower_weight_limit_rejected() {
        let (block, txs, mut config) = mined();
        config.max_block_weight = 1_000;
        assert!(matches!(
            validate_mined_block(&block, &txs, &config),
            Err(MinerError::WeightExceeded { .. })
        ));
    }
}
