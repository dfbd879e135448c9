//! Segregated Witness commitment and block weight (BIP141)

use crate::constants::{COINBASE_WTXID, WITNESS_COMMITMENT_HEADER};
use crate::constants::opcodes::{OP_PUSHBYTES_36, OP_RETURN};
use crate::error::{MinerError, Result};
use crate::hashing::{double_hash_parts, ByteOrder};
use crate::merkle::merkle_root;
use crate::types::*;

/// Length of a commitment script: OP_RETURN, push-36, header, commitment
pub const COMMITMENT_SCRIPT_LEN: usize = 38;

/// Witness merkle root over `wtxids` (internal order) with the zero coinbase
/// wtxid prepended
pub fn witness_root(wtxids: &[Hash]) -> Hash {
    let mut ids = Vec::with_capacity(wtxids.len() + 1);
    ids.push(COINBASE_WTXID);
    ids.extend_from_slice(wtxids);
    // never empty: the coinbase id is always present
    merkle_root(&ids, ByteOrder::Internal).unwrap_or(COINBASE_WTXID)
}

/// WitnessCommitment = SHA256d(WitnessRoot ‖ ReservedValue)
///
/// `transactions` excludes the coinbase; its wtxid is taken to be zero.
pub fn witness_commitment(transactions: &[ProcessedTransaction], reserved_value: &Hash) -> Hash {
    let wtxids: Vec<Hash> = transactions.iter().map(|tx| tx.wtxid).collect();
    let root = witness_root(&wtxids);
    double_hash_parts(&[&root, reserved_value])
}

/// OP_RETURN script carrying a witness commitment
pub fn commitment_script(commitment: &Hash) -> ByteString {
    let mut script = Vec::with_capacity(COMMITMENT_SCRIPT_LEN);
    script.push(OP_RETURN);
    script.push(OP_PUSHBYTES_36);
    script.extend_from_slice(&WITNESS_COMMITMENT_HEADER);
    script.extend_from_slice(commitment);
    script
}

fn commitment_prefix() -> [u8; 6] {
    let mut prefix = [0u8; 6];
    prefix[0] = OP_RETURN;
    prefix[1] = OP_PUSHBYTES_36;
    prefix[2..].copy_from_slice(&WITNESS_COMMITMENT_HEADER);
    prefix
}

/// Extract the commitment from a script of the commitment form
pub fn extract_witness_commitment(script: &[u8]) -> Option<Hash> {
    if script.len() < COMMITMENT_SCRIPT_LEN || !script.starts_with(&commitment_prefix()) {
        return None;
    }
    let mut commitment = [0u8; 32];
    commitment.copy_from_slice(&script[6..COMMITMENT_SCRIPT_LEN]);
    Some(commitment)
}

/// Structural check: some coinbase output script starts with the commitment
/// prefix and ends with `expected`
pub fn verify_witness_commitment(coinbase_tx: &Transaction, expected: &Hash) -> bool {
    let prefix = commitment_prefix();
    coinbase_tx.outputs.iter().any(|output| {
        let script = &output.script_pubkey;
        script.len() >= prefix.len() + expected.len()
            && script.starts_with(&prefix)
            && script.ends_with(expected)
    })
}

/// Sum `weights` and reject totals above `max_weight`
pub fn check_block_weight<I>(weights: I, max_weight: u64) -> Result<u64>
where
    I: IntoIterator<Item = u64>,
{
    let total = weights
        .into_iter()
        .try_fold(0u64, |acc, w| acc.checked_add(w))
        .unwrap_or(u64::MAX);
    if total > max_weight {
        return Err(MinerError::WeightExceeded {
            weight: total,
            limit: max_weight,
        });
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{MAX_BLOCK_WEIGHT, WITNESS_RESERVED_VALUE};
    use crate::hashing::double_hash;

    fn processed(wtxid: Hash) -> ProcessedTransaction {
        ProcessedTransaction {
            tx: Transaction {
                version: 1,
                inputs: vec![],
                outputs: vec![],
                lock_time: 0,
            },
            txid: [0xee; 32],
            wtxid,
            weight: 400,
            fee: 0,
        }
    }

    fn create_coinbase_with_outputs(scripts: Vec<ByteString>) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TransactionInput {
                prevout: OutPoint::NULL,
                script_sig: vec![0x51],
                sequence: 0xffffffff,
                witness: vec![WITNESS_RESERVED_VALUE.to_vec()],
                spent_output: None,
            }],
            outputs: scripts
                .into_iter()
                .map(|script_pubkey| TransactionOutput { value: 0, script_pubkey })
                .collect(),
            lock_time: 0,
        }
    }

    #[test]
    fn test_commitment_coinbase_only() {
        // the witness tree is just the zero coinbase id, so the root is zero
        let commitment = witness_commitment(&[], &WITNESS_RESERVED_VALUE);
        let mut preimage = [0u8; 64];
        preimage[32..].copy_from_slice(&WITNESS_RESERVED_VALUE);
        assert_eq!(commitment, double_hash(&preimage));
        assert_eq!(
            hex::encode(commitment),
            "e2f61c3f71d1defd3fa999dfa36953755c690689799962b48bebd836974e8cf9"
        );
    }

    #[test]
    fn test_witness_root_prepends_zero() {
        let w = [0x42; 32];
        let expected = double_hash_parts(&[&COINBASE_WTXID, &w]);
        assert_eq!(witness_root(&[w]), expected);
    }

    #[test]
    fn test_commitment_depends_on_reserved_value() {
        let txs = vec![processed([1; 32]), processed([2; 32])];
        assert_ne!(
            witness_commitment(&txs, &[0u8; 32]),
            witness_commitment(&txs, &[1u8; 32])
        );
    }

    #[test]
    fn test_commitment_script_layout() {
        let script = commitment_script(&[0xab; 32]);
        assert_eq!(script.len(), COMMITMENT_SCRIPT_LEN);
        assert_eq!(hex::encode(&script[..6]), "6a24aa21a9ed");
        assert_eq!(extract_witness_commitment(&script), Some([0xab; 32]));
    }

    #[test]
    fn test_extract_rejects_other_scripts() {
        assert_eq!(extract_witness_commitment(&[0x51]), None);

        let mut wrong_opcode = commitment_script(&[1; 32]);
        wrong_opcode[0] = 0x52;
        assert_eq!(extract_witness_commitment(&wrong_opcode), None);

        let mut wrong_header = commitment_script(&[1; 32]);
        wrong_header[2] = 0x00;
        assert_eq!(extract_witness_commitment(&wrong_header), None);
    }

    #[test]
    fn test_verify_witness_commitment_first_match() {
        let commitment = [0x33; 32];
        let coinbase = create_coinbase_with_outputs(vec![
            vec![0x76, 0xa9],
            commitment_script(&commitment),
        ]);
        assert!(verify_witness_commitment(&coinbase, &commitment));
        assert!(!verify_witness_commitment(&coinbase, &[0x34; 32]));
    }

    #[test]
    fn test_verify_witness_commitment_absent() {
        let coinbase = create_coinbase_with_outputs(vec![vec![0x51]]);
        assert!(!verify_witness_commitment(&coinbase, &[0u8; 32]));
    }

    #[test]
    fn test_block_weight_limit() {
        assert_eq!(
            check_block_weight([1_000_000; 4], MAX_BLOCK_WEIGHT).unwrap(),
            4_000_000
        );
        assert!(matches!(
            check_block_weight([1_000_000, 1_000_000, 1_000_000, 1_000_001], MAX_BLOCK_WEIGHT),
            Err(MinerError::WeightExceeded { weight: 4_000_001, limit: 4_000_000 })
        ));
    }

    #[test]
    fn test_block_weight_overflow_is_rejected() {
        assert!(check_block_weight([u64::MAX, 1], MAX_BLOCK_WEIGHT).is_err());
    }
}
