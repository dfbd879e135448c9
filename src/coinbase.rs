//! Coinbase transaction construction
//!
//! The coinbase has exactly one input spending the null outpoint, with the
//! witness reserved value as its only witness item, and exactly two outputs:
//! the payout and a zero-value witness commitment. One [`Transaction`] value
//! backs both the wire encoding and the txid.

use crate::constants::SEQUENCE_FINAL;
use crate::segwit::commitment_script;
use crate::serialization::{compute_txid, serialize_witness};
use crate::types::*;

/// Fixed parts of the coinbase, decided before the commitment is known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinbaseTemplate {
    pub script_sig: ByteString,
    pub payout_script: ByteString,
    pub payout_value: u64,
    pub reserved_value: Hash,
}

/// A built coinbase with its encoding and txid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinbaseTransaction {
    pub tx: Transaction,
    /// Witness-form encoding, as placed in the block
    pub encoded: ByteString,
    /// Internal-order txid of the legacy encoding
    pub txid: Hash,
}

impl CoinbaseTemplate {
    /// Splice `witness_commitment` into the template
    pub fn build(&self, witness_commitment: &Hash) -> CoinbaseTransaction {
        build_coinbase(self, witness_commitment)
    }
}

/// BuildCoinbase: template × commitment → (encoding, txid)
pub fn build_coinbase(template: &CoinbaseTemplate, witness_commitment: &Hash) -> CoinbaseTransaction {
    let tx = Transaction {
        version: 1,
        inputs: vec![TransactionInput {
            prevout: OutPoint::NULL,
            script_sig: template.script_sig.clone(),
            sequence: SEQUENCE_FINAL,
            witness: vec![template.reserved_value.to_vec()],
            spent_output: None,
        }],
        outputs: vec![
            TransactionOutput {
                value: template.payout_value,
                script_pubkey: template.payout_script.clone(),
            },
            TransactionOutput {
                value: 0,
                script_pubkey: commitment_script(witness_commitment),
            },
        ],
        lock_time: 0,
    };

    let encoded = serialize_witness(&tx);
    let txid = compute_txid(&tx);
    CoinbaseTransaction { tx, encoded, txid }
}

/// Shape check for a coinbase: one null-prevout input, two outputs
pub fn is_coinbase_shape(tx: &Transaction) -> bool {
    tx.inputs.len() == 1 && tx.inputs[0].prevout.is_null() && tx.outputs.len() == 2
}
