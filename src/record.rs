//! Transaction records as supplied by the transaction pool
//!
//! A record is JSON with display-order txids and hex-encoded scripts. Each
//! input carries the output it spends, so fees and signature preimages can be
//! computed without a UTXO lookup. Unknown fields are ignored.

use crate::error::{MinerError, Result};
use crate::hashing::{decode_hex, from_display_hex, to_display_hex};
use crate::script::{assemble_asm, classify_script, verifier_for};
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub version: i32,
    pub locktime: u32,
    pub vin: Vec<InputRecord>,
    pub vout: Vec<OutputRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    /// Display-order id of the transaction being spent
    pub txid: String,
    pub vout: u32,
    #[serde(default)]
    pub scriptsig: String,
    pub sequence: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub witness: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prevout: Option<PrevoutRecord>,
    #[serde(default)]
    pub is_coinbase: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrevoutRecord {
    pub value: u64,
    pub scriptpubkey: String,
    #[serde(default)]
    pub scriptpubkey_asm: String,
    #[serde(default)]
    pub scriptpubkey_type: ScriptType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub value: u64,
    pub scriptpubkey: String,
}

impl TransactionRecord {
    /// Parse one record; missing or mistyped fields are decoding errors
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| MinerError::Decoding(format!("transaction record: {}", e)))
    }

    pub fn to_transaction(&self) -> Result<Transaction> {
        let inputs = self
            .vin
            .iter()
            .enumerate()
            .map(|(i, input)| input.to_input(i))
            .collect::<Result<Vec<_>>>()?;

        let outputs = self
            .vout
            .iter()
            .map(|output| {
                Ok(TransactionOutput {
                    value: output.value,
                    script_pubkey: decode_hex(&output.scriptpubkey)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Transaction {
            version: self.version,
            inputs,
            outputs,
            lock_time: self.locktime,
        })
    }
}

impl InputRecord {
    fn to_input(&self, index: usize) -> Result<TransactionInput> {
        let prevout = if self.is_coinbase {
            OutPoint::NULL
        } else {
            OutPoint {
                hash: from_display_hex(&self.txid)?,
                index: self.vout,
            }
        };

        let witness = self
            .witness
            .iter()
            .flatten()
            .map(|item| decode_hex(item))
            .collect::<Result<Witness>>()?;

        let spent_output = self
            .prevout
            .as_ref()
            .map(|prevout| prevout.to_spent_output(index))
            .transpose()?;

        Ok(TransactionInput {
            prevout,
            script_sig: decode_hex(&self.scriptsig)?,
            sequence: self.sequence,
            witness,
            spent_output,
        })
    }
}

impl PrevoutRecord {
    fn to_spent_output(&self, index: usize) -> Result<SpentOutput> {
        let script_pubkey = decode_hex(&self.scriptpubkey)?;

        // a tag must not move a script into or out of a verified pattern
        let classified = classify_script(&script_pubkey);
        let verified_type = verifier_for(self.scriptpubkey_type).is_some();
        if classified != self.scriptpubkey_type && (verified_type || verifier_for(classified).is_some()) {
            return Err(MinerError::Decoding(format!(
                "input {}: scriptpubkey_type {:?} does not match a {:?} scriptpubkey",
                index, self.scriptpubkey_type, classified
            )));
        }

        // the hex is authoritative; a disagreeing asm means a corrupt record
        if verified_type && !self.scriptpubkey_asm.is_empty() && assemble_asm(&self.scriptpubkey_asm)? != script_pubkey {
            return Err(MinerError::Decoding(format!(
                "input {}: scriptpubkey_asm does not match scriptpubkey",
                index
            )));
        }

        Ok(SpentOutput {
            value: self.value,
            script_pubkey,
            script_pubkey_asm: self.scriptpubkey_asm.clone(),
            script_type: self.scriptpubkey_type,
        })
    }
}

impl TryFrom<&TransactionRecord> for Transaction {
    type Error = MinerError;

    fn try_from(record: &TransactionRecord) -> Result<Self> {
        record.to_transaction()
    }
}

impl TryFrom<TransactionRecord> for Transaction {
    type Error = MinerError;

    fn try_from(record: TransactionRecord) -> Result<Self> {
        record.to_transaction()
    }
}

impl From<&Transaction> for TransactionRecord {
    fn from(tx: &Transaction) -> Self {
        TransactionRecord {
            version: tx.version,
            locktime: tx.lock_time,
            vin: tx
                .inputs
                .iter()
                .map(|input| InputRecord {
                    txid: to_display_hex(&input.prevout.hash),
                    vout: input.prevout.index,
                    scriptsig: hex::encode(&input.script_sig),
                    sequence: input.sequence,
                    witness: (!input.witness.is_empty())
                        .then(|| input.witness.iter().map(hex::encode).collect()),
                    prevout: input.spent_output.as_ref().map(|spent| PrevoutRecord {
                        value: spent.value,
                        scriptpubkey: hex::encode(&spent.script_pubkey),
                        scriptpubkey_asm: spent.script_pubkey_asm.clone(),
                        scriptpubkey_type: spent.script_type,
                    }),
                    is_coinbase: input.prevout.is_null(),
                })
                .collect(),
            vout: tx
                .outputs
                .iter()
                .map(|output| OutputRecord {
                    value: output.value,
                    scriptpubkey: hex::encode(&output.script_pubkey),
                })
                .collect(),
        }
    }
}

impl ProcessedTransaction {
    /// Decode a record and derive its fields
    pub fn from_record(record: &TransactionRecord) -> Result<Self> {
        ProcessedTransaction::new(record.to_transaction()?)
    }
}
