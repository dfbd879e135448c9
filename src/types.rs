//! Core types for block assembly
//!
//! Every `Hash` held by these types is in internal (wire) byte order. Display
//! order only exists at the edges, as hex strings produced by
//! [`crate::hashing::to_display_hex`] and parsed by
//! [`crate::hashing::from_display_hex`].

use serde::{Deserialize, Serialize};

/// Hash type: 256-bit hash, internal byte order
pub type Hash = [u8; 32];

/// Byte string type
pub type ByteString = Vec<u8>;

/// Witness stack for one input: 𝒲 = 𝕊*
pub type Witness = Vec<ByteString>;

/// OutPoint: 𝒪 = ℍ × ℕ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub hash: Hash,
    pub index: u32,
}

impl OutPoint {
    /// The outpoint spent by a coinbase input
    pub const NULL: OutPoint = OutPoint {
        hash: [0u8; 32],
        index: 0xffffffff,
    };

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

/// Locking-script pattern tag as reported alongside a spent output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScriptType {
    #[serde(rename = "p2pkh")]
    P2pkh,
    #[serde(rename = "p2sh")]
    P2sh,
    #[serde(rename = "v0_p2wpkh")]
    V0P2wpkh,
    #[serde(rename = "v0_p2wsh")]
    V0P2wsh,
    #[serde(rename = "v1_p2tr")]
    V1P2tr,
    #[serde(rename = "op_return")]
    OpReturn,
    #[default]
    #[serde(other)]
    Unknown,
}

/// The output an input spends, carried with the input so that fees and
/// signature preimages can be computed without a UTXO lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpentOutput {
    pub value: u64,
    pub script_pubkey: ByteString,
    pub script_pubkey_asm: String,
    pub script_type: ScriptType,
}

/// Transaction Input: ℐ = 𝒪 × 𝕊 × ℕ × 𝒲
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInput {
    pub prevout: OutPoint,
    pub script_sig: ByteString,
    pub sequence: u32,
    pub witness: Witness,
    /// Absent for coinbase inputs and for transactions decoded from raw bytes
    pub spent_output: Option<SpentOutput>,
}

/// Transaction Output: 𝒯 = ℕ × 𝕊
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub value: u64,
    pub script_pubkey: ByteString,
}

/// Transaction: 𝒯𝒳 = ℤ × ℐ* × 𝒯* × ℕ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: u32,
}

impl Transaction {
    /// True when at least one input carries a non-empty witness stack
    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }
}

/// Block Header: ℋ = ℤ × ℍ × ℍ × ℕ × ℕ × ℕ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block_hash: Hash,
    pub merkle_root: Hash,
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
}

/// Validation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid(String),
}

/// A transaction together with the fields derived from it once.
///
/// Built by [`crate::transaction::ProcessedTransaction::new`]; the derived
/// fields are never recomputed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedTransaction {
    pub tx: Transaction,
    pub txid: Hash,
    pub wtxid: Hash,
    pub weight: u64,
    pub fee: u64,
}
