//! Consensus and block-template constants

/// Maximum block weight in weight units
pub const MAX_BLOCK_WEIGHT: u64 = 4_000_000;

/// Weight multiplier applied to non-witness bytes (BIP141)
pub const WITNESS_SCALE_FACTOR: u64 = 4;

/// Block version used for assembled headers
pub const BLOCK_VERSION: i32 = 4;

/// Serialized block header length
pub const HEADER_SIZE: usize = 80;

/// Default difficulty target, big-endian hex
pub const DEFAULT_TARGET_HEX: &str =
    "0000ffff00000000000000000000000000000000000000000000000000000000";

/// Compact encoding of [`DEFAULT_TARGET_HEX`]
pub const DEFAULT_BITS: u32 = 0x1f00ffff;

/// Witness reserved value placed in the coinbase witness
pub const WITNESS_RESERVED_VALUE: [u8; 32] = [0u8; 32];

/// wtxid substituted for the coinbase when building the witness tree
pub const COINBASE_WTXID: [u8; 32] = [0u8; 32];

/// Marker following OP_RETURN in the witness commitment output (BIP141)
pub const WITNESS_COMMITMENT_HEADER: [u8; 4] = [0xaa, 0x21, 0xa9, 0xed];

/// Block subsidy at the current halving epoch: 3.125 BTC
pub const BLOCK_SUBSIDY: u64 = 312_500_000;

/// Maximum money supply: 21,000,000 BTC in satoshis
pub const MAX_MONEY: u64 = 21_000_000 * 100_000_000;

/// Sequence number for final inputs
pub const SEQUENCE_FINAL: u32 = 0xffffffff;

/// Sighash type covering all inputs and outputs
pub const SIGHASH_ALL: u32 = 0x01;

/// Default coinbase unlocking script (height push followed by a miner tag)
pub const DEFAULT_COINBASE_SCRIPT_SIG_HEX: &str =
    "03233708184d696e656420627920416e74506f6f6c373946205b8160a4256c0000946e0100";

/// Default payout locking script (P2PKH)
pub const DEFAULT_PAYOUT_SCRIPT_HEX: &str = "76a914edf10a7fac6b32e24daa5305c723f3de58db1bc888ac";

/// Default cap on transactions taken from the pool
pub const DEFAULT_MAX_TRANSACTIONS: usize = 2100;

/// Opcodes understood by the script verifier and assembler
pub mod opcodes {
    pub const OP_0: u8 = 0x00;
    pub const OP_PUSHBYTES_20: u8 = 0x14;
    pub const OP_PUSHBYTES_32: u8 = 0x20;
    pub const OP_PUSHBYTES_33: u8 = 0x21;
    pub const OP_PUSHBYTES_36: u8 = 0x24;
    pub const OP_PUSHBYTES_75: u8 = 0x4b;
    pub const OP_PUSHDATA1: u8 = 0x4c;
    pub const OP_PUSHDATA2: u8 = 0x4d;
    pub const OP_PUSHDATA4: u8 = 0x4e;
    pub const OP_1NEGATE: u8 = 0x4f;
    pub const OP_1: u8 = 0x51;
    pub const OP_16: u8 = 0x60;
    pub const OP_RETURN: u8 = 0x6a;
    pub const OP_DUP: u8 = 0x76;
    pub const OP_EQUAL: u8 = 0x87;
    pub const OP_EQUALVERIFY: u8 = 0x88;
    pub const OP_HASH160: u8 = 0xa9;
    pub const OP_CHECKSIG: u8 = 0xac;
    pub const OP_CHECKSIGVERIFY: u8 = 0xad;
    pub const OP_CHECKMULTISIG: u8 = 0xae;
    pub const OP_CHECKLOCKTIMEVERIFY: u8 = 0xb1;
    pub const OP_CHECKSEQUENCEVERIFY: u8 = 0xb2;
}
