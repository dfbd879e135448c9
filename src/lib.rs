//! # Consensus-Miner
//!
//! Block assembly, proof-of-work search and validation over Bitcoin consensus
//! serialization rules.
//!
//! Given a pool of pending transactions, the crate computes each
//! transaction's identifiers, weight and fee, commits to their witness data
//! from a synthesized coinbase, builds the transaction merkle root, and
//! searches the nonce space until the header hash meets the difficulty
//! target. The same rules are then applied in reverse to validate a mined
//! block.
//!
//! ## Architecture
//!
//! Leaf modules first:
//! - [`hashing`], [`varint`]: double hashing, byte order, compact-size integers
//! - [`serialization`], [`sighash`]: legacy and witness encodings, signature preimages
//! - [`merkle`], [`segwit`], [`coinbase`]: commitments and the coinbase
//! - [`script`]: spend verification for key-hash, script-hash and witness key-hash outputs
//! - [`pow`], [`mining`], [`block`]: headers, the nonce search, block validation
//! - [`record`], [`mempool`], [`config`]: records, pool loading, configuration
//!
//! ## Design Principles
//!
//! 1. **Explicit byte order**: every 32-byte id is internal order unless it is a display string
//! 2. **One transaction value**: wire encoding and ids derive from the same [`Transaction`]
//! 3. **Explicit configuration**: target, reserved value and version come from [`MinerConfig`]
//! 4. **Exact version pinning**: consensus-critical cryptography is pinned to exact versions
//!
//! ## Usage
//!
//! ```rust
//! use consensus_miner::{BlockMiner, MinerConfig};
//!
//! let config = MinerConfig {
//!     target: format!("7fffff{}", "00".repeat(29)),
//!     bits: 0x207fffff,
//!     ..MinerConfig::default()
//! };
//! let miner = BlockMiner::new(config).unwrap();
//!
//! let template = miner.assemble(vec![]).unwrap();
//! let block = miner.mine(&template).unwrap();
//! miner.validate(&block, &template.transactions).unwrap();
//! ```

pub mod block;
pub mod coinbase;
pub mod config;
pub mod constants;
pub mod error;
pub mod hashing;
pub mod mempool;
pub mod merkle;
pub mod mining;
pub mod pow;
pub mod record;
pub mod script;
pub mod segwit;
pub mod serialization;
pub mod sighash;
pub mod transaction;
pub mod types;
pub mod varint;

// Re-export commonly used types
pub use config::{CoinbaseConfig, MinerConfig};
pub use error::{MinerError, Result};
pub use mining::{BlockTemplate, MinedBlock};
pub use pow::U256;
pub use record::TransactionRecord;
pub use types::*;

use std::path::Path;
use std::sync::atomic::AtomicBool;

/// Block miner bound to one configuration
///
/// # Examples
///
/// ```
/// use consensus_miner::{BlockMiner, TransactionRecord};
///
/// let miner = BlockMiner::default();
///
/// let record = TransactionRecord::from_json(r#"{
///     "version": 1,
///     "locktime": 0,
///     "vin": [{
///         "txid": "0000000000000000000000000000000000000000000000000000000000000001",
///         "vout": 0,
///         "scriptsig": "",
///         "sequence": 4294967295,
///         "witness": ["aa"],
///         "prevout": {"value": 5000, "scriptpubkey": "51", "scriptpubkey_type": "unknown"}
///     }],
///     "vout": [{"value": 4000, "scriptpubkey": "51"}]
/// }"#).unwrap();
///
/// let tx = miner.process(&record).unwrap();
/// assert_eq!(tx.fee, 1000);
/// assert_ne!(tx.txid, tx.wtxid);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BlockMiner {
    config: MinerConfig,
}

impl BlockMiner {
    /// Create a miner, rejecting unusable configuration
    pub fn new(config: MinerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    /// Decode a record, derive its fields and verify its scripts
    pub fn process(&self, record: &TransactionRecord) -> Result<ProcessedTransaction> {
        let processed = ProcessedTransaction::from_record(record)?;
        script::verify_transaction(&processed.tx)?;
        Ok(processed)
    }

    /// Load, process and select candidates from a pool directory
    pub fn load_candidates(&self, dir: impl AsRef<Path>) -> Result<Vec<ProcessedTransaction>> {
        let entries = mempool::load_mempool_dir(dir)?;
        let preprocessed = mempool::preprocess_all(&entries);
        let fee_budget = constants::MAX_MONEY.saturating_sub(self.config.coinbase.block_subsidy);
        Ok(mempool::take_candidates(
            preprocessed,
            self.config.max_transactions,
            fee_budget,
        ))
    }

    /// Assemble a block template stamped with the current time
    pub fn assemble(&self, transactions: Vec<ProcessedTransaction>) -> Result<BlockTemplate> {
        mining::assemble_block(transactions, &self.config, mining::current_timestamp())
    }

    /// Search for a nonce on the configured number of workers
    pub fn mine(&self, template: &BlockTemplate) -> Result<MinedBlock> {
        self.mine_with_cancel(template, &AtomicBool::new(false))
    }

    /// Like [`BlockMiner::mine`], stopping with `SearchCancelled` once `cancel` is set
    pub fn mine_with_cancel(&self, template: &BlockTemplate, cancel: &AtomicBool) -> Result<MinedBlock> {
        mining::mine_block_parallel(template, self.config.workers, cancel)
    }

    /// Validate a mined block against its transaction set
    pub fn validate(&self, block: &MinedBlock, transactions: &[ProcessedTransaction]) -> Result<()> {
        block::validate_mined_block(block, transactions, &self.config)
    }

    /// Check a serialized header against the configured target
    ///
    /// # Examples
    ///
    /// ```
    /// use consensus_miner::{BlockMiner, MinerError};
    ///
    /// let miner = BlockMiner::default();
    /// assert!(matches!(
    ///     miner.validate_header(&[0u8; 79]),
    ///     Err(MinerError::InvalidLength { expected: 80, actual: 79 })
    /// ));
    /// ```
    pub fn validate_header(&self, header: &[u8]) -> Result<Hash> {
        pow::validate_header(header, &self.config.target_value()?)
    }
}
