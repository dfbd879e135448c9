//! Miner configuration
//!
//! Every parameter the assembler and validator need is carried here rather
//! than read from process-wide state. All fields have defaults, so an empty
//! JSON object is a complete configuration.

use crate::coinbase::CoinbaseTemplate;
use crate::constants::*;
use crate::error::{MinerError, Result};
use crate::hashing::{decode_hex, hash_from_hex};
use crate::pow::{expand_bits, U256};
use crate::types::Hash;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Coinbase template configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinbaseConfig {
    /// Unlocking script of the coinbase input, hex
    #[serde(default = "default_script_sig")]
    pub script_sig: String,

    /// Locking script receiving subsidy and fees, hex
    #[serde(default = "default_payout_script")]
    pub payout_script: String,

    /// Subsidy in satoshis; the payout is subsidy plus included fees
    #[serde(default = "default_block_subsidy")]
    pub block_subsidy: u64,
}

fn default_script_sig() -> String {
    DEFAULT_COINBASE_SCRIPT_SIG_HEX.to_string()
}

fn default_payout_script() -> String {
    DEFAULT_PAYOUT_SCRIPT_HEX.to_string()
}

fn default_block_subsidy() -> u64 {
    BLOCK_SUBSIDY
}

impl Default for CoinbaseConfig {
    fn default() -> Self {
        Self {
            script_sig: default_script_sig(),
            payout_script: default_payout_script(),
            block_subsidy: default_block_subsidy(),
        }
    }
}

/// Block assembly and search configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinerConfig {
    /// Difficulty target, 64 hex characters, most significant byte first
    #[serde(default = "default_target")]
    pub target: String,

    /// Compact bits written into the header
    #[serde(default = "default_bits")]
    pub bits: u32,

    #[serde(default = "default_block_version")]
    pub block_version: i32,

    /// Hard cap on coinbase plus transaction weight
    #[serde(default = "default_max_block_weight")]
    pub max_block_weight: u64,

    /// Witness reserved value, 64 hex characters
    #[serde(default = "default_witness_reserved_value")]
    pub witness_reserved_value: String,

    /// Nonce-search shards
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Cap on transactions taken from the pool
    #[serde(default = "default_max_transactions")]
    pub max_transactions: usize,

    #[serde(default)]
    pub coinbase: CoinbaseConfig,
}

fn default_target() -> String {
    DEFAULT_TARGET_HEX.to_string()
}

fn default_bits() -> u32 {
    DEFAULT_BITS
}

fn default_block_version() -> i32 {
    BLOCK_VERSION
}

fn default_max_block_weight() -> u64 {
    MAX_BLOCK_WEIGHT
}

fn default_witness_reserved_value() -> String {
    hex::encode(WITNESS_RESERVED_VALUE)
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_max_transactions() -> usize {
    DEFAULT_MAX_TRANSACTIONS
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            target: default_target(),
            bits: default_bits(),
            block_version: default_block_version(),
            max_block_weight: default_max_block_weight(),
            witness_reserved_value: default_witness_reserved_value(),
            workers: default_workers(),
            max_transactions: default_max_transactions(),
            coinbase: CoinbaseConfig::default(),
        }
    }
}

impl MinerConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Reject configurations the assembler cannot use
    pub fn validate(&self) -> Result<()> {
        let target = self.target_value()?;
        let expanded = expand_bits(self.bits).map_err(|e| MinerError::Config(format!("bits: {}", e)))?;
        if expanded != target {
            return Err(MinerError::Config(format!(
                "bits {:#010x} expand to {} but target is {}",
                self.bits, expanded, target
            )));
        }
        self.reserved_value()?;
        self.coinbase_scripts()?;
        if self.workers == 0 {
            return Err(MinerError::Config("workers must be at least 1".to_string()));
        }
        if self.max_block_weight == 0 {
            return Err(MinerError::Config("max_block_weight must be positive".to_string()));
        }
        Ok(())
    }

    pub fn target_value(&self) -> Result<U256> {
        U256::from_hex(&self.target).map_err(|e| MinerError::Config(format!("target: {}", e)))
    }

    pub fn reserved_value(&self) -> Result<Hash> {
        hash_from_hex(&self.witness_reserved_value)
            .map_err(|e| MinerError::Config(format!("witness_reserved_value: {}", e)))
    }

    fn coinbase_scripts(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let script_sig = decode_hex(&self.coinbase.script_sig)
            .map_err(|e| MinerError::Config(format!("coinbase.script_sig: {}", e)))?;
        let payout_script = decode_hex(&self.coinbase.payout_script)
            .map_err(|e| MinerError::Config(format!("coinbase.payout_script: {}", e)))?;
        Ok((script_sig, payout_script))
    }

    /// Coinbase template paying subsidy plus `fees`
    pub fn coinbase_template(&self, fees: u64) -> Result<CoinbaseTemplate> {
        let (script_sig, payout_script) = self.coinbase_scripts()?;
        let payout_value = self
            .coinbase
            .block_subsidy
            .checked_add(fees)
            .filter(|&value| value <= MAX_MONEY)
            .ok_or_else(|| MinerError::Config(format!("payout of subsidy plus {} fees exceeds supply", fees)))?;
        Ok(CoinbaseTemplate {
            script_sig,
            payout_script,
            payout_value,
            reserved_value: self.reserved_value()?,
        })
    }
}
