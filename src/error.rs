//! Error types for block assembly, mining and validation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MinerError {
    #[error("Decoding failed: {0}")]
    Decoding(String),

    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Script verification failed: {0}")]
    ScriptFailure(String),

    #[error("Block weight {weight} exceeds limit {limit}")]
    WeightExceeded { weight: u64, limit: u64 },

    #[error("Negative fee: {0}")]
    NegativeFee(String),

    #[error("Witness commitment mismatch: {0}")]
    CommitmentMismatch(String),

    #[error("Header rejected: {0}")]
    HeaderRejected(String),

    #[error("Nonce space exhausted without meeting target")]
    ExhaustedNonceSpace,

    #[error("Nonce search cancelled")]
    SearchCancelled,

    #[error("Block validation failed: {0}")]
    InvalidBlock(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MinerError>;
