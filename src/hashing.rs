//! Hashing primitives shared by every component
//!
//! Identifiers come in two byte orders. Internal order is what the hash
//! function produces and what goes on the wire; display order is the reverse,
//! used for hex strings shown to humans and found in transaction records.

use crate::error::{MinerError, Result};
use crate::types::Hash;
use bitcoin_hashes::{sha256d, Hash as BitcoinHash, HashEngine};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Byte order an identifier is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Hash-function output order, as serialized on the wire
    Internal,
    /// Reversed order used for hex display
    Display,
}

impl ByteOrder {
    /// Convert `hash` from this order into internal order
    pub fn to_internal(self, hash: &Hash) -> Hash {
        match self {
            ByteOrder::Internal => *hash,
            ByteOrder::Display => reverse_hash(hash),
        }
    }
}

/// SHA256(x)
pub fn sha256(data: &[u8]) -> Hash {
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&Sha256::digest(data));
    hash
}

/// SHA256(SHA256(x))
pub fn double_hash(data: &[u8]) -> Hash {
    sha256d::Hash::hash(data).into_inner()
}

/// SHA256(SHA256(a ‖ b ‖ ...)) without building the concatenation
pub fn double_hash_parts<T: AsRef<[u8]>>(parts: &[T]) -> Hash {
    let mut engine = sha256d::Hash::engine();
    for part in parts {
        engine.input(part.as_ref());
    }
    sha256d::Hash::from_engine(engine).into_inner()
}

/// RIPEMD160(SHA256(x))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha256_hash = Sha256::digest(data);
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&Ripemd160::digest(sha256_hash));
    hash
}

/// Reverse the byte order of an arbitrary byte string
pub fn reverse_bytes(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().rev().copied().collect()
}

/// Reverse the byte order of a 32-byte identifier
pub fn reverse_hash(hash: &Hash) -> Hash {
    let mut reversed = *hash;
    reversed.reverse();
    reversed
}

/// Render an internal-order hash as display-order hex
pub fn to_display_hex(hash: &Hash) -> String {
    hex::encode(reverse_hash(hash))
}

/// Parse display-order hex into an internal-order hash
pub fn from_display_hex(s: &str) -> Result<Hash> {
    Ok(reverse_hash(&hash_from_hex(s)?))
}

/// Parse 64 hex characters into 32 bytes, keeping their order
pub fn hash_from_hex(s: &str) -> Result<Hash> {
    let bytes = decode_hex(s)?;
    if bytes.len() != 32 {
        return Err(MinerError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        });
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&bytes);
    Ok(hash)
}

/// Decode a hex string, mapping failures to a decoding error
pub fn decode_hex(s: &str) -> Result<Vec<u8>> {
    hex::decode(s).map_err(|e| MinerError::Decoding(format!("invalid hex {:?}: {}", truncate(s), e)))
}

fn truncate(s: &str) -> &str {
    match s.char_indices().nth(16) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
