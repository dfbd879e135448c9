//! Proof of work: header encoding, targets and the acceptance predicate

use crate::constants::HEADER_SIZE;
use crate::error::{MinerError, Result};
use crate::hashing::{double_hash, hash_from_hex, reverse_hash, to_display_hex};
use crate::types::*;
use std::fmt;

/// 256-bit unsigned integer for target comparisons
///
/// Stored as four little-endian 64-bit words: `self.0[0]` is least significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct U256([u64; 4]);

impl U256 {
    pub const ZERO: U256 = U256([0; 4]);
    pub const MAX: U256 = U256([u64::MAX; 4]);

    pub fn from_u32(value: u32) -> Self {
        U256([value as u64, 0, 0, 0])
    }

    pub fn from_u64(value: u64) -> Self {
        U256([value, 0, 0, 0])
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&x| x == 0)
    }

    /// Interpret 32 big-endian bytes
    pub fn from_be_bytes(bytes: &[u8; 32]) -> Self {
        let mut words = [0u64; 4];
        for (i, word) in words.iter_mut().enumerate() {
            let start = 32 - (i + 1) * 8;
            let mut chunk = [0u8; 8];
            chunk.copy_from_slice(&bytes[start..start + 8]);
            *word = u64::from_be_bytes(chunk);
        }
        U256(words)
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        for (i, word) in self.0.iter().enumerate() {
            let start = 32 - (i + 1) * 8;
            bytes[start..start + 8].copy_from_slice(&word.to_be_bytes());
        }
        bytes
    }

    /// Parse 64 hex characters, most significant byte first
    pub fn from_hex(s: &str) -> Result<Self> {
        Ok(Self::from_be_bytes(&hash_from_hex(s)?))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_be_bytes())
    }

    /// Number of significant bits
    pub fn bits(&self) -> u32 {
        for (i, &word) in self.0.iter().enumerate().rev() {
            if word != 0 {
                return 64 * i as u32 + (64 - word.leading_zeros());
            }
        }
        0
    }

    /// Least significant 64 bits
    pub fn low_u64(&self) -> u64 {
        self.0[0]
    }

    pub fn shl(&self, shift: u32) -> Self {
        if shift >= 256 {
            return U256::ZERO;
        }

        let mut result = U256::ZERO;
        let word_shift = (shift / 64) as usize;
        let bit_shift = shift % 64;

        for i in 0..4 - word_shift {
            result.0[i + word_shift] |= self.0[i] << bit_shift;
            if bit_shift > 0 && i + word_shift + 1 < 4 {
                result.0[i + word_shift + 1] |= self.0[i] >> (64 - bit_shift);
            }
        }
        result
    }

    pub fn shr(&self, shift: u32) -> Self {
        if shift >= 256 {
            return U256::ZERO;
        }

        let mut result = U256::ZERO;
        let word_shift = (shift / 64) as usize;
        let bit_shift = shift % 64;

        for i in word_shift..4 {
            result.0[i - word_shift] |= self.0[i] >> bit_shift;
            if bit_shift > 0 && i > word_shift {
                result.0[i - word_shift - 1] |= self.0[i] << (64 - bit_shift);
            }
        }
        result
    }
}

impl PartialOrd for U256 {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for U256 {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.iter().rev().cmp(other.0.iter().rev())
    }
}

impl fmt::Display for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// ExpandBits: compact → U256
///
/// target = mantissa × 256^(exponent − 3) where exponent = bits >> 24 and
/// mantissa = bits & 0x007fffff. The sign bit must be clear and the result
/// must fit in 256 bits.
pub fn expand_bits(bits: u32) -> Result<U256> {
    let exponent = bits >> 24;
    let mantissa = bits & 0x007f_ffff;

    if mantissa != 0 && bits & 0x0080_0000 != 0 {
        return Err(MinerError::Decoding(format!("negative compact target {:#010x}", bits)));
    }

    if exponent <= 3 {
        return Ok(U256::from_u32(mantissa >> (8 * (3 - exponent))));
    }

    let overflow = mantissa != 0
        && (exponent > 34 || (mantissa > 0xff && exponent > 33) || (mantissa > 0xffff && exponent > 32));
    if overflow {
        return Err(MinerError::Decoding(format!("compact target {:#010x} overflows", bits)));
    }

    Ok(U256::from_u32(mantissa).shl(8 * (exponent - 3)))
}

/// Compact encoding of `target`, the inverse of [`expand_bits`] up to
/// mantissa precision
pub fn target_to_bits(target: &U256) -> u32 {
    let mut size = target.bits().div_ceil(8);
    let mut compact = if size <= 3 {
        (target.low_u64() << (8 * (3 - size))) as u32
    } else {
        target.shr(8 * (size - 3)).low_u64() as u32
    };

    // keep the sign bit clear
    if compact & 0x0080_0000 != 0 {
        compact >>= 8;
        size += 1;
    }
    compact | (size << 24)
}

/// Serialize a header to its fixed 80-byte form
///
/// version ‖ prev_block_hash ‖ merkle_root ‖ timestamp ‖ bits ‖ nonce,
/// integers little-endian and hashes in internal order.
pub fn serialize_header(header: &BlockHeader) -> [u8; HEADER_SIZE] {
    let mut bytes = [0u8; HEADER_SIZE];
    bytes[0..4].copy_from_slice(&header.version.to_le_bytes());
    bytes[4..36].copy_from_slice(&header.prev_block_hash);
    bytes[36..68].copy_from_slice(&header.merkle_root);
    bytes[68..72].copy_from_slice(&header.timestamp.to_le_bytes());
    bytes[72..76].copy_from_slice(&header.bits.to_le_bytes());
    bytes[76..80].copy_from_slice(&header.nonce.to_le_bytes());
    bytes
}

fn header_bytes(bytes: &[u8]) -> Result<&[u8; HEADER_SIZE]> {
    bytes.try_into().map_err(|_| MinerError::InvalidLength {
        expected: HEADER_SIZE,
        actual: bytes.len(),
    })
}

/// Parse an 80-byte header
pub fn parse_header(bytes: &[u8]) -> Result<BlockHeader> {
    let bytes = header_bytes(bytes)?;
    let u32_at = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

    let mut prev_block_hash = [0u8; 32];
    prev_block_hash.copy_from_slice(&bytes[4..36]);
    let mut merkle_root = [0u8; 32];
    merkle_root.copy_from_slice(&bytes[36..68]);

    Ok(BlockHeader {
        version: u32_at(0) as i32,
        prev_block_hash,
        merkle_root,
        timestamp: u32_at(68),
        bits: u32_at(72),
        nonce: u32_at(76),
    })
}

/// Header hash in internal order
pub fn header_hash(header: &[u8; HEADER_SIZE]) -> Hash {
    double_hash(header)
}

/// True iff the byte-reversed hash, read as a big-endian integer, is ≤ target
pub fn hash_meets_target(hash: &Hash, target: &U256) -> bool {
    U256::from_be_bytes(&reverse_hash(hash)) <= *target
}

/// ValidateHeader: 𝔹⁸⁰ × U256 → ℍ
///
/// 1. Reject anything other than exactly 80 bytes
/// 2. Recompute SHA256d(header)
/// 3. Accept iff reverse(hash) ≤ target
///
/// Returns the header hash (internal order) on acceptance.
pub fn validate_header(header: &[u8], target: &U256) -> Result<Hash> {
    let bytes = header_bytes(header)?;
    let hash = header_hash(bytes);
    if !hash_meets_target(&hash, target) {
        return Err(MinerError::HeaderRejected(format!(
            "hash {} above target {}",
            to_display_hex(&hash),
            target
        )));
    }
    Ok(hash)
}
