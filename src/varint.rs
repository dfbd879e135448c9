//! Compact-size integer encoding/decoding
//!
//! Encoding rules:
//! - If value < 0xfd: single byte
//! - If value <= 0xffff: 0xfd prefix + 2 bytes (little-endian)
//! - If value <= 0xffffffff: 0xfe prefix + 4 bytes (little-endian)
//! - Otherwise: 0xff prefix + 8 bytes (little-endian)

use crate::error::{MinerError, Result};

/// Encode a count as a compact-size integer
///
/// # Examples
///
/// ```
/// use consensus_miner::varint::encode_varint;
///
/// assert_eq!(encode_varint(0xfc), vec![0xfc]);
/// assert_eq!(encode_varint(0xfd), vec![0xfd, 0xfd, 0x00]);
/// assert_eq!(encode_varint(0x10000), vec![0xfe, 0x00, 0x00, 0x01, 0x00]);
/// ```
pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(varint_size(value));
    write_varint(&mut out, value);
    out
}

/// Append the compact-size encoding of `value` to `out`
pub fn write_varint(out: &mut Vec<u8>, value: u64) {
    if value < 0xfd {
        out.push(value as u8);
    } else if value <= 0xffff {
        out.push(0xfd);
        out.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value <= 0xffffffff {
        out.push(0xfe);
        out.extend_from_slice(&(value as u32).to_le_bytes());
    } else {
        out.push(0xff);
        out.extend_from_slice(&value.to_le_bytes());
    }
}

/// Number of bytes the encoding of `value` occupies
pub fn varint_size(value: u64) -> usize {
    match value {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x10000..=0xffffffff => 5,
        _ => 9,
    }
}

/// Decode a compact-size integer from the front of `data`
///
/// Returns the value and the number of bytes consumed. Non-minimal encodings
/// are rejected so that decoding followed by encoding reproduces the input.
pub fn decode_varint(data: &[u8]) -> Result<(u64, usize)> {
    let first = *data
        .first()
        .ok_or_else(|| MinerError::Decoding("empty input for compact size".to_string()))?;

    let (width, min) = match first {
        b if b < 0xfd => return Ok((b as u64, 1)),
        0xfd => (2, 0xfd),
        0xfe => (4, 0x10000),
        _ => (8, 0x1_0000_0000),
    };

    let body = data.get(1..1 + width).ok_or_else(|| {
        MinerError::Decoding(format!(
            "compact size needs {} bytes, have {}",
            1 + width,
            data.len()
        ))
    })?;
    let mut buf = [0u8; 8];
    buf[..width].copy_from_slice(body);
    let value = u64::from_le_bytes(buf);

    if value < min {
        return Err(MinerError::Decoding(format!(
            "non-canonical compact size {} with prefix {:#04x}",
            value, first
        )));
    }
    Ok((value, 1 + width))
}
