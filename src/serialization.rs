//! Transaction wire encoding
//!
//! Two forms are produced:
//! - legacy: version ‖ inputs ‖ outputs ‖ locktime, hashed for the txid
//! - witness: legacy with a 0x00 0x01 marker/flag after the version and one
//!   witness field per input before the locktime, hashed for the wtxid
//!
//! A transaction without witness data has identical legacy and witness
//! encodings, so its txid equals its wtxid.

use crate::constants::WITNESS_SCALE_FACTOR;
use crate::error::{MinerError, Result};
use crate::hashing::{decode_hex, double_hash};
use crate::types::*;
use crate::varint::{decode_varint, write_varint};

const SEGWIT_MARKER: u8 = 0x00;
const SEGWIT_FLAG: u8 = 0x01;

/// Serialize without witness data
pub fn serialize_legacy(tx: &Transaction) -> ByteString {
    let mut out = Vec::with_capacity(estimate_size(tx));
    out.extend_from_slice(&tx.version.to_le_bytes());
    write_inputs(&mut out, tx, |input| input.script_sig.as_slice());
    write_outputs(&mut out, &tx.outputs);
    out.extend_from_slice(&tx.lock_time.to_le_bytes());
    out
}

/// Serialize with witness data when any input carries some
pub fn serialize_witness(tx: &Transaction) -> ByteString {
    if !tx.has_witness() {
        return serialize_legacy(tx);
    }

    let mut out = Vec::with_capacity(estimate_size(tx));
    out.extend_from_slice(&tx.version.to_le_bytes());
    out.push(SEGWIT_MARKER);
    out.push(SEGWIT_FLAG);
    write_inputs(&mut out, tx, |input| input.script_sig.as_slice());
    write_outputs(&mut out, &tx.outputs);
    for input in &tx.inputs {
        write_varint(&mut out, input.witness.len() as u64);
        for item in &input.witness {
            write_varint(&mut out, item.len() as u64);
            out.extend_from_slice(item);
        }
    }
    out.extend_from_slice(&tx.lock_time.to_le_bytes());
    out
}

/// Write the input count and every input, taking each input's script from
/// `script_for` so signature preimages can substitute their own.
pub(crate) fn write_inputs<'t, 's, F>(out: &mut Vec<u8>, tx: &'t Transaction, mut script_for: F)
where
    F: FnMut(&'t TransactionInput) -> &'s [u8],
{
    write_varint(out, tx.inputs.len() as u64);
    for input in &tx.inputs {
        write_outpoint(out, &input.prevout);
        let script = script_for(input);
        write_varint(out, script.len() as u64);
        out.extend_from_slice(script);
        out.extend_from_slice(&input.sequence.to_le_bytes());
    }
}

pub(crate) fn write_outpoint(out: &mut Vec<u8>, outpoint: &OutPoint) {
    out.extend_from_slice(&outpoint.hash);
    out.extend_from_slice(&outpoint.index.to_le_bytes());
}

/// Write the output count followed by every output
pub(crate) fn write_outputs(out: &mut Vec<u8>, outputs: &[TransactionOutput]) {
    write_varint(out, outputs.len() as u64);
    out.extend_from_slice(&serialize_outputs(outputs));
}

/// Concatenated output encodings, without a leading count
pub fn serialize_outputs(outputs: &[TransactionOutput]) -> ByteString {
    let mut out = Vec::new();
    for output in outputs {
        out.extend_from_slice(&output.value.to_le_bytes());
        write_varint(&mut out, output.script_pubkey.len() as u64);
        out.extend_from_slice(&output.script_pubkey);
    }
    out
}

fn estimate_size(tx: &Transaction) -> usize {
    10 + tx.inputs.len() * 41
        + tx
            .inputs
            .iter()
            .map(|i| i.script_sig.len() + i.witness.iter().map(|w| w.len() + 1).sum::<usize>())
            .sum::<usize>()
        + tx.outputs.iter().map(|o| 9 + o.script_pubkey.len()).sum::<usize>()
}

/// Transaction id in internal byte order: SHA256d(legacy)
pub fn compute_txid(tx: &Transaction) -> Hash {
    double_hash(&serialize_legacy(tx))
}

/// Witness transaction id in internal byte order: SHA256d(witness form)
pub fn compute_wtxid(tx: &Transaction) -> Hash {
    double_hash(&serialize_witness(tx))
}

/// Weight(tx) = 3 × |legacy(tx)| + |witness(tx)|
pub fn calculate_weight(tx: &Transaction) -> u64 {
    let base_size = serialize_legacy(tx).len() as u64;
    let total_size = serialize_witness(tx).len() as u64;
    base_size * (WITNESS_SCALE_FACTOR - 1) + total_size
}

/// Virtual size: weight / 4, rounded up
pub fn calculate_vsize(tx: &Transaction) -> u64 {
    calculate_weight(tx).div_ceil(WITNESS_SCALE_FACTOR)
}

/// Byte cursor used by the decoder
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(MinerError::Decoding(format!(
                "need {} bytes at offset {}, only {} left",
                n,
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos + offset).copied()
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    fn read_varint(&mut self) -> Result<u64> {
        let (value, used) = decode_varint(&self.data[self.pos..])?;
        self.pos += used;
        Ok(value)
    }

    /// Read a count that prefixes items of at least `min_item_size` bytes;
    /// counts that cannot fit in the remaining input are rejected up front.
    fn read_count(&mut self, min_item_size: usize) -> Result<usize> {
        let count = self.read_varint()?;
        let fits = usize::try_from(count)
            .ok()
            .filter(|c| c.saturating_mul(min_item_size.max(1)) <= self.remaining());
        fits.ok_or_else(|| {
            MinerError::Decoding(format!(
                "count {} at offset {} overflows remaining {} bytes",
                count,
                self.pos,
                self.remaining()
            ))
        })
    }

    fn read_bytes(&mut self) -> Result<ByteString> {
        let len = self.read_count(1)?;
        Ok(self.take(len)?.to_vec())
    }
}

/// Decode a legacy or witness-form transaction
///
/// Decoded inputs have no spent-output data. Trailing bytes, truncated
/// fields, oversized length prefixes and witness sections whose stacks are
/// all empty are decoding errors.
pub fn deserialize_transaction(bytes: &[u8]) -> Result<Transaction> {
    let mut reader = Reader::new(bytes);
    let version = i32::from_le_bytes(reader.read_array()?);

    let segwit = reader.peek(0) == Some(SEGWIT_MARKER) && reader.peek(1) == Some(SEGWIT_FLAG);
    if segwit {
        reader.take(2)?;
    }

    let input_count = reader.read_count(41)?;
    let mut inputs = Vec::with_capacity(input_count);
    for _ in 0..input_count {
        let hash: Hash = reader.read_array()?;
        let index = reader.read_u32()?;
        let script_sig = reader.read_bytes()?;
        let sequence = reader.read_u32()?;
        inputs.push(TransactionInput {
            prevout: OutPoint { hash, index },
            script_sig,
            sequence,
            witness: Vec::new(),
            spent_output: None,
        });
    }

    let output_count = reader.read_count(9)?;
    let mut outputs = Vec::with_capacity(output_count);
    for _ in 0..output_count {
        let value = reader.read_u64()?;
        let script_pubkey = reader.read_bytes()?;
        outputs.push(TransactionOutput { value, script_pubkey });
    }

    if segwit {
        for input in inputs.iter_mut() {
            let items = reader.read_count(1)?;
            let mut witness = Vec::with_capacity(items);
            for _ in 0..items {
                witness.push(reader.read_bytes()?);
            }
            input.witness = witness;
        }
        if inputs.iter().all(|input| input.witness.is_empty()) {
            return Err(MinerError::Decoding("superfluous witness record".to_string()));
        }
    }

    let lock_time = reader.read_u32()?;
    if reader.remaining() != 0 {
        return Err(MinerError::Decoding(format!(
            "{} trailing bytes after transaction",
            reader.remaining()
        )));
    }

    Ok(Transaction {
        version,
        inputs,
        outputs,
        lock_time,
    })
}

/// Decode a transaction from hex
pub fn deserialize_transaction_hex(s: &str) -> Result<Transaction> {
    deserialize_transaction(&decode_hex(s)?)
}
