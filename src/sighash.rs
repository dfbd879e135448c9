//! Signature-hash preimages
//!
//! Legacy: the transaction re-serialized with the signed input's script
//! replaced by its script code and every other input's script emptied,
//! followed by the 4-byte sighash type.
//!
//! Segregated witness v0 (BIP143):
//! version ‖ SHA256d(outpoints) ‖ SHA256d(sequences) ‖ outpoint ‖ scriptCode
//! ‖ amount ‖ sequence ‖ SHA256d(outputs) ‖ locktime ‖ sighash type

use crate::error::{MinerError, Result};
use crate::hashing::double_hash;
use crate::serialization::{serialize_outputs, write_inputs, write_outpoint, write_outputs};
use crate::types::*;
use crate::varint::write_varint;

fn check_index(tx: &Transaction, input_index: usize) -> Result<()> {
    if input_index >= tx.inputs.len() {
        return Err(MinerError::Decoding(format!(
            "input index {} out of range for {} inputs",
            input_index,
            tx.inputs.len()
        )));
    }
    Ok(())
}

/// Legacy preimage for `input_index`, signing with `script_code`
pub fn legacy_preimage(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    sighash_type: u32,
) -> Result<ByteString> {
    check_index(tx, input_index)?;

    let mut out = Vec::new();
    out.extend_from_slice(&tx.version.to_le_bytes());
    let mut position = 0usize;
    write_inputs(&mut out, tx, |_| {
        let script: &[u8] = if position == input_index { script_code } else { &[] };
        position += 1;
        script
    });
    write_outputs(&mut out, &tx.outputs);
    out.extend_from_slice(&tx.lock_time.to_le_bytes());
    out.extend_from_slice(&sighash_type.to_le_bytes());
    Ok(out)
}

/// SHA256d of the legacy preimage: the digest an ECDSA signature commits to
pub fn legacy_sighash(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    sighash_type: u32,
) -> Result<Hash> {
    Ok(double_hash(&legacy_preimage(tx, input_index, script_code, sighash_type)?))
}

/// Script code for a version-0 key-hash program: the standard key-hash template
pub fn p2wpkh_script_code(pubkey_hash: &[u8; 20]) -> ByteString {
    let mut script = Vec::with_capacity(25);
    script.extend_from_slice(&[0x76, 0xa9, 0x14]);
    script.extend_from_slice(pubkey_hash);
    script.extend_from_slice(&[0x88, 0xac]);
    script
}

/// BIP143 preimage for `input_index` spending `amount` with `script_code`
pub fn segwit_v0_preimage(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    amount: u64,
    sighash_type: u32,
) -> Result<ByteString> {
    check_index(tx, input_index)?;
    let input = &tx.inputs[input_index];

    let mut outpoints = Vec::with_capacity(tx.inputs.len() * 36);
    let mut sequences = Vec::with_capacity(tx.inputs.len() * 4);
    for other in &tx.inputs {
        write_outpoint(&mut outpoints, &other.prevout);
        sequences.extend_from_slice(&other.sequence.to_le_bytes());
    }
    let hash_prevouts = double_hash(&outpoints);
    let hash_sequence = double_hash(&sequences);
    let hash_outputs = double_hash(&serialize_outputs(&tx.outputs));

    let mut out = Vec::with_capacity(156 + script_code.len());
    out.extend_from_slice(&tx.version.to_le_bytes());
    out.extend_from_slice(&hash_prevouts);
    out.extend_from_slice(&hash_sequence);
    write_outpoint(&mut out, &input.prevout);
    write_varint(&mut out, script_code.len() as u64);
    out.extend_from_slice(script_code);
    out.extend_from_slice(&amount.to_le_bytes());
    out.extend_from_slice(&input.sequence.to_le_bytes());
    out.extend_from_slice(&hash_outputs);
    out.extend_from_slice(&tx.lock_time.to_le_bytes());
    out.extend_from_slice(&sighash_type.to_le_bytes());
    Ok(out)
}

/// SHA256d of the BIP143 preimage
pub fn segwit_v0_sighash(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    amount: u64,
    sighash_type: u32,
) -> Result<Hash> {
    Ok(double_hash(&segwit_v0_preimage(
        tx,
        input_index,
        script_code,
        amount,
        sighash_type,
    )?))
}
