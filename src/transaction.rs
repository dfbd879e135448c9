//! Transaction checks and derived fields

use crate::constants::*;
use crate::error::{MinerError, Result};
use crate::hashing::to_display_hex;
use crate::serialization::{calculate_weight, compute_txid, compute_wtxid};
use crate::types::*;
use std::collections::HashSet;

/// CheckTransaction: 𝒯𝒳 → {valid, invalid}
///
/// A transaction tx = (v, ins, outs, lt) is valid if and only if:
/// 1. |ins| > 0 ∧ |outs| > 0
/// 2. ∀o ∈ outs: o.value ≤ M_max and Σ o.value ≤ M_max
/// 3. no outpoint is spent twice
/// 4. only a coinbase spends the null outpoint
pub fn check_transaction(tx: &Transaction) -> Result<ValidationResult> {
    // 1. Check inputs and outputs are not empty
    if tx.inputs.is_empty() || tx.outputs.is_empty() {
        return Ok(ValidationResult::Invalid("Empty inputs or outputs".to_string()));
    }

    // 2. Check output values are valid
    let mut total = 0u64;
    for (i, output) in tx.outputs.iter().enumerate() {
        if output.value > MAX_MONEY {
            return Ok(ValidationResult::Invalid(format!(
                "Invalid output value {} at index {}",
                output.value, i
            )));
        }
        total += output.value;
        if total > MAX_MONEY {
            return Ok(ValidationResult::Invalid(format!("Total output value {} too large", total)));
        }
    }

    // 3. Check for duplicate inputs
    let mut seen = HashSet::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        if !seen.insert(input.prevout) {
            return Ok(ValidationResult::Invalid(format!(
                "Duplicate input {}:{}",
                to_display_hex(&input.prevout.hash),
                input.prevout.index
            )));
        }
    }

    // 4. Null prevouts belong to the coinbase only
    if !is_coinbase(tx) && tx.inputs.iter().any(|input| input.prevout.is_null()) {
        return Ok(ValidationResult::Invalid("Null prevout in non-coinbase".to_string()));
    }

    Ok(ValidationResult::Valid)
}

/// Check if transaction is coinbase
pub fn is_coinbase(tx: &Transaction) -> bool {
    tx.inputs.len() == 1 && tx.inputs[0].prevout.is_null()
}

/// Fee(tx) = Σᵢ prevout(i).value − Σₒ o.value
///
/// Prevout values are taken from the inputs' spent-output data as given;
/// they are not checked against a UTXO set, only bounded by M_max per input
/// and in total. A coinbase pays no fee.
pub fn calculate_fee(tx: &Transaction) -> Result<u64> {
    if is_coinbase(tx) {
        return Ok(0);
    }

    let mut total_in = 0u64;
    for (i, input) in tx.inputs.iter().enumerate() {
        let spent = input
            .spent_output
            .as_ref()
            .ok_or_else(|| MinerError::Decoding(format!("input {} is missing prevout data", i)))?;
        if spent.value > MAX_MONEY {
            return Err(MinerError::InvalidTransaction(format!(
                "input {} spends {}, above the money supply",
                i, spent.value
            )));
        }
        total_in += spent.value;
        if total_in > MAX_MONEY {
            return Err(MinerError::InvalidTransaction(format!(
                "total input value {} above the money supply",
                total_in
            )));
        }
    }

    let total_out = tx
        .outputs
        .iter()
        .try_fold(0u64, |acc, output| acc.checked_add(output.value))
        .ok_or_else(|| MinerError::Decoding("output value overflow".to_string()))?;

    total_in.checked_sub(total_out).ok_or_else(|| {
        MinerError::NegativeFee(format!(
            "{} spends {} but creates {}",
            to_display_hex(&compute_txid(tx)),
            total_in,
            total_out
        ))
    })
}

impl ProcessedTransaction {
    /// Derive txid, wtxid, weight and fee once
    ///
    /// Fails with `NegativeFee` for transactions that cannot be included,
    /// `InvalidTransaction` when prevout values exceed the money supply, and
    /// `Decoding` when prevout data is missing.
    pub fn new(tx: Transaction) -> Result<Self> {
        let fee = calculate_fee(&tx)?;
        Ok(ProcessedTransaction {
            txid: compute_txid(&tx),
            wtxid: compute_wtxid(&tx),
            weight: calculate_weight(&tx),
            fee,
            tx,
        })
    }

    /// txid as display-order hex
    pub fn display_txid(&self) -> String {
        to_display_hex(&self.txid)
    }

    pub fn display_wtxid(&self) -> String {
        to_display_hex(&self.wtxid)
    }

    /// Fee per weight unit, scaled by 1000 to stay integral
    pub fn fee_rate_milli(&self) -> u64 {
        self.fee.saturating_mul(1000) / self.weight.max(1)
    }
}
