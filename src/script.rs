//! Script verification for three spending patterns
//!
//! A bounded stack machine rather than a general interpreter. Unlocking
//! scripts may only push data; locking scripts run over the resulting stack
//! with a small opcode set, and any opcode outside that set is a no-op.
//!
//! Evaluation never raises for a failed spend: verifiers return
//! `Ok(false)`, and `Err` is reserved for malformed caller input such as a
//! missing spent output or an input index out of range.

use crate::constants::opcodes::*;
use crate::constants::SIGHASH_ALL;
use crate::error::{MinerError, Result};
use crate::hashing::{decode_hex, hash160};
use crate::sighash::{legacy_sighash, p2wpkh_script_code, segwit_v0_sighash};
use crate::types::*;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, VerifyOnly};
use std::sync::OnceLock;
use tracing::debug;

static SECP: OnceLock<Secp256k1<VerifyOnly>> = OnceLock::new();

fn secp() -> &'static Secp256k1<VerifyOnly> {
    SECP.get_or_init(Secp256k1::verification_only)
}

/// One parsed script element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOp {
    /// Data push, including `OP_0` as an empty push
    Push(ByteString),
    /// Any other opcode
    Op(u8),
}

/// Split `script` into pushes and opcodes
///
/// A push whose length runs past the end of the script is a decoding error.
pub fn parse_script(script: &[u8]) -> Result<Vec<ScriptOp>> {
    let mut ops = Vec::new();
    let mut pos = 0;

    while pos < script.len() {
        let opcode = script[pos];
        pos += 1;

        let len = match opcode {
            OP_0 => 0,
            0x01..=OP_PUSHBYTES_75 => opcode as usize,
            OP_PUSHDATA1 => read_push_len(script, &mut pos, 1)?,
            OP_PUSHDATA2 => read_push_len(script, &mut pos, 2)?,
            OP_PUSHDATA4 => read_push_len(script, &mut pos, 4)?,
            _ => {
                ops.push(ScriptOp::Op(opcode));
                continue;
            }
        };

        let end = pos
            .checked_add(len)
            .filter(|&end| end <= script.len())
            .ok_or_else(|| {
                MinerError::Decoding(format!(
                    "push of {} bytes at offset {} overruns {}-byte script",
                    len,
                    pos,
                    script.len()
                ))
            })?;
        ops.push(ScriptOp::Push(script[pos..end].to_vec()));
        pos = end;
    }

    Ok(ops)
}

fn read_push_len(script: &[u8], pos: &mut usize, width: usize) -> Result<usize> {
    let bytes = script.get(*pos..*pos + width).ok_or_else(|| {
        MinerError::Decoding(format!("truncated push length at offset {}", pos))
    })?;
    *pos += width;
    let mut buf = [0u8; 4];
    buf[..width].copy_from_slice(bytes);
    Ok(u32::from_le_bytes(buf) as usize)
}

/// Data pushed by a push-only script, or `None` if it contains anything else
pub fn push_only(script: &[u8]) -> Result<Option<Vec<ByteString>>> {
    let mut items = Vec::new();
    for op in parse_script(script)? {
        match op {
            ScriptOp::Push(data) => items.push(data),
            ScriptOp::Op(opcode) => match small_number(opcode) {
                Some(value) => items.push(value),
                None => return Ok(None),
            },
        }
    }
    Ok(Some(items))
}

fn small_number(opcode: u8) -> Option<ByteString> {
    match opcode {
        OP_1NEGATE => Some(vec![0x81]),
        OP_1..=OP_16 => Some(vec![opcode - (OP_1 - 1)]),
        _ => None,
    }
}

/// Script boolean: any non-zero byte, except negative zero
pub fn cast_to_bool(item: &[u8]) -> bool {
    match item.split_last() {
        None => false,
        Some((&last, rest)) => rest.iter().any(|&b| b != 0) || (last != 0 && last != 0x80),
    }
}

/// Signature check behind OP_CHECKSIG
pub trait SignatureChecker {
    /// `signature` carries its trailing sighash-type byte
    fn check_sig(&self, signature: &[u8], pubkey: &[u8]) -> Result<bool>;
}

/// Legacy sighash over `script_code` for one input
pub struct LegacyChecker<'a> {
    pub tx: &'a Transaction,
    pub input_index: usize,
    pub script_code: &'a [u8],
}

impl SignatureChecker for LegacyChecker<'_> {
    fn check_sig(&self, signature: &[u8], pubkey: &[u8]) -> Result<bool> {
        let Some(der) = strip_sighash_all(signature) else {
            return Ok(false);
        };
        let digest = legacy_sighash(self.tx, self.input_index, self.script_code, SIGHASH_ALL)?;
        Ok(verify_ecdsa(der, pubkey, &digest))
    }
}

/// BIP143 sighash for one version-0 witness input
pub struct SegwitV0Checker<'a> {
    pub tx: &'a Transaction,
    pub input_index: usize,
    pub script_code: &'a [u8],
    pub amount: u64,
}

impl SignatureChecker for SegwitV0Checker<'_> {
    fn check_sig(&self, signature: &[u8], pubkey: &[u8]) -> Result<bool> {
        let Some(der) = strip_sighash_all(signature) else {
            return Ok(false);
        };
        let digest = segwit_v0_sighash(
            self.tx,
            self.input_index,
            self.script_code,
            self.amount,
            SIGHASH_ALL,
        )?;
        Ok(verify_ecdsa(der, pubkey, &digest))
    }
}

// Only SIGHASH_ALL is supported
fn strip_sighash_all(signature: &[u8]) -> Option<&[u8]> {
    match signature.split_last() {
        Some((&hash_type, der)) if hash_type as u32 == SIGHASH_ALL => Some(der),
        _ => None,
    }
}

/// ECDSA verification of a DER signature over a 32-byte digest
///
/// Signatures are parsed leniently and normalized to low-S before checking.
pub fn verify_ecdsa(der_signature: &[u8], pubkey: &[u8], digest: &Hash) -> bool {
    let Ok(pubkey) = PublicKey::from_slice(pubkey) else {
        return false;
    };
    let Ok(mut signature) = Signature::from_der_lax(der_signature) else {
        return false;
    };
    let Ok(message) = Message::from_digest_slice(digest) else {
        return false;
    };
    signature.normalize_s();
    secp().verify_ecdsa(&message, &signature, &pubkey).is_ok()
}

/// EvalScript: ops × stack → {true, false}
///
/// 1. Pushes and small numbers go on the stack
/// 2. OP_DUP, OP_HASH160, OP_EQUAL act on the top items
/// 3. OP_EQUALVERIFY and OP_CHECKSIGVERIFY stop with false on mismatch
/// 4. OP_CHECKSIG pushes the checker's verdict
/// 5. OP_RETURN fails; every other opcode is skipped
/// 6. Succeeds iff the final top item is true
pub fn eval_script(
    ops: &[ScriptOp],
    stack: &mut Vec<ByteString>,
    checker: &dyn SignatureChecker,
) -> Result<bool> {
    for op in ops {
        let opcode = match op {
            ScriptOp::Push(data) => {
                stack.push(data.clone());
                continue;
            }
            ScriptOp::Op(opcode) => *opcode,
        };

        if let Some(value) = small_number(opcode) {
            stack.push(value);
            continue;
        }

        match opcode {
            OP_DUP => match stack.last().cloned() {
                Some(top) => stack.push(top),
                None => return Ok(false),
            },
            OP_HASH160 => match stack.pop() {
                Some(top) => stack.push(hash160(&top).to_vec()),
                None => return Ok(false),
            },
            OP_EQUAL | OP_EQUALVERIFY => {
                let (Some(a), Some(b)) = (stack.pop(), stack.pop()) else {
                    return Ok(false);
                };
                if opcode == OP_EQUALVERIFY {
                    if a != b {
                        return Ok(false);
                    }
                } else {
                    stack.push(bool_item(a == b));
                }
            }
            OP_CHECKSIG | OP_CHECKSIGVERIFY => {
                let (Some(pubkey), Some(signature)) = (stack.pop(), stack.pop()) else {
                    return Ok(false);
                };
                let valid = checker.check_sig(&signature, &pubkey)?;
                if opcode == OP_CHECKSIGVERIFY {
                    if !valid {
                        return Ok(false);
                    }
                } else {
                    stack.push(bool_item(valid));
                }
            }
            OP_RETURN => return Ok(false),
            _ => {}
        }
    }

    Ok(stack.last().is_some_and(|top| cast_to_bool(top)))
}

fn bool_item(value: bool) -> ByteString {
    if value {
        vec![1]
    } else {
        vec![]
    }
}

/// One spending pattern, selected by the spent output's script type
pub trait SpendVerifier: Sync {
    fn script_type(&self) -> ScriptType;

    /// Verify input `input_index` of `tx`, which spends `spent`
    fn verify(&self, tx: &Transaction, input_index: usize, spent: &SpentOutput) -> Result<bool>;
}

/// Pay-to-public-key-hash: signature and key in the unlocking script
pub struct P2pkhVerifier;

/// Pay-to-script-hash, with nested version-0 key-hash support
pub struct P2shVerifier;

/// Pay-to-witness-public-key-hash
pub struct P2wpkhVerifier;

static P2PKH: P2pkhVerifier = P2pkhVerifier;
static P2SH: P2shVerifier = P2shVerifier;
static P2WPKH: P2wpkhVerifier = P2wpkhVerifier;

/// Script type implied by the locking script's template
pub fn classify_script(script: &[u8]) -> ScriptType {
    match script {
        [OP_DUP, OP_HASH160, OP_PUSHBYTES_20, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG] if hash.len() == 20 => {
            ScriptType::P2pkh
        }
        [OP_HASH160, OP_PUSHBYTES_20, hash @ .., OP_EQUAL] if hash.len() == 20 => ScriptType::P2sh,
        [OP_0, OP_PUSHBYTES_20, program @ ..] if program.len() == 20 => ScriptType::V0P2wpkh,
        [OP_0, OP_PUSHBYTES_32, program @ ..] if program.len() == 32 => ScriptType::V0P2wsh,
        [OP_1, OP_PUSHBYTES_32, program @ ..] if program.len() == 32 => ScriptType::V1P2tr,
        [OP_RETURN, ..] => ScriptType::OpReturn,
        _ => ScriptType::Unknown,
    }
}

/// Verifier for `script_type`, if the pattern is supported
pub fn verifier_for(script_type: ScriptType) -> Option<&'static dyn SpendVerifier> {
    match script_type {
        ScriptType::P2pkh => Some(&P2PKH),
        ScriptType::P2sh => Some(&P2SH),
        ScriptType::V0P2wpkh => Some(&P2WPKH),
        _ => None,
    }
}

impl SpendVerifier for P2pkhVerifier {
    fn script_type(&self) -> ScriptType {
        ScriptType::P2pkh
    }

    fn verify(&self, tx: &Transaction, input_index: usize, spent: &SpentOutput) -> Result<bool> {
        let Some(mut stack) = push_only(&input_at(tx, input_index)?.script_sig)? else {
            return Ok(false);
        };
        let checker = LegacyChecker {
            tx,
            input_index,
            script_code: &spent.script_pubkey,
        };
        eval_script(&parse_script(&spent.script_pubkey)?, &mut stack, &checker)
    }
}

impl SpendVerifier for P2shVerifier {
    fn script_type(&self) -> ScriptType {
        ScriptType::P2sh
    }

    fn verify(&self, tx: &Transaction, input_index: usize, spent: &SpentOutput) -> Result<bool> {
        let input = input_at(tx, input_index)?;
        let Some(mut stack) = push_only(&input.script_sig)? else {
            return Ok(false);
        };
        let Some(redeem_script) = stack.last().cloned() else {
            return Ok(false);
        };

        // OP_HASH160 <hash> OP_EQUAL against the serialized redeem script
        let checker = LegacyChecker {
            tx,
            input_index,
            script_code: &redeem_script,
        };
        if !eval_script(&parse_script(&spent.script_pubkey)?, &mut stack, &checker)? {
            return Ok(false);
        }

        if let Some(program) = witness_v0_keyhash(&redeem_script) {
            return verify_witness_keyhash(tx, input_index, &program, spent.value);
        }

        // Only the hash commitment is checked for other redeem scripts;
        // multisig threshold verification is not performed.
        debug!(
            "input {}: redeem script of {} bytes checked by hash only",
            input_index,
            redeem_script.len()
        );
        Ok(true)
    }
}

impl SpendVerifier for P2wpkhVerifier {
    fn script_type(&self) -> ScriptType {
        ScriptType::V0P2wpkh
    }

    fn verify(&self, tx: &Transaction, input_index: usize, spent: &SpentOutput) -> Result<bool> {
        if !input_at(tx, input_index)?.script_sig.is_empty() {
            return Ok(false);
        }
        match witness_v0_keyhash(&spent.script_pubkey) {
            Some(program) => verify_witness_keyhash(tx, input_index, &program, spent.value),
            None => Ok(false),
        }
    }
}

/// The 20-byte program of `OP_0 OP_PUSHBYTES_20 <hash>`
fn witness_v0_keyhash(script: &[u8]) -> Option<[u8; 20]> {
    match script {
        [OP_0, OP_PUSHBYTES_20, program @ ..] if program.len() == 20 => {
            let mut hash = [0u8; 20];
            hash.copy_from_slice(program);
            Some(hash)
        }
        _ => None,
    }
}

fn input_at(tx: &Transaction, input_index: usize) -> Result<&TransactionInput> {
    tx.inputs.get(input_index).ok_or_else(|| {
        MinerError::Decoding(format!(
            "input index {} out of range for {} inputs",
            input_index,
            tx.inputs.len()
        ))
    })
}

// The witness must be exactly [signature, pubkey] with hash160(pubkey) == program
fn verify_witness_keyhash(
    tx: &Transaction,
    input_index: usize,
    program: &[u8; 20],
    amount: u64,
) -> Result<bool> {
    let [signature, pubkey] = input_at(tx, input_index)?.witness.as_slice() else {
        return Ok(false);
    };
    if hash160(pubkey) != *program {
        return Ok(false);
    }
    let script_code = p2wpkh_script_code(program);
    let checker = SegwitV0Checker {
        tx,
        input_index,
        script_code: &script_code,
        amount,
    };
    checker.check_sig(signature, pubkey)
}

/// VerifyInput: 𝒯𝒳 × ℕ → {true, false, unchecked}
///
/// `Ok(None)` when the input spends a pattern without a verifier, or is a
/// coinbase input.
pub fn verify_input(tx: &Transaction, input_index: usize) -> Result<Option<bool>> {
    let input = input_at(tx, input_index)?;
    if input.prevout.is_null() {
        return Ok(None);
    }

    let spent = input.spent_output.as_ref().ok_or_else(|| {
        MinerError::Decoding(format!("input {} is missing prevout data", input_index))
    })?;

    // the script bytes decide the pattern, not the record's tag
    let script_type = classify_script(&spent.script_pubkey);
    match verifier_for(script_type) {
        Some(verifier) => verifier.verify(tx, input_index, spent).map(Some),
        None => {
            debug!("input {}: no verifier for {:?}, skipping", input_index, script_type);
            Ok(None)
        }
    }
}

/// Verify every input, failing on the first one that does not verify
pub fn verify_transaction(tx: &Transaction) -> Result<()> {
    for index in 0..tx.inputs.len() {
        if verify_input(tx, index)? == Some(false) {
            let script_type = tx.inputs[index]
                .spent_output
                .as_ref()
                .map(|spent| classify_script(&spent.script_pubkey))
                .unwrap_or_default();
            return Err(MinerError::ScriptFailure(format!(
                "input {} ({:?}) failed verification",
                index, script_type
            )));
        }
    }
    Ok(())
}

/// Parameters of a pay-to-script-hash multisignature spend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultisigSpend {
    pub required: usize,
    pub pubkeys: Vec<ByteString>,
    pub signatures: Vec<ByteString>,
    /// Legacy sighash over the redeem script, SIGHASH_ALL
    pub sighash: Hash,
}

/// Pull threshold, keys, signatures and message hash out of a P2SH
/// `OP_m <keys> OP_n OP_CHECKMULTISIG` spend
///
/// Signatures are not checked against the keys.
pub fn extract_multisig(tx: &Transaction, input_index: usize) -> Result<MultisigSpend> {
    let input = tx.inputs.get(input_index).ok_or_else(|| {
        MinerError::Decoding(format!("input index {} out of range", input_index))
    })?;
    let not_multisig = || MinerError::Decoding(format!("input {} is not a multisig spend", input_index));

    let mut items = push_only(&input.script_sig)?.ok_or_else(not_multisig)?;
    let redeem_script = items.pop().ok_or_else(not_multisig)?;
    let ops = parse_script(&redeem_script)?;

    let [ScriptOp::Op(m), keys @ .., ScriptOp::Op(n), ScriptOp::Op(OP_CHECKMULTISIG)] = ops.as_slice() else {
        return Err(not_multisig());
    };
    let (Some(required), Some(total)) = (small_int(*m), small_int(*n)) else {
        return Err(not_multisig());
    };

    let pubkeys: Vec<ByteString> = keys
        .iter()
        .map(|op| match op {
            ScriptOp::Push(key) if key.len() == 33 || key.len() == 65 => Ok(key.clone()),
            _ => Err(not_multisig()),
        })
        .collect::<Result<_>>()?;
    if pubkeys.len() != total || required > total {
        return Err(not_multisig());
    }

    // the leading empty push is the CHECKMULTISIG dummy element
    let signatures = items.into_iter().filter(|item| !item.is_empty()).collect();
    let sighash = legacy_sighash(tx, input_index, &redeem_script, SIGHASH_ALL)?;

    Ok(MultisigSpend {
        required,
        pubkeys,
        signatures,
        sighash,
    })
}

fn small_int(opcode: u8) -> Option<usize> {
    match opcode {
        OP_1..=OP_16 => Some((opcode - (OP_1 - 1)) as usize),
        _ => None,
    }
}

const NAMED_OPCODES: &[(&str, u8)] = &[
    ("OP_0", OP_0),
    ("OP_FALSE", OP_0),
    ("OP_PUSHNUM_NEG1", OP_1NEGATE),
    ("OP_1NEGATE", OP_1NEGATE),
    ("OP_RETURN", OP_RETURN),
    ("OP_DUP", OP_DUP),
    ("OP_EQUAL", OP_EQUAL),
    ("OP_EQUALVERIFY", OP_EQUALVERIFY),
    ("OP_HASH160", OP_HASH160),
    ("OP_CHECKSIG", OP_CHECKSIG),
    ("OP_CHECKSIGVERIFY", OP_CHECKSIGVERIFY),
    ("OP_CHECKMULTISIG", OP_CHECKMULTISIG),
    ("OP_CLTV", OP_CHECKLOCKTIMEVERIFY),
    ("OP_CSV", OP_CHECKSEQUENCEVERIFY),
];

/// Assemble a space-separated ASM string into script bytes
///
/// Understands `OP_PUSHBYTES_n <hex>`, `OP_PUSHDATA1/2/4 <hex>`,
/// `OP_PUSHNUM_n` and the named opcodes in `NAMED_OPCODES`.
pub fn assemble_asm(asm: &str) -> Result<ByteString> {
    let mut script = Vec::new();
    let mut tokens = asm.split_whitespace();

    while let Some(token) = tokens.next() {
        if let Some(&(_, opcode)) = NAMED_OPCODES.iter().find(|(name, _)| *name == token) {
            script.push(opcode);
        } else if let Some(n) = token.strip_prefix("OP_PUSHNUM_") {
            match n.parse::<u8>() {
                Ok(n @ 1..=16) => script.push(OP_1 - 1 + n),
                _ => return Err(MinerError::Decoding(format!("unknown opcode {}", token))),
            }
        } else if let Some(n) = token.strip_prefix("OP_PUSHBYTES_") {
            let data = operand(&mut tokens, token)?;
            let declared: usize = n
                .parse()
                .map_err(|_| MinerError::Decoding(format!("unknown opcode {}", token)))?;
            if declared != data.len() || !(1..=OP_PUSHBYTES_75 as usize).contains(&declared) {
                return Err(MinerError::Decoding(format!(
                    "{} followed by {} bytes",
                    token,
                    data.len()
                )));
            }
            script.push(declared as u8);
            script.extend_from_slice(&data);
        } else if token.starts_with("OP_PUSHDATA") {
            let data = operand(&mut tokens, token)?;
            match token {
                "OP_PUSHDATA1" if data.len() <= 0xff => {
                    script.push(OP_PUSHDATA1);
                    script.push(data.len() as u8);
                }
                "OP_PUSHDATA2" if data.len() <= 0xffff => {
                    script.push(OP_PUSHDATA2);
                    script.extend_from_slice(&(data.len() as u16).to_le_bytes());
                }
                "OP_PUSHDATA4" if data.len() <= u32::MAX as usize => {
                    script.push(OP_PUSHDATA4);
                    script.extend_from_slice(&(data.len() as u32).to_le_bytes());
                }
                _ => return Err(MinerError::Decoding(format!("bad push {}", token))),
            }
            script.extend_from_slice(&data);
        } else {
            return Err(MinerError::Decoding(format!("unknown opcode {}", token)));
        }
    }

    Ok(script)
}

fn operand<'a>(tokens: &mut impl Iterator<Item = &'a str>, opcode: &str) -> Result<ByteString> {
    let hex = tokens
        .next()
        .ok_or_else(|| MinerError::Decoding(format!("{} missing operand", opcode)))?;
    decode_hex(hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::{All, SecretKey};

    struct Keys {
        secp: Secp256k1<All>,
        secret: SecretKey,
        public: Vec<u8>,
    }

    fn keys(seed: u8) -> Keys {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[seed; 32]).unwrap();
        let public = PublicKey::from_secret_key(&secp, &secret).serialize().to_vec();
        Keys { secp, secret, public }
    }

    impl Keys {
        fn sign(&self, digest: &Hash) -> ByteString {
            let message = Message::from_digest_slice(digest).unwrap();
            let mut sig = self.secp.sign_ecdsa(&message, &self.secret).serialize_der().to_vec();
            sig.push(SIGHASH_ALL as u8);
            sig
        }

        fn pubkey_hash(&self) -> [u8; 20] {
            hash160(&self.public)
        }
    }

    fn push(script: &mut ByteString, data: &[u8]) {
        assert!(data.len() <= 75);
        script.push(data.len() as u8);
        script.extend_from_slice(data);
    }

    fn spending(script_pubkey: ByteString, script_type: ScriptType, value: u64) -> Transaction {
        Transaction {
            version: 2,
            inputs: vec![TransactionInput {
                prevout: OutPoint { hash: [0x77; 32], index: 1 },
                script_sig: vec![],
                sequence: 0xfffffffd,
                witness: vec![],
                spent_output: Some(SpentOutput {
                    value,
                    script_pubkey,
                    script_pubkey_asm: String::new(),
                    script_type,
                }),
            }],
            outputs: vec![TransactionOutput {
                value: value - 1_000,
                script_pubkey: vec![OP_0, OP_PUSHBYTES_20, 0x42, 0x42],
            }],
            lock_time: 0,
        }
    }

    fn p2pkh_script(hash: &[u8; 20]) -> ByteString {
        let mut script = vec![OP_DUP, OP_HASH160, OP_PUSHBYTES_20];
        script.extend_from_slice(hash);
        script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        script
    }

    fn p2sh_script(redeem_script: &[u8]) -> ByteString {
        let mut script = vec![OP_HASH160, OP_PUSHBYTES_20];
        script.extend_from_slice(&hash160(redeem_script));
        script.push(OP_EQUAL);
        script
    }

    fn p2wpkh_program(hash: &[u8; 20]) -> ByteString {
        let mut script = vec![OP_0, OP_PUSHBYTES_20];
        script.extend_from_slice(hash);
        script
    }

    fn signed_p2pkh(keys: &Keys) -> Transaction {
        let script_pubkey = p2pkh_script(&keys.pubkey_hash());
        let mut tx = spending(script_pubkey.clone(), ScriptType::P2pkh, 50_000);
        let sig = keys.sign(&legacy_sighash(&tx, 0, &script_pubkey, SIGHASH_ALL).unwrap());
        push(&mut tx.inputs[0].script_sig, &sig);
        push(&mut tx.inputs[0].script_sig, &keys.public);
        tx
    }

    fn signed_p2wpkh(keys: &Keys) -> Transaction {
        let hash = keys.pubkey_hash();
        let mut tx = spending(p2wpkh_program(&hash), ScriptType::V0P2wpkh, 80_000);
        let digest = segwit_v0_sighash(&tx, 0, &p2wpkh_script_code(&hash), 80_000, SIGHASH_ALL).unwrap();
        tx.inputs[0].witness = vec![keys.sign(&digest), keys.public.clone()];
        tx
    }

    #[test]
    fn test_parse_script_pushes_and_ops() {
        let ops = parse_script(&[OP_0, 0x02, 0xaa, 0xbb, OP_PUSHDATA1, 0x01, 0xcc, OP_DUP]).unwrap();
        assert_eq!(
            ops,
            vec![
                ScriptOp::Push(vec![]),
                ScriptOp::Push(vec![0xaa, 0xbb]),
                ScriptOp::Push(vec![0xcc]),
                ScriptOp::Op(OP_DUP),
            ]
        );
    }

    #[test]
    fn test_parse_script_truncated_push() {
        assert!(matches!(parse_script(&[0x05, 0x01]), Err(MinerError::Decoding(_))));
        assert!(matches!(parse_script(&[OP_PUSHDATA2, 0x01]), Err(MinerError::Decoding(_))));
    }

    #[test]
    fn test_cast_to_bool() {
        assert!(!cast_to_bool(&[]));
        assert!(!cast_to_bool(&[0, 0]));
        assert!(!cast_to_bool(&[0, 0x80]));
        assert!(cast_to_bool(&[1]));
        assert!(cast_to_bool(&[0x80, 0]));
    }

    #[test]
    fn test_p2pkh_valid_signature() {
        let tx = signed_p2pkh(&keys(1));
        assert_eq!(verify_input(&tx, 0).unwrap(), Some(true));
        assert!(verify_transaction(&tx).is_ok());
    }

    #[test]
    fn test_p2pkh_tampered_output_fails() {
        let mut tx = signed_p2pkh(&keys(1));
        tx.outputs[0].value += 1;
        assert_eq!(verify_input(&tx, 0).unwrap(), Some(false));
        assert!(matches!(verify_transaction(&tx), Err(MinerError::ScriptFailure(_))));
    }

    #[test]
    fn test_p2pkh_wrong_key_fails_equalverify() {
        let owner = keys(1);
        let other = keys(2);
        let mut tx = signed_p2pkh(&owner);
        let sig = other.sign(&[9u8; 32]);
        tx.inputs[0].script_sig.clear();
        push(&mut tx.inputs[0].script_sig, &sig);
        push(&mut tx.inputs[0].script_sig, &other.public);
        assert_eq!(verify_input(&tx, 0).unwrap(), Some(false));
    }

    #[test]
    fn test_p2pkh_non_sighash_all_rejected() {
        let mut tx = signed_p2pkh(&keys(3));
        // rewrite the sighash byte of the signature push
        let sig_len = tx.inputs[0].script_sig[0] as usize;
        tx.inputs[0].script_sig[sig_len] = 0x03;
        assert_eq!(verify_input(&tx, 0).unwrap(), Some(false));
    }

    #[test]
    fn test_p2wpkh_valid_and_tampered() {
        let keys = keys(4);
        let tx = signed_p2wpkh(&keys);
        assert_eq!(verify_input(&tx, 0).unwrap(), Some(true));

        let mut wrong_amount = tx.clone();
        if let Some(spent) = wrong_amount.inputs[0].spent_output.as_mut() {
            spent.value += 1;
        }
        assert_eq!(verify_input(&wrong_amount, 0).unwrap(), Some(false));

        let mut tampered = tx.clone();
        tampered.lock_time = 1;
        assert_eq!(verify_input(&tampered, 0).unwrap(), Some(false));
    }

    #[test]
    fn test_p2wpkh_rejects_bad_witness_shape() {
        let signer = keys(4);
        let mut tx = signed_p2wpkh(&signer);
        tx.inputs[0].witness.push(vec![]);
        assert_eq!(verify_input(&tx, 0).unwrap(), Some(false));

        let mut wrong_key = signed_p2wpkh(&signer);
        wrong_key.inputs[0].witness[1] = keys(5).public;
        assert_eq!(verify_input(&wrong_key, 0).unwrap(), Some(false));
    }

    #[test]
    fn test_p2sh_wrapped_p2wpkh() {
        let keys = keys(6);
        let hash = keys.pubkey_hash();
        let redeem_script = p2wpkh_program(&hash);
        let mut tx = spending(p2sh_script(&redeem_script), ScriptType::P2sh, 60_000);
        push(&mut tx.inputs[0].script_sig, &redeem_script);
        let digest = segwit_v0_sighash(&tx, 0, &p2wpkh_script_code(&hash), 60_000, SIGHASH_ALL).unwrap();
        tx.inputs[0].witness = vec![keys.sign(&digest), keys.public.clone()];

        assert_eq!(verify_input(&tx, 0).unwrap(), Some(true));

        tx.outputs[0].value -= 1;
        assert_eq!(verify_input(&tx, 0).unwrap(), Some(false));
    }

    fn multisig_spend() -> (Transaction, Vec<Keys>, ByteString) {
        let signers = vec![keys(7), keys(8)];
        let mut redeem_script = vec![OP_1 + 1];
        for signer in &signers {
            push(&mut redeem_script, &signer.public);
        }
        redeem_script.extend_from_slice(&[OP_1 + 1, OP_CHECKMULTISIG]);

        let mut tx = spending(p2sh_script(&redeem_script), ScriptType::P2sh, 90_000);
        let digest = legacy_sighash(&tx, 0, &redeem_script, SIGHASH_ALL).unwrap();
        let mut script_sig = vec![OP_0];
        for signer in &signers {
            push(&mut script_sig, &signer.sign(&digest));
        }
        push(&mut script_sig, &redeem_script);
        tx.inputs[0].script_sig = script_sig;
        (tx, signers, redeem_script)
    }

    #[test]
    fn test_p2sh_multisig_hash_check() {
        let (tx, _, _) = multisig_spend();
        assert_eq!(verify_input(&tx, 0).unwrap(), Some(true));

        let mut wrong_hash = tx.clone();
        if let Some(spent) = wrong_hash.inputs[0].spent_output.as_mut() {
            spent.script_pubkey[2] ^= 0x01;
        }
        assert_eq!(verify_input(&wrong_hash, 0).unwrap(), Some(false));
    }

    #[test]
    fn test_extract_multisig() {
        let (tx, signers, redeem_script) = multisig_spend();
        let spend = extract_multisig(&tx, 0).unwrap();
        assert_eq!(spend.required, 2);
        assert_eq!(spend.pubkeys, vec![signers[0].public.clone(), signers[1].public.clone()]);
        assert_eq!(spend.signatures.len(), 2);
        assert_eq!(
            spend.sighash,
            legacy_sighash(&tx, 0, &redeem_script, SIGHASH_ALL).unwrap()
        );

        let (_, der) = spend.signatures[0].split_last().unwrap();
        assert!(verify_ecdsa(der, &spend.pubkeys[0], &spend.sighash));
    }

    #[test]
    fn test_extract_multisig_rejects_keyhash_spend() {
        let tx = signed_p2pkh(&keys(1));
        assert!(extract_multisig(&tx, 0).is_err());
    }

    #[test]
    fn test_unsupported_type_is_skipped() {
        let mut tx = spending(vec![0x51, 0x20], ScriptType::V1P2tr, 10_000);
        tx.inputs[0].witness = vec![vec![0u8; 64]];
        assert_eq!(verify_input(&tx, 0).unwrap(), None);
        assert!(verify_transaction(&tx).is_ok());
    }

    #[test]
    fn test_classify_script() {
        let hash = keys(1).pubkey_hash();
        assert_eq!(classify_script(&p2pkh_script(&hash)), ScriptType::P2pkh);
        assert_eq!(classify_script(&p2sh_script(&[OP_1])), ScriptType::P2sh);
        assert_eq!(classify_script(&p2wpkh_program(&hash)), ScriptType::V0P2wpkh);

        let mut program = vec![OP_0, OP_PUSHBYTES_32];
        program.extend_from_slice(&[3u8; 32]);
        assert_eq!(classify_script(&program), ScriptType::V0P2wsh);
        program[0] = OP_1;
        assert_eq!(classify_script(&program), ScriptType::V1P2tr);

        assert_eq!(classify_script(&[OP_RETURN, 0x01, 0xff]), ScriptType::OpReturn);
        assert_eq!(classify_script(&[OP_0, OP_PUSHBYTES_20, 0x42]), ScriptType::Unknown);
        assert_eq!(classify_script(&[]), ScriptType::Unknown);
    }

    #[test]
    fn test_mislabelled_keyhash_spend_is_still_verified() {
        for tag in [ScriptType::Unknown, ScriptType::V1P2tr] {
            let mut tx = signed_p2wpkh(&keys(4));
            tx.inputs[0].spent_output.as_mut().unwrap().script_type = tag;
            assert_eq!(verify_input(&tx, 0).unwrap(), Some(true));

            tx.outputs[0].value -= 1;
            assert_eq!(verify_input(&tx, 0).unwrap(), Some(false));
            assert!(matches!(verify_transaction(&tx), Err(MinerError::ScriptFailure(_))));
        }

        let mut tx = signed_p2pkh(&keys(5));
        tx.inputs[0].spent_output.as_mut().unwrap().script_type = ScriptType::Unknown;
        tx.lock_time = 7;
        assert_eq!(verify_input(&tx, 0).unwrap(), Some(false));
    }

    #[test]
    fn test_verifiers_reject_out_of_range_index() {
        let tx = signed_p2wpkh(&keys(4));
        let spent = tx.inputs[0].spent_output.clone().unwrap();
        for verifier in [&P2PKH as &dyn SpendVerifier, &P2SH, &P2WPKH] {
            assert!(matches!(verifier.verify(&tx, 1, &spent), Err(MinerError::Decoding(_))));
        }
    }

    #[test]
    fn test_missing_prevout_is_caller_error() {
        let mut tx = signed_p2pkh(&keys(1));
        tx.inputs[0].spent_output = None;
        assert!(matches!(verify_input(&tx, 0), Err(MinerError::Decoding(_))));
        assert!(verify_input(&tx, 3).is_err());
    }

    #[test]
    fn test_verifier_for() {
        assert_eq!(verifier_for(ScriptType::P2pkh).map(|v| v.script_type()), Some(ScriptType::P2pkh));
        assert_eq!(verifier_for(ScriptType::P2sh).map(|v| v.script_type()), Some(ScriptType::P2sh));
        assert_eq!(
            verifier_for(ScriptType::V0P2wpkh).map(|v| v.script_type()),
            Some(ScriptType::V0P2wpkh)
        );
        assert!(verifier_for(ScriptType::V0P2wsh).is_none());
        assert!(verifier_for(ScriptType::Unknown).is_none());
    }

    #[test]
    fn test_unknown_opcode_is_noop() {
        struct NeverCalled;
        impl SignatureChecker for NeverCalled {
            fn check_sig(&self, _: &[u8], _: &[u8]) -> Result<bool> {
                panic!("checker should not run");
            }
        }
        let ops = parse_script(&[OP_1, 0xb0, OP_CHECKLOCKTIMEVERIFY, OP_1, OP_EQUAL]).unwrap();
        assert!(eval_script(&ops, &mut Vec::new(), &NeverCalled).unwrap());

        let ops = parse_script(&[OP_1, OP_RETURN]).unwrap();
        assert!(!eval_script(&ops, &mut Vec::new(), &NeverCalled).unwrap());
    }

    #[test]
    fn test_assemble_asm_p2pkh() {
        let asm = "OP_DUP OP_HASH160 OP_PUSHBYTES_20 edf10a7fac6b32e24daa5305c723f3de58db1bc8 OP_EQUALVERIFY OP_CHECKSIG";
        assert_eq!(
            hex::encode(assemble_asm(asm).unwrap()),
            "76a914edf10a7fac6b32e24daa5305c723f3de58db1bc888ac"
        );
    }

    #[test]
    fn test_assemble_asm_numbers_and_pushdata() {
        assert_eq!(assemble_asm("OP_0 OP_PUSHNUM_1 OP_PUSHNUM_16").unwrap(), vec![0x00, 0x51, 0x60]);
        assert_eq!(assemble_asm("OP_PUSHDATA1 aabb").unwrap(), vec![OP_PUSHDATA1, 0x02, 0xaa, 0xbb]);
        assert_eq!(assemble_asm("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_assemble_asm_errors() {
        assert!(assemble_asm("OP_PUSHBYTES_2 aa").is_err());
        assert!(assemble_asm("OP_PUSHBYTES_20").is_err());
        assert!(assemble_asm("OP_PUSHNUM_17").is_err());
        assert!(assemble_asm("OP_NOT_A_THING").is_err());
    }
}
