//! Signed transactions for integration tests

#![allow(dead_code)]

use consensus_miner::constants::SIGHASH_ALL;
use consensus_miner::hashing::hash160;
use consensus_miner::sighash::{legacy_sighash, p2wpkh_script_code, segwit_v0_sighash};
use consensus_miner::*;
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};

pub const EASY_TARGET: &str = "7fffff0000000000000000000000000000000000000000000000000000000000";

pub fn easy_config() -> MinerConfig {
    MinerConfig {
        target: EASY_TARGET.to_string(),
        bits: 0x207fffff,
        workers: 2,
        ..MinerConfig::default()
    }
}

pub struct Signer {
    secp: Secp256k1<All>,
    secret: SecretKey,
    pub public: Vec<u8>,
}

impl Signer {
    pub fn new(seed: u8) -> Self {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[seed; 32]).unwrap();
        let public = PublicKey::from_secret_key(&secp, &secret).serialize().to_vec();
        Signer { secp, secret, public }
    }

    pub fn pubkey_hash(&self) -> [u8; 20] {
        hash160(&self.public)
    }

    pub fn sign(&self, digest: &Hash) -> ByteString {
        let message = Message::from_digest_slice(digest).unwrap();
        let mut sig = self.secp.sign_ecdsa(&message, &self.secret).serialize_der().to_vec();
        sig.push(SIGHASH_ALL as u8);
        sig
    }
}

fn unsigned(prev: u8, script_pubkey: ByteString, script_type: ScriptType, value: u64, fee: u64) -> Transaction {
    Transaction {
        version: 2,
        inputs: vec![TransactionInput {
            prevout: OutPoint { hash: [prev; 32], index: 0 },
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
            value: value - fee,
            script_pubkey: vec![0x00, 0x14, 0x11, 0x22],
        }],
        lock_time: 0,
    }
}

/// One-input P2WPKH spend of `value`, paying `fee`
pub fn signed_p2wpkh(signer: &Signer, prev: u8, value: u64, fee: u64) -> Transaction {
    let hash = signer.pubkey_hash();
    let mut program = vec![0x00, 0x14];
    program.extend_from_slice(&hash);
    let mut tx = unsigned(prev, program, ScriptType::V0P2wpkh, value, fee);
    let digest = segwit_v0_sighash(&tx, 0, &p2wpkh_script_code(&hash), value, SIGHASH_ALL).unwrap();
    tx.inputs[0].witness = vec![signer.sign(&digest), signer.public.clone()];
    tx
}

/// One-input P2PKH spend of `value`, paying `fee`
pub fn signed_p2pkh(signer: &Signer, prev: u8, value: u64, fee: u64) -> Transaction {
    let script_pubkey = p2wpkh_script_code(&signer.pubkey_hash());
    let mut tx = unsigned(prev, script_pubkey.clone(), ScriptType::P2pkh, value, fee);
    let sig = signer.sign(&legacy_sighash(&tx, 0, &script_pubkey, SIGHASH_ALL).unwrap());
    let mut script_sig = vec![sig.len() as u8];
    script_sig.extend_from_slice(&sig);
    script_sig.push(signer.public.len() as u8);
    script_sig.extend_from_slice(&signer.public);
    tx.inputs[0].script_sig = script_sig;
    tx
}

pub fn write_record(dir: &std::path::Path, name: &str, tx: &Transaction) {
    let json = serde_json::to_string_pretty(&TransactionRecord::from(tx)).unwrap();
    std::fs::write(dir.join(format!("{}.json", name)), json).unwrap();
}
