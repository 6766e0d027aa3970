//! Script verification seam
//!
//! The kernel treats script interpretation as an external collaborator.
//! `SchnorrScriptVerifier` is the reference implementation used by the
//! in-memory chain: a locking script is a bare x-only public key and the
//! unlocking script is a bare signature over the input's signature hash.

use super::{Script, Transaction};
use crate::crypto::{PrivateKey, PublicKey, SchnorrSignature};

/// Verifies an input's unlocking script against the output it spends
pub trait ScriptVerifier {
    fn verify(
        &self,
        script_sig: &Script,
        script_pubkey: &Script,
        tx: &Transaction,
        input_index: usize,
        amount: i64,
    ) -> bool;
}

impl<V: ScriptVerifier + ?Sized> ScriptVerifier for &V {
    fn verify(
        &self,
        script_sig: &Script,
        script_pubkey: &Script,
        tx: &Transaction,
        input_index: usize,
        amount: i64,
    ) -> bool {
        (**self).verify(script_sig, script_pubkey, tx, input_index, amount)
    }
}

/// Pay-to-public-key verifier
#[derive(Debug, Default, Clone, Copy)]
pub struct SchnorrScriptVerifier;

impl ScriptVerifier for SchnorrScriptVerifier {
    fn verify(
        &self,
        script_sig: &Script,
        script_pubkey: &Script,
        tx: &Transaction,
        input_index: usize,
        _amount: i64,
    ) -> bool {
        if input_index >= tx.inputs.len() {
            return false;
        }
        let Ok(public_key) = PublicKey::from_slice(script_pubkey.as_bytes()) else {
            return false;
        };
        let Some(signature) = SchnorrSignature::from_slice(script_sig.as_bytes()) else {
            return false;
        };
        public_key.verify(&tx.signature_hash(input_index), &signature)
    }
}

/// Locking script paying to `public_key`
pub fn pay_to_pubkey(public_key: &PublicKey) -> Script {
    Script(public_key.0.to_vec())
}

/// Fill in the unlocking script of input `input_index`.
///
/// Returns `false`, leaving `tx` untouched, when there is no such input.
pub fn sign_input(tx: &mut Transaction, input_index: usize, key: &PrivateKey) -> bool {
    if input_index >= tx.inputs.len() {
        return false;
    }
    let signature = key.sign(&tx.signature_hash(input_index));
    tx.inputs[input_index].script_sig = Script(signature.0.to_vec());
    true
}
