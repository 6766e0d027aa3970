//! Transaction structure
//!
//! Only what the kernel reads: outpoints, values, scripts and the
//! coinbase/coinstake shape rules.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{Hash256, HashWriter};

/// Reference to a transaction output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct OutPoint {
    /// Hash of the transaction containing the output
    pub hash: Hash256,
    /// Index of the output in that transaction
    pub n: u32,
}

impl OutPoint {
    pub fn new(hash: Hash256, n: u32) -> Self {
        Self { hash, n }
    }

    /// The null outpoint spent by coinbase inputs
    pub fn null() -> Self {
        Self {
            hash: Hash256::zero(),
            n: u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.hash.is_zero() && self.n == u32::MAX
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hash, self.n)
    }
}

/// Opaque script bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Script(pub Vec<u8>);

impl Script {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// A transaction input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    pub prevout: OutPoint,
    /// Unlocking script
    pub script_sig: Script,
}

impl TxIn {
    pub fn new(prevout: OutPoint) -> Self {
        Self {
            prevout,
            script_sig: Script::default(),
        }
    }
}

/// A transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    /// Amount in atomic units
    pub value: i64,
    /// Locking script
    pub script_pubkey: Script,
}

impl TxOut {
    pub fn new(value: i64, script_pubkey: Script) -> Self {
        Self { value, script_pubkey }
    }

    /// The empty marker output that opens every coinstake
    pub fn empty() -> Self {
        Self {
            value: 0,
            script_pubkey: Script::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value == 0 && self.script_pubkey.is_empty()
    }
}

/// A complete transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn new(inputs: Vec<TxIn>, outputs: Vec<TxOut>) -> Self {
        Self {
            version: 1,
            inputs,
            outputs,
            lock_time: 0,
        }
    }

    /// Create a coinbase paying `value` to `script_pubkey`.
    ///
    /// `height` goes into the unlocking script so coinbases of different
    /// blocks never share a hash.
    pub fn coinbase(height: u32, value: i64, script_pubkey: Script) -> Self {
        let mut input = TxIn::new(OutPoint::null());
        input.script_sig = Script(height.to_le_bytes().to_vec());
        Self::new(vec![input], vec![TxOut::new(value, script_pubkey)])
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prevout.is_null()
    }

    /// A coinstake spends real outputs and opens with an empty marker output
    pub fn is_coinstake(&self) -> bool {
        !self.inputs.is_empty()
            && !self.inputs[0].prevout.is_null()
            && self.outputs.len() >= 2
            && self.outputs[0].is_empty()
    }

    pub fn hash(&self) -> Hash256 {
        self.serialize(None, true).finish()
    }

    /// Hash signed by input `input_index` (all unlocking scripts blanked)
    pub fn signature_hash(&self, input_index: usize) -> Hash256 {
        self.serialize(Some(input_index), false).finish()
    }

    fn serialize(&self, signing_index: Option<usize>, with_scripts: bool) -> HashWriter {
        let mut writer = HashWriter::new();
        writer.write_u32(self.version);
        writer.write_u32(self.inputs.len() as u32);
        for input in &self.inputs {
            writer.write_hash(&input.prevout.hash);
            writer.write_u32(input.prevout.n);
            if with_scripts {
                writer.write_bytes(input.script_sig.as_bytes());
            }
        }
        writer.write_u32(self.outputs.len() as u32);
        for output in &self.outputs {
            writer.write_i64(output.value);
            writer.write_bytes(output.script_pubkey.as_bytes());
        }
        writer.write_u32(self.lock_time);
        if let Some(index) = signing_index {
            writer.write_u32(index as u32);
        }
        writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coinstake() -> Transaction {
        Transaction::new(
            vec![TxIn::new(OutPoint::new(Hash256([7u8; 32]), 1))],
            vec![TxOut::empty(), TxOut::new(100, Script(vec![1, 2, 3]))],
        )
    }

    #[test]
    fn test_coinbase_detection() {
        let coinbase = Transaction::coinbase(5, 5000, Script::default());
        assert!(coinbase.is_coinbase());
        assert!(!coinbase.is_coinstake());

        let regular = Transaction::new(vec![], vec![]);
        assert!(!regular.is_coinbase());
    }

    #[test]
    fn test_coinstake_shape() {
        assert!(coinstake().is_coinstake());

        let mut no_marker = coinstake();
        no_marker.outputs[0] = TxOut::new(1, Script::default());
        assert!(!no_marker.is_coinstake());

        let mut single_output = coinstake();
        single_output.outputs.truncate(1);
        assert!(!single_output.is_coinstake());
    }

    #[test]
    fn test_signature_hash_ignores_unlocking_scripts() {
        let unsigned = coinstake();
        let mut signed = coinstake();
        signed.inputs[0].script_sig = Script(vec![9u8; 64]);

        assert_eq!(unsigned.signature_hash(0), signed.signature_hash(0));
        assert_ne!(unsigned.hash(), signed.hash());
        assert_ne!(unsigned.signature_hash(0), unsigned.signature_hash(1));
    }

    #[test]
    fn test_coinbase_hash_differs_by_height() {
        let a = Transaction::coinbase(1, 50, Script::default());
        let b = Transaction::coinbase(2, 50, Script::default());
        assert_ne!(a.hash(), b.hash());
    }
}
