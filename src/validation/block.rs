//! Block structure
//!
//! Header fields the kernel consumes plus the transaction list whose
//! second entry carries the coinstake of a proof-of-stake block.

use serde::{Deserialize, Serialize};

use super::Transaction;
use crate::crypto::{Hash256, HashWriter};

/// Block header
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockHeader {
    /// Protocol version
    pub version: u32,
    /// Hash of the previous block
    pub prev_hash: Hash256,
    /// Merkle root of all transactions
    pub merkle_root: Hash256,
    /// Block timestamp (seconds since Unix epoch)
    pub time: u32,
    /// Difficulty target (compact representation)
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    pub fn new(prev_hash: Hash256, merkle_root: Hash256, time: u32, bits: u32, nonce: u32) -> Self {
        Self {
            version: 4,
            prev_hash,
            merkle_root,
            time,
            bits,
            nonce,
        }
    }

    pub fn hash(&self) -> Hash256 {
        let mut writer = HashWriter::new();
        writer
            .write_u32(self.version)
            .write_hash(&self.prev_hash)
            .write_hash(&self.merkle_root)
            .write_u32(self.time)
            .write_u32(self.bits)
            .write_u32(self.nonce);
        writer.finish()
    }
}

/// A complete block containing header and transactions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Create a block, committing to the transactions in the header
    pub fn new(mut header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        header.merkle_root = transactions_commitment(&transactions);
        Self { header, transactions }
    }

    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    pub fn is_genesis(&self) -> bool {
        self.header.prev_hash.is_zero()
    }

    /// The coinstake, if this is a proof-of-stake block
    pub fn coinstake(&self) -> Option<&Transaction> {
        self.transactions.get(1).filter(|tx| tx.is_coinstake())
    }

    pub fn is_proof_of_stake(&self) -> bool {
        self.coinstake().is_some()
    }
}

/// Flat commitment to the transaction list (no merkle branches are ever served)
fn transactions_commitment(transactions: &[Transaction]) -> Hash256 {
    let mut writer = HashWriter::new();
    writer.write_u32(transactions.len() as u32);
    for tx in transactions {
        writer.write_hash(&tx.hash());
    }
    writer.finish()
}
