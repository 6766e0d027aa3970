//! In-memory chain index
//!
//! Block metadata keyed by hash, the active chain by height, and a
//! transaction index of every output ever created. Connecting a block is
//! the single point where its stake modifier is assigned.

use std::collections::HashMap;
use tracing::debug;

use super::{BlockMetadata, ChainParams, ChainView, TxIndex};
use crate::consensus::compute_and_set_stake_modifier;
use crate::crypto::Hash256;
use crate::error::ChainError;
use crate::validation::{Block, OutPoint, Transaction, TxOut};

/// Chain index plus transaction index
#[derive(Debug, Clone)]
pub struct MemoryChain {
    params: ChainParams,
    blocks: HashMap<Hash256, BlockMetadata>,
    /// Active chain, indexed by height
    active: Vec<Hash256>,
    outputs: HashMap<OutPoint, TxOut>,
    /// tx hash -> confirming block hash
    tx_blocks: HashMap<Hash256, Hash256>,
}

impl MemoryChain {
    pub fn new(params: ChainParams) -> Self {
        Self {
            params,
            blocks: HashMap::new(),
            active: Vec::new(),
            outputs: HashMap::new(),
            tx_blocks: HashMap::new(),
        }
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Connect `meta` on top of the active tip, assigning its stake modifier.
    ///
    /// Nothing is written unless the modifier computation succeeds.
    pub fn connect(&mut self, mut meta: BlockMetadata) -> Result<&BlockMetadata, ChainError> {
        if self.blocks.contains_key(&meta.block_hash) {
            return Err(ChainError::Duplicate(meta.block_hash));
        }
        let tip = self.tip().map(|t| (t.block_hash, t.height));
        let extends_tip = match tip {
            Some((hash, height)) => meta.prev_hash == hash && meta.height == height + 1,
            None => meta.height == 0,
        };
        if !extends_tip {
            return Err(ChainError::NotExtendingTip {
                block: meta.block_hash,
                tip: tip.map(|(hash, _)| hash).unwrap_or_default(),
            });
        }

        compute_and_set_stake_modifier(&*self, &mut meta, &self.params)?;
        debug!(
            height = meta.height,
            hash = %meta.block_hash,
            modifier = meta.stake_modifier_v2,
            generated = meta.generated_modifier,
            "Connected block"
        );

        let hash = meta.block_hash;
        self.active.push(hash);
        Ok(self.blocks.entry(hash).or_insert(meta))
    }

    /// Connect a full block and index its transactions.
    ///
    /// `hash_proof` is the winning kernel hash for a proof-of-stake block
    /// (zero otherwise), as returned by the validator.
    pub fn connect_block(&mut self, block: &Block, hash_proof: Hash256) -> Result<BlockMetadata, ChainError> {
        let height = self.tip_height().map_or(0, |h| h + 1);
        let mut meta = BlockMetadata::new(height, block.header.time, block.hash(), block.header.prev_hash);
        if let Some(coinstake) = block.coinstake() {
            meta = meta.with_stake(coinstake.inputs[0].prevout, hash_proof);
        }

        let meta = self.connect(meta)?.clone();
        for tx in &block.transactions {
            self.add_transaction(tx, meta.block_hash);
        }
        Ok(meta)
    }

    /// Index the outputs of `tx` as confirmed in `block_hash`
    pub fn add_transaction(&mut self, tx: &Transaction, block_hash: Hash256) {
        let tx_hash = tx.hash();
        for (index, output) in tx.outputs.iter().enumerate() {
            self.outputs.insert(OutPoint::new(tx_hash, index as u32), output.clone());
        }
        self.tx_blocks.insert(tx_hash, block_hash);
    }
}

impl ChainView for MemoryChain {
    fn block_by_hash(&self, hash: &Hash256) -> Option<&BlockMetadata> {
        self.blocks.get(hash)
    }

    fn block_at_height(&self, height: u32) -> Option<&BlockMetadata> {
        self.active
            .get(height as usize)
            .and_then(|hash| self.blocks.get(hash))
    }

    fn tip_height(&self) -> Option<u32> {
        self.active.len().checked_sub(1).map(|h| h as u32)
    }
}

impl TxIndex for MemoryChain {
    fn prev_output(&self, outpoint: &OutPoint) -> Option<&TxOut> {
        self.outputs.get(outpoint)
    }

    fn confirmation_block(&self, tx_hash: &Hash256) -> Option<Hash256> {
        self.tx_blocks.get(tx_hash).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FIRST_BLOCK_STAKE_MODIFIER;
    use crate::crypto::HashWriter;
    use crate::validation::{BlockHeader, Script};

    fn block_hash(height: u32) -> Hash256 {
        let mut writer = HashWriter::new();
        writer.write_u32(height);
        writer.finish()
    }

    fn meta(height: u32, timestamp: u32) -> BlockMetadata {
        let prev = if height == 0 { Hash256::zero() } else { block_hash(height - 1) };
        BlockMetadata::new(height, timestamp, block_hash(height), prev)
    }

    #[test]
    fn test_genesis_and_first_block_modifiers() {
        let mut chain = MemoryChain::new(ChainParams::regtest());
        let genesis = chain.connect(meta(0, 1_000)).unwrap().clone();
        assert_eq!(genesis.stake_modifier_v2, 0);
        assert!(genesis.generated_modifier);

        let first = chain.connect(meta(1, 1_060)).unwrap();
        assert_eq!(first.stake_modifier_v2, FIRST_BLOCK_STAKE_MODIFIER);
        assert!(first.generated_modifier);
        assert_eq!(chain.tip_height(), Some(1));
    }

    #[test]
    fn test_rejects_block_not_extending_tip() {
        let mut chain = MemoryChain::new(ChainParams::regtest());
        chain.connect(meta(0, 1_000)).unwrap();

        let orphan = BlockMetadata::new(1, 1_060, block_hash(1), Hash256([9u8; 32]));
        assert!(matches!(chain.connect(orphan), Err(ChainError::NotExtendingTip { .. })));
        assert!(matches!(chain.connect(meta(0, 1_000)), Err(ChainError::Duplicate(_))));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_connect_block_indexes_outputs() {
        let mut chain = MemoryChain::new(ChainParams::regtest());
        let coinbase = Transaction::coinbase(0, 50, Script(vec![7]));
        let header = BlockHeader::new(Hash256::zero(), Hash256::zero(), 1_000, 0x207fffff, 0);
        let block = Block::new(header, vec![coinbase.clone()]);

        let meta = chain.connect_block(&block, Hash256::zero()).unwrap();
        assert_eq!(meta.height, 0);
        assert!(!meta.is_proof_of_stake);

        let outpoint = OutPoint::new(coinbase.hash(), 0);
        assert_eq!(chain.prev_output(&outpoint).map(|o| o.value), Some(50));
        assert_eq!(chain.confirmation_block(&coinbase.hash()), Some(block.hash()));
    }
}
