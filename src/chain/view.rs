//! Read interfaces onto the node's collaborators
//!
//! The kernel never reaches for process-wide state: every operation gets
//! an explicit view that must stay consistent for the whole call.

use super::BlockMetadata;
use crate::crypto::Hash256;
use crate::validation::{OutPoint, TxOut};

/// Chain index snapshot
pub trait ChainView {
    fn block_by_hash(&self, hash: &Hash256) -> Option<&BlockMetadata>;

    /// Block at `height` on the active chain
    fn block_at_height(&self, height: u32) -> Option<&BlockMetadata>;

    /// Height of the active tip, `None` for an empty index
    fn tip_height(&self) -> Option<u32>;

    fn prev(&self, block: &BlockMetadata) -> Option<&BlockMetadata> {
        if block.height == 0 {
            return None;
        }
        self.block_by_hash(&block.prev_hash)
    }

    fn tip(&self) -> Option<&BlockMetadata> {
        self.tip_height().and_then(|h| self.block_at_height(h))
    }
}

/// Transaction / UTXO index
pub trait TxIndex {
    /// Output referenced by `outpoint`, spent or not
    fn prev_output(&self, outpoint: &OutPoint) -> Option<&TxOut>;

    /// Block that confirmed transaction `tx_hash`
    fn confirmation_block(&self, tx_hash: &Hash256) -> Option<Hash256>;
}

/// Network governance switches consulted by the kernel
pub trait NetworkFlags {
    /// Whether the minimum stake amount applies to a block at `height`
    fn min_stake_amount_enforced(&self, height: u32) -> bool;
}

impl NetworkFlags for bool {
    fn min_stake_amount_enforced(&self, _height: u32) -> bool {
        *self
    }
}

/// Enforce from a fixed activation height onwards
#[derive(Debug, Clone, Copy)]
pub struct ActivationHeight(pub u32);

impl NetworkFlags for ActivationHeight {
    fn min_stake_amount_enforced(&self, height: u32) -> bool {
        height >= self.0
    }
}
