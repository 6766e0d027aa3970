//! Per-block staking metadata held by the chain index

use serde::{Deserialize, Serialize};

use crate::crypto::Hash256;
use crate::validation::OutPoint;

/// Block is proof-of-stake
pub const FLAG_PROOF_OF_STAKE: u32 = 1 << 0;
/// Block's stake entropy bit
pub const FLAG_STAKE_ENTROPY: u32 = 1 << 1;
/// Block generated a fresh V2 stake modifier
pub const FLAG_STAKE_MODIFIER: u32 = 1 << 2;

/// Staking view of one connected block.
///
/// Everything except the modifier fields is fixed when the block is
/// indexed; the modifier fields are assigned exactly once, at connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMetadata {
    pub height: u32,
    pub timestamp: u32,
    pub block_hash: Hash256,
    /// Zero for genesis
    pub prev_hash: Hash256,
    pub is_proof_of_stake: bool,
    pub stake_entropy_bit: u8,
    pub generated_modifier: bool,
    pub stake_modifier_v2: u64,
    pub stake_modifier_checksum: u32,
    pub stake_modifier_v3: Hash256,
    /// Winning kernel hash (zero for proof-of-work blocks)
    pub hash_proof_of_stake: Hash256,
    /// Staked outpoint (null for proof-of-work blocks)
    pub prevout_stake: OutPoint,
}

impl BlockMetadata {
    /// Metadata for a proof-of-work block; modifier fields unset
    pub fn new(height: u32, timestamp: u32, block_hash: Hash256, prev_hash: Hash256) -> Self {
        Self {
            height,
            timestamp,
            block_hash,
            prev_hash,
            is_proof_of_stake: false,
            stake_entropy_bit: entropy_bit(&block_hash),
            generated_modifier: false,
            stake_modifier_v2: 0,
            stake_modifier_checksum: 0,
            stake_modifier_v3: Hash256::zero(),
            hash_proof_of_stake: Hash256::zero(),
            prevout_stake: OutPoint::null(),
        }
    }

    /// Mark as proof-of-stake, recording the staked coin and winning hash
    pub fn with_stake(mut self, prevout: OutPoint, hash_proof: Hash256) -> Self {
        self.is_proof_of_stake = true;
        self.prevout_stake = prevout;
        self.hash_proof_of_stake = hash_proof;
        self
    }

    pub fn time(&self) -> i64 {
        i64::from(self.timestamp)
    }

    /// Flag word hashed into the modifier checksum
    pub fn flags(&self) -> u32 {
        let mut flags = 0;
        if self.is_proof_of_stake {
            flags |= FLAG_PROOF_OF_STAKE;
        }
        if self.stake_entropy_bit != 0 {
            flags |= FLAG_STAKE_ENTROPY;
        }
        if self.generated_modifier {
            flags |= FLAG_STAKE_MODIFIER;
        }
        flags
    }

    pub fn set_stake_modifier(&mut self, modifier: u64, generated: bool) {
        self.stake_modifier_v2 = modifier;
        self.generated_modifier = generated;
    }
}

/// Entropy bit of a block: lowest bit of its hash
pub fn entropy_bit(block_hash: &Hash256) -> u8 {
    block_hash.0[0] & 1
}
