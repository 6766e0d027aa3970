//! Synthetic single-staker network
//!
//! Drives a [`SharedChain`] forward with proof-of-work filler blocks and
//! staked blocks from one [`Staker`]. Block times advance by the target
//! spacing.

use tracing::info;

use super::genesis::create_genesis_block;
use super::staker::{StakeResult, Staker};
use crate::chain::{ActivationHeight, BlockMetadata, ChainParams, MemoryChain, SharedChain};
use crate::constants::{COIN, STAKE_TARGET_SPACING};
use crate::crypto::PrivateKey;
use crate::error::ChainError;
use crate::validation::SchnorrScriptVerifier;

/// Smallest coinbase value of a filler block
pub const MIN_WORK_REWARD: i64 = 100 * COIN;

pub struct Simnet {
    chain: SharedChain,
    staker: Staker,
    tip: BlockMetadata,
    /// Coinbase value of filler blocks, enough to stake alone
    reward: i64,
    /// Minimum stake amount applies from this height
    flags: ActivationHeight,
}

impl Simnet {
    /// Start a chain at genesis; the genesis coinbase pays the staker
    pub fn new(params: ChainParams, key: PrivateKey) -> Result<Self, ChainError> {
        let mut staker = Staker::new(key);
        let reward = params.min_staking_amount.max(MIN_WORK_REWARD);
        let genesis = create_genesis_block(&params, reward, staker.script().clone());
        let chain = SharedChain::new(MemoryChain::new(params));
        let tip = chain.connect_unchecked(&genesis)?;
        staker.watch_block(&genesis);
        Ok(Self {
            chain,
            staker,
            tip,
            reward,
            flags: ActivationHeight(0),
        })
    }

    pub fn chain(&self) -> &SharedChain {
        &self.chain
    }

    pub fn staker(&self) -> &Staker {
        &self.staker
    }

    pub fn tip(&self) -> &BlockMetadata {
        &self.tip
    }

    fn next_time(&self) -> u32 {
        self.tip.timestamp + STAKE_TARGET_SPACING as u32
    }

    /// Connect a proof-of-work filler block
    pub fn mine(&mut self) -> Result<&BlockMetadata, ChainError> {
        let block = self
            .staker
            .assemble_work_block(&self.tip, self.next_time(), self.reward);
        self.tip = self.chain.connect_unchecked(&block)?;
        self.staker.watch_block(&block);
        Ok(&self.tip)
    }

    /// Try to stake the next block; `None` when no coin finds a kernel
    pub fn stake(&mut self) -> Result<Option<&BlockMetadata>, ChainError> {
        let time = self.next_time();
        let result = {
            let snapshot = self.chain.snapshot();
            self.staker.stake_block(&snapshot, &self.flags, time)?
        };
        let block = match result {
            StakeResult::Success(block) => block,
            StakeResult::Interrupted | StakeResult::NoStake => return Ok(None),
        };

        self.tip = self.chain.accept_block(&block, &SchnorrScriptVerifier, &self.flags)?;
        self.staker.watch_block(&block);
        Ok(Some(&self.tip))
    }

    /// Stake the next block, falling back to a filler block
    pub fn advance(&mut self) -> Result<&BlockMetadata, ChainError> {
        if self.stake()?.is_none() {
            self.mine()?;
        }
        Ok(&self.tip)
    }

    /// `work` filler blocks to mature coins, then `blocks` more via [`Simnet::advance`]
    pub fn build(params: ChainParams, key: PrivateKey, work: u32, blocks: u32) -> Result<Self, ChainError> {
        let mut net = Self::new(params, key)?;
        for _ in 0..work {
            net.mine()?;
        }
        for _ in 0..blocks {
            net.advance()?;
        }
        let tip = net.tip();
        info!(height = tip.height, hash = %tip.block_hash, "Synthetic chain built");
        Ok(net)
    }
}
