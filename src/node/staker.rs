//! Block producer for synthetic chains
//!
//! Assembles proof-of-work filler blocks and searches the coins it owns
//! for a stake kernel. The search runs against a read snapshot and polls
//! a stop signal between attempts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::genesis::GENESIS_BITS;
use crate::chain::{BlockMetadata, ChainView, MemoryChain, NetworkFlags, TxIndex};
use crate::consensus::{check_stake_age, KernelMode, KernelProtocol, ProofOfStakeValidator, StakeCandidate};
use crate::crypto::{Hash256, PrivateKey};
use crate::error::KernelError;
use crate::validation::{
    pay_to_pubkey, sign_input, Block, BlockHeader, OutPoint, SchnorrScriptVerifier, Script, Transaction, TxIn, TxOut,
};

/// Outcome of a stake attempt
#[derive(Debug)]
pub enum StakeResult {
    /// Found a kernel; the block passed validation against the snapshot
    Success(Block),
    /// Stopped before a kernel was found
    Interrupted,
    /// No coin produced a kernel
    NoStake,
}

/// Staking wallet and block producer
#[derive(Clone)]
pub struct Staker {
    key: PrivateKey,
    script: Script,
    /// Unspent outputs paying `script`
    coins: Vec<OutPoint>,
    stop_signal: Arc<AtomicBool>,
}

impl Staker {
    pub fn new(key: PrivateKey) -> Self {
        let script = pay_to_pubkey(&key.public_key());
        Self {
            key,
            script,
            coins: Vec::new(),
            stop_signal: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn coins(&self) -> &[OutPoint] {
        &self.coins
    }

    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::Release);
    }

    pub fn reset(&self) {
        self.stop_signal.store(false, Ordering::Release);
    }

    /// Track outputs of a connected block: spent coins leave, new ones join
    pub fn watch_block(&mut self, block: &Block) {
        for tx in &block.transactions {
            if !tx.is_coinbase() {
                self.coins
                    .retain(|coin| tx.inputs.iter().all(|input| input.prevout != *coin));
            }
            let tx_hash = tx.hash();
            for (n, output) in tx.outputs.iter().enumerate() {
                if output.script_pubkey == self.script {
                    self.coins.push(OutPoint::new(tx_hash, n as u32));
                }
            }
        }
    }

    /// Proof-of-work block on top of `tip` paying `reward` to this staker
    pub fn assemble_work_block(&self, tip: &BlockMetadata, time: u32, reward: i64) -> Block {
        let coinbase = Transaction::coinbase(tip.height + 1, reward, self.script.clone());
        let header = BlockHeader::new(tip.block_hash, Hash256::zero(), time, GENESIS_BITS, 0);
        Block::new(header, vec![coinbase])
    }

    /// Proof-of-stake block on top of `tip` spending `coin` back to this staker
    pub fn assemble_stake_block(&self, tip: &BlockMetadata, coin: OutPoint, value: i64, time: u32) -> Block {
        let mut coinstake = Transaction::new(
            vec![TxIn::new(coin)],
            vec![TxOut::empty(), TxOut::new(value, self.script.clone())],
        );
        let signed = sign_input(&mut coinstake, 0, &self.key);
        debug_assert!(signed, "coinstake has a kernel input");

        let coinbase = Transaction::coinbase(tip.height + 1, 0, Script::default());
        let header = BlockHeader::new(tip.block_hash, Hash256::zero(), time, GENESIS_BITS, 0);
        Block::new(header, vec![coinbase, coinstake])
    }

    /// Search every mature coin for a kernel at `time` or up to the hash
    /// drift before it.
    ///
    /// A found block is run through the validator before it is returned:
    /// a timestamp found by the search can carry a smaller time weight
    /// than the one it was found with.
    pub fn stake_block<F: NetworkFlags>(
        &self,
        chain: &MemoryChain,
        flags: &F,
        time: u32,
    ) -> Result<StakeResult, KernelError> {
        let Some(tip) = chain.tip() else {
            return Ok(StakeResult::NoStake);
        };
        let params = chain.params();
        let validator = ProofOfStakeValidator::new(chain, chain, &SchnorrScriptVerifier, flags, params);

        for coin in &self.coins {
            let (Some(output), Some(from_hash)) = (chain.prev_output(coin), chain.confirmation_block(&coin.hash)) else {
                continue;
            };
            let Some(block_from) = chain.block_by_hash(&from_hash) else {
                continue;
            };
            if check_stake_age(block_from.timestamp, time, params).is_err() {
                continue;
            }

            let protocol = KernelProtocol::for_block(chain, tip, &from_hash, params)?;
            let stake = StakeCandidate {
                outpoint: *coin,
                value: output.value,
                block_from_time: block_from.timestamp,
            };
            let mode = KernelMode::Search {
                hash_drift: params.hash_drift,
                cancel: self.stop_signal.as_ref(),
            };
            let outcome = match protocol.check(GENESIS_BITS, &stake, time, mode, params) {
                Ok(outcome) => outcome,
                Err(KernelError::SearchCancelled { attempts }) => {
                    debug!(attempts, "Stake search interrupted");
                    return Ok(StakeResult::Interrupted);
                }
                Err(e) => return Err(e),
            };
            if !outcome.accepted {
                continue;
            }

            let block = self.assemble_stake_block(tip, *coin, output.value, outcome.proof.timestamp);
            match validator.check(&block) {
                Ok(_) => return Ok(StakeResult::Success(block)),
                Err(e) => debug!(coin = %coin, error = %e, "Found kernel does not validate"),
            }
        }
        Ok(StakeResult::NoStake)
    }
}
