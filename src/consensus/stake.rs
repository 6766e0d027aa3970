//! Proof-of-stake block validation
//!
//! Entry point called during block acceptance. Resolves the staked coin
//! through the transaction index, applies the combined-input and minimum
//! stake rules, verifies the kernel input's script, and hands the kernel to
//! the protocol in force at the block's height.

use tracing::{debug, instrument};

use super::kernel::{KernelMode, KernelProof, KernelProtocol, StakeCandidate};
use crate::chain::{ChainParams, ChainView, NetworkFlags, TxIndex};
use crate::error::{KernelError, Result};
use crate::validation::{Block, Script, ScriptVerifier, Transaction};

/// Stateless validator over a consistent snapshot of its collaborators
pub struct ProofOfStakeValidator<'a, C, X, V, F> {
    chain: &'a C,
    txs: &'a X,
    scripts: &'a V,
    flags: &'a F,
    params: &'a ChainParams,
}

impl<'a, C, X, V, F> ProofOfStakeValidator<'a, C, X, V, F>
where
    C: ChainView,
    X: TxIndex,
    V: ScriptVerifier,
    F: NetworkFlags,
{
    pub fn new(chain: &'a C, txs: &'a X, scripts: &'a V, flags: &'a F, params: &'a ChainParams) -> Self {
        Self {
            chain,
            txs,
            scripts,
            flags,
            params,
        }
    }

    /// Check the stake kernel of `block` against its declared timestamp.
    ///
    /// `block` must build on a block already in the chain index. Returns
    /// the kernel proof on success.
    #[instrument(skip_all, fields(block = %block.hash()))]
    pub fn check(&self, block: &Block) -> Result<KernelProof> {
        let coinstake = match block.transactions.get(1) {
            Some(tx) if tx.is_coinstake() => tx,
            Some(tx) => return Err(KernelError::NotCoinstake(tx.hash())),
            None => return Err(KernelError::NotCoinstake(block.hash())),
        };
        let max = self.params.max_kernel_combined_inputs;
        if coinstake.inputs.len() > max {
            return Err(KernelError::TooManyStakeInputs {
                got: coinstake.inputs.len(),
                max,
            });
        }

        let prev = self
            .chain
            .block_by_hash(&block.header.prev_hash)
            .ok_or(KernelError::MissingBlock(block.header.prev_hash))?;
        let height = prev.height + 1;

        // Kernel coin
        let kernel_in = &coinstake.inputs[0];
        let kernel_out = self
            .txs
            .prev_output(&kernel_in.prevout)
            .ok_or(KernelError::MissingPrevout(kernel_in.prevout))?;

        self.check_stake_inputs(coinstake, &kernel_out.script_pubkey, height)?;

        if !self.scripts.verify(
            &kernel_in.script_sig,
            &kernel_out.script_pubkey,
            coinstake,
            0,
            kernel_out.value,
        ) {
            return Err(KernelError::ScriptVerificationFailed(coinstake.hash()));
        }

        let from_hash = self
            .txs
            .confirmation_block(&kernel_in.prevout.hash)
            .ok_or(KernelError::MissingConfirmation(kernel_in.prevout.hash))?;
        let block_from = self
            .chain
            .block_by_hash(&from_hash)
            .ok_or(KernelError::MissingBlock(from_hash))?;

        let protocol = KernelProtocol::for_block(self.chain, prev, &from_hash, self.params)?;
        let stake = StakeCandidate {
            outpoint: kernel_in.prevout,
            value: kernel_out.value,
            block_from_time: block_from.timestamp,
        };
        let outcome = protocol.check(block.header.bits, &stake, block.header.time, KernelMode::Check, self.params)?;
        if !outcome.accepted {
            return Err(KernelError::KernelCheckFailed(outcome.proof.hash));
        }

        debug!(
            height,
            ?protocol,
            block_from = block_from.height,
            prevout = %stake.outpoint,
            hash = %outcome.proof.hash,
            "Stake kernel accepted"
        );
        Ok(outcome.proof)
    }

    /// Every input must spend an output locked by `kernel_script`, and at
    /// least one resolvable input must reach the minimum stake when the
    /// minimum applies at `height`.
    fn check_stake_inputs(&self, coinstake: &Transaction, kernel_script: &Script, height: u32) -> Result<()> {
        let mut valid = 0;
        let mut has_min_stake = false;
        for input in &coinstake.inputs {
            let Some(output) = self.txs.prev_output(&input.prevout) else {
                continue;
            };
            if output.value >= self.params.min_staking_amount {
                has_min_stake = true;
            }
            if output.script_pubkey == *kernel_script {
                valid += 1;
            }
        }

        let total = coinstake.inputs.len();
        if valid != total {
            return Err(KernelError::MismatchedStakeInputs { total, valid });
        }
        if !has_min_stake && self.flags.min_stake_amount_enforced(height) {
            return Err(KernelError::InsufficientStakeAmount(self.params.min_staking_amount));
        }
        Ok(())
    }
}
