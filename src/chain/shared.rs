//! Lock-guarded chain handle
//!
//! Validation runs against a read snapshot that no tip mutation can touch;
//! connecting a block is the single writer. Acceptance holds an upgradable
//! read across validation so the snapshot it validated against is exactly
//! the one it extends.

use parking_lot::{RwLock, RwLockReadGuard, RwLockUpgradableReadGuard};
use std::sync::Arc;
use tracing::{info, warn};

use super::{BlockMetadata, MemoryChain, NetworkFlags};
use crate::consensus::ProofOfStakeValidator;
use crate::crypto::Hash256;
use crate::error::ChainError;
use crate::validation::{Block, ScriptVerifier};

/// Shared, thread-safe chain index
#[derive(Debug, Clone)]
pub struct SharedChain {
    inner: Arc<RwLock<MemoryChain>>,
}

impl SharedChain {
    pub fn new(chain: MemoryChain) -> Self {
        Self {
            inner: Arc::new(RwLock::new(chain)),
        }
    }

    /// Consistent read view for the duration of the guard
    pub fn snapshot(&self) -> RwLockReadGuard<'_, MemoryChain> {
        self.inner.read()
    }

    /// Connect a block without proof-of-stake checks (genesis, proof-of-work)
    pub fn connect_unchecked(&self, block: &Block) -> Result<BlockMetadata, ChainError> {
        self.inner.write().connect_block(block, Hash256::zero())
    }

    /// Validate a proof-of-stake block and connect it if the kernel holds.
    ///
    /// The connected metadata carries the winning kernel hash.
    pub fn accept_block<V, F>(&self, block: &Block, scripts: &V, flags: &F) -> Result<BlockMetadata, ChainError>
    where
        V: ScriptVerifier,
        F: NetworkFlags,
    {
        let guard = self.inner.upgradable_read();
        let proof = {
            let chain: &MemoryChain = &guard;
            let validator = ProofOfStakeValidator::new(chain, chain, scripts, flags, chain.params());
            match validator.check(block) {
                Ok(proof) => proof,
                Err(e) => {
                    warn!(block = %block.hash(), error = %e, "Proof-of-stake check failed");
                    return Err(e.into());
                }
            }
        };

        let mut chain = RwLockUpgradableReadGuard::upgrade(guard);
        let meta = chain.connect_block(block, proof.hash)?;
        info!(height = meta.height, hash = %meta.block_hash, "Accepted proof-of-stake block");
        Ok(meta)
    }
}
