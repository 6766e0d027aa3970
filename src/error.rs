//! Error types for kernel validation and modifier computation.

use thiserror::Error;

use crate::crypto::Hash256;
use crate::validation::OutPoint;

/// Stake-modifier computation errors.
///
/// These signal a broken chain index rather than a bad block: on a
/// well-formed chain none of them can occur.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModifierError {
    /// A block referenced by the chain walk is not indexed.
    #[error("block {0} not found in chain index")]
    MissingBlock(Hash256),

    /// No ancestor, genesis included, generated a modifier.
    #[error("no stake modifier generated at or before block {0}")]
    NoGeneratedModifier(Hash256),

    /// A selection round had no eligible candidate.
    #[error("unable to select block at round {round}")]
    SelectionExhausted { round: usize },

    /// Modifier checksum disagrees with a hard checkpoint (enforcing policy only).
    #[error("stake modifier checkpoint mismatch at height {height}: got {got:#010x}, expected {expected:#010x}")]
    CheckpointMismatch { height: u32, got: u32, expected: u32 },
}

/// Proof-of-stake validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// Block carries no coinstake in second position.
    #[error("called on non-coinstake transaction {0}")]
    NotCoinstake(Hash256),

    /// Coinstake combines more inputs than allowed.
    #[error("invalid amount of stake inputs, current: {got}, max: {max}")]
    TooManyStakeInputs { got: usize, max: usize },

    /// A spent output is unknown to the transaction index.
    #[error("previous output {0} not found")]
    MissingPrevout(OutPoint),

    /// The kernel coin's transaction has no confirming block in the index.
    #[error("no confirmation block for transaction {0}")]
    MissingConfirmation(Hash256),

    /// Some stake inputs are not paid to the kernel's script.
    #[error("invalid inputs for stake, total inputs: {total} vs valid inputs {valid}")]
    MismatchedStakeInputs { total: usize, valid: usize },

    /// No input reaches the minimum staking amount.
    #[error("amount of stake less than the required minimum of {0}")]
    InsufficientStakeAmount(i64),

    /// Kernel input signature/script rejected.
    #[error("script verification failed on coinstake {0}")]
    ScriptVerificationFailed(Hash256),

    /// Confirmation or parent block not indexed.
    #[error("block {0} not found in chain index")]
    MissingBlock(Hash256),

    /// Stake timestamp precedes the coin's confirmation time.
    #[error("nTime violation: timestamp {timestamp} precedes block-from time {block_from_time}")]
    TimestampViolation { block_from_time: u32, timestamp: u32 },

    /// Coin has not reached the minimum stake age.
    #[error("min age violation - block_from_time={block_from_time} stake_min_age={min_age} timestamp={timestamp}")]
    MinAgeViolation {
        block_from_time: u32,
        min_age: i64,
        timestamp: u32,
    },

    /// Kernel hash does not meet the weighted target.
    #[error("check kernel failed, hash_proof={0}")]
    KernelCheckFailed(Hash256),

    /// Stake search was cancelled (active tip changed).
    #[error("stake search cancelled after {attempts} attempts")]
    SearchCancelled { attempts: u32 },

    /// Stake modifier lookup failed.
    #[error(transparent)]
    Modifier(#[from] ModifierError),
}

/// In-memory chain index errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// Block does not extend the active tip.
    #[error("block {block} does not extend tip {tip}")]
    NotExtendingTip { block: Hash256, tip: Hash256 },

    /// Block is already indexed.
    #[error("block {0} already indexed")]
    Duplicate(Hash256),

    /// Proof-of-stake check rejected the block.
    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Modifier(#[from] ModifierError),
}

/// Chain parameter loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read chain parameters: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse chain parameters: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid chain parameters: {0}")]
    Invalid(String),
}

/// Result type for kernel operations.
pub type Result<T, E = KernelError> = std::result::Result<T, E>;
