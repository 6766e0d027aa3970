//! Divi proof-of-stake kernel
//!
//! Deterministic stake-modifier derivation, kernel hashing and coinstake
//! validation. Every node must reach bit-identical answers from the same
//! chain state, so everything here is a pure function of the chain view
//! passed in.

pub mod chain;
pub mod consensus;
pub mod crypto;
pub mod error;
pub mod node;
pub mod validation;

pub use error::{ChainError, ConfigError, KernelError, ModifierError, Result};

/// Protocol constants - consensus critical, shared by every network
pub mod constants {
    /// Atomic units per coin
    pub const COIN: i64 = 100_000_000;

    /// Modifier interval on mainnet (seconds) - a new V2 modifier at most every 3 hours
    pub const MODIFIER_INTERVAL: i64 = 60 * 60 * 3;

    /// Modifier interval on testnet (seconds)
    pub const MODIFIER_INTERVAL_TESTNET: i64 = 60 * 20;

    /// Ratio of group interval length between the last group and the first group
    pub const MODIFIER_INTERVAL_RATIO: i64 = 3;

    /// Number of selection rounds (one entropy bit each) in a V2 modifier
    pub const MODIFIER_SELECTION_ROUNDS: usize = 64;

    /// Modifier handed to the first block after genesis
    pub const FIRST_BLOCK_STAKE_MODIFIER: u64 = 8_093_378;

    /// Target spacing between stake blocks (seconds)
    pub const STAKE_TARGET_SPACING: i64 = 60;

    /// Divisor applied to the coin-day weight of a V2 kernel
    pub const COIN_DAY_WEIGHT_DIVISOR: u64 = 400;

    /// Number of seconds searched backwards by the V2 stake search
    pub const DEFAULT_HASH_DRIFT: u32 = 45;
}
