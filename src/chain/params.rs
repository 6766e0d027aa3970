//! Chain parameters
//!
//! Network-specific staking parameters. Presets exist for mainnet, testnet
//! and regtest; private networks load a JSON document with the same shape.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::constants::{COIN, DEFAULT_HASH_DRIFT, MODIFIER_INTERVAL, MODIFIER_INTERVAL_TESTNET};
use crate::error::ConfigError;

/// Network identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

/// What to do when a modifier checksum disagrees with a hard checkpoint.
///
/// Historical nodes only logged the mismatch. Enforcing it changes which
/// chains are accepted, so it is opt-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointPolicy {
    #[default]
    Advisory,
    Enforce,
}

/// Staking consensus parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainParams {
    pub network: Network,
    /// Minimum coin age before it may stake (seconds)
    pub stake_min_age: i64,
    /// Age at which the V2 time weight stops growing (seconds)
    pub stake_max_age: i64,
    /// Length of one modifier bucket (seconds)
    pub modifier_interval: i64,
    /// Height from which the selection hash always uses the block hash
    pub modifier_update_height: u32,
    /// Height from which V3 modifiers and kernels apply
    pub witness_activation_height: u32,
    /// Minimum value one stake input must carry when enforced
    pub min_staking_amount: i64,
    pub max_kernel_combined_inputs: usize,
    /// Seconds searched backwards by block production
    #[serde(default = "default_hash_drift")]
    pub hash_drift: u32,
    #[serde(default = "default_coin")]
    pub coin: i64,
    #[serde(default)]
    pub checkpoint_policy: CheckpointPolicy,
    /// Height -> required stake modifier checksum
    #[serde(default)]
    pub modifier_checkpoints: BTreeMap<u32, u32>,
}

fn default_hash_drift() -> u32 {
    DEFAULT_HASH_DRIFT
}

fn default_coin() -> i64 {
    COIN
}

impl ChainParams {
    pub fn mainnet() -> Self {
        Self {
            network: Network::Mainnet,
            stake_min_age: 60 * 60,
            stake_max_age: 60 * 60 * 24 * 7,
            modifier_interval: MODIFIER_INTERVAL,
            modifier_update_height: 0,
            witness_activation_height: 1_000_000,
            min_staking_amount: 10_000 * COIN,
            max_kernel_combined_inputs: 20,
            hash_drift: DEFAULT_HASH_DRIFT,
            coin: COIN,
            checkpoint_policy: CheckpointPolicy::Advisory,
            modifier_checkpoints: BTreeMap::from([(0, 0xfd11_f4e7)]),
        }
    }

    /// Testnet has a 20 minute modifier interval and no checkpoints
    pub fn testnet() -> Self {
        Self {
            network: Network::Testnet,
            modifier_interval: MODIFIER_INTERVAL_TESTNET,
            witness_activation_height: 100_000,
            modifier_checkpoints: BTreeMap::new(),
            ..Self::mainnet()
        }
    }

    /// Short ages and a one-minute modifier interval for local chains
    pub fn regtest() -> Self {
        Self {
            network: Network::Regtest,
            stake_min_age: 600,
            stake_max_age: 1_600,
            modifier_interval: 60,
            modifier_update_height: 0,
            witness_activation_height: 500,
            min_staking_amount: 10 * COIN,
            max_kernel_combined_inputs: 20,
            hash_drift: DEFAULT_HASH_DRIFT,
            coin: COIN,
            checkpoint_policy: CheckpointPolicy::Advisory,
            modifier_checkpoints: BTreeMap::new(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.modifier_interval <= 0 {
            return Err(ConfigError::Invalid("modifier_interval must be positive".into()));
        }
        if self.stake_min_age < 0 || self.stake_max_age < self.stake_min_age {
            return Err(ConfigError::Invalid(format!(
                "stake ages out of order: min {} max {}",
                self.stake_min_age, self.stake_max_age
            )));
        }
        if self.max_kernel_combined_inputs == 0 {
            return Err(ConfigError::Invalid("max_kernel_combined_inputs must be at least 1".into()));
        }
        if self.coin <= 0 {
            return Err(ConfigError::Invalid("coin must be positive".into()));
        }
        Ok(())
    }

    /// Whether V3 modifier and kernel rules apply at `height`
    pub fn is_witness_enabled(&self, height: u32) -> bool {
        height >= self.witness_activation_height
    }

    /// Checksum a block at `height` must carry, if checkpointed
    pub fn modifier_checkpoint(&self, height: u32) -> Option<u32> {
        self.modifier_checkpoints.get(&height).copied()
    }
}
