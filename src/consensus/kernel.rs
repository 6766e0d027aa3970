//! Stake kernel hashing
//!
//! A coin may stake a block when the hash of its kernel falls under a
//! target scaled by the coin's value (and, under V2, by its age). V2 and V3
//! differ in the modifier they hash, the field order of the kernel, the
//! target weighting and the comparison at the boundary.

use primitive_types::U256;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use super::modifier::kernel_stake_modifier;
use super::target::decode_compact;
use crate::chain::{BlockMetadata, ChainParams, ChainView};
use crate::constants::COIN_DAY_WEIGHT_DIVISOR;
use crate::crypto::{Hash256, HashWriter};
use crate::error::{KernelError, ModifierError, Result};
use crate::validation::OutPoint;

/// Cooperative cancellation for the stake search.
///
/// Block production sets it when the active tip moves; the search polls
/// it before every attempt.
pub trait CancelToken {
    fn is_cancelled(&self) -> bool;
}

impl CancelToken for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

impl<F: Fn() -> bool> CancelToken for F {
    fn is_cancelled(&self) -> bool {
        self()
    }
}

/// How a V2 kernel is evaluated
#[derive(Clone, Copy)]
pub enum KernelMode<'a> {
    /// Validate a single timestamp
    Check,
    /// Try `timestamp - i` for `i in 0..hash_drift`, first hit wins
    Search {
        hash_drift: u32,
        cancel: &'a dyn CancelToken,
    },
}

impl std::fmt::Debug for KernelMode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KernelMode::Check => f.write_str("Check"),
            KernelMode::Search { hash_drift, .. } => f.debug_struct("Search").field("hash_drift", hash_drift).finish(),
        }
    }
}

/// The staked coin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StakeCandidate {
    pub outpoint: OutPoint,
    pub value: i64,
    /// Timestamp of the block that confirmed the coin
    pub block_from_time: u32,
}

/// Kernel hash and the timestamp it was computed at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelProof {
    pub hash: Hash256,
    pub timestamp: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelOutcome {
    pub accepted: bool,
    pub proof: KernelProof,
}

/// Kernel protocol in force for a block, with the modifier it hashes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelProtocol {
    V2 { modifier: u64 },
    V3 { modifier: Hash256 },
}

impl KernelProtocol {
    /// Protocol and modifier for a block built on `prev` staking a coin
    /// confirmed in `block_from`.
    pub fn for_block<C: ChainView>(
        chain: &C,
        prev: &BlockMetadata,
        block_from: &Hash256,
        params: &ChainParams,
    ) -> std::result::Result<Self, ModifierError> {
        let height = prev.height + 1;
        if params.is_witness_enabled(height) {
            return Ok(KernelProtocol::V3 {
                modifier: prev.stake_modifier_v3,
            });
        }
        let found = kernel_stake_modifier(chain, block_from, height, params)?;
        debug!(
            modifier = found.modifier,
            height = found.height,
            time = found.time,
            "Using kernel stake modifier"
        );
        Ok(KernelProtocol::V2 {
            modifier: found.modifier,
        })
    }

    /// Evaluate the kernel. V3 ignores `mode` and checks `timestamp` only.
    pub fn check(
        &self,
        bits: u32,
        stake: &StakeCandidate,
        timestamp: u32,
        mode: KernelMode<'_>,
        params: &ChainParams,
    ) -> Result<KernelOutcome> {
        match self {
            KernelProtocol::V2 { modifier } => check_kernel_hash_v2(bits, stake, timestamp, *modifier, mode, params),
            KernelProtocol::V3 { modifier } => check_kernel_hash_v3(bits, stake, timestamp, modifier, params),
        }
    }
}

/// Ordering and minimum-age checks shared by both protocols
pub fn check_stake_age(block_from_time: u32, timestamp: u32, params: &ChainParams) -> Result<()> {
    if timestamp < block_from_time {
        return Err(KernelError::TimestampViolation {
            block_from_time,
            timestamp,
        });
    }
    if i64::from(block_from_time) + params.stake_min_age > i64::from(timestamp) {
        return Err(KernelError::MinAgeViolation {
            block_from_time,
            min_age: params.stake_min_age,
            timestamp,
        });
    }
    Ok(())
}

/// `Hash(modifier || block_from_time || prevout.n || prevout.hash || timestamp)`
pub fn stake_hash_v2(modifier: u64, block_from_time: u32, outpoint: &OutPoint, timestamp: u32) -> Hash256 {
    let mut writer = HashWriter::new();
    writer
        .write_u64(modifier)
        .write_u32(block_from_time)
        .write_u32(outpoint.n)
        .write_hash(&outpoint.hash)
        .write_u32(timestamp);
    writer.finish()
}

/// `Hash(modifier || block_from_time || prevout.hash || prevout.n || timestamp)`
pub fn stake_hash_v3(modifier: &Hash256, block_from_time: u32, outpoint: &OutPoint, timestamp: u32) -> Hash256 {
    let mut writer = HashWriter::new();
    writer
        .write_hash(modifier)
        .write_u32(block_from_time)
        .write_hash(&outpoint.hash)
        .write_u32(outpoint.n)
        .write_u32(timestamp);
    writer.finish()
}

/// Coin-day weight: `value * time_weight / coin / 400`, truncating
pub fn coin_day_weight(value: i64, time_weight: i64, coin: i64) -> U256 {
    U256::from(value as u64) * U256::from(time_weight as u64) / U256::from(coin as u64) / U256::from(COIN_DAY_WEIGHT_DIVISOR)
}

/// V2 target: coin-day weight times the decoded target, wrapping at 2^256
pub fn weighted_target_v2(bits: u32, value: i64, time_weight: i64, coin: i64) -> U256 {
    coin_day_weight(value, time_weight, coin)
        .overflowing_mul(decode_compact(bits))
        .0
}

/// V3 target: decoded target times the coin value, wrapping at 2^256
pub fn weighted_target_v3(bits: u32, value: i64) -> U256 {
    decode_compact(bits).overflowing_mul(U256::from(value as u64)).0
}

/// V2 acceptance is strict
pub fn meets_target_v2(hash: &Hash256, target: U256) -> bool {
    hash.to_u256() < target
}

/// V3 acceptance includes the boundary
pub fn meets_target_v3(hash: &Hash256, target: U256) -> bool {
    hash.to_u256() <= target
}

/// Evaluate a V2 kernel.
///
/// The time weight is fixed by `timestamp` even when searching earlier
/// timestamps. A search that finds nothing returns the last attempt.
pub fn check_kernel_hash_v2(
    bits: u32,
    stake: &StakeCandidate,
    timestamp: u32,
    modifier: u64,
    mode: KernelMode<'_>,
    params: &ChainParams,
) -> Result<KernelOutcome> {
    check_stake_age(stake.block_from_time, timestamp, params)?;

    let time_weight = (i64::from(timestamp) - i64::from(stake.block_from_time))
        .min(params.stake_max_age - params.stake_min_age);
    let target = weighted_target_v2(bits, stake.value, time_weight, params.coin);
    let attempt = |try_time: u32| {
        let hash = stake_hash_v2(modifier, stake.block_from_time, &stake.outpoint, try_time);
        KernelOutcome {
            accepted: meets_target_v2(&hash, target),
            proof: KernelProof {
                hash,
                timestamp: try_time,
            },
        }
    };

    let (hash_drift, cancel) = match mode {
        KernelMode::Check => return Ok(attempt(timestamp)),
        KernelMode::Search { hash_drift, cancel } => (hash_drift, cancel),
    };

    let mut last = KernelOutcome {
        accepted: false,
        proof: KernelProof {
            hash: Hash256::zero(),
            timestamp,
        },
    };
    for i in 0..hash_drift {
        if cancel.is_cancelled() {
            return Err(KernelError::SearchCancelled { attempts: i });
        }
        let Some(try_time) = timestamp.checked_sub(i) else {
            break;
        };
        last = attempt(try_time);
        if last.accepted {
            debug!(
                modifier,
                block_from_time = stake.block_from_time,
                prevout = %stake.outpoint,
                timestamp = try_time,
                hash = %last.proof.hash,
                "Stake kernel found"
            );
            break;
        }
    }
    Ok(last)
}

/// Evaluate a V3 kernel at exactly `timestamp`
pub fn check_kernel_hash_v3(
    bits: u32,
    stake: &StakeCandidate,
    timestamp: u32,
    modifier: &Hash256,
    params: &ChainParams,
) -> Result<KernelOutcome> {
    check_stake_age(stake.block_from_time, timestamp, params)?;

    let target = weighted_target_v3(bits, stake.value);
    let hash = stake_hash_v3(modifier, stake.block_from_time, &stake.outpoint, timestamp);
    Ok(KernelOutcome {
        accepted: meets_target_v3(&hash, target),
        proof: KernelProof { hash, timestamp },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::COIN;
    use std::cell::Cell;

    /// Target `0xffff << 240`, passes nearly every hash at weight 1
    const EASY_BITS: u32 = 0x2100_ffff;

    fn stake(value: i64, block_from_time: u32) -> StakeCandidate {
        StakeCandidate {
            outpoint: OutPoint::new(Hash256([3u8; 32]), 1),
            value,
            block_from_time,
        }
    }

    #[test]
    fn test_age_checks() {
        let params = ChainParams::regtest();
        assert_eq!(
            check_stake_age(1_000, 999, &params).unwrap_err(),
            KernelError::TimestampViolation { block_from_time: 1_000, timestamp: 999 }
        );
        assert_eq!(
            check_stake_age(1_000, 1_599, &params).unwrap_err(),
            KernelError::MinAgeViolation { block_from_time: 1_000, min_age: 600, timestamp: 1_599 }
        );
        check_stake_age(1_000, 1_600, &params).unwrap();
    }

    #[test]
    fn test_v2_and_v3_field_order_differ() {
        let outpoint = OutPoint::new(Hash256([8u8; 32]), 2);
        let mut v2 = HashWriter::new();
        v2.write_u64(5).write_u32(10).write_u32(2).write_hash(&outpoint.hash).write_u32(20);
        assert_eq!(stake_hash_v2(5, 10, &outpoint, 20), v2.finish());

        let modifier = Hash256([6u8; 32]);
        let mut v3 = HashWriter::new();
        v3.write_hash(&modifier).write_u32(10).write_hash(&outpoint.hash).write_u32(2).write_u32(20);
        assert_eq!(stake_hash_v3(&modifier, 10, &outpoint, 20), v3.finish());
    }

    #[test]
    fn test_coin_day_weight_truncates_before_target() {
        // 1 coin for 399 seconds truncates to zero weight
        assert_eq!(coin_day_weight(COIN, 399, COIN), U256::zero());
        assert_eq!(coin_day_weight(COIN, 400, COIN), U256::one());
        assert_eq!(weighted_target_v2(EASY_BITS, COIN, 399, COIN), U256::zero());
        assert_eq!(weighted_target_v2(EASY_BITS, COIN, 800, COIN), decode_compact(EASY_BITS) * U256::from(2u64));
    }

    #[test]
    fn test_targets_wrap() {
        // 0xffff << 240 times 2^16 overflows to zero
        assert_eq!(weighted_target_v3(EASY_BITS, 1 << 16), U256::zero());
    }

    #[test]
    fn test_boundary_comparison() {
        let hash = Hash256::from_u256(U256::from(1_000u64));
        let target = U256::from(1_000u64);
        assert!(!meets_target_v2(&hash, target));
        assert!(meets_target_v3(&hash, target));
        assert!(meets_target_v2(&hash, target + U256::one()));
        assert!(!meets_target_v3(&hash, target - U256::one()));
    }

    #[test]
    fn test_v2_check_at_easy_target() {
        let params = ChainParams::regtest();
        let outcome = check_kernel_hash_v2(EASY_BITS, &stake(10 * COIN, 1_000), 1_600, 9, KernelMode::Check, &params).unwrap();
        assert_eq!(outcome.proof.timestamp, 1_600);
        assert_eq!(outcome.proof.hash, stake_hash_v2(9, 1_000, &stake(0, 0).outpoint, 1_600));
        assert_eq!(
            outcome.accepted,
            meets_target_v2(&outcome.proof.hash, weighted_target_v2(EASY_BITS, 10 * COIN, 600, COIN))
        );
    }

    #[test]
    fn test_v2_zero_weight_never_passes() {
        let params = ChainParams::regtest();
        let outcome = check_kernel_hash_v2(EASY_BITS, &stake(1, 1_000), 1_600, 9, KernelMode::Check, &params).unwrap();
        assert!(!outcome.accepted);
    }

    #[test]
    fn test_search_tries_earlier_timestamps() {
        let params = ChainParams::regtest();
        let never = AtomicBool::new(false);
        let mode = KernelMode::Search { hash_drift: 5, cancel: &never };
        // Zero weight: every attempt fails, the last one is at timestamp - 4
        let outcome = check_kernel_hash_v2(EASY_BITS, &stake(1, 1_000), 2_000, 9, mode, &params).unwrap();
        assert!(!outcome.accepted);
        assert_eq!(outcome.proof.timestamp, 1_996);
    }

    #[test]
    fn test_search_stops_at_first_hit() {
        let params = ChainParams::regtest();
        let never = AtomicBool::new(false);
        let mode = KernelMode::Search { hash_drift: 45, cancel: &never };
        // 0.4 coin at full age has weight 1
        let value = 4 * COIN / 10;
        let outcome = check_kernel_hash_v2(EASY_BITS, &stake(value, 1_000), 2_000, 9, mode, &params).unwrap();
        let first_hit = (0..45)
            .map(|i| 2_000 - i)
            .find(|&t| {
                let hash = stake_hash_v2(9, 1_000, &stake(0, 0).outpoint, t);
                meets_target_v2(&hash, weighted_target_v2(EASY_BITS, value, 1_000, COIN))
            })
            .unwrap();
        assert!(outcome.accepted);
        assert_eq!(outcome.proof.timestamp, first_hit);
    }

    #[test]
    fn test_search_honours_cancellation() {
        let params = ChainParams::regtest();
        let polls = Cell::new(0u32);
        let cancel = || {
            polls.set(polls.get() + 1);
            polls.get() > 3
        };
        let mode = KernelMode::Search { hash_drift: 45, cancel: &cancel };
        let err = check_kernel_hash_v2(EASY_BITS, &stake(1, 1_000), 2_000, 9, mode, &params).unwrap_err();
        assert_eq!(err, KernelError::SearchCancelled { attempts: 3 });
    }

    #[test]
    fn test_v3_ignores_age_weight() {
        let params = ChainParams::regtest();
        let modifier = Hash256([1u8; 32]);
        let young = check_kernel_hash_v3(0x1f00_ffff, &stake(65_536, 1_000), 1_600, &modifier, &params).unwrap();
        let target = weighted_target_v3(0x1f00_ffff, 65_536);
        assert_eq!(young.accepted, meets_target_v3(&young.proof.hash, target));
        assert_eq!(young.proof.timestamp, 1_600);
    }

    #[test]
    fn test_protocol_dispatch() {
        let params = ChainParams::regtest();
        let modifier = Hash256([1u8; 32]);
        let v3 = KernelProtocol::V3 { modifier };
        let never = AtomicBool::new(true);
        // V3 has no search: a set cancel flag is not consulted
        let mode = KernelMode::Search { hash_drift: 10, cancel: &never };
        let outcome = v3.check(0x1f00_ffff, &stake(65_536, 1_000), 1_700, mode, &params).unwrap();
        assert_eq!(outcome.proof.hash, stake_hash_v3(&modifier, 1_000, &stake(0, 0).outpoint, 1_700));
    }
}
