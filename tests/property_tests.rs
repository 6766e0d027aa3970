//! Property-based tests for the kernel arithmetic
//!
//! These tests verify invariants hold under random inputs.

use primitive_types::U256;
use proptest::prelude::*;

use divi_kernel::chain::{BlockMetadata, ChainParams};
use divi_kernel::consensus::{
    check_stake_age, decode_compact, encode_compact, meets_target_v2, meets_target_v3, selection_hash,
    selection_interval, selection_interval_section, stake_hash_v2, stake_hash_v3, weighted_target_v2,
};
use divi_kernel::constants::{COIN, MODIFIER_SELECTION_ROUNDS};
use divi_kernel::crypto::Hash256;
use divi_kernel::validation::OutPoint;
use divi_kernel::KernelError;

fn hash() -> impl Strategy<Value = Hash256> {
    any::<[u8; 32]>().prop_map(Hash256)
}

proptest! {
    /// No selection section is shorter than the one before it
    #[test]
    fn prop_sections_increase(interval in 64i64..10_000_000) {
        for round in 1..MODIFIER_SELECTION_ROUNDS {
            prop_assert!(
                selection_interval_section(round, interval) >= selection_interval_section(round - 1, interval)
            );
        }
        prop_assert_eq!(selection_interval_section(MODIFIER_SELECTION_ROUNDS - 1, interval), interval);
    }

    /// The selection interval spans between a third of and the full modifier interval per round
    #[test]
    fn prop_selection_interval_bounds(interval in 3i64..10_000_000) {
        let total = selection_interval(interval);
        let rounds = MODIFIER_SELECTION_ROUNDS as i64;
        prop_assert!(total >= rounds * (interval / 3));
        prop_assert!(total <= rounds * interval);
    }

    /// Canonical compact targets survive decode then encode
    #[test]
    fn prop_canonical_compact_is_stable(size in 3u32..=32, mantissa in 0x01_0000u32..=0x7f_ffff) {
        let compact = (size << 24) | mantissa;
        prop_assert_eq!(encode_compact(decode_compact(compact)), compact);
    }

    /// Encoding rounds down and never loses more than the mantissa precision
    #[test]
    fn prop_encode_rounds_down(bytes in any::<[u8; 32]>()) {
        let target = U256::from_little_endian(&bytes) >> 1;
        let rounded = decode_compact(encode_compact(target));
        prop_assert!(rounded <= target);
        if target.bits() > 24 {
            prop_assert!(target - rounded < U256::one() << (target.bits() - 15));
        }
    }

    /// More value or more age never lowers the V2 target below the wrap point
    #[test]
    fn prop_v2_target_monotonic(
        value in 0i64..10_000_000 * COIN,
        extra_value in 0i64..COIN * 1_000,
        time_weight in 0i64..1_000_000,
        extra_time in 0i64..10_000,
    ) {
        let bits = 0x1b00_ffff;
        let base = weighted_target_v2(bits, value, time_weight, COIN);
        prop_assert!(weighted_target_v2(bits, value + extra_value, time_weight, COIN) >= base);
        prop_assert!(weighted_target_v2(bits, value, time_weight + extra_time, COIN) >= base);
    }

    /// V2 rejects a hash equal to its target, V3 accepts it
    #[test]
    fn prop_boundary_asymmetry(h in hash()) {
        let target = h.to_u256();
        prop_assert!(!meets_target_v2(&h, target));
        prop_assert!(meets_target_v3(&h, target));
    }

    /// Selection hashes are a pure function of block and modifier
    #[test]
    fn prop_selection_hash_deterministic(h in hash(), prev_modifier in any::<u64>(), stake in any::<bool>()) {
        let mut block = BlockMetadata::new(10, 1_000, h, Hash256::zero());
        if stake {
            block = block.with_stake(OutPoint::new(Hash256([1u8; 32]), 0), Hash256::zero());
        }
        prop_assert_eq!(
            selection_hash(&block, prev_modifier, true),
            selection_hash(&block.clone(), prev_modifier, true)
        );
        if stake {
            prop_assert!(selection_hash(&block, prev_modifier, true) < U256::one() << 224);
        }
    }

    /// Kernel hashes commit to the timestamp
    #[test]
    fn prop_kernel_hash_binds_timestamp(
        tx in hash(),
        n in any::<u32>(),
        modifier in any::<u64>(),
        from_time in any::<u32>(),
        time in 0u32..u32::MAX,
    ) {
        let outpoint = OutPoint::new(tx, n);
        prop_assert_ne!(
            stake_hash_v2(modifier, from_time, &outpoint, time),
            stake_hash_v2(modifier, from_time, &outpoint, time + 1)
        );
        let v3_modifier = Hash256::from_bytes(tx.0);
        prop_assert_ne!(
            stake_hash_v3(&v3_modifier, from_time, &outpoint, time),
            stake_hash_v3(&v3_modifier, from_time, &outpoint, time + 1)
        );
    }

    /// Stake age accepts exactly the timestamps at least the minimum age after confirmation
    #[test]
    fn prop_stake_age(from_time in 0u32..2_000_000_000, offset in -2_000i64..2_000) {
        let params = ChainParams::regtest();
        let timestamp = (i64::from(from_time) + offset).max(0) as u32;
        let result = check_stake_age(from_time, timestamp, &params);
        match i64::from(timestamp) - i64::from(from_time) {
            age if age < 0 => prop_assert!(
                matches!(result, Err(KernelError::TimestampViolation { .. })),
                "expected timestamp violation"
            ),
            age if age < params.stake_min_age => prop_assert!(
                matches!(result, Err(KernelError::MinAgeViolation { .. })),
                "expected min age violation"
            ),
            _ => prop_assert!(result.is_ok()),
        }
    }
}

#[test]
fn test_v2_weight_truncates_to_zero() {
    // Under one coin-day-weight unit the target collapses to zero
    assert_eq!(weighted_target_v2(0x1d00_ffff, COIN, 399, COIN), U256::zero());
    assert_eq!(weighted_target_v2(0x1d00_ffff, COIN, 400, COIN), decode_compact(0x1d00_ffff));
}
