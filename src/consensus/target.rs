//! Compact difficulty targets
//!
//! The 32-bit "nBits" form: one byte exponent (size in bytes), then a
//! 23-bit mantissa and a sign bit. Decoding never fails; degenerate
//! encodings simply yield a zero or truncated target.

use primitive_types::U256;
use std::fmt;

/// Compact-encoded 256-bit target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompactTarget(pub u32);

impl CompactTarget {
    /// Expand to the full 256-bit target
    pub fn decode(self) -> U256 {
        decode_compact(self.0)
    }

    /// Canonical compact form of `target` (mantissa rounded down)
    pub fn from_target(target: U256) -> Self {
        CompactTarget(encode_compact(target))
    }
}

impl fmt::Display for CompactTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Expand a compact target.
///
/// The sign bit is ignored and bits shifted past 2^256 are dropped, as
/// fixed-width arithmetic does.
pub fn decode_compact(compact: u32) -> U256 {
    let size = compact >> 24;
    let word = compact & 0x007f_ffff;
    if size <= 3 {
        U256::from(word >> (8 * (3 - size)))
    } else {
        let shift = 8 * (size as usize - 3);
        if shift >= 256 {
            return U256::zero();
        }
        U256::from(word) << shift
    }
}

/// Compress a target into compact form
pub fn encode_compact(target: U256) -> u32 {
    let mut size = (target.bits() as u32 + 7) / 8;
    let mut compact = if size <= 3 {
        (target.low_u64() << (8 * (3 - size))) as u32
    } else {
        (target >> (8 * (size as usize - 3))).low_u64() as u32
    };
    // Keep the mantissa positive
    if compact & 0x0080_0000 != 0 {
        compact >>= 8;
        size += 1;
    }
    compact | (size << 24)
}
