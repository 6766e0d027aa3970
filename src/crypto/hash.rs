//! Double SHA-256 hashing
//!
//! Every consensus hash in the kernel is SHA-256d over a little-endian
//! serialization stream, compared as a little-endian 256-bit integer.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// 32-byte hash in internal byte order
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The all-zero hash (null previous block, PoS placeholder proof)
    pub const fn zero() -> Self {
        Hash256([0u8; 32])
    }

    /// Create hash from bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash256(bytes)
    }

    /// Parse from display hex (most significant byte first)
    pub fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(hex)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        for (dst, src) in arr.iter_mut().zip(bytes.iter().rev()) {
            *dst = *src;
        }
        Ok(Hash256(arr))
    }

    /// Display hex (most significant byte first)
    pub fn to_hex(&self) -> String {
        let mut reversed = self.0;
        reversed.reverse();
        hex::encode(reversed)
    }

    /// Get as bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Interpret as a little-endian 256-bit integer
    pub fn to_u256(&self) -> U256 {
        U256::from_little_endian(&self.0)
    }

    pub fn from_u256(value: U256) -> Self {
        let mut bytes = [0u8; 32];
        value.to_little_endian(&mut bytes);
        Hash256(bytes)
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Default for Hash256 {
    fn default() -> Self {
        Self::zero()
    }
}

/// SHA-256d of arbitrary bytes
pub fn hash256(data: &[u8]) -> Hash256 {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    Hash256(second.into())
}

/// Append-only hashing stream.
///
/// Integers are written little-endian and hashes as their 32 raw bytes,
/// which is exactly how the network serializes kernel inputs.
#[derive(Debug, Default, Clone)]
pub struct HashWriter {
    buf: Vec<u8>,
}

impl HashWriter {
    pub fn new() -> Self {
        Self { buf: Vec::with_capacity(96) }
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_i64(&mut self, value: i64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_hash(&mut self, hash: &Hash256) -> &mut Self {
        self.buf.extend_from_slice(&hash.0);
        self
    }

    /// Length-prefixed byte string (u32 length)
    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.write_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn finish(&self) -> Hash256 {
        hash256(&self.buf)
    }
}
