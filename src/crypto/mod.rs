//! Cryptography module - SHA-256d hashing and Schnorr stake keys

mod hash;
mod schnorr;

pub use hash::*;
pub use schnorr::*;
