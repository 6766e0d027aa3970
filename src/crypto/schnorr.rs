//! BIP-340 Schnorr keys backing the pay-to-public-key stake script
//!
//! Script interpretation is a black box to the kernel; this is the one
//! script form the bundled verifier understands.

use k256::schnorr::signature::{Signer, Verifier};
use k256::schnorr::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

use super::Hash256;

/// Signature errors
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid private key")]
    InvalidPrivateKey,
}

/// Stake signing key
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivateKey([REDACTED])")
    }
}

/// x-only public key, the body of a pay-to-public-key script
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(pub [u8; 32]);

/// 64-byte Schnorr signature, the body of an unlocking script
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SchnorrSignature(pub [u8; 64]);

impl PrivateKey {
    pub fn generate() -> Self {
        PrivateKey(SigningKey::random(&mut OsRng))
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, SignatureError> {
        SigningKey::from_bytes(bytes)
            .map(PrivateKey)
            .map_err(|_| SignatureError::InvalidPrivateKey)
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key().to_bytes().into())
    }

    /// Sign a transaction signature hash
    pub fn sign(&self, message: &Hash256) -> SchnorrSignature {
        let signature: Signature = self.0.sign(&message.0);
        SchnorrSignature(signature.to_bytes())
    }
}

impl PublicKey {
    /// Create from 32 bytes, rejecting points off the curve
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, SignatureError> {
        VerifyingKey::from_bytes(bytes).map_err(|_| SignatureError::InvalidPublicKey)?;
        Ok(PublicKey(*bytes))
    }

    /// Parse from a locking script body
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SignatureError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SignatureError::InvalidPublicKey)?;
        Self::from_bytes(&arr)
    }

    pub fn verify(&self, message: &Hash256, signature: &SchnorrSignature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let Ok(sig) = Signature::try_from(signature.0.as_slice()) else {
            return false;
        };
        verifying_key.verify(&message.0, &sig).is_ok()
    }
}

impl SchnorrSignature {
    /// Parse from an unlocking script body
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 64] = bytes.try_into().ok()?;
        Some(SchnorrSignature(arr))
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

impl std::fmt::Debug for SchnorrSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}
