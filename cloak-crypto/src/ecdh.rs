//! Elliptic-curve Diffie-Hellman on secp256k1.
//!
//! ```text
//! sender:    S = r · P_view      (r = ephemeral secret)
//! recipient: S = k_view · R      (R = ephemeral public key)
//! shared_secret = x(S)
//! ```

use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::ProjectivePoint;
use zeroize::{Zeroize, ZeroizeOnDrop};

use cloak_core::constants::SHARED_SECRET_SIZE;
use cloak_core::error::{CloakError, Result};
use cloak_core::types::{PublicKey, SecretKey};

use crate::secp::{to_k256_public, to_k256_secret};

/// 32-byte ECDH shared secret.
///
/// Never serialized, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; SHARED_SECRET_SIZE]);

impl SharedSecret {
    /// Wraps raw bytes. Intended for test vectors.
    pub fn from_array(bytes: [u8; SHARED_SECRET_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the secret bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SharedSecret([REDACTED])")
    }
}

/// Computes the shared secret between a secret key and a public key.
///
/// Symmetric: `compute_shared_secret(a, B) == compute_shared_secret(b, A)`.
///
/// # Errors
/// `InvalidKeyFormat` when either key does not decode to a valid curve
/// element.
pub fn compute_shared_secret(secret: &SecretKey, public: &PublicKey) -> Result<SharedSecret> {
    let scalar = to_k256_secret(secret)?.to_nonzero_scalar();
    let point = to_k256_public(public)?.to_projective();

    let shared = (point * *scalar).to_affine();
    let encoded = shared.to_encoded_point(true);
    let x = encoded
        .x()
        .ok_or_else(|| CloakError::InternalError("ECDH produced the identity point".into()))?;

    let mut bytes = [0u8; SHARED_SECRET_SIZE];
    bytes.copy_from_slice(x);
    Ok(SharedSecret(bytes))
}

/// Adds `tweak · G` to a public key, returning the raw curve point.
pub(crate) fn tweak_public_key(base: &PublicKey, tweak: &k256::Scalar) -> Result<ProjectivePoint> {
    let point = to_k256_public(base)?.to_projective();
    Ok(point + ProjectivePoint::GENERATOR * tweak)
}
