//! secp256k1 key handling.
//!
//! Conversions between the wire types in `cloak-core` and `k256` curve
//! types. Every decode path checks curve membership and rejects the
//! identity point, so later arithmetic can assume well-formed inputs.

use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::{CryptoRng, RngCore};

use cloak_core::constants::{PUBLIC_KEY_SIZE, UNCOMPRESSED_PUBLIC_KEY_SIZE};
use cloak_core::error::{CloakError, Result};
use cloak_core::types::{KeyPair, PublicKey, SecretKey, StealthKeys};

use crate::hash::shake256_xof;

// ═══════════════════════════════════════════════════════════════════════════════
// DECODING
// ═══════════════════════════════════════════════════════════════════════════════

/// Parses a SEC1 public key (33-byte compressed or 65-byte uncompressed)
/// and returns its canonical compressed form.
///
/// # Errors
/// `InvalidKeyFormat` for wrong lengths, off-curve points and the identity.
pub fn parse_public_key(bytes: &[u8]) -> Result<PublicKey> {
    if bytes.len() != PUBLIC_KEY_SIZE && bytes.len() != UNCOMPRESSED_PUBLIC_KEY_SIZE {
        return Err(CloakError::InvalidKeyFormat(format!(
            "public key must be {} or {} bytes, got {}",
            PUBLIC_KEY_SIZE,
            UNCOMPRESSED_PUBLIC_KEY_SIZE,
            bytes.len()
        )));
    }
    let point = k256::PublicKey::from_sec1_bytes(bytes)
        .map_err(|_| CloakError::InvalidKeyFormat("point is not on secp256k1".into()))?;
    from_k256_public(&point)
}

/// Parses a 32-byte secret scalar, rejecting zero and values `>= n`.
pub fn parse_secret_key(bytes: &[u8]) -> Result<SecretKey> {
    let secret = to_k256_secret_bytes(bytes)?;
    Ok(SecretKey::from_array(secret.to_bytes().into()))
}

pub(crate) fn to_k256_public(pk: &PublicKey) -> Result<k256::PublicKey> {
    k256::PublicKey::from_sec1_bytes(pk.as_bytes())
        .map_err(|_| CloakError::InvalidKeyFormat("point is not on secp256k1".into()))
}

pub(crate) fn to_k256_secret(sk: &SecretKey) -> Result<k256::SecretKey> {
    to_k256_secret_bytes(sk.as_bytes())
}

fn to_k256_secret_bytes(bytes: &[u8]) -> Result<k256::SecretKey> {
    if bytes.len() != 32 {
        return Err(CloakError::InvalidKeyFormat(format!(
            "secret key must be 32 bytes, got {}",
            bytes.len()
        )));
    }
    k256::SecretKey::from_slice(bytes)
        .map_err(|_| CloakError::InvalidKeyFormat("secret scalar out of range".into()))
}

pub(crate) fn from_k256_public(pk: &k256::PublicKey) -> Result<PublicKey> {
    let encoded = pk.to_encoded_point(true);
    PublicKey::from_bytes(encoded.as_bytes())
}

pub(crate) fn from_k256_secret(sk: &k256::SecretKey) -> SecretKey {
    SecretKey::from_array(sk.to_bytes().into())
}

// ═══════════════════════════════════════════════════════════════════════════════
// KEY GENERATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Generates a key pair from the OS random number generator.
pub fn generate_keypair() -> KeyPair {
    generate_keypair_with_rng(&mut rand::rngs::OsRng)
}

/// Generates a key pair from the supplied RNG.
///
/// Deterministic RNGs (e.g. ChaCha20 with a fixed seed) make test vectors
/// reproducible.
pub fn generate_keypair_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> KeyPair {
    let secret = k256::SecretKey::random(rng);
    keypair_from_k256(&secret)
}

/// Rebuilds a key pair from its secret key.
pub fn keypair_from_secret(secret: &SecretKey) -> Result<KeyPair> {
    let sk = to_k256_secret(secret)?;
    Ok(keypair_from_k256(&sk))
}

/// Returns the public key for a secret key.
pub fn public_key_from_secret(secret: &SecretKey) -> Result<PublicKey> {
    Ok(keypair_from_secret(secret)?.public)
}

fn keypair_from_k256(secret: &k256::SecretKey) -> KeyPair {
    let encoded = secret.public_key().to_encoded_point(true);
    let mut public = [0u8; PUBLIC_KEY_SIZE];
    public.copy_from_slice(encoded.as_bytes());
    KeyPair::new(PublicKey::from_array(public), from_k256_secret(secret))
}

/// Generates a fresh recipient key set (spending + viewing).
pub fn generate_stealth_keys() -> StealthKeys {
    let mut rng = rand::rngs::OsRng;
    StealthKeys::new(
        generate_keypair_with_rng(&mut rng),
        generate_keypair_with_rng(&mut rng),
    )
}

/// Derives a recipient key set deterministically from a seed.
///
/// The spending and viewing scalars are read from independent SHAKE256
/// streams, rejecting out-of-range candidates.
pub fn stealth_keys_from_seed(seed: &[u8]) -> Result<StealthKeys> {
    let spending = seeded_keypair(seed, b"spending")?;
    let viewing = seeded_keypair(seed, b"viewing")?;
    Ok(StealthKeys::new(spending, viewing))
}

fn seeded_keypair(seed: &[u8], role: &[u8]) -> Result<KeyPair> {
    let mut input = Vec::with_capacity(role.len() + seed.len());
    input.extend_from_slice(role);
    input.extend_from_slice(seed);
    let mut reader = shake256_xof(cloak_core::constants::DOMAIN_KEY_SEED, &input);
    zeroize::Zeroize::zeroize(&mut input);

    for _ in 0..crate::derive::MAX_REJECTION_ROUNDS {
        let mut candidate: [u8; 32] = reader.read_array();
        let parsed = k256::SecretKey::from_slice(&candidate);
        zeroize::Zeroize::zeroize(&mut candidate);
        if let Ok(sk) = parsed {
            return Ok(keypair_from_k256(&sk));
        }
    }
    Err(CloakError::InternalError(
        "seed expansion did not yield a valid scalar".into(),
    ))
}
