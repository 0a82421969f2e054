//! Stealth key and address derivation.
//!
//! ## Derivation Flow
//!
//! ```text
//! shared_secret
//!       ↓
//! s = hash_to_scalar(DOMAIN_STEALTH_ADDRESS, shared_secret)
//!       ↓
//! P_stealth = P_spend + s·G
//!       ↓
//! address = keccak256(uncompressed(P_stealth)[1..])[12..32]
//! ```
//!
//! ## Private Key Derivation
//!
//! Only the holder of the spending secret can spend:
//!
//! ```text
//! k_stealth = k_spend + s   (mod n)
//! ```

use k256::elliptic_curve::ff::{Field, PrimeField};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::{FieldBytes, NonZeroScalar, Scalar};
use subtle::ConstantTimeEq;

use cloak_core::constants::{
    COMMITMENT_SIZE, DOMAIN_COMMITMENT, DOMAIN_STEALTH_ADDRESS, ETH_ADDRESS_SIZE,
};
use cloak_core::error::{CloakError, Result};
use cloak_core::types::{EthAddress, PublicKey, SecretKey};

use crate::ecdh::{tweak_public_key, SharedSecret};
use crate::hash::{keccak256, shake256_multi, shake256_xof};
use crate::secp::{from_k256_secret, to_k256_public, to_k256_secret};

/// Upper bound on rejection-sampling rounds. Each round fails with
/// probability below 2^-127.
pub(crate) const MAX_REJECTION_ROUNDS: usize = 64;

// ═══════════════════════════════════════════════════════════════════════════════
// HASH TO SCALAR
// ═══════════════════════════════════════════════════════════════════════════════

/// Maps a shared secret to a non-zero scalar.
///
/// Reads 32-byte candidates from a domain-separated SHAKE256 stream until
/// one is a canonical, non-zero scalar. Deterministic for a given input.
pub fn hash_to_scalar(domain: &[u8], shared_secret: &[u8]) -> Result<Scalar> {
    let mut reader = shake256_xof(domain, shared_secret);

    for _ in 0..MAX_REJECTION_ROUNDS {
        let candidate: [u8; 32] = reader.read_array();
        let scalar: Option<Scalar> = Scalar::from_repr(FieldBytes::from(candidate)).into();
        if let Some(s) = scalar {
            if !bool::from(s.is_zero()) {
                return Ok(s);
            }
        }
    }

    Err(CloakError::InternalError(
        "hash_to_scalar exhausted rejection rounds".into(),
    ))
}

// ═══════════════════════════════════════════════════════════════════════════════
// STEALTH PUBLIC KEY & ADDRESS
// ═══════════════════════════════════════════════════════════════════════════════

/// Computes `P_spend + hash_to_scalar(domain, shared_secret)·G`.
pub fn derive_stealth_public_key(
    spending_pk: &PublicKey,
    shared_secret: &SharedSecret,
    domain: &[u8],
) -> Result<k256::PublicKey> {
    let tweak = hash_to_scalar(domain, shared_secret.as_bytes())?;
    let point = tweak_public_key(spending_pk, &tweak)?;
    k256::PublicKey::from_affine(point.to_affine())
        .map_err(|_| CloakError::InternalError("stealth public key is the identity".into()))
}

/// Ethereum address of a public key: last 20 bytes of keccak256 over the
/// uncompressed point without its `0x04` prefix.
pub fn eth_address_from_public_key(pk: &k256::PublicKey) -> EthAddress {
    let uncompressed = pk.to_encoded_point(false);
    let hash = keccak256(&uncompressed.as_bytes()[1..]);

    let mut address = [0u8; ETH_ADDRESS_SIZE];
    address.copy_from_slice(&hash[32 - ETH_ADDRESS_SIZE..]);
    EthAddress::from_array(address)
}

/// Ethereum address of a wire-format public key.
pub fn eth_address(pk: &PublicKey) -> Result<EthAddress> {
    Ok(eth_address_from_public_key(&to_k256_public(pk)?))
}

/// Derives the stealth address for a spending key and shared secret.
pub fn hash_to_address(
    spending_pk: &PublicKey,
    shared_secret: &SharedSecret,
    domain: &[u8],
) -> Result<EthAddress> {
    let stealth_pk = derive_stealth_public_key(spending_pk, shared_secret, domain)?;
    Ok(eth_address_from_public_key(&stealth_pk))
}

/// Derives the stealth address under the protocol's address domain.
pub fn derive_stealth_address(
    spending_pk: &PublicKey,
    shared_secret: &SharedSecret,
) -> Result<EthAddress> {
    hash_to_address(spending_pk, shared_secret, DOMAIN_STEALTH_ADDRESS)
}

// ═══════════════════════════════════════════════════════════════════════════════
// STEALTH PRIVATE KEY
// ═══════════════════════════════════════════════════════════════════════════════

/// Derives the private key controlling a stealth address.
///
/// # Security
/// The result is a spend key. It is zeroized on drop and must never be
/// logged.
pub fn derive_stealth_secret_key(
    spending_sk: &SecretKey,
    shared_secret: &SharedSecret,
) -> Result<SecretKey> {
    let tweak = hash_to_scalar(DOMAIN_STEALTH_ADDRESS, shared_secret.as_bytes())?;
    let base = to_k256_secret(spending_sk)?;
    let sum = *base.to_nonzero_scalar() + tweak;

    let nonzero: Option<NonZeroScalar> = NonZeroScalar::new(sum).into();
    let nonzero = nonzero
        .ok_or_else(|| CloakError::InternalError("stealth secret key is zero".into()))?;
    Ok(from_k256_secret(&k256::SecretKey::from(nonzero)))
}

/// Ethereum address controlled by a secret key.
pub fn eth_address_from_secret(secret: &SecretKey) -> Result<EthAddress> {
    let sk = to_k256_secret(secret)?;
    Ok(eth_address_from_public_key(&sk.public_key()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMITMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Commitment binding a stealth address to the ephemeral key that made it.
///
/// Published in announcement metadata and used as the owner field of
/// private limit orders.
pub fn compute_commitment(
    address: &EthAddress,
    ephemeral_pub_key: &PublicKey,
) -> [u8; COMMITMENT_SIZE] {
    let digest = shake256_multi(
        DOMAIN_COMMITMENT,
        &[address.as_bytes(), ephemeral_pub_key.as_bytes()],
        COMMITMENT_SIZE,
    );
    let mut out = [0u8; COMMITMENT_SIZE];
    out.copy_from_slice(&digest);
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// VERIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Verifies that a stealth address was derived from this spending key and
/// shared secret. Constant-time in the address comparison.
pub fn verify_stealth_address(
    spending_pk: &PublicKey,
    shared_secret: &SharedSecret,
    expected_address: &EthAddress,
) -> Result<bool> {
    let derived = derive_stealth_address(spending_pk, shared_secret)?;
    Ok(derived.as_bytes().ct_eq(expected_address.as_bytes()).into())
}

/// Constant-time commitment comparison.
pub fn verify_commitment(
    address: &EthAddress,
    ephemeral_pub_key: &PublicKey,
    expected: &[u8; COMMITMENT_SIZE],
) -> bool {
    let computed = compute_commitment(address, ephemeral_pub_key);
    computed[..].ct_eq(&expected[..]).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecdh::compute_shared_secret;
    use crate::secp::{generate_keypair, public_key_from_secret};

    fn test_secret() -> SharedSecret {
        SharedSecret::from_array([0xAB; 32])
    }

    #[test]
    fn test_hash_to_scalar_deterministic_and_domain_separated() {
        let a = hash_to_scalar(DOMAIN_STEALTH_ADDRESS, &[1u8; 32]).unwrap();
        let b = hash_to_scalar(DOMAIN_STEALTH_ADDRESS, &[1u8; 32]).unwrap();
        let c = hash_to_scalar(DOMAIN_COMMITMENT, &[1u8; 32]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_stealth_address_deterministic() {
        let spending = generate_keypair();
        let a1 = derive_stealth_address(&spending.public, &test_secret()).unwrap();
        let a2 = derive_stealth_address(&spending.public, &test_secret()).unwrap();
        assert_eq!(a1, a2);
    }

    #[test]
    fn test_stealth_address_differs_from_spending_address() {
        let spending = generate_keypair();
        let stealth = derive_stealth_address(&spending.public, &test_secret()).unwrap();
        assert_ne!(stealth, eth_address(&spending.public).unwrap());
    }

    #[test]
    fn test_domain_changes_address() {
        let spending = generate_keypair();
        let a = hash_to_address(&spending.public, &test_secret(), DOMAIN_STEALTH_ADDRESS).unwrap();
        let b = hash_to_address(&spending.public, &test_secret(), b"OTHER_DOMAIN").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_stealth_secret_controls_stealth_address() {
        let spending = generate_keypair();
        let viewing = generate_keypair();
        let ephemeral = generate_keypair();

        let shared = compute_shared_secret(&ephemeral.secret, &viewing.public).unwrap();
        let address = derive_stealth_address(&spending.public, &shared).unwrap();

        let stealth_sk = derive_stealth_secret_key(&spending.secret, &shared).unwrap();
        assert_eq!(eth_address_from_secret(&stealth_sk).unwrap(), address);

        let stealth_pk = public_key_from_secret(&stealth_sk).unwrap();
        let derived_pk = derive_stealth_public_key(
            &spending.public,
            &shared,
            DOMAIN_STEALTH_ADDRESS,
        )
        .unwrap();
        assert_eq!(stealth_pk, crate::secp::from_k256_public(&derived_pk).unwrap());
    }

    #[test]
    fn test_known_eth_address() {
        // Secret key 1 maps to the generator, whose address is well known.
        let mut one = [0u8; 32];
        one[31] = 1;
        let address = eth_address_from_secret(&SecretKey::from_array(one)).unwrap();
        assert_eq!(
            address.to_hex_string(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_commitment_binds_both_inputs() {
        let eph = generate_keypair().public;
        let other_eph = generate_keypair().public;
        let addr = EthAddress::from_array([0x11; 20]);
        let other_addr = EthAddress::from_array([0x22; 20]);

        let c = compute_commitment(&addr, &eph);
        assert!(verify_commitment(&addr, &eph, &c));
        assert!(!verify_commitment(&other_addr, &eph, &c));
        assert!(!verify_commitment(&addr, &other_eph, &c));
    }

    #[test]
    fn test_verify_stealth_address() {
        let spending = generate_keypair();
        let address = derive_stealth_address(&spending.public, &test_secret()).unwrap();

        assert!(verify_stealth_address(&spending.public, &test_secret(), &address).unwrap());

        let wrong = EthAddress::from_array([0xFF; ETH_ADDRESS_SIZE]);
        assert!(!verify_stealth_address(&spending.public, &test_secret(), &wrong).unwrap());
    }
}
