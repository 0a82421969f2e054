//! # CLOAK Cryptography
//!
//! Key math for the CLOAK protocol, on secp256k1.
//!
//! This crate provides:
//!
//! - **Keys**: generation, SEC1 parsing, seed derivation
//! - **ECDH**: shared secrets between ephemeral and viewing keys
//! - **Hash**: SHAKE256 with domain separation, Keccak256 for EVM values
//! - **View Tags**: one-byte scan filter
//! - **Derivation**: stealth public keys, addresses, spend keys, commitments
//!
//! ## Security Properties
//!
//! - Secret keys and shared secrets are zeroized on drop
//! - Secret-dependent comparisons are constant-time (`subtle`)
//! - Each derivation uses its own domain separator
//!
//! ## Example
//!
//! ```rust
//! use cloak_crypto::{compute_shared_secret, derive_stealth_address, generate_keypair};
//!
//! let spending = generate_keypair();
//! let viewing = generate_keypair();
//! let ephemeral = generate_keypair();
//!
//! // Sender side
//! let ss = compute_shared_secret(&ephemeral.secret, &viewing.public).unwrap();
//! let address = derive_stealth_address(&spending.public, &ss).unwrap();
//!
//! // Recipient side
//! let ss2 = compute_shared_secret(&viewing.secret, &ephemeral.public).unwrap();
//! assert_eq!(derive_stealth_address(&spending.public, &ss2).unwrap(), address);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod derive;
pub mod ecdh;
pub mod hash;
pub mod secp;
pub mod view_tag;

// Re-export main functions at crate root
pub use derive::{
    compute_commitment, derive_stealth_address, derive_stealth_secret_key, eth_address,
    eth_address_from_secret, hash_to_address, hash_to_scalar, verify_commitment,
    verify_stealth_address,
};
pub use ecdh::{compute_shared_secret, SharedSecret};
pub use hash::{event_topic, function_selector, keccak256, shake256, shake256_multi, shake256_xof};
pub use secp::{
    generate_keypair, generate_keypair_with_rng, generate_stealth_keys, keypair_from_secret,
    parse_public_key, parse_secret_key, public_key_from_secret, stealth_keys_from_seed,
};
pub use view_tag::{compute_view_tag, hash_to_byte, verify_view_tag};
