//! Hashing utilities with domain separation.
//!
//! Two families are used:
//!
//! - **SHAKE256** with a length-prefixed domain separator, for every
//!   protocol derivation (view tags, stealth tweaks, commitments):
//!
//!   ```text
//!   output = SHAKE256(len(domain) || domain || input, output_length)
//!   ```
//!
//! - **Keccak256**, for everything the EVM defines: addresses, function
//!   selectors, event topics, pool and order identifiers.

use sha3::{
    digest::{ExtendableOutput, Update, XofReader},
    Digest, Keccak256, Shake256,
};

// ═══════════════════════════════════════════════════════════════════════════════
// SHAKE256 FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

fn domain_hasher(domain: &[u8]) -> Shake256 {
    let mut hasher = Shake256::default();
    hasher.update(&(domain.len() as u32).to_le_bytes());
    hasher.update(domain);
    hasher
}

/// Computes SHAKE256 with domain separation.
///
/// # Example
///
/// ```rust
/// use cloak_core::constants::DOMAIN_VIEW_TAG;
/// use cloak_crypto::shake256;
///
/// let shared_secret = [0u8; 32];
/// let digest = shake256(DOMAIN_VIEW_TAG, &shared_secret, 32);
/// assert_eq!(digest.len(), 32);
/// ```
pub fn shake256(domain: &[u8], input: &[u8], output_len: usize) -> Vec<u8> {
    let mut hasher = domain_hasher(domain);
    hasher.update(input);

    let mut reader = hasher.finalize_xof();
    let mut output = vec![0u8; output_len];
    reader.read(&mut output);
    output
}

/// Computes SHAKE256 over several inputs.
///
/// Each input is prefixed with its length so `["ab", "c"]` and `["a", "bc"]`
/// hash differently.
pub fn shake256_multi(domain: &[u8], inputs: &[&[u8]], output_len: usize) -> Vec<u8> {
    let mut hasher = domain_hasher(domain);
    for input in inputs {
        hasher.update(&(input.len() as u64).to_le_bytes());
        hasher.update(input);
    }

    let mut reader = hasher.finalize_xof();
    let mut output = vec![0u8; output_len];
    reader.read(&mut output);
    output
}

/// Returns a SHAKE256 XOF reader for streaming output.
///
/// Used for rejection sampling, where the number of bytes needed is not
/// known up front.
pub fn shake256_xof(domain: &[u8], input: &[u8]) -> Shake256XofReader {
    let mut hasher = domain_hasher(domain);
    hasher.update(input);

    Shake256XofReader {
        reader: hasher.finalize_xof(),
    }
}

/// Streaming reader for SHAKE256 output.
pub struct Shake256XofReader {
    reader: sha3::Shake256Reader,
}

impl Shake256XofReader {
    /// Reads bytes into the provided buffer.
    pub fn read(&mut self, output: &mut [u8]) {
        self.reader.read(output);
    }

    /// Reads and returns a fixed-size array.
    pub fn read_array<const N: usize>(&mut self) -> [u8; N] {
        let mut output = [0u8; N];
        self.reader.read(&mut output);
        output
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// KECCAK256 (EVM)
// ═══════════════════════════════════════════════════════════════════════════════

/// Computes Keccak256.
///
/// Note: Keccak256 is NOT SHA3-256. They use different padding.
pub fn keccak256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    Digest::update(&mut hasher, input);
    hasher.finalize().into()
}

/// Keccak256 over the concatenation of several inputs.
pub fn keccak256_concat(inputs: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for input in inputs {
        Digest::update(&mut hasher, input);
    }
    hasher.finalize().into()
}

/// Four-byte function selector of a canonical signature.
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Topic0 of a canonical event signature.
pub fn event_topic(signature: &str) -> [u8; 32] {
    keccak256(signature.as_bytes())
}
