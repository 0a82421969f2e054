//! View tag computation for efficient scanning.
//!
//! Every announcement carries one byte derived from the shared secret.
//! A recipient recomputes it after a single ECDH and skips the announcement
//! on mismatch, so only ~1/256 of foreign announcements reach full address
//! derivation.
//!
//! The tag reveals 8 bits of a hash of the shared secret, which leaves the
//! secret itself and the recipient's identity hidden.

use subtle::ConstantTimeEq;

use cloak_core::constants::DOMAIN_VIEW_TAG;

use crate::ecdh::SharedSecret;
use crate::hash::shake256;

/// First byte of `SHAKE256(domain || input)`.
pub fn hash_to_byte(domain: &[u8], input: &[u8]) -> u8 {
    shake256(domain, input, 1)[0]
}

/// Computes the view tag for a shared secret.
///
/// # Example
///
/// ```rust
/// use cloak_crypto::{compute_shared_secret, compute_view_tag, generate_keypair};
///
/// let ephemeral = generate_keypair();
/// let viewing = generate_keypair();
///
/// let sender = compute_shared_secret(&ephemeral.secret, &viewing.public).unwrap();
/// let recipient = compute_shared_secret(&viewing.secret, &ephemeral.public).unwrap();
/// assert_eq!(compute_view_tag(&sender), compute_view_tag(&recipient));
/// ```
pub fn compute_view_tag(shared_secret: &SharedSecret) -> u8 {
    hash_to_byte(DOMAIN_VIEW_TAG, shared_secret.as_bytes())
}

/// Constant-time check of an observed view tag.
pub fn verify_view_tag(shared_secret: &SharedSecret, observed_tag: u8) -> bool {
    compute_view_tag(shared_secret).ct_eq(&observed_tag).into()
}

/// Distribution of view tags, e.g. across a channel's announcements.
#[derive(Debug, Clone)]
pub struct ViewTagStats {
    /// Count of each view tag value
    pub distribution: Vec<u64>,
    /// Total number of tags analyzed
    pub total: u64,
}

impl Default for ViewTagStats {
    fn default() -> Self {
        Self {
            distribution: vec![0; 256],
            total: 0,
        }
    }
}

impl ViewTagStats {
    /// Creates a new stats tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a view tag.
    pub fn add(&mut self, tag: u8) {
        self.distribution[tag as usize] += 1;
        self.total += 1;
    }

    /// Returns the most common view tag.
    pub fn most_common(&self) -> Option<(u8, u64)> {
        self.distribution
            .iter()
            .enumerate()
            .max_by_key(|(_, &count)| count)
            .map(|(tag, &count)| (tag as u8, count))
    }

    /// Chi-squared statistic against a uniform distribution.
    pub fn chi_squared(&self) -> f64 {
        let expected = self.total as f64 / 256.0;
        if expected == 0.0 {
            return 0.0;
        }

        self.distribution
            .iter()
            .map(|&observed| {
                let diff = observed as f64 - expected;
                (diff * diff) / expected
            })
            .sum()
    }
}
