//! Key types for CLOAK.
//!
//! This module defines the secp256k1 key structures used in the protocol:
//!
//! - [`PublicKey`]: Compressed SEC1 public key (33 bytes)
//! - [`SecretKey`]: Secret scalar (32 bytes, zeroized on drop)
//! - [`KeyPair`]: Combined public + secret key
//! - [`StealthKeys`]: Spending + viewing key pairs of a recipient
//! - [`ViewingKey`]: Scan capability (viewing secret + spending public key)
//!
//! Length and prefix checks live here. Curve membership is checked by
//! `cloak-crypto`, which owns the point arithmetic.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::{PUBLIC_KEY_SIZE, SECRET_KEY_SIZE};
use crate::error::{CloakError, Result};
use crate::types::StealthMetaAddress;

// ═══════════════════════════════════════════════════════════════════════════════
// PUBLIC KEY
// ═══════════════════════════════════════════════════════════════════════════════

/// Compressed secp256k1 public key.
///
/// Safe to share publicly. Recipients publish two of these in their
/// meta-address; senders publish an ephemeral one per payment.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey {
    bytes: [u8; PUBLIC_KEY_SIZE],
}

impl PublicKey {
    /// Creates a public key from its compressed encoding.
    ///
    /// # Errors
    /// Returns `InvalidKeyFormat` if the length is not 33 bytes or the
    /// prefix is not `0x02`/`0x03`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(CloakError::InvalidKeyFormat(format!(
                "public key must be {} bytes, got {}",
                PUBLIC_KEY_SIZE,
                bytes.len()
            )));
        }
        if bytes[0] != 0x02 && bytes[0] != 0x03 {
            return Err(CloakError::InvalidKeyFormat(format!(
                "unexpected compressed point prefix 0x{:02x}",
                bytes[0]
            )));
        }

        let mut arr = [0u8; PUBLIC_KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Creates a public key from a fixed-size array without validation.
    pub fn from_array(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the raw bytes of the public key.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the public key as a fixed-size array reference.
    pub fn as_array(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.bytes
    }

    /// Returns the hex-encoded public key (no prefix).
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Parses a public key from hex, with or without `0x`.
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        Self::from_bytes(&bytes)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SECRET KEY
// ═══════════════════════════════════════════════════════════════════════════════

/// secp256k1 secret scalar.
///
/// This key is sensitive and will be automatically zeroized when dropped.
/// Never expose this key in logs or error messages.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    bytes: [u8; SECRET_KEY_SIZE],
}

impl SecretKey {
    /// Creates a secret key from raw bytes.
    ///
    /// # Errors
    /// Returns `InvalidKeyFormat` if the length is not 32 bytes or the
    /// scalar is zero.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SECRET_KEY_SIZE {
            return Err(CloakError::InvalidKeyFormat(format!(
                "secret key must be {} bytes, got {}",
                SECRET_KEY_SIZE,
                bytes.len()
            )));
        }
        if bytes.iter().all(|&b| b == 0) {
            return Err(CloakError::InvalidKeyFormat("secret key is zero".into()));
        }

        let mut arr = [0u8; SECRET_KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    /// Creates a secret key from a fixed-size array.
    pub fn from_array(bytes: [u8; SECRET_KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Parses a secret key from hex, with or without `0x`.
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = hex::decode(s)?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    /// Returns the raw bytes of the secret key.
    ///
    /// # Security
    /// Handle the returned bytes carefully - do not log or expose them.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the secret key as a fixed-size array reference.
    pub fn as_array(&self) -> &[u8; SECRET_KEY_SIZE] {
        &self.bytes
    }

    /// Hex encoding for explicit export paths (key backup, CLI output).
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretKey([REDACTED])")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// KEY PAIR
// ═══════════════════════════════════════════════════════════════════════════════

/// A complete secp256k1 key pair (public + secret).
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    /// Public key (safe to share)
    #[zeroize(skip)]
    pub public: PublicKey,
    /// Secret key (keep private, auto-zeroized)
    pub secret: SecretKey,
}

impl KeyPair {
    /// Creates a new key pair from public and secret keys.
    pub fn new(public: PublicKey, secret: SecretKey) -> Self {
        Self { public, secret }
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECIPIENT KEY SETS
// ═══════════════════════════════════════════════════════════════════════════════

/// Viewing capability: enough to recognise incoming payments, not to spend.
///
/// The viewing secret can be handed to a scanning service or an auditor.
#[derive(Clone, ZeroizeOnDrop)]
pub struct ViewingKey {
    /// Viewing secret key used for ECDH against ephemeral keys
    pub viewing_sk: SecretKey,
    /// Spending public key the stealth addresses are built on
    #[zeroize(skip)]
    pub spending_pk: PublicKey,
}

impl ViewingKey {
    /// Creates a viewing key from its parts.
    pub fn new(viewing_sk: SecretKey, spending_pk: PublicKey) -> Self {
        Self {
            viewing_sk,
            spending_pk,
        }
    }
}

impl std::fmt::Debug for ViewingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewingKey")
            .field("viewing_sk", &"[REDACTED]")
            .field("spending_pk", &self.spending_pk)
            .finish()
    }
}

/// Complete recipient key set (spending + viewing).
#[derive(Clone, ZeroizeOnDrop)]
pub struct StealthKeys {
    /// Keys for spending from stealth addresses
    pub spending: KeyPair,
    /// Keys for viewing/scanning announcements
    pub viewing: KeyPair,
}

impl StealthKeys {
    /// Creates a new key set.
    pub fn new(spending: KeyPair, viewing: KeyPair) -> Self {
        Self { spending, viewing }
    }

    /// Returns the public meta-address senders derive stealth addresses from.
    pub fn meta_address(&self) -> StealthMetaAddress {
        StealthMetaAddress::new(self.spending.public, self.viewing.public)
    }

    /// Returns the scan-only capability.
    pub fn viewing_key(&self) -> ViewingKey {
        ViewingKey::new(self.viewing.secret.clone(), self.spending.public)
    }
}

impl std::fmt::Debug for StealthKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StealthKeys")
            .field("spending", &self.spending)
            .field("viewing", &self.viewing)
            .finish()
    }
}
