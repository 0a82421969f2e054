//! Address types for CLOAK.
//!
//! - [`EthAddress`]: A 20-byte Ethereum account address
//! - [`StealthMetaAddress`]: The public keys a recipient publishes
//! - [`StealthAddress`]: A one-time address derived for a single payment

use std::str::FromStr;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use super::PublicKey;
use crate::constants::{
    COMMITMENT_SIZE, ETH_ADDRESS_SIZE, META_ADDRESS_PREFIX, META_ADDRESS_SIZE, PUBLIC_KEY_SIZE,
};
use crate::error::{CloakError, Result};
use crate::types::AnnouncementMetadata;

// ═══════════════════════════════════════════════════════════════════════════════
// ETHEREUM ADDRESS
// ═══════════════════════════════════════════════════════════════════════════════

/// A standard 20-byte Ethereum account address.
///
/// Thin wrapper over [`Address`] that keeps the lowercase hex text form used
/// in key files and logs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EthAddress(Address);

impl EthAddress {
    /// Creates an address from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ETH_ADDRESS_SIZE {
            return Err(CloakError::InvalidAddress(format!(
                "expected {} bytes, got {}",
                ETH_ADDRESS_SIZE,
                bytes.len()
            )));
        }
        Ok(Self(Address::from_slice(bytes)))
    }

    /// Creates from a fixed-size array.
    pub const fn from_array(bytes: [u8; ETH_ADDRESS_SIZE]) -> Self {
        Self(Address::new(bytes))
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }

    /// Returns the wrapped [`Address`].
    pub const fn address(&self) -> Address {
        self.0
    }

    /// Returns the lowercase `0x`-prefixed hex form.
    pub fn to_hex_string(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parses from hex string (with or without 0x prefix).
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        Self::from_bytes(&bytes)
    }

    /// Returns the zero address.
    pub const fn zero() -> Self {
        Self(Address::ZERO)
    }

    /// Returns true if this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == Address::ZERO
    }
}

impl From<Address> for EthAddress {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

impl From<EthAddress> for Address {
    fn from(address: EthAddress) -> Self {
        address.0
    }
}

impl std::fmt::Debug for EthAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EthAddress({})", self.to_hex_string())
    }
}

impl std::fmt::Display for EthAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex_string())
    }
}

impl FromStr for EthAddress {
    type Err = CloakError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for EthAddress {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex_string())
    }
}

impl<'de> Deserialize<'de> for EthAddress {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STEALTH META-ADDRESS
// ═══════════════════════════════════════════════════════════════════════════════

/// The public half of a recipient's key set.
///
/// Senders derive fresh stealth addresses from it; the recipient's viewing
/// key recognises them again.
///
/// # Encodings
/// - raw: `spending_pk (33) || viewing_pk (33)`
/// - text: `st:eth:0x` followed by the raw bytes in hex
///
/// A bare 33-byte key is accepted as a single-key recipient, in which case
/// the same key serves both roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StealthMetaAddress {
    /// Spending public key - base point of every stealth address
    pub spending_pk: PublicKey,
    /// Viewing public key - ECDH target for ephemeral keys
    pub viewing_pk: PublicKey,
}

impl StealthMetaAddress {
    /// Creates a meta-address from its two keys.
    pub fn new(spending_pk: PublicKey, viewing_pk: PublicKey) -> Self {
        Self {
            spending_pk,
            viewing_pk,
        }
    }

    /// Meta-address for a recipient that publishes one key for both roles.
    pub fn single_key(pk: PublicKey) -> Self {
        Self::new(pk, pk)
    }

    /// Returns true if spending and viewing keys coincide.
    pub fn is_single_key(&self) -> bool {
        self.spending_pk == self.viewing_pk
    }

    /// Serializes to `spending_pk || viewing_pk`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(META_ADDRESS_SIZE);
        bytes.extend_from_slice(self.spending_pk.as_bytes());
        bytes.extend_from_slice(self.viewing_pk.as_bytes());
        bytes
    }

    /// Deserializes from 66 bytes, or 33 bytes for a single-key recipient.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            PUBLIC_KEY_SIZE => Ok(Self::single_key(PublicKey::from_bytes(bytes)?)),
            META_ADDRESS_SIZE => Ok(Self::new(
                PublicKey::from_bytes(&bytes[..PUBLIC_KEY_SIZE])?,
                PublicKey::from_bytes(&bytes[PUBLIC_KEY_SIZE..])?,
            )),
            n => Err(CloakError::InvalidMetaAddress(format!(
                "expected {} or {} bytes, got {}",
                PUBLIC_KEY_SIZE, META_ADDRESS_SIZE, n
            ))),
        }
    }

    /// Encodes to plain hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Decodes from hex (with or without `0x`).
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        Self::from_bytes(&bytes)
    }

    /// Encodes to the `st:eth:0x…` text form.
    pub fn to_uri(&self) -> String {
        format!("{}{}", META_ADDRESS_PREFIX, self.to_hex())
    }
}

impl std::fmt::Display for StealthMetaAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_uri())
    }
}

impl FromStr for StealthMetaAddress {
    type Err = CloakError;

    /// Accepts the `st:eth:0x` form as well as bare hex.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.strip_prefix(META_ADDRESS_PREFIX) {
            Some(body) => Self::from_hex(body),
            None if s.starts_with("st:") => Err(CloakError::InvalidMetaAddress(format!(
                "unsupported meta-address chain prefix in '{}'",
                s
            ))),
            None => Self::from_hex(s),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STEALTH ADDRESS
// ═══════════════════════════════════════════════════════════════════════════════

/// A one-time address derived for a specific payment.
///
/// Contains everything the sender needs to pay and to announce. The
/// ephemeral secret that produced it is never part of this value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StealthAddress {
    /// The Ethereum address to send funds to
    pub address: EthAddress,
    /// Sender's ephemeral public key (published in the announcement)
    pub ephemeral_pub_key: PublicKey,
    /// View tag for efficient scanning
    pub view_tag: u8,
    /// Commitment binding `address` and `ephemeral_pub_key`
    #[serde(with = "hex")]
    pub commitment: [u8; COMMITMENT_SIZE],
}

impl StealthAddress {
    /// Creates a new stealth address value.
    pub fn new(
        address: EthAddress,
        ephemeral_pub_key: PublicKey,
        view_tag: u8,
        commitment: [u8; COMMITMENT_SIZE],
    ) -> Self {
        Self {
            address,
            ephemeral_pub_key,
            view_tag,
            commitment,
        }
    }

    /// Announcement metadata: `view_tag || commitment`.
    pub fn metadata(&self) -> Vec<u8> {
        AnnouncementMetadata::new(self.view_tag)
            .with_commitment(self.commitment)
            .to_bytes()
    }
}
