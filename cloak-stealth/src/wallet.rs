//! CLOAK wallet implementation.
//!
//! The wallet manages the recipient key set and provides high-level
//! operations for receiving and spending stealth payments.

use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

use cloak_core::error::{CloakError, Result};
use cloak_core::traits::KeyProvider;
use cloak_core::types::{
    Announcement, EthAddress, PublicKey, SecretKey, StealthKeys, StealthMetaAddress, ViewingKey,
};
use cloak_crypto::{
    compute_shared_secret, derive_stealth_secret_key, eth_address_from_secret,
    generate_stealth_keys, keypair_from_secret, parse_public_key, stealth_keys_from_seed,
};

use crate::discovery::{scan_announcement, ScanResult};

/// A payment the wallet can spend.
#[derive(ZeroizeOnDrop)]
pub struct DiscoveredPayment {
    /// Address holding the funds
    #[zeroize(skip)]
    pub address: EthAddress,
    /// Announcement the payment was found in
    #[zeroize(skip)]
    pub announcement: Announcement,
    /// Private key controlling `address`
    pub spending_key: SecretKey,
}

impl std::fmt::Debug for DiscoveredPayment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveredPayment")
            .field("address", &self.address)
            .field("announcement", &self.announcement)
            .field("spending_key", &"[REDACTED]")
            .finish()
    }
}

/// A CLOAK wallet containing keys for receiving private payments.
///
/// The wallet holds:
/// - Spending keys: For deriving stealth private keys and spending funds
/// - Viewing keys: For scanning announcements (can be shared with auditors)
#[derive(ZeroizeOnDrop)]
pub struct StealthWallet {
    keys: StealthKeys,
    #[zeroize(skip)]
    meta_address: StealthMetaAddress,
}

impl StealthWallet {
    /// Generates a new wallet with random keys.
    pub fn generate() -> Self {
        Self::from_keys(generate_stealth_keys())
    }

    /// Derives a wallet deterministically from a seed.
    pub fn from_seed(seed: &[u8]) -> Result<Self> {
        Ok(Self::from_keys(stealth_keys_from_seed(seed)?))
    }

    /// Creates a wallet from existing keys.
    pub fn from_keys(keys: StealthKeys) -> Self {
        let meta_address = keys.meta_address();
        Self { keys, meta_address }
    }

    /// Loads the wallet keys from a provider.
    pub async fn from_provider(provider: &dyn KeyProvider) -> Result<Self> {
        Ok(Self::from_keys(provider.stealth_keys().await?))
    }

    /// Rebuilds a wallet from hex-encoded secret keys.
    pub fn from_secret_hex(spending_sk: &str, viewing_sk: &str) -> Result<Self> {
        let spending = keypair_from_secret(&SecretKey::from_hex(spending_sk)?)?;
        let viewing = keypair_from_secret(&SecretKey::from_hex(viewing_sk)?)?;
        Ok(Self::from_keys(StealthKeys::new(spending, viewing)))
    }

    /// Returns the meta-address for publishing.
    pub fn meta_address(&self) -> &StealthMetaAddress {
        &self.meta_address
    }

    /// Returns the scan-only capability.
    pub fn viewing_key(&self) -> ViewingKey {
        self.keys.viewing_key()
    }

    /// Returns the full key set.
    pub fn keys(&self) -> &StealthKeys {
        &self.keys
    }

    /// Attempts to discover a payment from an announcement.
    ///
    /// `Ok(None)` covers every announcement that is not ours, including
    /// view tag false positives and tampered commitments.
    ///
    /// # Errors
    /// Propagates decode failures for malformed announcements.
    pub fn try_discover(&self, announcement: &Announcement) -> Result<Option<DiscoveredPayment>> {
        match scan_announcement(announcement, &self.viewing_key()) {
            ScanResult::Discovered(recovered) => {
                let spending_key = self.stealth_secret_key(recovered.stealth.ephemeral_pub_key.as_bytes())?;
                Ok(Some(DiscoveredPayment {
                    address: recovered.stealth.address,
                    announcement: recovered.announcement,
                    spending_key,
                }))
            }
            ScanResult::Malformed(e) => Err(e),
            _ => Ok(None),
        }
    }

    /// Derives the private key for the stealth address built on
    /// `ephemeral_pub_key`.
    pub fn stealth_secret_key(&self, ephemeral_pub_key: &[u8]) -> Result<SecretKey> {
        let ephemeral = parse_public_key(ephemeral_pub_key)?;
        let shared_secret = compute_shared_secret(&self.keys.viewing.secret, &ephemeral)?;
        derive_stealth_secret_key(&self.keys.spending.secret, &shared_secret)
    }

    /// Exports the public halves for sharing.
    pub fn export_public(&self) -> PublicKeyExport {
        PublicKeyExport {
            meta_address: self.meta_address.to_uri(),
            spending_public_key: self.keys.spending.public,
            viewing_public_key: self.keys.viewing.public,
        }
    }

    /// Exports the viewing capability for a third-party scanner or auditor.
    ///
    /// The export allows scanning for payments but not spending them.
    pub fn export_viewing_key(&self) -> ViewingKeyExport {
        ViewingKeyExport {
            viewing_secret_key: self.keys.viewing.secret.to_hex(),
            spending_public_key: self.keys.spending.public,
        }
    }
}

impl std::fmt::Debug for StealthWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StealthWallet")
            .field("meta_address", &self.meta_address)
            .field("keys", &"[REDACTED]")
            .finish()
    }
}

/// Public wallet information.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublicKeyExport {
    /// Meta-address URI
    pub meta_address: String,
    /// Spending public key
    pub spending_public_key: PublicKey,
    /// Viewing public key
    pub viewing_public_key: PublicKey,
}

/// Exported viewing capability.
#[derive(Clone, Serialize, Deserialize)]
pub struct ViewingKeyExport {
    /// Viewing secret key (hex)
    pub viewing_secret_key: String,
    /// Spending public key
    pub spending_public_key: PublicKey,
}

impl ViewingKeyExport {
    /// Turns the export back into a usable viewing key.
    pub fn into_viewing_key(self) -> Result<ViewingKey> {
        let viewing_sk = SecretKey::from_hex(&self.viewing_secret_key)?;
        Ok(ViewingKey::new(viewing_sk, self.spending_public_key))
    }
}

impl std::fmt::Debug for ViewingKeyExport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewingKeyExport")
            .field("viewing_secret_key", &"[REDACTED]")
            .field("spending_public_key", &self.spending_public_key)
            .finish()
    }
}

/// Checks that a derived spending key really controls `address`.
pub fn verify_spending_key(spending_key: &SecretKey, address: &EthAddress) -> Result<()> {
    let derived = eth_address_from_secret(spending_key)?;
    if derived != *address {
        return Err(CloakError::VerificationFailed(format!(
            "key controls {}, expected {}",
            derived, address
        )));
    }
    Ok(())
}
