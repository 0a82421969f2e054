//! Key providers.
//!
//! [`MemoryKeyProvider`] holds keys in process memory. [`EnvKeyProvider`]
//! reads hex-encoded secrets from the environment (and a `.env` file),
//! and can run in scan-only mode when only the viewing secret and the
//! spending public key are present.

use async_trait::async_trait;

use cloak_core::error::{CloakError, Result};
use cloak_core::traits::KeyProvider;
use cloak_core::types::{PublicKey, SecretKey, StealthKeys, ViewingKey};
use cloak_crypto::{keypair_from_secret, public_key_from_secret};

/// Environment variable holding the spending secret key.
pub const ENV_SPENDING_KEY: &str = "CLOAK_SPENDING_KEY";
/// Environment variable holding the viewing secret key.
pub const ENV_VIEWING_KEY: &str = "CLOAK_VIEWING_KEY";
/// Environment variable holding the spending public key (scan-only mode).
pub const ENV_SPENDING_PUBLIC_KEY: &str = "CLOAK_SPENDING_PUBLIC_KEY";

/// Keys held in memory.
#[derive(Clone, Debug)]
pub struct MemoryKeyProvider {
    keys: StealthKeys,
}

impl MemoryKeyProvider {
    /// Wraps an existing key set.
    pub fn new(keys: StealthKeys) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl KeyProvider for MemoryKeyProvider {
    async fn stealth_keys(&self) -> Result<StealthKeys> {
        Ok(self.keys.clone())
    }
}

/// Keys read from environment variables.
#[derive(Clone, Debug)]
pub struct EnvKeyProvider {
    spending_var: String,
    viewing_var: String,
    spending_public_var: String,
}

impl Default for EnvKeyProvider {
    fn default() -> Self {
        Self {
            spending_var: ENV_SPENDING_KEY.to_string(),
            viewing_var: ENV_VIEWING_KEY.to_string(),
            spending_public_var: ENV_SPENDING_PUBLIC_KEY.to_string(),
        }
    }
}

impl EnvKeyProvider {
    /// Uses the standard variable names, loading `.env` if present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::default()
    }

    /// Uses custom variable names.
    pub fn with_vars(
        spending_var: impl Into<String>,
        viewing_var: impl Into<String>,
        spending_public_var: impl Into<String>,
    ) -> Self {
        Self {
            spending_var: spending_var.into(),
            viewing_var: viewing_var.into(),
            spending_public_var: spending_public_var.into(),
        }
    }

    fn read(var: &str) -> Result<Option<String>> {
        match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => Ok(Some(value.trim().to_string())),
            Ok(_) | Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(CloakError::KeyStorageError(format!("{}: {}", var, e))),
        }
    }

    fn read_secret(var: &str) -> Result<SecretKey> {
        let value = Self::read(var)?
            .ok_or_else(|| CloakError::KeyStorageError(format!("{} is not set", var)))?;
        SecretKey::from_hex(&value)
    }
}

#[async_trait]
impl KeyProvider for EnvKeyProvider {
    async fn stealth_keys(&self) -> Result<StealthKeys> {
        let spending = keypair_from_secret(&Self::read_secret(&self.spending_var)?)?;
        let viewing = keypair_from_secret(&Self::read_secret(&self.viewing_var)?)?;
        Ok(StealthKeys::new(spending, viewing))
    }

    async fn viewing_key(&self) -> Result<ViewingKey> {
        let viewing_sk = Self::read_secret(&self.viewing_var)?;
        let spending_pk = match Self::read(&self.spending_public_var)? {
            Some(hex_pk) => PublicKey::from_hex(&hex_pk)?,
            None => public_key_from_secret(&Self::read_secret(&self.spending_var)?)?,
        };
        Ok(ViewingKey::new(viewing_sk, spending_pk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloak_crypto::generate_stealth_keys;

    #[tokio::test]
    async fn test_memory_provider() {
        let keys = generate_stealth_keys();
        let provider = MemoryKeyProvider::new(keys.clone());

        let loaded = provider.stealth_keys().await.unwrap();
        assert_eq!(loaded.meta_address(), keys.meta_address());

        let vk = provider.viewing_key().await.unwrap();
        assert_eq!(vk.spending_pk, keys.spending.public);
    }

    #[tokio::test]
    async fn test_env_provider_full_keys() {
        let keys = generate_stealth_keys();
        std::env::set_var("CLOAK_TEST_FULL_SPEND", keys.spending.secret.to_hex());
        std::env::set_var("CLOAK_TEST_FULL_VIEW", keys.viewing.secret.to_hex());

        let provider = EnvKeyProvider::with_vars(
            "CLOAK_TEST_FULL_SPEND",
            "CLOAK_TEST_FULL_VIEW",
            "CLOAK_TEST_FULL_SPEND_PK",
        );
        let loaded = provider.stealth_keys().await.unwrap();
        assert_eq!(loaded.meta_address(), keys.meta_address());
    }

    #[tokio::test]
    async fn test_env_provider_scan_only() {
        let keys = generate_stealth_keys();
        std::env::set_var("CLOAK_TEST_SCAN_VIEW", keys.viewing.secret.to_hex());
        std::env::set_var("CLOAK_TEST_SCAN_SPEND_PK", keys.spending.public.to_hex());

        let provider = EnvKeyProvider::with_vars(
            "CLOAK_TEST_SCAN_SPEND",
            "CLOAK_TEST_SCAN_VIEW",
            "CLOAK_TEST_SCAN_SPEND_PK",
        );

        let vk = provider.viewing_key().await.unwrap();
        assert_eq!(vk.spending_pk, keys.spending.public);
        assert!(matches!(
            provider.stealth_keys().await,
            Err(CloakError::KeyStorageError(_))
        ));
    }

    #[tokio::test]
    async fn test_env_provider_rejects_bad_hex() {
        std::env::set_var("CLOAK_TEST_BAD_SPEND", "not-hex");
        std::env::set_var("CLOAK_TEST_BAD_VIEW", "00");

        let provider =
            EnvKeyProvider::with_vars("CLOAK_TEST_BAD_SPEND", "CLOAK_TEST_BAD_VIEW", "UNUSED");
        assert!(provider.stealth_keys().await.is_err());
    }
}
