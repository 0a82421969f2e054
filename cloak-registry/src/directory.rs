//! Meta-address directory.
//!
//! Maps accounts to the stealth meta-addresses senders derive from, one
//! entry per `(account, scheme_id)`.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, instrument};

use cloak_core::error::{CloakError, Result};
use cloak_core::traits::MetaAddressDirectory;
use cloak_core::types::{EthAddress, StealthMetaAddress};
use cloak_crypto::parse_public_key;

/// In-memory directory.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    entries: DashMap<(EthAddress, u64), StealthMetaAddress>,
}

impl MemoryDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl MetaAddressDirectory for MemoryDirectory {
    /// Registers a meta-address after checking both keys are curve points.
    #[instrument(skip(self, meta))]
    async fn register(
        &self,
        account: EthAddress,
        scheme_id: u64,
        meta: StealthMetaAddress,
    ) -> Result<()> {
        parse_public_key(meta.spending_pk.as_bytes())
            .and_then(|_| parse_public_key(meta.viewing_pk.as_bytes()))
            .map_err(|e| CloakError::InvalidMetaAddress(e.to_string()))?;

        let replaced = self.entries.insert((account, scheme_id), meta).is_some();
        debug!(replaced, "Registered meta-address");
        Ok(())
    }

    async fn lookup(
        &self,
        account: EthAddress,
        scheme_id: u64,
    ) -> Result<Option<StealthMetaAddress>> {
        Ok(self.entries.get(&(account, scheme_id)).map(|e| *e.value()))
    }
}
