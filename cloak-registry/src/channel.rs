//! Announcement channel backed by the ERC-5564 announcer contract.

use std::sync::Arc;

use alloy::primitives::{Bytes, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use tracing::{debug, info, instrument};

use cloak_core::error::{CloakError, Result};
use cloak_core::traits::AnnouncementChannel;
use cloak_core::types::{Announcement, BlockBound, EthAddress, TransactionHandle};

use crate::config::LedgerConfig;
use crate::contracts::IERC5564Announcer;
use crate::rpc::{log_position, LedgerClient, LogQuery, RpcLedger};

/// Reads and writes announcements through a [`LedgerClient`].
///
/// `publish` calls `announce(uint256,address,bytes,bytes)` on the announcer;
/// `list` decodes `Announcement` logs emitted by it.
pub struct RpcAnnouncementChannel {
    ledger: Arc<dyn LedgerClient>,
    announcer: EthAddress,
    max_block_range: u64,
}

impl RpcAnnouncementChannel {
    /// Creates a channel over an existing ledger client.
    pub fn new(ledger: Arc<dyn LedgerClient>, announcer: EthAddress, max_block_range: u64) -> Self {
        Self {
            ledger,
            announcer,
            max_block_range,
        }
    }

    /// Creates a channel with its own JSON-RPC client.
    pub fn from_config(config: LedgerConfig) -> Result<Self> {
        let announcer = config.announcer_address;
        let max_block_range = config.max_block_range;
        let ledger = RpcLedger::new(config)?;
        Ok(Self::new(Arc::new(ledger), announcer, max_block_range))
    }

    /// The announcer contract address.
    pub fn announcer(&self) -> EthAddress {
        self.announcer
    }
}

/// Builds the calldata for `announce(schemeId, stealthAddress, ephemeralPubKey, metadata)`.
pub fn encode_announce_call(
    scheme_id: u64,
    stealth_address: EthAddress,
    ephemeral_pub_key: &[u8],
    metadata: &[u8],
) -> Bytes {
    IERC5564Announcer::announceCall {
        schemeId: U256::from(scheme_id),
        stealthAddress: stealth_address.address(),
        ephemeralPubKey: Bytes::copy_from_slice(ephemeral_pub_key),
        metadata: Bytes::copy_from_slice(metadata),
    }
    .abi_encode()
    .into()
}

/// Decodes an `Announcement` log.
///
/// Returns `None` for scheme ids beyond `u64`; no scheme we can scan lives
/// there, and the announcer accepts any value.
pub fn decode_announcement_log(log: &Log) -> Result<Option<Announcement>> {
    let decoded = log
        .log_decode::<IERC5564Announcer::Announcement>()
        .map_err(|e| CloakError::AbiError(e.to_string()))?;
    let event = decoded.inner.data;

    let scheme_id = match u64::try_from(event.schemeId) {
        Ok(id) => id,
        Err(_) => {
            debug!(scheme_id = %event.schemeId, "Skipping announcement with unknown scheme");
            return Ok(None);
        }
    };

    let mut announcement = Announcement::new(
        scheme_id,
        event.stealthAddress.into(),
        event.caller.into(),
        event.ephemeralPubKey.to_vec(),
        event.metadata.to_vec(),
    );
    (announcement.block_number, announcement.log_index) = log_position(log);
    announcement.tx_hash = log.transaction_hash.map(|hash| hash.to_string());
    Ok(Some(announcement))
}

/// Resolves and bounds-checks a list window.
///
/// Returns `None` for an empty window (`from > to`).
pub(crate) fn checked_window(from_block: u64, to_block: u64, max: u64) -> Result<Option<u64>> {
    if from_block > to_block {
        return Ok(None);
    }
    let requested = to_block - from_block + 1;
    if requested > max {
        return Err(CloakError::RangeTooLarge { requested, max });
    }
    Ok(Some(requested))
}

#[async_trait]
impl AnnouncementChannel for RpcAnnouncementChannel {
    #[instrument(
        skip(self, stealth_address, ephemeral_pub_key, metadata),
        fields(stealth = %stealth_address)
    )]
    async fn publish(
        &self,
        scheme_id: u64,
        stealth_address: EthAddress,
        ephemeral_pub_key: &[u8],
        metadata: &[u8],
    ) -> Result<TransactionHandle> {
        let input = encode_announce_call(scheme_id, stealth_address, ephemeral_pub_key, metadata);
        let handle = self.ledger.send_transaction(self.announcer, input).await?;
        info!(tx_hash = %handle, "Announcement submitted");
        Ok(handle)
    }

    #[instrument(skip(self))]
    async fn list(&self, from_block: u64, to_block: BlockBound) -> Result<Vec<Announcement>> {
        let to = match to_block {
            BlockBound::Number(n) => n,
            BlockBound::Latest => self.ledger.block_number().await?,
        };
        if checked_window(from_block, to, self.max_block_range)?.is_none() {
            return Ok(Vec::new());
        }

        let query = LogQuery::for_event::<IERC5564Announcer::Announcement>(
            self.announcer,
            from_block,
            BlockBound::Number(to),
        );
        let logs = self.ledger.get_logs(&query).await?;

        let mut announcements = Vec::with_capacity(logs.len());
        for log in &logs {
            if let Some(announcement) = decode_announcement_log(log).map_err(CloakError::transport)? {
                announcements.push(announcement);
            }
        }
        announcements.sort_by_key(Announcement::position);

        debug!(from_block, to, count = announcements.len(), "Listed announcements");
        Ok(announcements)
    }

    async fn latest_block(&self) -> Result<u64> {
        self.ledger.block_number().await
    }

    fn max_block_range(&self) -> u64 {
        self.max_block_range
    }
}
