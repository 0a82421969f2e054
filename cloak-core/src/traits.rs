//! Common traits for CLOAK.
//!
//! These traits are the seams between the protocol logic and the ledger,
//! the order venue and key custody. Every implementation is injected at
//! construction so tests can swap in-memory fakes for network clients.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    Announcement, BlockBound, CreateLimitOrderParams, EthAddress, LimitOrderExecutedEvent,
    StealthKeys, StealthMetaAddress, TransactionHandle, ViewingKey,
};

// ═══════════════════════════════════════════════════════════════════════════════
// ANNOUNCEMENT CHANNEL
// ═══════════════════════════════════════════════════════════════════════════════

/// Publish and read stealth payment announcements.
///
/// Implementations might use:
/// - An in-process ledger (for testing/development)
/// - The ERC-5564 announcer contract over JSON-RPC
#[async_trait]
pub trait AnnouncementChannel: Send + Sync {
    /// Publishes an announcement.
    ///
    /// Returns once the transaction is accepted for submission; inclusion
    /// is not awaited.
    async fn publish(
        &self,
        scheme_id: u64,
        stealth_address: EthAddress,
        ephemeral_pub_key: &[u8],
        metadata: &[u8],
    ) -> Result<TransactionHandle>;

    /// Lists announcements in the inclusive block window.
    ///
    /// Fails with `RangeTooLarge` when the window exceeds
    /// [`max_block_range`](Self::max_block_range) or the provider rejects it.
    async fn list(&self, from_block: u64, to_block: BlockBound) -> Result<Vec<Announcement>>;

    /// Returns the current head block.
    async fn latest_block(&self) -> Result<u64>;

    /// Widest window a single `list` call accepts.
    fn max_block_range(&self) -> u64;
}

// ═══════════════════════════════════════════════════════════════════════════════
// ORDER VENUE
// ═══════════════════════════════════════════════════════════════════════════════

/// Submits limit orders to the execution venue.
#[async_trait]
pub trait OrderSink: Send + Sync {
    /// Submits the order. Errors are reported as `SubmissionFailed`.
    async fn submit(&self, params: &CreateLimitOrderParams) -> Result<TransactionHandle>;
}

/// Source of order execution events.
#[async_trait]
pub trait ExecutionFeed: Send + Sync {
    /// Returns executions at or after `from_block`.
    async fn executions(&self, from_block: u64) -> Result<Vec<LimitOrderExecutedEvent>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// KEY CUSTODY
// ═══════════════════════════════════════════════════════════════════════════════

/// Supplies recipient key material.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Loads the full key set (spending + viewing).
    async fn stealth_keys(&self) -> Result<StealthKeys>;

    /// Loads the scan-only capability.
    async fn viewing_key(&self) -> Result<ViewingKey> {
        Ok(self.stealth_keys().await?.viewing_key())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// META-ADDRESS DIRECTORY
// ═══════════════════════════════════════════════════════════════════════════════

/// Registry mapping accounts to their published stealth meta-addresses.
#[async_trait]
pub trait MetaAddressDirectory: Send + Sync {
    /// Registers (or replaces) the meta-address of `account` for a scheme.
    async fn register(
        &self,
        account: EthAddress,
        scheme_id: u64,
        meta: StealthMetaAddress,
    ) -> Result<()>;

    /// Looks up the meta-address of `account` for a scheme.
    async fn lookup(&self, account: EthAddress, scheme_id: u64)
        -> Result<Option<StealthMetaAddress>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCAN PROGRESS
// ═══════════════════════════════════════════════════════════════════════════════

/// Progress update during scanning.
#[derive(Clone, Debug)]
pub struct ScanProgress {
    /// Total announcements to scan
    pub total: u64,
    /// Announcements scanned so far
    pub scanned: u64,
    /// Announcements that matched view tag
    pub matched_view_tag: u64,
    /// Payments recovered so far
    pub discoveries: u64,
}

/// Callback for scan progress updates.
pub type ProgressCallback = Box<dyn Fn(ScanProgress) + Send + Sync>;
