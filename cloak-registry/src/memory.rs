//! In-memory announcement channel.
//!
//! An in-process stand-in for the announcer contract: every publish is
//! mined into its own block, and logs are kept ordered by
//! `(block_number, log_index)`. Suitable for development and testing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, instrument};

use cloak_core::constants::DEFAULT_MAX_BLOCK_RANGE;
use cloak_core::error::{CloakError, Result};
use cloak_core::traits::AnnouncementChannel;
use cloak_core::types::{Announcement, AnnouncementStats, BlockBound, EthAddress, TransactionHandle};
use cloak_crypto::keccak256;

use crate::channel::checked_window;

type Position = (u64, u64);

/// In-memory announcement channel.
///
/// # Indexing
///
/// Announcements are indexed by:
/// - Position: `(block, log_index)`, for ordered range queries
/// - View tag: For bucket lookups
/// - Tx hash: For duplicate detection on import
///
/// # Thread Safety
///
/// All operations are thread-safe and can be called concurrently.
#[derive(Debug)]
pub struct MemoryChannel {
    /// Primary storage ordered by position
    announcements: RwLock<BTreeMap<Position, Announcement>>,
    /// View tag index: tag → positions
    view_tag_index: DashMap<u8, Vec<Position>>,
    /// Tx hash index: normalized hash → position
    tx_hash_index: DashMap<String, Position>,
    /// Current head block
    head: AtomicU64,
    /// Widest window `list` accepts
    max_block_range: u64,
    /// Account recorded as the announcement caller
    caller: EthAddress,
    /// Channel statistics
    stats: RwLock<AnnouncementStats>,
}

impl MemoryChannel {
    /// Creates an empty channel at block 0.
    pub fn new() -> Self {
        Self {
            announcements: RwLock::new(BTreeMap::new()),
            view_tag_index: DashMap::with_capacity(256),
            tx_hash_index: DashMap::new(),
            head: AtomicU64::new(0),
            max_block_range: DEFAULT_MAX_BLOCK_RANGE,
            caller: EthAddress::zero(),
            stats: RwLock::new(AnnouncementStats::new()),
        }
    }

    /// Sets the widest window `list` accepts.
    pub fn with_max_block_range(mut self, max_block_range: u64) -> Self {
        self.max_block_range = max_block_range;
        self
    }

    /// Sets the account recorded as the caller of published announcements.
    pub fn with_caller(mut self, caller: EthAddress) -> Self {
        self.caller = caller;
        self
    }

    /// Normalizes a tx hash for indexing (lowercase, trimmed).
    fn normalize_tx_hash(hash: &str) -> String {
        hash.trim().to_lowercase()
    }

    fn synthetic_tx_hash(position: Position) -> String {
        let mut input = [0u8; 16];
        input[..8].copy_from_slice(&position.0.to_be_bytes());
        input[8..].copy_from_slice(&position.1.to_be_bytes());
        format!("0x{}", hex::encode(keccak256(&input)))
    }

    /// Indexes and stores an announcement whose position is already set.
    fn insert(&self, store: &mut BTreeMap<Position, Announcement>, ann: Announcement) {
        let position = ann.position();
        if let Some(tag) = ann.view_tag() {
            self.view_tag_index.entry(tag).or_default().push(position);
        }
        if let Some(ref hash) = ann.tx_hash {
            self.tx_hash_index
                .insert(Self::normalize_tx_hash(hash), position);
        }
        self.stats.write().add(&ann);
        self.head.fetch_max(position.0, Ordering::SeqCst);
        store.insert(position, ann);
    }

    /// Mines `count` empty blocks.
    pub fn advance_blocks(&self, count: u64) -> u64 {
        self.head.fetch_add(count, Ordering::SeqCst) + count
    }

    /// Returns the current statistics.
    pub fn stats(&self) -> AnnouncementStats {
        self.stats.read().clone()
    }

    /// Returns the number of announcements.
    pub fn len(&self) -> usize {
        self.announcements.read().len()
    }

    /// Returns true if the channel is empty.
    pub fn is_empty(&self) -> bool {
        self.announcements.read().is_empty()
    }

    /// Clears all announcements and resets the head to block 0.
    pub fn clear(&self) {
        let mut store = self.announcements.write();
        store.clear();
        self.view_tag_index.clear();
        self.tx_hash_index.clear();
        self.head.store(0, Ordering::SeqCst);
        *self.stats.write() = AnnouncementStats::new();
    }

    /// Returns all announcements in ledger order (for export/backup).
    pub fn all_announcements(&self) -> Vec<Announcement> {
        self.announcements.read().values().cloned().collect()
    }

    /// Returns the announcements carrying a view tag, in ledger order.
    pub fn get_by_view_tag(&self, view_tag: u8) -> Vec<Announcement> {
        let mut positions = match self.view_tag_index.get(&view_tag) {
            Some(positions) => positions.clone(),
            None => return Vec::new(),
        };
        positions.sort_unstable();

        let store = self.announcements.read();
        let found: Vec<Announcement> = positions
            .iter()
            .filter_map(|p| store.get(p).cloned())
            .collect();
        debug!(view_tag, count = found.len(), "Retrieved by view tag");
        found
    }

    /// Looks an announcement up by transaction hash.
    pub fn get_by_tx_hash(&self, tx_hash: &str) -> Option<Announcement> {
        let position = *self.tx_hash_index.get(&Self::normalize_tx_hash(tx_hash))?;
        self.announcements.read().get(&position).cloned()
    }

    /// Imports positioned announcements, e.g. from a backup.
    ///
    /// Each announcement keeps its block number and log index. Occupied
    /// positions and duplicate transaction hashes are rejected.
    pub fn import(&self, announcements: Vec<Announcement>) -> Result<usize> {
        let mut store = self.announcements.write();
        let mut imported = 0;

        for mut ann in announcements {
            ann.validate()?;
            let position = ann.position();
            if store.contains_key(&position) {
                return Err(CloakError::InvalidAnnouncement(format!(
                    "position {:?} is already occupied",
                    position
                )));
            }
            match ann.tx_hash {
                Some(ref hash) if self.tx_hash_index.contains_key(&Self::normalize_tx_hash(hash)) => {
                    return Err(CloakError::InvalidAnnouncement(
                        "announcement with this transaction hash already exists".into(),
                    ));
                }
                Some(_) => {}
                None => ann.tx_hash = Some(Self::synthetic_tx_hash(position)),
            }

            self.insert(&mut store, ann);
            imported += 1;
        }

        Ok(imported)
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnnouncementChannel for MemoryChannel {
    /// Publishes an announcement into a freshly mined block.
    #[instrument(skip(self, stealth_address, ephemeral_pub_key, metadata))]
    async fn publish(
        &self,
        scheme_id: u64,
        stealth_address: EthAddress,
        ephemeral_pub_key: &[u8],
        metadata: &[u8],
    ) -> Result<TransactionHandle> {
        let mut ann = Announcement::new(
            scheme_id,
            stealth_address,
            self.caller,
            ephemeral_pub_key.to_vec(),
            metadata.to_vec(),
        );
        ann.validate()?;

        let mut store = self.announcements.write();
        let block = self.head.load(Ordering::SeqCst) + 1;
        let position = (block, 0);
        let tx_hash = Self::synthetic_tx_hash(position);

        ann.block_number = block;
        ann.log_index = 0;
        ann.tx_hash = Some(tx_hash.clone());

        debug!(block, view_tag = ?ann.view_tag(), "Publishing announcement");
        self.insert(&mut store, ann);

        Ok(TransactionHandle::new(tx_hash))
    }

    #[instrument(skip(self))]
    async fn list(&self, from_block: u64, to_block: BlockBound) -> Result<Vec<Announcement>> {
        let to = to_block.resolve(self.head.load(Ordering::SeqCst));
        if checked_window(from_block, to, self.max_block_range)?.is_none() {
            return Ok(Vec::new());
        }

        let found: Vec<Announcement> = self
            .announcements
            .read()
            .range((from_block, 0)..=(to, u64::MAX))
            .map(|(_, ann)| ann.clone())
            .collect();

        debug!(from_block, to, count = found.len(), "Listed announcements");
        Ok(found)
    }

    async fn latest_block(&self) -> Result<u64> {
        Ok(self.head.load(Ordering::SeqCst))
    }

    fn max_block_range(&self) -> u64 {
        self.max_block_range
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloak_core::types::AnnouncementBuilder;

    fn ephemeral_key() -> Vec<u8> {
        let mut key = vec![0x42u8; 33];
        key[0] = 0x02;
        key
    }

    fn stealth(n: u8) -> EthAddress {
        EthAddress::from_array([n; 20])
    }

    async fn publish(channel: &MemoryChannel, view_tag: u8) -> TransactionHandle {
        channel
            .publish(1, stealth(0x11), &ephemeral_key(), &[view_tag])
            .await
            .unwrap()
    }

    fn positioned(block: u64, index: u64, view_tag: u8) -> Announcement {
        AnnouncementBuilder::new()
            .stealth_address(stealth(0x22))
            .ephemeral_pub_key(ephemeral_key())
            .metadata(vec![view_tag])
            .block_number(block)
            .log_index(index)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_publish_mines_sequential_blocks() {
        let channel = MemoryChannel::new().with_caller(stealth(0x99));

        let h1 = publish(&channel, 0x01).await;
        let h2 = publish(&channel, 0x02).await;
        assert_ne!(h1, h2);
        assert_eq!(channel.latest_block().await.unwrap(), 2);

        let listed = channel.list(0, BlockBound::Latest).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].block_number, 1);
        assert_eq!(listed[1].block_number, 2);
        assert_eq!(listed[0].caller, stealth(0x99));
        assert_eq!(listed[0].tx_hash.as_deref(), Some(h1.tx_hash.as_str()));
    }

    #[tokio::test]
    async fn test_list_is_inclusive() {
        let channel = MemoryChannel::new();
        for tag in 0..5u8 {
            publish(&channel, tag).await;
        }

        let middle = channel.list(2, BlockBound::Number(4)).await.unwrap();
        let blocks: Vec<u64> = middle.iter().map(|a| a.block_number).collect();
        assert_eq!(blocks, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_list_rejects_wide_window() {
        let channel = MemoryChannel::new().with_max_block_range(10);
        let result = channel.list(0, BlockBound::Number(10)).await;
        assert!(matches!(
            result,
            Err(CloakError::RangeTooLarge { requested: 11, max: 10 })
        ));
        assert!(channel.list(1, BlockBound::Number(10)).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_orders_by_block_then_log_index() {
        let channel = MemoryChannel::new();
        channel
            .import(vec![positioned(5, 2, 0), positioned(3, 0, 1), positioned(5, 0, 2)])
            .unwrap();

        let listed = channel.list(0, BlockBound::Latest).await.unwrap();
        let positions: Vec<_> = listed.iter().map(Announcement::position).collect();
        assert_eq!(positions, vec![(3, 0), (5, 0), (5, 2)]);
        assert_eq!(channel.latest_block().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_import_rejects_occupied_position() {
        let channel = MemoryChannel::new();
        channel.import(vec![positioned(1, 0, 0)]).unwrap();
        let result = channel.import(vec![positioned(1, 0, 9)]);
        assert!(matches!(result, Err(CloakError::InvalidAnnouncement(_))));
    }

    #[tokio::test]
    async fn test_invalid_announcement_rejected() {
        let channel = MemoryChannel::new();
        let empty_key = channel.publish(1, stealth(0x11), &[], &[0x01]).await;
        assert!(matches!(empty_key, Err(CloakError::InvalidAnnouncement(_))));

        let no_tag = channel.publish(1, stealth(0x11), &ephemeral_key(), &[]).await;
        assert!(no_tag.is_err());
        assert!(channel.is_empty());
    }

    #[tokio::test]
    async fn test_get_by_view_tag_and_tx_hash() {
        let channel = MemoryChannel::new();
        let handle = publish(&channel, 0x42).await;
        publish(&channel, 0x42).await;
        publish(&channel, 0x00).await;

        assert_eq!(channel.get_by_view_tag(0x42).len(), 2);
        assert_eq!(channel.get_by_view_tag(0x00).len(), 1);
        assert!(channel.get_by_view_tag(0xFF).is_empty());

        let found = channel.get_by_tx_hash(&handle.tx_hash.to_uppercase()).unwrap();
        assert_eq!(found.block_number, 1);
    }

    #[tokio::test]
    async fn test_stats_and_clear() {
        let channel = MemoryChannel::new();
        publish(&channel, 0x42).await;
        channel.publish(2, stealth(0x11), &ephemeral_key(), &[0x42]).await.unwrap();

        let stats = channel.stats();
        assert_eq!(stats.total_count, 2);
        assert_eq!(stats.view_tag_distribution[0x42], 2);
        assert_eq!(stats.foreign_scheme_count, 1);

        channel.clear();
        assert!(channel.is_empty());
        assert_eq!(channel.latest_block().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_advance_blocks() {
        let channel = MemoryChannel::new();
        assert_eq!(channel.advance_blocks(10), 10);
        publish(&channel, 0x01).await;
        let listed = channel.list(0, BlockBound::Latest).await.unwrap();
        assert_eq!(listed[0].block_number, 11);
    }

    #[tokio::test]
    async fn test_concurrent_publish() {
        use std::sync::Arc;
        use tokio::task::JoinSet;

        let channel = Arc::new(MemoryChannel::new().with_max_block_range(1_000));
        let mut tasks = JoinSet::new();

        for i in 0..100u8 {
            let ch = channel.clone();
            tasks.spawn(async move {
                ch.publish(1, stealth(0x11), &ephemeral_key(), &[i]).await.unwrap()
            });
        }

        while let Some(result) = tasks.join_next().await {
            result.unwrap();
        }

        assert_eq!(channel.len(), 100);
        let listed = channel.list(1, BlockBound::Latest).await.unwrap();
        let blocks: Vec<u64> = listed.iter().map(|a| a.block_number).collect();
        assert_eq!(blocks, (1..=100).collect::<Vec<_>>());
    }
}
