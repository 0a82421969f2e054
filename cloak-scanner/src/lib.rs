//! # CLOAK Scanner
//!
//! Scans announcement logs to recover the payments addressed to a
//! viewing key.
//!
//! Each announcement first gets the cheap view-tag check; only the ~1/256
//! that pass pay for a full address derivation, and only an exact address
//! match (plus a matching commitment, when published) counts as recovered.
//!
//! ## Features
//!
//! - **Paged Fetching**: Splits wide windows into provider-sized pages
//!   fetched concurrently
//! - **Progress Reporting**: Callbacks for UI progress updates
//! - **Resumable Scans**: Track the last scanned block to resume later
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use cloak_core::traits::AnnouncementChannel;
//! use cloak_core::types::{Announcement, BlockBound, EthAddress};
//! use cloak_registry::MemoryChannel;
//! use cloak_scanner::AnnouncementScanner;
//! use cloak_stealth::StealthAddressDeriver;
//!
//! # tokio_test::block_on(async {
//! let keys = cloak_crypto::generate_stealth_keys();
//! let channel = Arc::new(MemoryChannel::new());
//!
//! let stealth = StealthAddressDeriver::new().generate(&keys.meta_address()).unwrap();
//! let ann = Announcement::for_stealth_address(&stealth, EthAddress::zero());
//! channel
//!     .publish(ann.scheme_id, ann.stealth_address, &ann.ephemeral_pub_key, &ann.metadata)
//!     .await
//!     .unwrap();
//!
//! let scanner = AnnouncementScanner::new(channel);
//! let found = scanner.scan(&keys.viewing_key(), 0, BlockBound::Latest).await.unwrap();
//! assert_eq!(found[0].stealth.address, stealth.address);
//! # });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt, TryStreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use cloak_core::constants::DEFAULT_SCAN_CONCURRENCY;
use cloak_core::error::{CloakError, Result};
use cloak_core::traits::{AnnouncementChannel, ProgressCallback, ScanProgress};
use cloak_core::types::{Announcement, BlockBound, RecoveredAnnouncement, ViewingKey};
use cloak_stealth::discovery::{scan_announcement, ScanResult, ScanStats};

/// Scanner configuration.
#[derive(Clone, Debug)]
pub struct ScannerConfig {
    /// Blocks per page for paged scans (`None` = the channel's maximum)
    pub page_size: Option<u64>,
    /// Pages fetched concurrently
    pub concurrency: usize,
    /// Announcements between progress callbacks
    pub progress_interval: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            page_size: None,
            concurrency: DEFAULT_SCAN_CONCURRENCY,
            progress_interval: 100,
        }
    }
}

impl ScannerConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page size.
    pub fn page_size(mut self, blocks: u64) -> Self {
        self.page_size = Some(blocks);
        self
    }

    /// Sets the number of pages fetched at once.
    pub fn concurrency(mut self, pages: usize) -> Self {
        self.concurrency = pages;
        self
    }

    /// Sets how often progress is reported.
    pub fn progress_interval(mut self, announcements: u64) -> Self {
        self.progress_interval = announcements;
        self
    }
}

/// Scan position for resumable scanning.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScanPosition {
    /// Last block fully scanned
    pub last_block: Option<u64>,
    /// Total announcements scanned in this session
    pub total_scanned: u64,
    /// Total discoveries in this session
    pub total_discoveries: u64,
}

impl ScanPosition {
    /// Creates a new scan position.
    pub fn new() -> Self {
        Self::default()
    }

    /// First block a resumed scan should read.
    pub fn next_block(&self) -> u64 {
        self.last_block.map_or(0, |b| b + 1)
    }

    /// Records a completed window.
    pub fn advance(&mut self, to_block: u64, scanned: u64, discoveries: u64) {
        self.last_block = Some(self.last_block.map_or(to_block, |b| b.max(to_block)));
        self.total_scanned += scanned;
        self.total_discoveries += discoveries;
    }
}

/// Scans an [`AnnouncementChannel`] for payments.
///
/// Scans are side-effect free apart from the statistics and position the
/// scanner keeps; scanning the same pinned window twice yields the same
/// ordered result.
pub struct AnnouncementScanner {
    channel: Arc<dyn AnnouncementChannel>,
    config: ScannerConfig,
    position: RwLock<ScanPosition>,
    stats: RwLock<ScanStats>,
}

impl AnnouncementScanner {
    /// Creates a scanner over a channel with the default configuration.
    pub fn new(channel: Arc<dyn AnnouncementChannel>) -> Self {
        Self::with_config(channel, ScannerConfig::default())
    }

    /// Creates a scanner with custom configuration.
    pub fn with_config(channel: Arc<dyn AnnouncementChannel>, config: ScannerConfig) -> Self {
        Self {
            channel,
            config,
            position: RwLock::new(ScanPosition::new()),
            stats: RwLock::new(ScanStats::new()),
        }
    }

    /// Returns the current scan position.
    pub fn position(&self) -> ScanPosition {
        self.position.read().clone()
    }

    /// Returns the accumulated statistics.
    pub fn stats(&self) -> ScanStats {
        self.stats.read().clone()
    }

    /// Resets position and statistics.
    pub fn reset_position(&self) {
        *self.position.write() = ScanPosition::new();
        *self.stats.write() = ScanStats::new();
    }

    async fn resolve(&self, to_block: BlockBound) -> Result<u64> {
        match to_block {
            BlockBound::Number(n) => Ok(n),
            BlockBound::Latest => self.channel.latest_block().await,
        }
    }

    /// Scans `[from_block, to_block]` with a single `list` call.
    ///
    /// `Latest` is pinned to the head block before listing. A window wider
    /// than the channel accepts fails with `RangeTooLarge`; use
    /// [`scan_paged`](Self::scan_paged) for those.
    #[instrument(skip(self, viewing_key))]
    pub async fn scan(
        &self,
        viewing_key: &ViewingKey,
        from_block: u64,
        to_block: BlockBound,
    ) -> Result<Vec<RecoveredAnnouncement>> {
        let start = Instant::now();
        let to = self.resolve(to_block).await?;
        let announcements = self.channel.list(from_block, BlockBound::Number(to)).await?;
        let found = self.process(viewing_key, &announcements, to, None, start);
        Ok(found)
    }

    /// Scans a window of any width, fetching pages concurrently.
    #[instrument(skip(self, viewing_key))]
    pub async fn scan_paged(
        &self,
        viewing_key: &ViewingKey,
        from_block: u64,
        to_block: BlockBound,
    ) -> Result<Vec<RecoveredAnnouncement>> {
        let start = Instant::now();
        let to = self.resolve(to_block).await?;
        let announcements = self.fetch_pages(from_block, to).await?;
        Ok(self.process(viewing_key, &announcements, to, None, start))
    }

    /// Paged scan with progress reporting.
    #[instrument(skip(self, viewing_key, progress_callback))]
    pub async fn scan_with_progress(
        &self,
        viewing_key: &ViewingKey,
        from_block: u64,
        to_block: BlockBound,
        progress_callback: ProgressCallback,
    ) -> Result<Vec<RecoveredAnnouncement>> {
        let start = Instant::now();
        let to = self.resolve(to_block).await?;
        let announcements = self.fetch_pages(from_block, to).await?;
        Ok(self.process(
            viewing_key,
            &announcements,
            to,
            Some(&progress_callback),
            start,
        ))
    }

    /// Continues from the recorded position up to the head block.
    pub async fn scan_from_position(
        &self,
        viewing_key: &ViewingKey,
    ) -> Result<Vec<RecoveredAnnouncement>> {
        let from = self.position.read().next_block();
        let head = self.channel.latest_block().await?;
        if from > head {
            return Ok(Vec::new());
        }
        self.scan_paged(viewing_key, from, BlockBound::Number(head)).await
    }

    /// Classifies a single announcement and records it in the statistics.
    pub fn scan_one(&self, viewing_key: &ViewingKey, announcement: &Announcement) -> ScanResult {
        let result = scan_announcement(announcement, viewing_key);
        self.stats.write().record(&result);
        result
    }

    fn page_size(&self) -> u64 {
        self.config
            .page_size
            .unwrap_or_else(|| self.channel.max_block_range())
            .clamp(1, self.channel.max_block_range().max(1))
    }

    /// Lists `[from, to]` in pages, merged in ledger order.
    async fn fetch_pages(&self, from: u64, to: u64) -> Result<Vec<Announcement>> {
        if from > to {
            return Ok(Vec::new());
        }
        let pages = split_range(from, to, self.page_size());
        debug!(pages = pages.len(), from, to, "Fetching pages");

        let channel = &self.channel;
        let batches: Vec<Vec<Announcement>> = stream::iter(pages)
            .map(|(a, b)| async move {
                let batch = channel.list(a, BlockBound::Number(b)).await?;
                debug!(from = a, to = b, count = batch.len(), "Fetched page");
                Ok::<_, CloakError>(batch)
            })
            .buffered(self.config.concurrency.max(1))
            .try_collect()
            .await?;

        let mut announcements: Vec<Announcement> = batches.into_iter().flatten().collect();
        announcements.sort_by_key(Announcement::position);
        announcements.dedup_by_key(|a| a.position());
        Ok(announcements)
    }

    fn process(
        &self,
        viewing_key: &ViewingKey,
        announcements: &[Announcement],
        to_block: u64,
        progress_callback: Option<&ProgressCallback>,
        start: Instant,
    ) -> Vec<RecoveredAnnouncement> {
        let mut stats = ScanStats::new();
        let mut found = Vec::new();
        let total = announcements.len() as u64;
        let interval = self.config.progress_interval.max(1);

        for announcement in announcements {
            let result = scan_announcement(announcement, viewing_key);
            stats.record(&result);
            if let Some(recovered) = result.into_recovered() {
                found.push(recovered);
            }

            if let Some(callback) = progress_callback {
                if stats.total_scanned % interval == 0 && stats.total_scanned < total {
                    callback(progress(total, &stats));
                }
            }
        }

        if let Some(callback) = progress_callback {
            callback(progress(total, &stats));
        }

        found.sort_by_key(|r| r.announcement.position());
        stats.duration_ms = start.elapsed().as_millis() as u64;

        self.position
            .write()
            .advance(to_block, stats.total_scanned, stats.discoveries);
        self.stats.write().merge(&stats);

        info!(
            discoveries = stats.discoveries,
            scanned = stats.total_scanned,
            false_positives = stats.false_positives,
            duration_ms = stats.duration_ms,
            rate = %format!("{:.2}/s", stats.rate()),
            "Scan complete"
        );

        found
    }
}

fn progress(total: u64, stats: &ScanStats) -> ScanProgress {
    ScanProgress {
        total,
        scanned: stats.total_scanned,
        matched_view_tag: stats.view_tag_matches,
        discoveries: stats.discoveries,
    }
}

/// Splits `[from, to]` into consecutive windows of at most `size` blocks.
pub fn split_range(from: u64, to: u64, size: u64) -> Vec<(u64, u64)> {
    let size = size.max(1);
    let mut pages = Vec::new();
    let mut start = from;
    while start <= to {
        let end = start.saturating_add(size - 1).min(to);
        pages.push((start, end));
        if end == u64::MAX {
            break;
        }
        start = end + 1;
    }
    pages
}

/// Scan result summary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Number of announcements scanned
    pub total_scanned: u64,
    /// Announcements skipped for another scheme id
    pub foreign_scheme: u64,
    /// Number of view tag matches
    pub view_tag_matches: u64,
    /// View tag matches that were not ours
    pub false_positives: u64,
    /// Number of payments discovered
    pub discoveries: u64,
    /// Number of errors
    pub errors: u64,
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// Scan rate (announcements per second)
    pub rate: f64,
    /// Filter efficiency (% filtered by view tag)
    pub filter_efficiency: f64,
}

impl From<ScanStats> for ScanSummary {
    fn from(stats: ScanStats) -> Self {
        Self {
            total_scanned: stats.total_scanned,
            foreign_scheme: stats.foreign_scheme,
            view_tag_matches: stats.view_tag_matches,
            false_positives: stats.false_positives,
            discoveries: stats.discoveries,
            errors: stats.errors,
            duration_ms: stats.duration_ms,
            rate: stats.rate(),
            filter_efficiency: stats.filter_efficiency(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cloak_core::types::{EthAddress, StealthKeys, TransactionHandle};
    use cloak_crypto::{generate_keypair_with_rng, generate_stealth_keys};
    use cloak_registry::MemoryChannel;
    use cloak_stealth::StealthAddressDeriver;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    async fn publish(channel: &MemoryChannel, ann: &Announcement) {
        channel
            .publish(
                ann.scheme_id,
                ann.stealth_address,
                &ann.ephemeral_pub_key,
                &ann.metadata,
            )
            .await
            .unwrap();
    }

    fn announcement_for(keys: &StealthKeys) -> Announcement {
        let stealth = StealthAddressDeriver::new()
            .generate(&keys.meta_address())
            .unwrap();
        Announcement::for_stealth_address(&stealth, EthAddress::zero())
    }

    fn setup() -> (StealthKeys, Arc<MemoryChannel>) {
        (generate_stealth_keys(), Arc::new(MemoryChannel::new()))
    }

    #[tokio::test]
    async fn test_scan_empty_channel() {
        let (keys, channel) = setup();
        let scanner = AnnouncementScanner::new(channel);

        let found = scanner
            .scan(&keys.viewing_key(), 0, BlockBound::Latest)
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_scan_finds_only_own_payments_in_order() {
        let (keys, channel) = setup();
        let other = generate_stealth_keys();

        let mut expected = Vec::new();
        for i in 0..12 {
            if i % 4 == 1 {
                let ann = announcement_for(&keys);
                expected.push(ann.stealth_address);
                publish(&channel, &ann).await;
            } else {
                publish(&channel, &announcement_for(&other)).await;
            }
        }

        let scanner = AnnouncementScanner::new(channel);
        let found = scanner
            .scan(&keys.viewing_key(), 0, BlockBound::Latest)
            .await
            .unwrap();

        let addresses: Vec<EthAddress> = found.iter().map(|r| r.stealth.address).collect();
        assert_eq!(addresses, expected);
        let blocks: Vec<u64> = found.iter().map(|r| r.announcement.block_number).collect();
        assert_eq!(blocks, vec![2, 6, 10]);
    }

    #[tokio::test]
    async fn test_view_tag_collision_yields_nothing() {
        let (alice, channel) = setup();
        let bob = generate_stealth_keys();
        let ann = announcement_for(&alice);
        publish(&channel, &ann).await;

        let tag = ann.view_tag().unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(256);
        let deriver = StealthAddressDeriver::new();
        let colliding = (0..8192)
            .map(|_| ViewingKey::new(generate_keypair_with_rng(&mut rng).secret.clone(), bob.spending.public))
            .find(|vk| {
                deriver
                    .recover_if_mine(vk, &ann.ephemeral_pub_key, tag)
                    .unwrap()
                    .is_some()
            })
            .expect("view tag collision within 8192 keys");

        let scanner = AnnouncementScanner::new(channel);
        let found = scanner
            .scan(&colliding, 0, BlockBound::Latest)
            .await
            .unwrap();
        assert!(found.is_empty());
        assert_eq!(scanner.stats().false_positives, 1);
        assert_eq!(scanner.stats().discoveries, 0);
    }

    #[tokio::test]
    async fn test_scan_is_idempotent() {
        let (keys, channel) = setup();
        for _ in 0..5 {
            publish(&channel, &announcement_for(&keys)).await;
            publish(&channel, &announcement_for(&generate_stealth_keys())).await;
        }

        let scanner = AnnouncementScanner::new(channel);
        let vk = keys.viewing_key();
        let first = scanner.scan(&vk, 0, BlockBound::Number(10)).await.unwrap();
        let second = scanner.scan(&vk, 0, BlockBound::Number(10)).await.unwrap();

        assert_eq!(first.len(), 5);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_scan_skips_foreign_scheme_and_tampered() {
        let (keys, channel) = setup();

        let mut foreign = announcement_for(&keys);
        foreign.scheme_id = 2;
        publish(&channel, &foreign).await;

        let mut tampered = announcement_for(&keys);
        tampered.metadata[5] ^= 0x01;
        publish(&channel, &tampered).await;

        let genuine = announcement_for(&keys);
        publish(&channel, &genuine).await;

        let scanner = AnnouncementScanner::new(channel);
        let found = scanner
            .scan(&keys.viewing_key(), 0, BlockBound::Latest)
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].stealth.address, genuine.stealth_address);

        let stats = scanner.stats();
        assert_eq!(stats.foreign_scheme, 1);
        assert_eq!(stats.tampered, 1);
        assert_eq!(stats.discoveries, 1);
    }

    #[tokio::test]
    async fn test_scan_rejects_wide_window() {
        let keys = generate_stealth_keys();
        let channel = Arc::new(MemoryChannel::new().with_max_block_range(10));
        let scanner = AnnouncementScanner::new(channel);

        let result = scanner
            .scan(&keys.viewing_key(), 0, BlockBound::Number(50))
            .await;
        assert!(matches!(result, Err(CloakError::RangeTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_scan_paged_matches_single_scan() {
        let keys = generate_stealth_keys();
        let channel = Arc::new(MemoryChannel::new().with_max_block_range(4));
        for i in 0..15 {
            if i % 3 == 0 {
                publish(&channel, &announcement_for(&keys)).await;
            } else {
                publish(&channel, &announcement_for(&generate_stealth_keys())).await;
            }
        }

        let scanner =
            AnnouncementScanner::with_config(channel.clone(), ScannerConfig::new().concurrency(3));
        let paged = scanner
            .scan_paged(&keys.viewing_key(), 1, BlockBound::Latest)
            .await
            .unwrap();
        assert_eq!(paged.len(), 5);

        let mut single = Vec::new();
        for (a, b) in split_range(1, 15, 4) {
            single.extend(
                scanner
                    .scan(&keys.viewing_key(), a, BlockBound::Number(b))
                    .await
                    .unwrap(),
            );
        }
        assert_eq!(paged, single);
    }

    #[tokio::test]
    async fn test_scan_with_progress_reports() {
        let (keys, channel) = setup();
        for _ in 0..25 {
            publish(&channel, &announcement_for(&keys)).await;
        }

        let updates = Arc::new(RwLock::new(Vec::new()));
        let sink = updates.clone();
        let callback: ProgressCallback = Box::new(move |p| sink.write().push(p));

        let scanner = AnnouncementScanner::with_config(
            channel,
            ScannerConfig::new().progress_interval(10),
        );
        let found = scanner
            .scan_with_progress(&keys.viewing_key(), 0, BlockBound::Latest, callback)
            .await
            .unwrap();
        assert_eq!(found.len(), 25);

        let updates = updates.read();
        let scanned: Vec<u64> = updates.iter().map(|p| p.scanned).collect();
        assert_eq!(scanned, vec![10, 20, 25]);
        let last = updates.last().unwrap();
        assert_eq!(last.total, 25);
        assert_eq!(last.discoveries, 25);
    }

    #[tokio::test]
    async fn test_position_tracking_and_resume() {
        let (keys, channel) = setup();
        publish(&channel, &announcement_for(&keys)).await;
        publish(&channel, &announcement_for(&keys)).await;

        let scanner = AnnouncementScanner::new(channel.clone());
        let vk = keys.viewing_key();
        assert_eq!(scanner.scan_from_position(&vk).await.unwrap().len(), 2);

        let pos = scanner.position();
        assert_eq!(pos.last_block, Some(2));
        assert_eq!(pos.total_discoveries, 2);

        publish(&channel, &announcement_for(&keys)).await;
        let resumed = scanner.scan_from_position(&vk).await.unwrap();
        assert_eq!(resumed.len(), 1);
        assert_eq!(resumed[0].announcement.block_number, 3);

        assert!(scanner.scan_from_position(&vk).await.unwrap().is_empty());

        scanner.reset_position();
        assert_eq!(scanner.position().total_scanned, 0);
        assert_eq!(scanner.stats().total_scanned, 0);
    }

    #[tokio::test]
    async fn test_scan_one_records_stats() {
        let (keys, channel) = setup();
        let scanner = AnnouncementScanner::new(channel);

        let result = scanner.scan_one(&keys.viewing_key(), &announcement_for(&keys));
        assert!(result.is_discovered());
        assert_eq!(scanner.stats().discoveries, 1);

        let summary = ScanSummary::from(scanner.stats());
        assert_eq!(summary.total_scanned, 1);
    }

    struct FailingChannel;

    #[async_trait]
    impl AnnouncementChannel for FailingChannel {
        async fn publish(
            &self,
            _scheme_id: u64,
            _stealth_address: EthAddress,
            _ephemeral_pub_key: &[u8],
            _metadata: &[u8],
        ) -> Result<TransactionHandle> {
            Err(CloakError::transport(std::io::Error::other("down")))
        }

        async fn list(&self, _from: u64, _to: BlockBound) -> Result<Vec<Announcement>> {
            Err(CloakError::transport(std::io::Error::other("down")))
        }

        async fn latest_block(&self) -> Result<u64> {
            Ok(100)
        }

        fn max_block_range(&self) -> u64 {
            10
        }
    }

    #[tokio::test]
    async fn test_transport_errors_propagate() {
        let keys = generate_stealth_keys();
        let scanner = AnnouncementScanner::new(Arc::new(FailingChannel));

        let result = scanner
            .scan_paged(&keys.viewing_key(), 0, BlockBound::Latest)
            .await;
        assert!(matches!(result, Err(CloakError::Transport(_))));
        assert_eq!(scanner.position().last_block, None);
    }

    #[test]
    fn test_split_range() {
        assert_eq!(split_range(0, 9, 4), vec![(0, 3), (4, 7), (8, 9)]);
        assert_eq!(split_range(5, 5, 100), vec![(5, 5)]);
        assert!(split_range(6, 5, 100).is_empty());
        assert_eq!(split_range(0, 2, 0), vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn test_scan_position_advance() {
        let mut pos = ScanPosition::new();
        assert_eq!(pos.next_block(), 0);
        pos.advance(10, 5, 1);
        pos.advance(7, 2, 0);
        assert_eq!(pos.last_block, Some(10));
        assert_eq!(pos.next_block(), 11);
        assert_eq!(pos.total_scanned, 7);
    }
}
