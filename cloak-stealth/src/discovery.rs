//! Payment discovery (recipient scan).
//!
//! Classifies a single announcement against a viewing key. The scanner
//! crate drives this over whole block windows.

use subtle::ConstantTimeEq;

use cloak_core::constants::SCHEME_ID_SECP256K1;
use cloak_core::error::{CloakError, Result};
use cloak_core::types::{Announcement, RecoveredAnnouncement, ViewingKey};

use crate::deriver::StealthAddressDeriver;

/// Result of scanning a single announcement.
#[derive(Debug)]
pub enum ScanResult {
    /// Announcement uses another stealth scheme
    ForeignScheme,
    /// View tag didn't match - not for this recipient
    NotForUs,
    /// View tag matched but the recomputed address differs
    FalsePositive,
    /// Address matched but the published commitment does not
    Tampered,
    /// Payment discovered
    Discovered(Box<RecoveredAnnouncement>),
    /// Announcement could not be decoded
    Malformed(CloakError),
}

impl ScanResult {
    /// Returns true if a payment was discovered.
    pub fn is_discovered(&self) -> bool {
        matches!(self, ScanResult::Discovered(_))
    }

    /// Returns true if the view tag matched, whatever the final verdict.
    pub fn matched_view_tag(&self) -> bool {
        matches!(
            self,
            ScanResult::FalsePositive | ScanResult::Tampered | ScanResult::Discovered(_)
        )
    }

    /// Returns the recovered announcement if present.
    pub fn into_recovered(self) -> Option<RecoveredAnnouncement> {
        match self {
            ScanResult::Discovered(recovered) => Some(*recovered),
            _ => None,
        }
    }
}

/// Statistics for scanning operations.
#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    /// Total announcements scanned
    pub total_scanned: u64,
    /// Announcements skipped for carrying another scheme id
    pub foreign_scheme: u64,
    /// Number of view tag matches
    pub view_tag_matches: u64,
    /// View tag matches whose address did not match
    pub false_positives: u64,
    /// Announcements whose commitment did not verify
    pub tampered: u64,
    /// Number of payments discovered
    pub discoveries: u64,
    /// Number of malformed announcements
    pub errors: u64,
    /// Duration of the scan in milliseconds
    pub duration_ms: u64,
}

impl ScanStats {
    /// Creates a new stats tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a scan result.
    pub fn record(&mut self, result: &ScanResult) {
        self.total_scanned += 1;
        if result.matched_view_tag() {
            self.view_tag_matches += 1;
        }
        match result {
            ScanResult::ForeignScheme => self.foreign_scheme += 1,
            ScanResult::FalsePositive => self.false_positives += 1,
            ScanResult::Tampered => self.tampered += 1,
            ScanResult::Discovered(_) => self.discoveries += 1,
            ScanResult::Malformed(_) => self.errors += 1,
            ScanResult::NotForUs => {}
        }
    }

    /// Folds another set of counters into this one.
    pub fn merge(&mut self, other: &ScanStats) {
        self.total_scanned += other.total_scanned;
        self.foreign_scheme += other.foreign_scheme;
        self.view_tag_matches += other.view_tag_matches;
        self.false_positives += other.false_positives;
        self.tampered += other.tampered;
        self.discoveries += other.discoveries;
        self.errors += other.errors;
        self.duration_ms += other.duration_ms;
    }

    /// Returns the scan rate (announcements per second).
    pub fn rate(&self) -> f64 {
        if self.duration_ms == 0 {
            0.0
        } else {
            (self.total_scanned as f64 / self.duration_ms as f64) * 1000.0
        }
    }

    /// Returns the filter efficiency (percentage of announcements filtered).
    pub fn filter_efficiency(&self) -> f64 {
        if self.total_scanned == 0 {
            0.0
        } else {
            ((self.total_scanned - self.view_tag_matches) as f64 / self.total_scanned as f64)
                * 100.0
        }
    }
}

/// Classifies one announcement for `viewing_key`.
///
/// Only announcements whose view tag matches pay for an address
/// derivation. A discovered payment has its announced address recomputed
/// exactly and, when metadata carries one, its commitment verified.
pub fn scan_announcement(announcement: &Announcement, viewing_key: &ViewingKey) -> ScanResult {
    if announcement.scheme_id != SCHEME_ID_SECP256K1 {
        return ScanResult::ForeignScheme;
    }
    if let Err(e) = announcement.validate() {
        return ScanResult::Malformed(e);
    }
    let view_tag = match announcement.view_tag() {
        Some(tag) => tag,
        None => {
            return ScanResult::Malformed(CloakError::InvalidAnnouncement(
                "missing view tag".into(),
            ))
        }
    };

    let recovered = match StealthAddressDeriver::new().recover_if_mine(
        viewing_key,
        &announcement.ephemeral_pub_key,
        view_tag,
    ) {
        Ok(Some(stealth)) => stealth,
        Ok(None) => return ScanResult::NotForUs,
        Err(e) => return ScanResult::Malformed(e),
    };

    let address_matches: bool = recovered
        .address
        .as_bytes()
        .ct_eq(announcement.stealth_address.as_bytes())
        .into();
    if !address_matches {
        return ScanResult::FalsePositive;
    }

    if let Some(published) = announcement.commitment() {
        let commitment_matches: bool = published[..].ct_eq(&recovered.commitment[..]).into();
        if !commitment_matches {
            return ScanResult::Tampered;
        }
    }

    ScanResult::Discovered(Box::new(RecoveredAnnouncement {
        announcement: announcement.clone(),
        stealth: recovered,
    }))
}

/// Scans a batch and returns the discoveries with their batch indices.
pub fn scan_announcements(
    announcements: &[Announcement],
    viewing_key: &ViewingKey,
) -> Vec<(usize, RecoveredAnnouncement)> {
    announcements
        .iter()
        .enumerate()
        .filter_map(|(idx, ann)| {
            scan_announcement(ann, viewing_key)
                .into_recovered()
                .map(|recovered| (idx, recovered))
        })
        .collect()
}

/// Scans a batch, recording every classification into `stats`.
pub fn scan_with_stats(
    announcements: &[Announcement],
    viewing_key: &ViewingKey,
    stats: &mut ScanStats,
) -> Vec<RecoveredAnnouncement> {
    let mut found = Vec::new();
    for ann in announcements {
        let result = scan_announcement(ann, viewing_key);
        stats.record(&result);
        if let Some(recovered) = result.into_recovered() {
            found.push(recovered);
        }
    }
    found
}

/// Checks whether an announced stealth address belongs to `viewing_key`.
pub fn verify_announcement(announcement: &Announcement, viewing_key: &ViewingKey) -> Result<bool> {
    announcement.validate()?;
    Ok(scan_announcement(announcement, viewing_key).is_discovered())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloak_core::types::{EthAddress, PublicKey, StealthAddress};
    use cloak_crypto::{generate_keypair_with_rng, generate_stealth_keys};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn announce_for(keys: &cloak_core::types::StealthKeys) -> (StealthAddress, Announcement) {
        let stealth = StealthAddressDeriver::new()
            .generate(&keys.meta_address())
            .unwrap();
        let ann = Announcement::for_stealth_address(&stealth, EthAddress::from_array([0x99; 20]));
        (stealth, ann)
    }

    #[test]
    fn test_scan_discovers_own_payment() {
        let keys = generate_stealth_keys();
        let (stealth, ann) = announce_for(&keys);

        let result = scan_announcement(&ann, &keys.viewing_key());
        let recovered = result.into_recovered().expect("payment is ours");
        assert_eq!(recovered.stealth, stealth);
        assert_eq!(recovered.announcement, ann);
    }

    #[test]
    fn test_scan_skips_foreign_scheme() {
        let keys = generate_stealth_keys();
        let (_, mut ann) = announce_for(&keys);
        ann.scheme_id = 2;

        assert!(matches!(
            scan_announcement(&ann, &keys.viewing_key()),
            ScanResult::ForeignScheme
        ));
    }

    #[test]
    fn test_scan_reports_malformed_key() {
        let keys = generate_stealth_keys();
        let (_, mut ann) = announce_for(&keys);
        ann.ephemeral_pub_key = vec![0x02; 10];

        assert!(matches!(
            scan_announcement(&ann, &keys.viewing_key()),
            ScanResult::Malformed(CloakError::InvalidKeyFormat(_))
        ));
    }

    #[test]
    fn test_scan_detects_tampered_commitment() {
        let keys = generate_stealth_keys();
        let (_, mut ann) = announce_for(&keys);
        ann.metadata[1] ^= 0xFF;

        assert!(matches!(
            scan_announcement(&ann, &keys.viewing_key()),
            ScanResult::Tampered
        ));
    }

    #[test]
    fn test_scan_address_mismatch_is_false_positive() {
        let keys = generate_stealth_keys();
        let (_, mut ann) = announce_for(&keys);
        ann.stealth_address = EthAddress::from_array([0x01; 20]);

        assert!(matches!(
            scan_announcement(&ann, &keys.viewing_key()),
            ScanResult::FalsePositive
        ));
    }

    /// Searches seeded viewing keys until one shares `ann`'s view tag
    /// without being its recipient.
    fn colliding_viewing_key(ann: &Announcement, spending_pk: PublicKey) -> ViewingKey {
        let mut rng = ChaCha20Rng::seed_from_u64(5564);
        let deriver = StealthAddressDeriver::new();
        for _ in 0..8192 {
            let candidate = ViewingKey::new(generate_keypair_with_rng(&mut rng).secret.clone(), spending_pk);
            let recovered = deriver
                .recover_if_mine(&candidate, &ann.ephemeral_pub_key, ann.view_tag().unwrap())
                .unwrap();
            if recovered.is_some() {
                return candidate;
            }
        }
        panic!("no view tag collision within 8192 keys");
    }

    #[test]
    fn test_view_tag_collision_is_false_positive() {
        let alice = generate_stealth_keys();
        let bob = generate_stealth_keys();
        let (_, ann) = announce_for(&alice);

        let colliding = colliding_viewing_key(&ann, bob.spending.public);
        assert!(matches!(
            scan_announcement(&ann, &colliding),
            ScanResult::FalsePositive
        ));
        assert!(scan_announcements(std::slice::from_ref(&ann), &colliding).is_empty());

        let mut stats = ScanStats::default();
        assert!(scan_with_stats(std::slice::from_ref(&ann), &colliding, &mut stats).is_empty());
        assert_eq!(stats.false_positives, 1);
        assert_eq!(stats.discoveries, 0);
    }

    #[test]
    fn test_scan_accepts_view_tag_only_metadata() {
        let keys = generate_stealth_keys();
        let (_, mut ann) = announce_for(&keys);
        ann.metadata.truncate(1);

        assert!(scan_announcement(&ann, &keys.viewing_key()).is_discovered());
    }

    #[test]
    fn test_scan_announcements_filters_others() {
        let alice = generate_stealth_keys();
        let bob = generate_stealth_keys();

        let mut batch = Vec::new();
        for i in 0..10 {
            let keys = if i % 3 == 0 { &alice } else { &bob };
            batch.push(announce_for(keys).1);
        }

        let found = scan_announcements(&batch, &alice.viewing_key());
        let indices: Vec<usize> = found.iter().map(|(idx, _)| *idx).collect();
        assert_eq!(indices, vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_scan_with_stats_counts() {
        let alice = generate_stealth_keys();
        let bob = generate_stealth_keys();

        let mut batch: Vec<Announcement> = (0..20).map(|_| announce_for(&bob).1).collect();
        batch.push(announce_for(&alice).1);
        let mut foreign = announce_for(&alice).1;
        foreign.scheme_id = 7;
        batch.push(foreign);

        let mut stats = ScanStats::new();
        let found = scan_with_stats(&batch, &alice.viewing_key(), &mut stats);

        assert_eq!(found.len(), 1);
        assert_eq!(stats.total_scanned, 22);
        assert_eq!(stats.foreign_scheme, 1);
        assert_eq!(stats.discoveries, 1);
        assert_eq!(stats.view_tag_matches, 1 + stats.false_positives);
    }

    #[test]
    fn test_scan_stats_rates() {
        let mut stats = ScanStats::new();
        assert_eq!(stats.rate(), 0.0);
        assert_eq!(stats.filter_efficiency(), 0.0);

        stats.total_scanned = 1000;
        stats.view_tag_matches = 4;
        stats.duration_ms = 500;
        assert_eq!(stats.rate(), 2000.0);
        assert!((stats.filter_efficiency() - 99.6).abs() < 1e-9);

        let mut total = ScanStats::new();
        total.merge(&stats);
        total.merge(&stats);
        assert_eq!(total.total_scanned, 2000);
    }

    #[test]
    fn test_verify_announcement() {
        let alice = generate_stealth_keys();
        let bob = generate_stealth_keys();
        let (_, ann) = announce_for(&alice);

        assert!(verify_announcement(&ann, &alice.viewing_key()).unwrap());
        assert!(!verify_announcement(&ann, &bob.viewing_key()).unwrap());
    }
}
