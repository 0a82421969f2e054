//! Announcement types for the CLOAK ledger.
//!
//! Announcements are emitted by the ERC-5564 announcer contract and carry the
//! ephemeral key and metadata recipients need to discover payments.

use serde::{Deserialize, Serialize};

use crate::constants::{
    COMMITMENT_SIZE, METADATA_COMMITMENT_OFFSET, METADATA_WITH_COMMITMENT_SIZE,
    SCHEME_ID_SECP256K1, VIEW_TAG_SIZE,
};
use crate::error::{CloakError, Result};
use crate::types::{EthAddress, StealthAddress};

// ═══════════════════════════════════════════════════════════════════════════════
// METADATA
// ═══════════════════════════════════════════════════════════════════════════════

/// Decoded announcement metadata.
///
/// # Layout
/// ```text
/// view_tag (1) || [commitment (32)] || [extra (..)]
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnouncementMetadata {
    /// First byte of the metadata
    pub view_tag: u8,
    /// Stealth commitment, when the sender included one
    pub commitment: Option<[u8; COMMITMENT_SIZE]>,
    /// Any trailing bytes, kept opaque
    pub extra: Vec<u8>,
}

impl AnnouncementMetadata {
    /// Metadata carrying only a view tag.
    pub fn new(view_tag: u8) -> Self {
        Self {
            view_tag,
            commitment: None,
            extra: Vec::new(),
        }
    }

    /// Attaches a commitment.
    pub fn with_commitment(mut self, commitment: [u8; COMMITMENT_SIZE]) -> Self {
        self.commitment = Some(commitment);
        self
    }

    /// Attaches trailing opaque bytes.
    pub fn with_extra(mut self, extra: Vec<u8>) -> Self {
        self.extra = extra;
        self
    }

    /// Encodes to the on-chain byte layout.
    ///
    /// Extra bytes are only emitted after a commitment, otherwise the
    /// layout would be ambiguous.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(METADATA_WITH_COMMITMENT_SIZE + self.extra.len());
        bytes.push(self.view_tag);
        if let Some(commitment) = &self.commitment {
            bytes.extend_from_slice(commitment);
            bytes.extend_from_slice(&self.extra);
        }
        bytes
    }

    /// Decodes the on-chain byte layout.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (&view_tag, rest) = bytes
            .split_first()
            .ok_or_else(|| CloakError::InvalidAnnouncement("metadata is empty".into()))?;

        if rest.len() < COMMITMENT_SIZE {
            return Ok(Self::new(view_tag));
        }

        let mut commitment = [0u8; COMMITMENT_SIZE];
        commitment.copy_from_slice(&rest[..COMMITMENT_SIZE]);
        Ok(Self {
            view_tag,
            commitment: Some(commitment),
            extra: rest[COMMITMENT_SIZE..].to_vec(),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ANNOUNCEMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// An announcement log read back from the ledger.
///
/// Immutable once published. Ordering is by `(block_number, log_index)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    /// Stealth scheme identifier (1 = secp256k1)
    pub scheme_id: u64,
    /// The stealth address that received funds
    pub stealth_address: EthAddress,
    /// Account that emitted the announcement
    pub caller: EthAddress,
    /// Sender's ephemeral public key, exactly as published
    #[serde(with = "hex")]
    pub ephemeral_pub_key: Vec<u8>,
    /// View tag followed by optional commitment and opaque bytes
    #[serde(with = "hex")]
    pub metadata: Vec<u8>,
    /// Block that included the announcement
    pub block_number: u64,
    /// Position of the log inside its block
    pub log_index: u64,
    /// Transaction hash, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

impl Announcement {
    /// Creates an announcement for the given payment, not yet positioned.
    pub fn new(
        scheme_id: u64,
        stealth_address: EthAddress,
        caller: EthAddress,
        ephemeral_pub_key: Vec<u8>,
        metadata: Vec<u8>,
    ) -> Self {
        Self {
            scheme_id,
            stealth_address,
            caller,
            ephemeral_pub_key,
            metadata,
            block_number: 0,
            log_index: 0,
            tx_hash: None,
        }
    }

    /// Builds the announcement a sender publishes for a stealth address.
    pub fn for_stealth_address(stealth: &StealthAddress, caller: EthAddress) -> Self {
        Self::new(
            SCHEME_ID_SECP256K1,
            stealth.address,
            caller,
            stealth.ephemeral_pub_key.as_bytes().to_vec(),
            stealth.metadata(),
        )
    }

    /// The view tag, i.e. the first metadata byte.
    pub fn view_tag(&self) -> Option<u8> {
        self.metadata.first().copied()
    }

    /// The stealth commitment, if metadata is long enough to carry one.
    ///
    /// Assumes the `view_tag || commitment || extra` layout written by
    /// [`Announcement::for_stealth_address`]. Announcements of any other
    /// scheme carry metadata we cannot interpret and yield `None`.
    pub fn commitment(&self) -> Option<[u8; COMMITMENT_SIZE]> {
        if self.scheme_id != SCHEME_ID_SECP256K1
            || self.metadata.len() < METADATA_WITH_COMMITMENT_SIZE
        {
            return None;
        }
        let mut commitment = [0u8; COMMITMENT_SIZE];
        commitment.copy_from_slice(
            &self.metadata[METADATA_COMMITMENT_OFFSET..METADATA_WITH_COMMITMENT_SIZE],
        );
        Some(commitment)
    }

    /// Sort key used everywhere announcements are ordered.
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }

    /// Validates the announcement structure.
    pub fn validate(&self) -> Result<()> {
        if self.ephemeral_pub_key.is_empty() {
            return Err(CloakError::InvalidAnnouncement(
                "ephemeral public key is empty".into(),
            ));
        }

        if self.metadata.len() < VIEW_TAG_SIZE {
            return Err(CloakError::InvalidAnnouncement(
                "metadata must start with a view tag".into(),
            ));
        }

        if self.stealth_address.is_zero() {
            return Err(CloakError::InvalidAnnouncement(
                "stealth address is the zero address".into(),
            ));
        }

        Ok(())
    }
}

/// Builder for creating announcements with optional fields.
#[derive(Default)]
pub struct AnnouncementBuilder {
    scheme_id: Option<u64>,
    stealth_address: Option<EthAddress>,
    caller: Option<EthAddress>,
    ephemeral_pub_key: Option<Vec<u8>>,
    metadata: Option<Vec<u8>>,
    block_number: Option<u64>,
    log_index: Option<u64>,
    tx_hash: Option<String>,
}

impl AnnouncementBuilder {
    /// Creates a new announcement builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the scheme id (optional, defaults to secp256k1).
    pub fn scheme_id(mut self, scheme_id: u64) -> Self {
        self.scheme_id = Some(scheme_id);
        self
    }

    /// Sets the stealth address (required).
    pub fn stealth_address(mut self, address: EthAddress) -> Self {
        self.stealth_address = Some(address);
        self
    }

    /// Sets the caller (optional, defaults to the zero address).
    pub fn caller(mut self, caller: EthAddress) -> Self {
        self.caller = Some(caller);
        self
    }

    /// Sets the ephemeral public key (required).
    pub fn ephemeral_pub_key(mut self, key: Vec<u8>) -> Self {
        self.ephemeral_pub_key = Some(key);
        self
    }

    /// Sets the raw metadata (required).
    pub fn metadata(mut self, metadata: Vec<u8>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Sets the block number (optional).
    pub fn block_number(mut self, num: u64) -> Self {
        self.block_number = Some(num);
        self
    }

    /// Sets the log index (optional).
    pub fn log_index(mut self, index: u64) -> Self {
        self.log_index = Some(index);
        self
    }

    /// Sets the transaction hash (optional).
    pub fn tx_hash(mut self, hash: String) -> Self {
        self.tx_hash = Some(hash);
        self
    }

    /// Builds the announcement.
    pub fn build(self) -> Result<Announcement> {
        let stealth_address = self
            .stealth_address
            .ok_or_else(|| CloakError::ValidationError("stealth_address is required".into()))?;

        let ephemeral_pub_key = self
            .ephemeral_pub_key
            .ok_or_else(|| CloakError::ValidationError("ephemeral_pub_key is required".into()))?;

        let metadata = self
            .metadata
            .ok_or_else(|| CloakError::ValidationError("metadata is required".into()))?;

        let mut announcement = Announcement::new(
            self.scheme_id.unwrap_or(SCHEME_ID_SECP256K1),
            stealth_address,
            self.caller.unwrap_or_default(),
            ephemeral_pub_key,
            metadata,
        );
        announcement.block_number = self.block_number.unwrap_or_default();
        announcement.log_index = self.log_index.unwrap_or_default();
        announcement.tx_hash = self.tx_hash;

        announcement.validate()?;
        Ok(announcement)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECOVERED ANNOUNCEMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// An announcement the scanner proved belongs to a viewing key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveredAnnouncement {
    /// The announcement as read from the ledger
    pub announcement: Announcement,
    /// The recomputed stealth address, matching the announced one
    pub stealth: StealthAddress,
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATISTICS
// ═══════════════════════════════════════════════════════════════════════════════

/// Statistics about announcements held by a channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnnouncementStats {
    /// Total number of announcements
    pub total_count: u64,
    /// Announcements per view tag (for distribution analysis)
    pub view_tag_distribution: Vec<u64>,
    /// Lowest block seen
    pub earliest_block: Option<u64>,
    /// Highest block seen
    pub latest_block: Option<u64>,
    /// Announcements using a scheme other than secp256k1
    pub foreign_scheme_count: u64,
}

impl Default for AnnouncementStats {
    fn default() -> Self {
        Self {
            total_count: 0,
            view_tag_distribution: vec![0; 256],
            earliest_block: None,
            latest_block: None,
            foreign_scheme_count: 0,
        }
    }
}

impl AnnouncementStats {
    /// Creates empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates stats with a new announcement.
    pub fn add(&mut self, announcement: &Announcement) {
        self.total_count += 1;
        if let Some(tag) = announcement.view_tag() {
            self.view_tag_distribution[tag as usize] += 1;
        }

        let block = announcement.block_number;
        self.earliest_block = Some(self.earliest_block.map_or(block, |b| b.min(block)));
        self.latest_block = Some(self.latest_block.map_or(block, |b| b.max(block)));

        if announcement.scheme_id != SCHEME_ID_SECP256K1 {
            self.foreign_scheme_count += 1;
        }
    }
}
