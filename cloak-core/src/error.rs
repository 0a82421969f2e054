//! Error types for CLOAK.
//!
//! One `thiserror` enum covers every crate in the workspace. Library errors
//! (HTTP, JSON, hex, curve arithmetic) are translated into these kinds at the
//! crate boundary that meets them.

use thiserror::Error;

/// Result type alias using `CloakError`.
pub type Result<T> = std::result::Result<T, CloakError>;

/// Boxed underlying cause carried by transport and submission failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for all CLOAK operations.
#[derive(Debug, Error)]
pub enum CloakError {
    // ═══════════════════════════════════════════════════════════════════════════
    // CRYPTOGRAPHIC ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Malformed public or secret key encoding.
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// Address generation was requested without a recipient key.
    #[error("Recipient public key is required")]
    RecipientKeyRequired,

    /// Cryptographic verification failed.
    #[error("Cryptographic verification failed: {0}")]
    VerificationFailed(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // STEALTH ADDRESS ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Invalid meta-address format or content.
    #[error("Invalid meta-address: {0}")]
    InvalidMetaAddress(String),

    /// Invalid Ethereum address encoding.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid announcement format.
    #[error("Invalid announcement: {0}")]
    InvalidAnnouncement(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // LEDGER ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Block window wider than the provider accepts.
    #[error("Block range too large: requested {requested} blocks, max {max}")]
    RangeTooLarge { requested: u64, max: u64 },

    /// Underlying transport or provider failure.
    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),

    // ═══════════════════════════════════════════════════════════════════════════
    // ORDER ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Order deadline is not in the future.
    #[error("Order expired: deadline {deadline} is not after {now}")]
    OrderExpired { deadline: u64, now: u64 },

    /// An order already occupies the requested (pool, tick, index) slot.
    #[error("Order slot occupied: {0}")]
    OrderSlotOccupied(String),

    /// No order stored at the requested slot.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Execution event for an order id the registry never recorded.
    #[error("Unknown order: {0}")]
    UnknownOrder(String),

    /// The order sink rejected or failed to submit the order.
    #[error("Order submission failed: {0}")]
    SubmissionFailed(#[source] BoxError),

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid hex encoding.
    #[error("Invalid hex encoding: {0}")]
    HexError(#[from] hex::FromHexError),

    /// ABI payload could not be decoded.
    #[error("ABI decoding failed: {0}")]
    AbiError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Key material could not be loaded from its provider.
    #[error("Key storage error: {0}")]
    KeyStorageError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // VALIDATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Input validation failed.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Internal invariant violation (should never happen).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl CloakError {
    /// Wraps any error as a transport failure.
    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CloakError::Transport(Box::new(err))
    }

    /// Wraps an error as an order submission failure.
    pub fn submission<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CloakError::SubmissionFailed(Box::new(err))
    }

    /// Returns true if this error is recoverable (caller may retry).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CloakError::Transport(_)
                | CloakError::RangeTooLarge { .. }
                | CloakError::SubmissionFailed(_)
        )
    }

    /// Returns true if this is a cryptographic error.
    pub fn is_crypto_error(&self) -> bool {
        matches!(
            self,
            CloakError::InvalidKeyFormat(_)
                | CloakError::RecipientKeyRequired
                | CloakError::VerificationFailed(_)
        )
    }

    /// Returns true if this is a validation error.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            CloakError::ValidationError(_)
                | CloakError::InvalidMetaAddress(_)
                | CloakError::InvalidAddress(_)
                | CloakError::InvalidAnnouncement(_)
                | CloakError::OrderExpired { .. }
        )
    }

    /// Returns true if this error comes from the limit-order registry.
    pub fn is_order_error(&self) -> bool {
        matches!(
            self,
            CloakError::OrderExpired { .. }
                | CloakError::OrderSlotOccupied(_)
                | CloakError::OrderNotFound(_)
                | CloakError::UnknownOrder(_)
                | CloakError::SubmissionFailed(_)
        )
    }
}
