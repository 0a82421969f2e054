//! Protocol constants for CLOAK.
//!
//! Key sizes follow SEC1 encodings of secp256k1 points and scalars. Contract
//! addresses and event signatures follow ERC-5564 and the limit-order hook ABI.

// ═══════════════════════════════════════════════════════════════════════════════
// SECP256K1 SIZES
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of a compressed SEC1 public key (`0x02`/`0x03` prefix + x-coordinate).
pub const PUBLIC_KEY_SIZE: usize = 33;

/// Size of an uncompressed SEC1 public key (`0x04` prefix + x + y).
pub const UNCOMPRESSED_PUBLIC_KEY_SIZE: usize = 65;

/// Size of a secp256k1 secret scalar in bytes.
pub const SECRET_KEY_SIZE: usize = 32;

/// Size of the ECDH shared secret (x-coordinate of the shared point).
pub const SHARED_SECRET_SIZE: usize = 32;

/// Size of a serialized stealth meta-address (spending_pk || viewing_pk).
pub const META_ADDRESS_SIZE: usize = PUBLIC_KEY_SIZE * 2;

/// Prefix of the textual stealth meta-address form.
pub const META_ADDRESS_PREFIX: &str = "st:eth:0x";

// ═══════════════════════════════════════════════════════════════════════════════
// VIEW TAG CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of view tag in bytes.
/// One byte filters out 255/256 of foreign announcements.
pub const VIEW_TAG_SIZE: usize = 1;

/// Number of possible view tag values (2^8 = 256).
pub const VIEW_TAG_SPACE: usize = 256;

/// Expected filtering efficiency as a percentage.
pub const VIEW_TAG_EFFICIENCY: f64 = 99.609375; // (255/256) * 100

// ═══════════════════════════════════════════════════════════════════════════════
// ANNOUNCEMENT METADATA LAYOUT
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of the stealth commitment carried in metadata and order records.
pub const COMMITMENT_SIZE: usize = 32;

/// Offset of the commitment inside announcement metadata (after the view tag).
pub const METADATA_COMMITMENT_OFFSET: usize = VIEW_TAG_SIZE;

/// Metadata length when it carries view tag and commitment.
pub const METADATA_WITH_COMMITMENT_SIZE: usize = VIEW_TAG_SIZE + COMMITMENT_SIZE;

// ═══════════════════════════════════════════════════════════════════════════════
// DOMAIN SEPARATORS
// ═══════════════════════════════════════════════════════════════════════════════
// Each SHAKE256 invocation uses a unique domain separator so outputs from
// different derivations never collide, even with identical inputs.

/// Domain separator for view tag derivation.
pub const DOMAIN_VIEW_TAG: &[u8] = b"CLOAK_VIEW_TAG_V1";

/// Domain separator for the stealth address tweak scalar.
pub const DOMAIN_STEALTH_ADDRESS: &[u8] = b"CLOAK_STEALTH_ADDRESS_V1";

/// Domain separator for the stealth commitment.
pub const DOMAIN_COMMITMENT: &[u8] = b"CLOAK_COMMITMENT_V1";

/// Domain separator for deterministic key derivation from a seed.
pub const DOMAIN_KEY_SEED: &[u8] = b"CLOAK_KEY_SEED_V1";

// ═══════════════════════════════════════════════════════════════════════════════
// PROTOCOL IDENTIFIERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Stealth scheme identifier for secp256k1 ECDH announcements.
pub const SCHEME_ID_SECP256K1: u64 = 1;

/// Canonical ERC-5564 announcer contract address.
pub const ERC5564_ANNOUNCER: &str = "0x5564000000000000000000000000000000000001";

/// `Announcement(uint256,address,address,bytes,bytes)`
pub const ANNOUNCEMENT_EVENT: &str = "Announcement(uint256,address,address,bytes,bytes)";

/// `announce(uint256,address,bytes,bytes)`
pub const ANNOUNCE_FUNCTION: &str = "announce(uint256,address,bytes,bytes)";

/// Event emitted by the hook when an order is created.
pub const LIMIT_ORDER_CREATED_EVENT: &str =
    "LimitOrderCreated(bytes32,address,address,uint256,uint256,uint256,int24)";

/// Event emitted by the hook when an order is filled.
pub const LIMIT_ORDER_EXECUTED_EVENT: &str = "LimitOrderExecuted(bytes32,address,uint256,uint256)";

/// Hook entry point for order creation.
pub const CREATE_LIMIT_ORDER_FUNCTION: &str =
    "createLimitOrder((address,address,uint24,int24,address),uint256,uint256,uint256,int24,bytes32,uint256,bytes,uint8)";

/// Hook getter for a stored order slot.
pub const ORDERS_FUNCTION: &str = "orders(bytes32,int24,uint256)";

// ═══════════════════════════════════════════════════════════════════════════════
// ETHEREUM CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of Ethereum address in bytes (20 bytes = 160 bits).
pub const ETH_ADDRESS_SIZE: usize = 20;

/// Size of keccak256 hash output.
pub const KECCAK256_SIZE: usize = 32;

/// Smallest tick representable as `int24`.
pub const MIN_TICK: i32 = -(1 << 23);

/// Largest tick representable as `int24`.
pub const MAX_TICK: i32 = (1 << 23) - 1;

// ═══════════════════════════════════════════════════════════════════════════════
// PERFORMANCE TUNING
// ═══════════════════════════════════════════════════════════════════════════════

/// Default widest block window a single log query may span.
pub const DEFAULT_MAX_BLOCK_RANGE: u64 = 10_000;

/// Default number of block pages fetched concurrently during a paged scan.
pub const DEFAULT_SCAN_CONCURRENCY: usize = 4;

/// Default JSON-RPC request timeout in seconds.
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_tag_efficiency_calculation() {
        let expected_efficiency = (255.0 / 256.0) * 100.0;
        assert!((VIEW_TAG_EFFICIENCY - expected_efficiency).abs() < 0.0001);
    }

    #[test]
    fn test_meta_address_size() {
        assert_eq!(META_ADDRESS_SIZE, 66);
    }

    #[test]
    fn test_tick_bounds_fit_int24() {
        assert_eq!(MIN_TICK, -8_388_608);
        assert_eq!(MAX_TICK, 8_388_607);
    }

    #[test]
    fn test_domain_separators_unique() {
        let domains = [
            DOMAIN_VIEW_TAG,
            DOMAIN_STEALTH_ADDRESS,
            DOMAIN_COMMITMENT,
            DOMAIN_KEY_SEED,
        ];

        for (i, a) in domains.iter().enumerate() {
            for (j, b) in domains.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Domain separators must be unique");
                }
            }
        }
    }
}
