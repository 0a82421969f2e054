//! Limit order types.
//!
//! Orders live in `(pool_id, tick, index)` slots and carry a stealth
//! commitment in place of an identifiable owner.

use alloy_primitives::{B256, U256};
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_TICK, MIN_TICK, SCHEME_ID_SECP256K1};
use crate::error::{CloakError, Result};
use crate::types::{EthAddress, PublicKey, StealthAddress};

// ═══════════════════════════════════════════════════════════════════════════════
// 32-BYTE IDENTIFIERS
// ═══════════════════════════════════════════════════════════════════════════════

/// A 32-byte word (`bytes32`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Bytes32(B256);

/// Pool identifier: keccak256 of the ABI-encoded pool key.
pub type PoolId = Bytes32;

/// Order identifier: keccak256 of the ABI-encoded slot.
pub type OrderId = Bytes32;

impl Bytes32 {
    /// Wraps raw bytes.
    pub const fn from_array(bytes: [u8; 32]) -> Self {
        Self(B256::new(bytes))
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0 .0
    }

    /// Returns the wrapped [`B256`].
    pub const fn word(&self) -> B256 {
        self.0
    }

    /// Returns true if every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == B256::ZERO
    }

    /// `0x`-prefixed hex form.
    pub fn to_hex_string(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parses hex of up to 32 bytes, left-padding shorter values with zeros.
    ///
    /// Odd-length input is accepted (`0xabc` reads as `0x0abc`).
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let padded;
        let s = if s.len() % 2 == 1 {
            padded = format!("0{}", s);
            padded.as_str()
        } else {
            s
        };
        let bytes = hex::decode(s)?;
        if bytes.len() > 32 {
            return Err(CloakError::ValidationError(format!(
                "bytes32 value is {} bytes long",
                bytes.len()
            )));
        }
        Ok(Self(B256::left_padding_from(&bytes)))
    }
}

impl From<B256> for Bytes32 {
    fn from(word: B256) -> Self {
        Self(word)
    }
}

impl From<Bytes32> for B256 {
    fn from(value: Bytes32) -> Self {
        value.0
    }
}

impl From<[u8; 32]> for Bytes32 {
    fn from(bytes: [u8; 32]) -> Self {
        Self::from_array(bytes)
    }
}

impl std::fmt::Debug for Bytes32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bytes32({})", self.to_hex_string())
    }
}

impl std::fmt::Display for Bytes32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex_string())
    }
}

impl std::str::FromStr for Bytes32 {
    type Err = CloakError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for Bytes32 {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex_string())
    }
}

impl<'de> Deserialize<'de> for Bytes32 {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// POOL & SLOT
// ═══════════════════════════════════════════════════════════════════════════════

/// Identity of a concentrated-liquidity pool.
///
/// `currency0 < currency1` is the caller's responsibility.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolKey {
    /// Lower-sorted currency
    pub currency0: EthAddress,
    /// Higher-sorted currency
    pub currency1: EthAddress,
    /// Fee in hundredths of a bip (`uint24`)
    pub fee: u32,
    /// Tick spacing (`int24`)
    pub tick_spacing: i32,
    /// Hook contract attached to the pool
    pub hooks: EthAddress,
}

/// Position of an order in the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderSlot {
    /// Pool the order rests in
    pub pool_id: PoolId,
    /// Target tick (`int24`)
    pub tick: i32,
    /// Sequence index within `(pool_id, tick)`
    pub index: u64,
}

impl OrderSlot {
    /// Creates a slot.
    pub fn new(pool_id: PoolId, tick: i32, index: u64) -> Self {
        Self {
            pool_id,
            tick,
            index,
        }
    }
}

impl std::fmt::Display for OrderSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.pool_id, self.tick, self.index)
    }
}

/// Checks that a tick fits in `int24`.
pub fn validate_tick(tick: i32) -> Result<()> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(CloakError::ValidationError(format!(
            "tick {} outside int24 range",
            tick
        )));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// ORDERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle of an order. Derived, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Waiting for the pool price to cross the target tick
    Open,
    /// Filled by an executor
    Executed,
    /// Deadline passed without execution
    Expired,
}

/// A stored limit order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitOrder {
    /// Stealth address that receives the proceeds
    pub owner: EthAddress,
    /// Token sold
    pub token_in: EthAddress,
    /// Token bought
    pub token_out: EthAddress,
    /// Amount of `token_in` (strictly positive)
    pub amount_in: U256,
    /// Minimum acceptable `token_out`
    pub min_amount_out: U256,
    /// Unix timestamp after which the order may not execute
    pub deadline: u64,
    /// Commitment standing in for the owner's identity
    pub stealth_commitment: Bytes32,
    /// Set once, by an execution event
    pub executed: bool,
}

impl LimitOrder {
    /// Derives the status at `now` (unix seconds).
    pub fn status(&self, now: u64) -> OrderStatus {
        if self.executed {
            OrderStatus::Executed
        } else if now >= self.deadline {
            OrderStatus::Expired
        } else {
            OrderStatus::Open
        }
    }
}

/// Parameters handed to the order-submission sink.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLimitOrderParams {
    /// Pool to place the order in
    pub pool_key: PoolKey,
    /// Stealth address that receives the proceeds
    pub owner: EthAddress,
    /// Sell `currency0` for `currency1` when true
    pub zero_for_one: bool,
    /// Amount to sell
    pub amount_in: U256,
    /// Minimum amount to receive
    pub min_amount_out: U256,
    /// Unix deadline
    pub deadline: u64,
    /// Tick at which the order becomes executable
    pub target_tick: i32,
    /// Commitment binding the order to its stealth owner
    pub stealth_commitment: Bytes32,
    /// Stealth scheme used for the owner address
    pub scheme_id: u64,
    /// Ephemeral key of the owner's stealth address
    pub ephemeral_pub_key: PublicKey,
    /// View tag of the owner's stealth address
    pub view_tag: u8,
    /// Explicit slot index; the next free index when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
}

impl CreateLimitOrderParams {
    /// Fills owner, commitment, ephemeral key and view tag from a stealth
    /// address generated for the order's proceeds.
    #[allow(clippy::too_many_arguments)]
    pub fn for_stealth(
        pool_key: PoolKey,
        stealth: &StealthAddress,
        zero_for_one: bool,
        amount_in: U256,
        min_amount_out: U256,
        deadline: u64,
        target_tick: i32,
    ) -> Self {
        Self {
            pool_key,
            owner: stealth.address,
            zero_for_one,
            amount_in,
            min_amount_out,
            deadline,
            target_tick,
            stealth_commitment: Bytes32::from_array(stealth.commitment),
            scheme_id: SCHEME_ID_SECP256K1,
            ephemeral_pub_key: stealth.ephemeral_pub_key,
            view_tag: stealth.view_tag,
            index: None,
        }
    }

    /// Pins the order to a specific slot index.
    pub fn with_index(mut self, index: u64) -> Self {
        self.index = Some(index);
        self
    }

    /// Token sold by this order.
    pub fn token_in(&self) -> EthAddress {
        if self.zero_for_one {
            self.pool_key.currency0
        } else {
            self.pool_key.currency1
        }
    }

    /// Token bought by this order.
    pub fn token_out(&self) -> EthAddress {
        if self.zero_for_one {
            self.pool_key.currency1
        } else {
            self.pool_key.currency0
        }
    }

    /// Stateless checks. Deadline is checked against a clock by the registry.
    pub fn validate(&self) -> Result<()> {
        if self.amount_in.is_zero() {
            return Err(CloakError::ValidationError(
                "amount_in must be greater than zero".into(),
            ));
        }
        if self.stealth_commitment.is_zero() {
            return Err(CloakError::ValidationError(
                "stealth commitment must not be empty".into(),
            ));
        }
        validate_tick(self.target_tick)
    }

    /// Builds the stored order record.
    pub fn to_order(&self) -> LimitOrder {
        LimitOrder {
            owner: self.owner,
            token_in: self.token_in(),
            token_out: self.token_out(),
            amount_in: self.amount_in,
            min_amount_out: self.min_amount_out,
            deadline: self.deadline,
            stealth_commitment: self.stealth_commitment,
            executed: false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Emitted when an order is recorded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitOrderCreatedEvent {
    /// Order identifier
    pub order_id: OrderId,
    /// Token sold
    pub token_in: EthAddress,
    /// Token bought
    pub token_out: EthAddress,
    /// Amount sold
    pub amount_in: U256,
    /// Minimum amount bought
    pub min_amount_out: U256,
    /// Unix deadline
    pub deadline: u64,
    /// Target tick
    pub target_tick: i32,
}

/// Emitted by the ledger when an order is filled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitOrderExecutedEvent {
    /// Order identifier
    pub order_id: OrderId,
    /// Account that executed the order
    pub executor: EthAddress,
    /// Amount sold
    pub amount_in: U256,
    /// Amount bought
    pub amount_out: U256,
    /// Block containing the execution
    pub block_number: u64,
    /// Log position within the block
    pub log_index: u64,
}

impl LimitOrderExecutedEvent {
    /// Sort key for execution feeds.
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}
