//! Pool and order identifiers.
//!
//! Both follow the hook's on-chain derivation so ids computed here match
//! the ones in `LimitOrderCreated`/`LimitOrderExecuted` logs.

use alloy::primitives::{aliases::I24, keccak256, U256};
use alloy::sol_types::{sol_data, SolType, SolValue};

use cloak_core::error::Result;
use cloak_core::types::{OrderId, OrderSlot, PoolId, PoolKey};

use crate::contracts::{self, int24, uint24};

type SlotTuple = (sol_data::FixedBytes<32>, sol_data::Int<24>, sol_data::Uint<256>);

/// The pool key in binding form.
pub(crate) fn encode_pool_key(key: &PoolKey) -> Result<contracts::PoolKey> {
    Ok(contracts::PoolKey {
        currency0: key.currency0.address(),
        currency1: key.currency1.address(),
        fee: uint24(key.fee)?,
        tickSpacing: int24(key.tick_spacing)?,
        hooks: key.hooks.address(),
    })
}

/// `keccak256(abi.encode(poolKey))`.
///
/// Fails if the fee does not fit `uint24` or the spacing `int24`.
pub fn pool_id(key: &PoolKey) -> Result<PoolId> {
    let encoded = encode_pool_key(key)?.abi_encode();
    Ok(keccak256(encoded).into())
}

/// `keccak256(abi.encode(poolId, tick, index))`.
pub fn order_id(slot: &OrderSlot) -> Result<OrderId> {
    let encoded = SlotTuple::abi_encode(&(
        slot.pool_id.word(),
        int24::<I24>(slot.tick)?,
        U256::from(slot.index),
    ));
    Ok(keccak256(encoded).into())
}
