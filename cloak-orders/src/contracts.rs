//! Solidity bindings for the limit-order hook.

use alloy::sol;

use cloak_core::error::{CloakError, Result};
use cloak_core::types::validate_tick;

sol! {
    /// Pool identity, hashed into the pool id.
    #[derive(Debug, PartialEq, Eq)]
    struct PoolKey {
        address currency0;
        address currency1;
        uint24 fee;
        int24 tickSpacing;
        address hooks;
    }

    /// Hook that stores limit orders and executes them on tick crossings.
    #[derive(Debug, PartialEq, Eq)]
    interface ILimitOrderHook {
        /// Emitted when an order is stored.
        event LimitOrderCreated(
            bytes32 indexed orderId,
            address indexed tokenIn,
            address indexed tokenOut,
            uint256 amountIn,
            uint256 minAmountOut,
            uint256 deadline,
            int24 targetTick
        );

        /// Emitted when an order is filled.
        event LimitOrderExecuted(
            bytes32 indexed orderId,
            address indexed executor,
            uint256 amountIn,
            uint256 amountOut
        );

        /// Stores a new order paying out to a stealth address.
        function createLimitOrder(
            PoolKey key,
            uint256 amountIn,
            uint256 minAmountOut,
            uint256 deadline,
            int24 targetTick,
            bytes32 stealthCommitment,
            uint256 schemeId,
            bytes memory ephemeralPubKey,
            uint8 viewTag
        ) external returns (bytes32);

        /// Reads an order slot. Unset slots read as zeros.
        function orders(bytes32 poolId, int24 tick, uint256 index)
            external
            view
            returns (
                address owner,
                address tokenIn,
                address tokenOut,
                uint256 amountIn,
                uint256 minAmountOut,
                uint256 deadline,
                bytes32 stealthCommitment,
                bool executed
            );

        /// Whether an order id is known to the hook.
        function orderExists(bytes32 orderId) external view returns (bool);
    }
}

/// Converts a tick into the bindings' `int24` representation.
pub(crate) fn int24<T: TryFrom<i32>>(value: i32) -> Result<T> {
    validate_tick(value)?;
    T::try_from(value)
        .map_err(|_| CloakError::ValidationError(format!("{} outside int24 range", value)))
}

/// Converts a fee into the bindings' `uint24` representation.
pub(crate) fn uint24<T: TryFrom<u32>>(value: u32) -> Result<T> {
    if value >= 1 << 24 {
        return Err(CloakError::ValidationError(format!(
            "{} outside uint24 range",
            value
        )));
    }
    T::try_from(value)
        .map_err(|_| CloakError::ValidationError(format!("{} outside uint24 range", value)))
}
