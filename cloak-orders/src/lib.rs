//! # CLOAK Orders
//!
//! Limit orders whose proceeds go to a stealth address.
//!
//! An order sits in a `(pool_id, tick, index)` slot and names its owner
//! only through a stealth address and commitment. The registry validates
//! and submits new orders, then follows execution events so a receiver can
//! learn when their order filled.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use alloy::primitives::U256;
//! use cloak_core::types::{CreateLimitOrderParams, EthAddress, PoolKey};
//! use cloak_orders::{LimitOrderRegistry, MemoryOrderBook};
//! use cloak_stealth::StealthAddressDeriver;
//!
//! # tokio_test::block_on(async {
//! let book = Arc::new(MemoryOrderBook::new());
//! let registry = LimitOrderRegistry::new(book.clone(), book.clone());
//!
//! let keys = cloak_crypto::generate_stealth_keys();
//! let stealth = StealthAddressDeriver::new().generate(&keys.meta_address()).unwrap();
//! let pool = PoolKey {
//!     currency0: EthAddress::from_array([0x01; 20]),
//!     currency1: EthAddress::from_array([0x02; 20]),
//!     fee: 3000,
//!     tick_spacing: 60,
//!     hooks: EthAddress::zero(),
//! };
//! let deadline = registry.now() + 3600;
//! let params = CreateLimitOrderParams::for_stealth(
//!     pool,
//!     &stealth,
//!     true,
//!     U256::from(1000),
//!     U256::from(900),
//!     deadline,
//!     120,
//! );
//!
//! let created = registry.create(params).await.unwrap();
//! let event = book.execute(
//!     created.order_id,
//!     EthAddress::zero(),
//!     U256::from(1000),
//!     U256::from(950),
//! );
//! registry.on_execution(&event).unwrap();
//! assert!(registry.get_by_id(&created.order_id).unwrap().1.executed);
//! # });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod book;
pub mod contracts;
pub mod hook;
pub mod ids;
pub mod registry;

pub use book::{MemoryOrderBook, SubmissionRejected};
pub use contracts::ILimitOrderHook;
pub use hook::{RpcExecutionFeed, RpcOrderSink};
pub use ids::{order_id, pool_id};
pub use registry::{system_clock, Clock, CreatedOrder, LimitOrderRegistry, RegistryStats};

// Re-export the traits from core
pub use cloak_core::traits::{ExecutionFeed, OrderSink};
