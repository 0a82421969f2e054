//! # CLOAK Registry
//!
//! Announcement publication and retrieval for the CLOAK protocol.
//!
//! This crate provides:
//!
//! - **Memory**: An in-process ledger fake with block numbers and log indices
//! - **RPC**: The ERC-5564 announcer over an alloy JSON-RPC provider
//! - **Directory**: Account → meta-address lookup
//!
//! ## Example
//!
//! ```rust
//! use cloak_core::traits::AnnouncementChannel;
//! use cloak_core::types::{BlockBound, EthAddress};
//! use cloak_registry::MemoryChannel;
//!
//! # tokio_test::block_on(async {
//! let channel = MemoryChannel::new();
//! let epk = vec![0x02u8; 33];
//! channel
//!     .publish(1, EthAddress::from_array([0x11; 20]), &epk, &[0x42])
//!     .await
//!     .unwrap();
//!
//! let listed = channel.list(0, BlockBound::Latest).await.unwrap();
//! assert_eq!(listed.len(), 1);
//! # });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod channel;
pub mod config;
pub mod contracts;
pub mod directory;
pub mod memory;
pub mod rpc;

pub use channel::RpcAnnouncementChannel;
pub use config::LedgerConfig;
pub use directory::MemoryDirectory;
pub use memory::MemoryChannel;
pub use contracts::IERC5564Announcer;
pub use rpc::{is_range_error, log_position, LedgerClient, LogQuery, RpcLedger};

// Re-export the traits from core
pub use cloak_core::traits::{AnnouncementChannel, MetaAddressDirectory};
