//! # CLOAK Stealth Address Protocol
//!
//! High-level API for creating and discovering stealth addresses.
//!
//! This crate provides:
//!
//! - **Stealth Address Creation**: Generate one-time addresses for payments
//! - **Recovery**: Recognise addresses derived for a viewing key
//! - **Payment Discovery**: Classify announcements to find incoming payments
//! - **Wallet**: Hold recipient keys and derive stealth spend keys
//! - **Key Providers**: Load keys from memory or the environment
//!
//! ## Quick Start
//!
//! ```rust
//! use cloak_core::types::EthAddress;
//! use cloak_stealth::{create_stealth_payment, StealthWallet};
//!
//! // Recipient: generate keys and publish the meta-address
//! let wallet = StealthWallet::generate();
//!
//! // Sender: derive a one-time address and the announcement to publish
//! let payment = create_stealth_payment(wallet.meta_address(), EthAddress::zero()).unwrap();
//!
//! // Recipient: recognise the payment and derive its spend key
//! let found = wallet.try_discover(&payment.announcement).unwrap().unwrap();
//! assert_eq!(found.address, payment.stealth.address);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod deriver;
pub mod discovery;
pub mod provider;
pub mod wallet;

pub use deriver::{
    create_stealth_payment, PaymentMetadata, StealthAddressDeriver, StealthPayment,
    StealthPaymentBuilder,
};
pub use discovery::{
    scan_announcement, scan_announcements, scan_with_stats, verify_announcement, ScanResult,
    ScanStats,
};
pub use provider::{EnvKeyProvider, MemoryKeyProvider};
pub use wallet::{
    verify_spending_key, DiscoveredPayment, PublicKeyExport, StealthWallet, ViewingKeyExport,
};
