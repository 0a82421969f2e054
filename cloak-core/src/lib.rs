//! # CLOAK Core
//!
//! Core types, errors, and traits for the CLOAK stealth payment and private
//! limit order protocol.
//!
//! This crate provides the foundational building blocks used by all other CLOAK crates:
//!
//! - **Types**: Keys, meta-addresses, stealth addresses, announcements, orders
//! - **Errors**: One error enum with classification helpers
//! - **Constants**: Key sizes, domain separators, contract signatures
//! - **Traits**: Announcement channel, order sink, execution feed, key provider
//!
//! ## Example
//!
//! ```rust
//! use cloak_core::{BlockBound, StealthMetaAddress};
//!
//! let bound: BlockBound = "latest".parse().unwrap();
//! assert_eq!(bound, BlockBound::Latest);
//!
//! let bad = "st:eth:0x1234".parse::<StealthMetaAddress>();
//! assert!(bad.is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{BoxError, CloakError, Result};
pub use traits::*;
pub use types::*;
