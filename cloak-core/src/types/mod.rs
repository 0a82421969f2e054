//! Domain types for CLOAK.
//!
//! - [`KeyPair`], [`StealthKeys`], [`ViewingKey`]: secp256k1 key material
//! - [`StealthMetaAddress`]: Published keys for receiving private payments
//! - [`StealthAddress`]: One-time address for a specific payment
//! - [`Announcement`]: Ledger record of a stealth payment
//! - [`LimitOrder`]: Commitment-owned limit order

mod keys;
mod address;
mod announcement;
mod ledger;
mod order;

pub use keys::*;
pub use address::*;
pub use announcement::*;
pub use ledger::*;
pub use order::*;
