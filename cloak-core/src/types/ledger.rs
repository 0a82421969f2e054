//! Ledger-facing value types shared by channels, sinks and feeds.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CloakError, Result};

/// Opaque reference to a submitted transaction. No finality is implied.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionHandle {
    /// `0x`-prefixed transaction hash
    pub tx_hash: String,
}

impl TransactionHandle {
    /// Wraps a transaction hash.
    pub fn new(tx_hash: impl Into<String>) -> Self {
        Self {
            tx_hash: tx_hash.into(),
        }
    }
}

impl std::fmt::Display for TransactionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.tx_hash)
    }
}

/// Upper bound of a block window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockBound {
    /// A concrete block number (inclusive)
    Number(u64),
    /// The chain head, resolved when the query runs
    Latest,
}

impl BlockBound {
    /// Resolves against a known head block.
    pub fn resolve(self, latest: u64) -> u64 {
        match self {
            BlockBound::Number(n) => n,
            BlockBound::Latest => latest,
        }
    }
}

impl From<u64> for BlockBound {
    fn from(n: u64) -> Self {
        BlockBound::Number(n)
    }
}

impl std::fmt::Display for BlockBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockBound::Number(n) => write!(f, "{}", n),
            BlockBound::Latest => f.write_str("latest"),
        }
    }
}

impl FromStr for BlockBound {
    type Err = CloakError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("latest") {
            return Ok(BlockBound::Latest);
        }
        let n = match s.strip_prefix("0x") {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => s.parse::<u64>(),
        }
        .map_err(|e| CloakError::ValidationError(format!("invalid block '{}': {}", s, e)))?;
        Ok(BlockBound::Number(n))
    }
}
