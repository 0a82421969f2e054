//! Ledger connection configuration.

use serde::{Deserialize, Serialize};
use url::Url;

use cloak_core::constants::{DEFAULT_MAX_BLOCK_RANGE, DEFAULT_RPC_TIMEOUT_SECS};
use cloak_core::error::{CloakError, Result};
use cloak_core::types::EthAddress;

/// Default JSON-RPC endpoint (a local node).
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Configuration for talking to an Ethereum JSON-RPC endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// JSON-RPC URL
    pub rpc_url: String,
    /// Chain id the endpoint is expected to serve
    pub chain_id: u64,
    /// ERC-5564 announcer contract
    pub announcer_address: EthAddress,
    /// Limit-order hook contract, if orders are used
    pub order_hook_address: Option<EthAddress>,
    /// Account used as `from` in `eth_sendTransaction`
    pub sender_address: Option<EthAddress>,
    /// Widest block window a single `eth_getLogs` may request
    pub max_block_range: u64,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.into(),
            chain_id: 1,
            announcer_address: EthAddress::from_array(announcer_bytes()),
            order_hook_address: None,
            sender_address: None,
            max_block_range: DEFAULT_MAX_BLOCK_RANGE,
            timeout_seconds: DEFAULT_RPC_TIMEOUT_SECS,
        }
    }
}

fn announcer_bytes() -> [u8; 20] {
    let mut bytes = [0u8; 20];
    bytes[0] = 0x55;
    bytes[1] = 0x64;
    bytes[19] = 0x01;
    bytes
}

impl LedgerConfig {
    /// Creates a configuration for the given RPC URL.
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            ..Default::default()
        }
    }

    /// Loads configuration from the environment (and `.env` if present).
    ///
    /// Recognised variables: `CLOAK_RPC_URL`, `CLOAK_CHAIN_ID`,
    /// `CLOAK_ANNOUNCER`, `CLOAK_ORDER_HOOK`, `CLOAK_SENDER`,
    /// `CLOAK_MAX_BLOCK_RANGE`, `CLOAK_RPC_TIMEOUT`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get("CLOAK_RPC_URL") {
            config.rpc_url = url.trim().to_string();
        }
        if let Some(id) = get("CLOAK_CHAIN_ID") {
            config.chain_id = parse_number("CLOAK_CHAIN_ID", &id)?;
        }
        if let Some(addr) = get("CLOAK_ANNOUNCER") {
            config.announcer_address = parse_address("CLOAK_ANNOUNCER", &addr)?;
        }
        if let Some(addr) = get("CLOAK_ORDER_HOOK") {
            config.order_hook_address = Some(parse_address("CLOAK_ORDER_HOOK", &addr)?);
        }
        if let Some(addr) = get("CLOAK_SENDER") {
            config.sender_address = Some(parse_address("CLOAK_SENDER", &addr)?);
        }
        if let Some(range) = get("CLOAK_MAX_BLOCK_RANGE") {
            config.max_block_range = parse_number("CLOAK_MAX_BLOCK_RANGE", &range)?;
        }
        if let Some(timeout) = get("CLOAK_RPC_TIMEOUT") {
            config.timeout_seconds = parse_number("CLOAK_RPC_TIMEOUT", &timeout)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Sets the chain id.
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Sets the announcer contract.
    pub fn with_announcer(mut self, address: EthAddress) -> Self {
        self.announcer_address = address;
        self
    }

    /// Sets the limit-order hook contract.
    pub fn with_order_hook(mut self, address: EthAddress) -> Self {
        self.order_hook_address = Some(address);
        self
    }

    /// Sets the sending account.
    pub fn with_sender(mut self, address: EthAddress) -> Self {
        self.sender_address = Some(address);
        self
    }

    /// Sets the widest log window.
    pub fn with_max_block_range(mut self, range: u64) -> Self {
        self.max_block_range = range;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// The parsed JSON-RPC endpoint.
    pub fn endpoint(&self) -> Result<Url> {
        let url = Url::parse(&self.rpc_url).map_err(|e| {
            CloakError::ConfigError(format!("invalid rpc url '{}': {}", self.rpc_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CloakError::ConfigError(format!(
                "rpc url must be http or https, got '{}'",
                url.scheme()
            )));
        }
        Ok(url)
    }

    /// Checks the URL, the block range and the timeout.
    pub fn validate(&self) -> Result<()> {
        self.endpoint()?;
        if self.max_block_range == 0 {
            return Err(CloakError::ConfigError("max block range must be positive".into()));
        }
        if self.timeout_seconds == 0 {
            return Err(CloakError::ConfigError("timeout must be positive".into()));
        }
        Ok(())
    }

    /// The order hook, or a configuration error if none is set.
    pub fn require_order_hook(&self) -> Result<EthAddress> {
        self.order_hook_address
            .ok_or_else(|| CloakError::ConfigError("CLOAK_ORDER_HOOK is not configured".into()))
    }

    /// The sending account, or a configuration error if none is set.
    pub fn require_sender(&self) -> Result<EthAddress> {
        self.sender_address
            .ok_or_else(|| CloakError::ConfigError("CLOAK_SENDER is not configured".into()))
    }
}

fn parse_number(name: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|e| CloakError::ConfigError(format!("{} = '{}': {}", name, value, e)))
}

fn parse_address(name: &str, value: &str) -> Result<EthAddress> {
    EthAddress::from_hex(value.trim())
        .map_err(|e| CloakError::ConfigError(format!("{}: {}", name, e)))
}
