//! Ethereum JSON-RPC ledger client.
//!
//! Provides the log query boundary used by the announcement channel and
//! the order feed. Provider errors are translated at this boundary:
//! rejected log windows become `RangeTooLarge`, everything else becomes
//! `Transport` wrapping the underlying cause.

use std::time::Duration;

use alloy::eips::BlockNumberOrTag;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Bytes, B256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::{Filter, Log, TransactionRequest};
use alloy::sol_types::SolEvent;
use alloy::transports::http::Http;
use alloy::transports::TransportError;
use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use cloak_core::error::{CloakError, Result};
use cloak_core::types::{BlockBound, EthAddress, TransactionHandle};

use crate::config::LedgerConfig;

/// JSON-RPC error code several providers use for oversized log queries.
const LIMIT_EXCEEDED_CODE: i64 = -32005;

// ═══════════════════════════════════════════════════════════════════════════════
// LOG QUERY BOUNDARY
// ═══════════════════════════════════════════════════════════════════════════════

/// A log filter: one contract, one event, an inclusive block window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogQuery {
    /// Emitting contract
    pub address: EthAddress,
    /// Event signature hash (topic0)
    pub topic0: B256,
    /// First block (inclusive)
    pub from_block: u64,
    /// Last block (inclusive)
    pub to_block: BlockBound,
}

impl LogQuery {
    /// Creates a query for a raw topic0.
    pub fn new(address: EthAddress, topic0: B256, from_block: u64, to_block: BlockBound) -> Self {
        Self {
            address,
            topic0,
            from_block,
            to_block,
        }
    }

    /// Creates a query for the logs of event `E`.
    pub fn for_event<E: SolEvent>(address: EthAddress, from_block: u64, to_block: BlockBound) -> Self {
        Self::new(address, E::SIGNATURE_HASH, from_block, to_block)
    }

    /// The `eth_getLogs` filter for this query.
    pub fn filter(&self) -> Filter {
        let to = match self.to_block {
            BlockBound::Number(n) => BlockNumberOrTag::Number(n),
            BlockBound::Latest => BlockNumberOrTag::Latest,
        };
        Filter::new()
            .address(self.address.address())
            .event_signature(self.topic0)
            .from_block(self.from_block)
            .to_block(to)
    }

    fn span(&self) -> u64 {
        match self.to_block {
            BlockBound::Number(to) => to.saturating_sub(self.from_block).saturating_add(1),
            BlockBound::Latest => u64::MAX,
        }
    }
}

/// Sort key of a ledger log. Pending logs sort first.
pub fn log_position(log: &Log) -> (u64, u64) {
    (log.block_number.unwrap_or_default(), log.log_index.unwrap_or_default())
}

/// Access to an Ethereum-style ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Current head block.
    async fn block_number(&self) -> Result<u64>;

    /// Logs matching the query, in ledger order.
    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<Log>>;

    /// Sends a transaction with the given calldata. Returns once accepted.
    async fn send_transaction(&self, to: EthAddress, input: Bytes) -> Result<TransactionHandle>;

    /// Read-only contract call.
    async fn call(&self, to: EthAddress, input: Bytes) -> Result<Bytes>;
}

/// Whether a provider error refuses the requested block window.
pub fn is_range_error(code: i64, message: &str) -> bool {
    let msg = message.to_lowercase();
    code == LIMIT_EXCEEDED_CODE
        || msg.contains("block range")
        || msg.contains("more than")
        || msg.contains("query returned more")
        || msg.contains("range too large")
}

// ═══════════════════════════════════════════════════════════════════════════════
// JSON-RPC CLIENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Ledger client over an alloy HTTP provider.
pub struct RpcLedger {
    config: LedgerConfig,
    provider: RootProvider<Http<reqwest::Client>>,
}

impl RpcLedger {
    /// Creates a client for the configured endpoint.
    pub fn new(config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        let url = config.endpoint()?;
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| CloakError::ConfigError(format!("failed to build HTTP client: {}", e)))?;

        let transport = Http::with_client(http_client, url);
        let provider = RootProvider::new(RpcClient::new(transport, false));

        Ok(Self { config, provider })
    }

    /// The configuration in use.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn translate(&self, err: TransportError, query: &LogQuery) -> CloakError {
        if let Some(payload) = err.as_error_resp() {
            warn!(code = payload.code, message = %payload.message, "RPC error");
            if is_range_error(payload.code, &payload.message) {
                return CloakError::RangeTooLarge {
                    requested: query.span(),
                    max: self.config.max_block_range,
                };
            }
        }
        CloakError::transport(err)
    }
}

#[async_trait]
impl LedgerClient for RpcLedger {
    async fn block_number(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .map_err(CloakError::transport)
    }

    #[instrument(skip(self, query), fields(from = query.from_block, to = %query.to_block))]
    async fn get_logs(&self, query: &LogQuery) -> Result<Vec<Log>> {
        let logs = self
            .provider
            .get_logs(&query.filter())
            .await
            .map_err(|e| self.translate(e, query))?;

        debug!(count = logs.len(), "Fetched logs");
        Ok(logs)
    }

    #[instrument(skip(self, to, input), fields(to = %to, len = input.len()))]
    async fn send_transaction(&self, to: EthAddress, input: Bytes) -> Result<TransactionHandle> {
        let from = self.config.require_sender()?;
        let tx = TransactionRequest::default()
            .with_from(from.address())
            .with_to(to.address())
            .with_input(input);

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(CloakError::transport)?;
        let handle = TransactionHandle::new(pending.tx_hash().to_string());
        debug!(tx_hash = %handle, "Transaction submitted");
        Ok(handle)
    }

    async fn call(&self, to: EthAddress, input: Bytes) -> Result<Bytes> {
        let tx = TransactionRequest::default()
            .with_to(to.address())
            .with_input(input);
        self.provider.call(&tx).await.map_err(CloakError::transport)
    }
}
