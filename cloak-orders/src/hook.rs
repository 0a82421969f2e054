//! Order sink and execution feed backed by the limit-order hook contract.

use std::sync::Arc;

use alloy::primitives::{Bytes, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use tracing::{debug, info, instrument};

use cloak_core::error::{CloakError, Result};
use cloak_core::traits::{ExecutionFeed, OrderSink};
use cloak_core::types::{
    BlockBound, CreateLimitOrderParams, EthAddress, LimitOrder, LimitOrderExecutedEvent,
    OrderSlot, TransactionHandle,
};
use cloak_registry::{log_position, LedgerClient, LedgerConfig, LogQuery, RpcLedger};

use crate::contracts::{int24, ILimitOrderHook};
use crate::ids::encode_pool_key;

/// Builds calldata for `createLimitOrder(key, amountIn, minAmountOut,
/// deadline, targetTick, stealthCommitment, schemeId, ephemeralPubKey, viewTag)`.
pub fn encode_create_order_call(params: &CreateLimitOrderParams) -> Result<Bytes> {
    let call = ILimitOrderHook::createLimitOrderCall {
        key: encode_pool_key(&params.pool_key)?,
        amountIn: params.amount_in,
        minAmountOut: params.min_amount_out,
        deadline: U256::from(params.deadline),
        targetTick: int24(params.target_tick)?,
        stealthCommitment: params.stealth_commitment.word(),
        schemeId: U256::from(params.scheme_id),
        ephemeralPubKey: Bytes::copy_from_slice(params.ephemeral_pub_key.as_bytes()),
        viewTag: params.view_tag,
    };
    Ok(call.abi_encode().into())
}

/// Decodes a `LimitOrderExecuted` log.
pub fn decode_executed_log(log: &Log) -> Result<LimitOrderExecutedEvent> {
    let decoded = log
        .log_decode::<ILimitOrderHook::LimitOrderExecuted>()
        .map_err(|e| CloakError::AbiError(e.to_string()))?;
    let event = decoded.inner.data;
    let (block_number, log_index) = log_position(log);
    Ok(LimitOrderExecutedEvent {
        order_id: event.orderId.into(),
        executor: event.executor.into(),
        amount_in: event.amountIn,
        amount_out: event.amountOut,
        block_number,
        log_index,
    })
}

/// Decodes the return data of `orders(poolId, tick, index)`.
///
/// An unset slot reads back as all zeros and yields `None`.
pub fn decode_order(data: &[u8]) -> Result<Option<LimitOrder>> {
    let stored = ILimitOrderHook::ordersCall::abi_decode_returns(data, true)
        .map_err(|e| CloakError::AbiError(e.to_string()))?;
    if stored.amountIn.is_zero() && stored.owner.is_zero() {
        return Ok(None);
    }
    Ok(Some(LimitOrder {
        owner: stored.owner.into(),
        token_in: stored.tokenIn.into(),
        token_out: stored.tokenOut.into(),
        amount_in: stored.amountIn,
        min_amount_out: stored.minAmountOut,
        deadline: u64::try_from(stored.deadline)
            .map_err(|_| CloakError::AbiError("deadline exceeds 64 bits".into()))?,
        stealth_commitment: stored.stealthCommitment.into(),
        executed: stored.executed,
    }))
}

/// Submits orders to the hook through a [`LedgerClient`].
pub struct RpcOrderSink {
    ledger: Arc<dyn LedgerClient>,
    hook: EthAddress,
}

impl RpcOrderSink {
    /// Creates a sink over an existing ledger client.
    pub fn new(ledger: Arc<dyn LedgerClient>, hook: EthAddress) -> Self {
        Self { ledger, hook }
    }

    /// Creates a sink with its own JSON-RPC client.
    pub fn from_config(config: LedgerConfig) -> Result<Self> {
        let hook = config.require_order_hook()?;
        config.require_sender()?;
        Ok(Self::new(Arc::new(RpcLedger::new(config)?), hook))
    }
}

#[async_trait]
impl OrderSink for RpcOrderSink {
    #[instrument(skip(self, params), fields(hook = %self.hook, tick = params.target_tick))]
    async fn submit(&self, params: &CreateLimitOrderParams) -> Result<TransactionHandle> {
        let input = encode_create_order_call(params)?;
        let handle = self
            .ledger
            .send_transaction(self.hook, input)
            .await
            .map_err(CloakError::submission)?;
        info!(tx_hash = %handle, "Order submitted");
        Ok(handle)
    }
}

/// Reads executions and order state from the hook.
pub struct RpcExecutionFeed {
    ledger: Arc<dyn LedgerClient>,
    hook: EthAddress,
    max_block_range: u64,
}

impl RpcExecutionFeed {
    /// Creates a feed over an existing ledger client.
    pub fn new(ledger: Arc<dyn LedgerClient>, hook: EthAddress, max_block_range: u64) -> Self {
        Self {
            ledger,
            hook,
            max_block_range: max_block_range.max(1),
        }
    }

    /// Creates a feed with its own JSON-RPC client.
    pub fn from_config(config: LedgerConfig) -> Result<Self> {
        let hook = config.require_order_hook()?;
        let max_block_range = config.max_block_range;
        Ok(Self::new(Arc::new(RpcLedger::new(config)?), hook, max_block_range))
    }

    /// Reads the order stored in `slot`, if any.
    #[instrument(skip(self))]
    pub async fn fetch_order(&self, slot: &OrderSlot) -> Result<Option<LimitOrder>> {
        let call = ILimitOrderHook::ordersCall {
            poolId: slot.pool_id.word(),
            tick: int24(slot.tick)?,
            index: U256::from(slot.index),
        };
        let output = self.ledger.call(self.hook, call.abi_encode().into()).await?;
        decode_order(&output).map_err(CloakError::transport)
    }
}

#[async_trait]
impl ExecutionFeed for RpcExecutionFeed {
    /// Queries `[from_block, head]` in windows of at most `max_block_range`.
    #[instrument(skip(self))]
    async fn executions(&self, from_block: u64) -> Result<Vec<LimitOrderExecutedEvent>> {
        let head = self.ledger.block_number().await?;
        let mut events = Vec::new();
        let mut start = from_block;

        while start <= head {
            let end = start.saturating_add(self.max_block_range - 1).min(head);
            let query = LogQuery::for_event::<ILimitOrderHook::LimitOrderExecuted>(
                self.hook,
                start,
                BlockBound::Number(end),
            );
            let logs = self.ledger.get_logs(&query).await?;
            for log in &logs {
                events.push(decode_executed_log(log).map_err(CloakError::transport)?);
            }
            if end == head {
                break;
            }
            start = end + 1;
        }

        events.sort_by_key(LimitOrderExecutedEvent::position);
        debug!(from_block, head, count = events.len(), "Fetched executions");
        Ok(events)
    }
}
