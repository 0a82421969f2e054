//! In-memory order hook.
//!
//! [`MemoryOrderBook`] stands in for the on-chain hook: it accepts
//! submissions as an [`OrderSink`] and serves executions as an
//! [`ExecutionFeed`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use alloy::primitives::U256;
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, instrument};

use cloak_core::error::{CloakError, Result};
use cloak_core::traits::{ExecutionFeed, OrderSink};
use cloak_core::types::{
    CreateLimitOrderParams, EthAddress, LimitOrderExecutedEvent, OrderId, TransactionHandle,
};

/// Rejection raised by a [`MemoryOrderBook`] switched to failing mode.
#[derive(Debug, thiserror::Error)]
#[error("order book rejected the submission")]
pub struct SubmissionRejected;

/// In-memory order sink and execution feed.
#[derive(Debug, Default)]
pub struct MemoryOrderBook {
    submitted: RwLock<Vec<CreateLimitOrderParams>>,
    executions: RwLock<Vec<LimitOrderExecutedEvent>>,
    head: AtomicU64,
    reject: AtomicBool,
}

impl MemoryOrderBook {
    /// Creates an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following submission fail (or succeed again).
    pub fn set_rejecting(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// Parameters accepted so far, in submission order.
    pub fn submitted(&self) -> Vec<CreateLimitOrderParams> {
        self.submitted.read().clone()
    }

    /// Records an execution in a freshly mined block and returns it.
    pub fn execute(
        &self,
        order_id: OrderId,
        executor: EthAddress,
        amount_in: U256,
        amount_out: U256,
    ) -> LimitOrderExecutedEvent {
        let block_number = self.head.fetch_add(1, Ordering::SeqCst) + 1;
        let event = LimitOrderExecutedEvent {
            order_id,
            executor,
            amount_in,
            amount_out,
            block_number,
            log_index: 0,
        };
        self.push_execution(event.clone());
        event
    }

    /// Inserts an execution event as-is.
    pub fn push_execution(&self, event: LimitOrderExecutedEvent) {
        self.head.fetch_max(event.block_number, Ordering::SeqCst);
        self.executions.write().push(event);
    }

    /// Current head block.
    pub fn head(&self) -> u64 {
        self.head.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderSink for MemoryOrderBook {
    #[instrument(skip(self, params), fields(tick = params.target_tick))]
    async fn submit(&self, params: &CreateLimitOrderParams) -> Result<TransactionHandle> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(CloakError::submission(SubmissionRejected));
        }
        let mut submitted = self.submitted.write();
        submitted.push(params.clone());
        let tx_hash = format!("0x{:064x}", submitted.len());
        debug!(tx_hash = %tx_hash, "Order accepted");
        Ok(TransactionHandle::new(tx_hash))
    }
}

#[async_trait]
impl ExecutionFeed for MemoryOrderBook {
    async fn executions(&self, from_block: u64) -> Result<Vec<LimitOrderExecutedEvent>> {
        let mut events: Vec<LimitOrderExecutedEvent> = self
            .executions
            .read()
            .iter()
            .filter(|e| e.block_number >= from_block)
            .cloned()
            .collect();
        events.sort_by_key(LimitOrderExecutedEvent::position);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloak_core::types::Bytes32;

    fn event(block: u64, index: u64) -> LimitOrderExecutedEvent {
        LimitOrderExecutedEvent {
            order_id: Bytes32::from_array([block as u8; 32]),
            executor: EthAddress::zero(),
            amount_in: U256::from(1),
            amount_out: U256::from(1),
            block_number: block,
            log_index: index,
        }
    }

    #[tokio::test]
    async fn test_executions_are_ordered_and_filtered() {
        let book = MemoryOrderBook::new();
        book.push_execution(event(5, 1));
        book.push_execution(event(3, 0));
        book.push_execution(event(5, 0));
        book.push_execution(event(1, 0));

        let events = book.executions(3).await.unwrap();
        let positions: Vec<_> = events.iter().map(|e| e.position()).collect();
        assert_eq!(positions, vec![(3, 0), (5, 0), (5, 1)]);
        assert_eq!(book.head(), 5);
    }

    #[tokio::test]
    async fn test_execute_mines_blocks() {
        let book = MemoryOrderBook::new();
        let (amount_in, amount_out) = (U256::from(10), U256::from(9));
        let first = book.execute(Bytes32::from_array([1; 32]), EthAddress::zero(), amount_in, amount_out);
        let second = book.execute(Bytes32::from_array([2; 32]), EthAddress::zero(), amount_in, amount_out);
        assert_eq!(first.block_number, 1);
        assert_eq!(second.block_number, 2);
    }

    #[test]
    fn test_rejecting_switch() {
        let book = MemoryOrderBook::new();
        book.set_rejecting(true);
        assert!(book.reject.load(Ordering::SeqCst));
        book.set_rejecting(false);
        assert!(!book.reject.load(Ordering::SeqCst));
    }
}
