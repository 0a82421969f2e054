//! Limit order registry.
//!
//! Tracks orders by `(pool_id, tick, index)` slot. Each slot is written at
//! most once; the only later change is the `executed` flag flipping to
//! true. Submission to the [`OrderSink`] happens before anything is
//! recorded. While it is in flight the slot is held by a reservation that
//! is released on drop, so a failed `create`, or one whose future is
//! dropped mid-submit, leaves no trace.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};


use cloak_core::error::{CloakError, Result};
use cloak_core::traits::{ExecutionFeed, OrderSink};
use cloak_core::types::{
    Bytes32, CreateLimitOrderParams, LimitOrder, LimitOrderCreatedEvent,
    LimitOrderExecutedEvent, OrderId, OrderSlot, OrderStatus, PoolId, TransactionHandle,
};

use crate::ids::{order_id, pool_id};

/// Source of the current unix time in seconds.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Wall clock backed by `chrono::Utc`.
pub fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp().max(0) as u64)
}

/// Result of a successful `create`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrder {
    /// Order identifier
    pub order_id: OrderId,
    /// Slot the order occupies
    pub slot: OrderSlot,
    /// Creation event recorded for the order
    pub event: LimitOrderCreatedEvent,
    /// Handle returned by the order sink
    pub transaction: TransactionHandle,
}

/// Order counts by derived status.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    /// Orders tracked
    pub total: u64,
    /// Orders still waiting
    pub open: u64,
    /// Orders filled
    pub executed: u64,
    /// Orders past their deadline
    pub expired: u64,
}

/// Holds a slot in the in-flight set until dropped.
struct SlotReservation<'a> {
    reserved: &'a Mutex<HashSet<OrderSlot>>,
    slot: OrderSlot,
}

impl Drop for SlotReservation<'_> {
    fn drop(&mut self) {
        self.reserved.lock().remove(&self.slot);
    }
}

/// Registry of privacy-preserving limit orders.
pub struct LimitOrderRegistry {
    sink: Arc<dyn OrderSink>,
    feed: Arc<dyn ExecutionFeed>,
    orders: DashMap<OrderSlot, LimitOrder>,
    ids: DashMap<OrderId, OrderSlot>,
    next_index: DashMap<(PoolId, i32), u64>,
    /// Slots with a submission in flight
    reserved: Mutex<HashSet<OrderSlot>>,
    created: RwLock<Vec<LimitOrderCreatedEvent>>,
    clock: Clock,
}

impl LimitOrderRegistry {
    /// Creates a registry using the system clock.
    pub fn new(sink: Arc<dyn OrderSink>, feed: Arc<dyn ExecutionFeed>) -> Self {
        Self {
            sink,
            feed,
            orders: DashMap::new(),
            ids: DashMap::new(),
            next_index: DashMap::new(),
            reserved: Mutex::new(HashSet::new()),
            created: RwLock::new(Vec::new()),
            clock: system_clock(),
        }
    }

    /// Replaces the clock used for deadline checks.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Current time according to the registry clock.
    pub fn now(&self) -> u64 {
        (self.clock)()
    }

    /// Creates an order in the pool identified by `params.pool_key`.
    pub async fn create(&self, params: CreateLimitOrderParams) -> Result<CreatedOrder> {
        let pool = pool_id(&params.pool_key)?;
        self.create_in_pool(pool, params).await
    }

    /// Creates an order under an explicit pool id.
    #[instrument(skip(self, params), fields(tick = params.target_tick))]
    pub async fn create_in_pool(
        &self,
        pool_id: PoolId,
        params: CreateLimitOrderParams,
    ) -> Result<CreatedOrder> {
        params.validate()?;
        let now = self.now();
        if params.deadline <= now {
            return Err(CloakError::OrderExpired {
                deadline: params.deadline,
                now,
            });
        }

        let reservation = self.reserve(pool_id, params.target_tick, params.index)?;
        let slot = reservation.slot;
        let id = order_id(&slot)?;
        let params = params.with_index(slot.index);

        let transaction = match self.sink.submit(&params).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(%slot, error = %e, "Order submission failed");
                return Err(match e {
                    CloakError::SubmissionFailed(_) => e,
                    other => CloakError::submission(other),
                });
            }
        };

        let event = LimitOrderCreatedEvent {
            order_id: id,
            token_in: params.token_in(),
            token_out: params.token_out(),
            amount_in: params.amount_in,
            min_amount_out: params.min_amount_out,
            deadline: params.deadline,
            target_tick: params.target_tick,
        };

        self.record(slot, id, params.to_order());
        self.created.write().push(event.clone());
        drop(reservation);

        info!(order_id = %id, %slot, tx_hash = %transaction, "Limit order created");
        Ok(CreatedOrder {
            order_id: id,
            slot,
            event,
            transaction,
        })
    }

    /// Claims a slot for an in-flight submission.
    fn reserve(
        &self,
        pool_id: PoolId,
        tick: i32,
        index: Option<u64>,
    ) -> Result<SlotReservation<'_>> {
        let mut reserved = self.reserved.lock();
        let taken = |slot: &OrderSlot| self.orders.contains_key(slot) || reserved.contains(slot);

        let slot = match index {
            Some(i) => {
                let slot = OrderSlot::new(pool_id, tick, i);
                if taken(&slot) {
                    return Err(CloakError::OrderSlotOccupied(slot.to_string()));
                }
                slot
            }
            None => {
                let mut i = self.next_index.get(&(pool_id, tick)).map_or(0, |n| *n);
                while taken(&OrderSlot::new(pool_id, tick, i)) {
                    i += 1;
                }
                OrderSlot::new(pool_id, tick, i)
            }
        };

        reserved.insert(slot);
        Ok(SlotReservation {
            reserved: &self.reserved,
            slot,
        })
    }

    fn record(&self, slot: OrderSlot, id: OrderId, order: LimitOrder) {
        self.orders.insert(slot, order);
        self.ids.insert(id, slot);
        let mut next = self.next_index.entry((slot.pool_id, slot.tick)).or_insert(0);
        if *next <= slot.index {
            *next = slot.index + 1;
        }
    }

    /// Starts tracking an order learned from the ledger rather than created here.
    pub fn track(&self, slot: OrderSlot, order: LimitOrder) -> Result<OrderId> {
        let reserved = self.reserved.lock();
        if self.orders.contains_key(&slot) || reserved.contains(&slot) {
            return Err(CloakError::OrderSlotOccupied(slot.to_string()));
        }
        let id = order_id(&slot)?;
        self.record(slot, id, order);
        debug!(order_id = %id, %slot, "Tracking order");
        Ok(id)
    }

    /// Looks up the order at `(pool_id, tick, index)`.
    pub fn get(&self, pool_id: PoolId, tick: i32, index: u64) -> Result<LimitOrder> {
        let slot = OrderSlot::new(pool_id, tick, index);
        self.orders
            .get(&slot)
            .map(|o| o.value().clone())
            .ok_or_else(|| CloakError::OrderNotFound(slot.to_string()))
    }

    /// Looks up an order by id.
    pub fn get_by_id(&self, order_id: &OrderId) -> Result<(OrderSlot, LimitOrder)> {
        let slot = self
            .ids
            .get(order_id)
            .map(|s| *s.value())
            .ok_or_else(|| CloakError::OrderNotFound(order_id.to_string()))?;
        let order = self.get(slot.pool_id, slot.tick, slot.index)?;
        Ok((slot, order))
    }

    /// Orders whose proceeds are bound to `commitment`.
    pub fn orders_for_commitment(&self, commitment: &Bytes32) -> Vec<(OrderSlot, LimitOrder)> {
        let mut found: Vec<(OrderSlot, LimitOrder)> = self
            .orders
            .iter()
            .filter(|e| &e.value().stealth_commitment == commitment)
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        found.sort_by_key(|(slot, _)| *slot);
        found
    }

    /// Derived status of the order in `slot` at `now`.
    pub fn status(&self, slot: &OrderSlot, now: u64) -> Result<OrderStatus> {
        self.orders
            .get(slot)
            .map(|o| o.status(now))
            .ok_or_else(|| CloakError::OrderNotFound(slot.to_string()))
    }

    /// Applies an execution event.
    ///
    /// Returns true if this call flipped the order to executed; replaying
    /// the same event is a no-op returning false.
    #[instrument(skip(self, event), fields(order_id = %event.order_id))]
    pub fn on_execution(&self, event: &LimitOrderExecutedEvent) -> Result<bool> {
        let slot = self
            .ids
            .get(&event.order_id)
            .map(|s| *s.value())
            .ok_or_else(|| CloakError::UnknownOrder(event.order_id.to_string()))?;

        let mut order = self
            .orders
            .get_mut(&slot)
            .ok_or_else(|| CloakError::InternalError(format!("id without order at {}", slot)))?;

        if order.executed {
            debug!("Execution already applied");
            return Ok(false);
        }
        order.executed = true;
        info!(
            block = event.block_number,
            amount_out = %event.amount_out,
            "Limit order executed"
        );
        Ok(true)
    }

    /// Execution events at or after `from_block`, in ledger order.
    pub async fn watch_executions(&self, from_block: u64) -> Result<Vec<LimitOrderExecutedEvent>> {
        let mut events = self.feed.executions(from_block).await?;
        events.sort_by_key(LimitOrderExecutedEvent::position);
        Ok(events)
    }

    /// Pulls executions and applies those for tracked orders.
    ///
    /// Returns the ids that became executed during this call. Events for
    /// orders this registry does not track are skipped.
    #[instrument(skip(self))]
    pub async fn sync_executions(&self, from_block: u64) -> Result<Vec<OrderId>> {
        let events = self.watch_executions(from_block).await?;
        let mut newly = Vec::new();
        for event in &events {
            match self.on_execution(event) {
                Ok(true) => newly.push(event.order_id),
                Ok(false) => {}
                Err(CloakError::UnknownOrder(_)) => {}
                Err(e) => return Err(e),
            }
        }
        debug!(events = events.len(), newly = newly.len(), "Synced executions");
        Ok(newly)
    }

    /// Creation events in the order they were recorded.
    pub fn created_events(&self) -> Vec<LimitOrderCreatedEvent> {
        self.created.read().clone()
    }

    /// Counts orders by status at `now`.
    pub fn stats(&self, now: u64) -> RegistryStats {
        let mut stats = RegistryStats::default();
        for entry in self.orders.iter() {
            stats.total += 1;
            match entry.value().status(now) {
                OrderStatus::Open => stats.open += 1,
                OrderStatus::Executed => stats.executed += 1,
                OrderStatus::Expired => stats.expired += 1,
            }
        }
        stats
    }

    /// Number of tracked orders.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Returns true if no orders are tracked.
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::MemoryOrderBook;
    use alloy::primitives::U256;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use cloak_core::types::{EthAddress, PoolKey};
    use cloak_crypto::generate_stealth_keys;
    use cloak_stealth::StealthAddressDeriver;
    use test_case::test_case;

    const NOW: u64 = 1_700_000_000;

    fn pool_key() -> PoolKey {
        PoolKey {
            currency0: EthAddress::from_array([0x01; 20]),
            currency1: EthAddress::from_array([0x02; 20]),
            fee: 3000,
            tick_spacing: 60,
            hooks: EthAddress::from_array([0x0F; 20]),
        }
    }

    fn params() -> CreateLimitOrderParams {
        let keys = generate_stealth_keys();
        let stealth = StealthAddressDeriver::new()
            .generate(&keys.meta_address())
            .unwrap();
        CreateLimitOrderParams::for_stealth(
            pool_key(),
            &stealth,
            true,
            U256::from(1000),
            U256::from(900),
            NOW + 3600,
            100,
        )
    }

    fn fill(
        book: &MemoryOrderBook,
        id: OrderId,
        amount_in: u64,
        amount_out: u64,
    ) -> LimitOrderExecutedEvent {
        book.execute(id, EthAddress::zero(), U256::from(amount_in), U256::from(amount_out))
    }

    fn setup() -> (Arc<MemoryOrderBook>, LimitOrderRegistry) {
        let book = Arc::new(MemoryOrderBook::new());
        let registry = LimitOrderRegistry::new(book.clone(), book.clone())
            .with_clock(Arc::new(|| NOW));
        (book, registry)
    }

    #[tokio::test]
    async fn test_create_then_execute() {
        let (book, registry) = setup();
        let pool = Bytes32::from_hex("0xabc").unwrap();

        let created = registry
            .create_in_pool(pool, params().with_index(0))
            .await
            .unwrap();
        assert_eq!(created.slot, OrderSlot::new(pool, 100, 0));
        assert_eq!(created.event.amount_in, U256::from(1000));
        assert_eq!(created.event.min_amount_out, U256::from(900));

        let order = registry.get(pool, 100, 0).unwrap();
        assert!(!order.executed);
        assert_eq!(registry.status(&created.slot, NOW).unwrap(), OrderStatus::Open);

        let event = fill(&book, created.order_id, 1000, 950);
        assert!(registry.on_execution(&event).unwrap());

        assert!(registry.get(pool, 100, 0).unwrap().executed);
        assert_eq!(
            registry.status(&created.slot, NOW).unwrap(),
            OrderStatus::Executed
        );
    }

    #[tokio::test]
    async fn test_execution_is_idempotent() {
        let (book, registry) = setup();
        let created = registry.create(params()).await.unwrap();
        let event = fill(&book, created.order_id, 1000, 950);

        assert!(registry.on_execution(&event).unwrap());
        assert!(!registry.on_execution(&event).unwrap());
        assert!(registry.get_by_id(&created.order_id).unwrap().1.executed);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_order_execution() {
        let (_, registry) = setup();
        let event = LimitOrderExecutedEvent {
            order_id: Bytes32::from_array([0x42; 32]),
            executor: EthAddress::zero(),
            amount_in: U256::from(1),
            amount_out: U256::from(1),
            block_number: 1,
            log_index: 0,
        };
        assert!(matches!(
            registry.on_execution(&event),
            Err(CloakError::UnknownOrder(_))
        ));
    }

    #[tokio::test]
    async fn test_occupied_slot_rejected() {
        let (book, registry) = setup();
        let first = registry.create(params().with_index(3)).await.unwrap();

        let again = registry.create(params().with_index(3)).await;
        assert!(matches!(again, Err(CloakError::OrderSlotOccupied(_))));

        // Executed slots stay taken.
        let event = fill(&book, first.order_id, 1000, 950);
        registry.on_execution(&event).unwrap();
        let after = registry.create(params().with_index(3)).await;
        assert!(matches!(after, Err(CloakError::OrderSlotOccupied(_))));

        assert_eq!(book.submitted().len(), 1);
        assert!(registry.get_by_id(&first.order_id).unwrap().1.executed);
    }

    #[tokio::test]
    async fn test_next_free_index() {
        let (_, registry) = setup();
        let a = registry.create(params()).await.unwrap();
        let b = registry.create(params().with_index(2)).await.unwrap();
        let c = registry.create(params()).await.unwrap();
        let d = registry.create(params()).await.unwrap();

        assert_eq!(a.slot.index, 0);
        assert_eq!(b.slot.index, 2);
        assert_eq!(c.slot.index, 3);
        assert_eq!(d.slot.index, 4);

        let e = registry.create(params().with_index(1)).await.unwrap();
        assert_eq!(e.slot.index, 1);
        assert_ne!(a.order_id, e.order_id);
    }

    #[tokio::test]
    async fn test_sink_receives_resolved_index() {
        let (book, registry) = setup();
        registry.create(params()).await.unwrap();
        registry.create(params()).await.unwrap();

        let indexes: Vec<_> = book.submitted().iter().map(|p| p.index).collect();
        assert_eq!(indexes, vec![Some(0), Some(1)]);
    }

    #[test_case(NOW ; "deadline equals now")]
    #[test_case(NOW - 1 ; "deadline in the past")]
    #[tokio::test]
    async fn test_stale_deadline_rejected(deadline: u64) {
        let (book, registry) = setup();
        let stale = CreateLimitOrderParams {
            deadline,
            ..params()
        };
        let result = registry.create(stale).await;
        assert!(matches!(result, Err(CloakError::OrderExpired { .. })));
        assert!(book.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_params_rejected() {
        let (book, registry) = setup();

        let zero = CreateLimitOrderParams {
            amount_in: U256::ZERO,
            ..params()
        };
        assert!(matches!(
            registry.create(zero).await,
            Err(CloakError::ValidationError(_))
        ));

        let no_commitment = CreateLimitOrderParams {
            stealth_commitment: Bytes32::default(),
            ..params()
        };
        assert!(registry.create(no_commitment).await.is_err());
        assert!(book.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_failed_submission_leaves_no_state() {
        let (book, registry) = setup();
        book.set_rejecting(true);

        let result = registry.create(params().with_index(0)).await;
        assert!(matches!(result, Err(CloakError::SubmissionFailed(_))));
        assert!(registry.is_empty());
        assert!(registry.created_events().is_empty());

        book.set_rejecting(false);
        let created = registry.create(params().with_index(0)).await.unwrap();
        assert_eq!(created.slot.index, 0);
    }

    /// Never completes its first submission; accepts the rest.
    #[derive(Default)]
    struct StallingSink {
        stalled: AtomicBool,
    }

    #[async_trait]
    impl OrderSink for StallingSink {
        async fn submit(&self, _params: &CreateLimitOrderParams) -> Result<TransactionHandle> {
            if !self.stalled.swap(true, Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            Ok(TransactionHandle::new("0x01"))
        }
    }

    #[tokio::test]
    async fn test_dropped_create_releases_slot() {
        let book = Arc::new(MemoryOrderBook::new());
        let registry = LimitOrderRegistry::new(Arc::new(StallingSink::default()), book)
            .with_clock(Arc::new(|| NOW));

        let stalled = tokio::time::timeout(
            Duration::from_millis(20),
            registry.create(params().with_index(0)),
        )
        .await;
        assert!(stalled.is_err());
        assert!(registry.reserved.lock().is_empty());
        assert!(registry.is_empty());

        let created = registry.create(params().with_index(0)).await.unwrap();
        assert_eq!(created.slot.index, 0);
        assert!(registry.reserved.lock().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_creates_get_distinct_slots() {
        let (_, registry) = setup();
        let registry = Arc::new(registry);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.create(params()).await.unwrap().slot.index
            }));
        }

        let mut indexes = Vec::new();
        for handle in handles {
            indexes.push(handle.await.unwrap());
        }
        indexes.sort_unstable();
        assert_eq!(indexes, (0..16).collect::<Vec<_>>());
        assert_eq!(registry.created_events().len(), 16);
    }

    #[tokio::test]
    async fn test_concurrent_creates_same_slot() {
        let (_, registry) = setup();
        let registry = Arc::new(registry);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.create(params().with_index(5)).await
            }));
        }

        let mut ok = 0;
        let mut occupied = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(CloakError::OrderSlotOccupied(_)) => occupied += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(occupied, 7);
    }

    #[tokio::test]
    async fn test_sync_executions() {
        let (book, registry) = setup();
        let a = registry.create(params()).await.unwrap();
        let b = registry.create(params()).await.unwrap();

        fill(&book, Bytes32::from_array([0x99; 32]), 1, 1);
        fill(&book, b.order_id, 1000, 990);

        let newly = registry.sync_executions(0).await.unwrap();
        assert_eq!(newly, vec![b.order_id]);
        assert!(registry.sync_executions(0).await.unwrap().is_empty());

        fill(&book, a.order_id, 1000, 990);
        let watched = registry.watch_executions(3).await.unwrap();
        assert_eq!(watched.len(), 1);
        assert_eq!(registry.sync_executions(3).await.unwrap(), vec![a.order_id]);

        let stats = registry.stats(NOW);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.executed, 2);
    }

    #[tokio::test]
    async fn test_expired_is_derived() {
        let (_, registry) = setup();
        let created = registry.create(params()).await.unwrap();
        let later = NOW + 7200;

        assert_eq!(registry.status(&created.slot, later).unwrap(), OrderStatus::Expired);
        assert!(!registry.get_by_id(&created.order_id).unwrap().1.executed);
        assert_eq!(registry.stats(later).expired, 1);
    }

    #[tokio::test]
    async fn test_lookup_by_commitment() {
        let (_, registry) = setup();
        let p = params();
        let commitment = p.stealth_commitment;
        registry.create(p.clone()).await.unwrap();
        registry.create(p).await.unwrap();
        registry.create(params()).await.unwrap();

        let mine = registry.orders_for_commitment(&commitment);
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|(_, o)| o.stealth_commitment == commitment));
    }

    #[test]
    fn test_missing_order() {
        let (_, registry) = setup();
        let pool = Bytes32::from_hex("0xabc").unwrap();
        assert!(matches!(
            registry.get(pool, 100, 0),
            Err(CloakError::OrderNotFound(_))
        ));
        assert!(matches!(
            registry.get_by_id(&Bytes32::default()),
            Err(CloakError::OrderNotFound(_))
        ));
    }

    #[test]
    fn test_track_learned_order() {
        let (_, registry) = setup();
        let slot = OrderSlot::new(Bytes32::from_array([7; 32]), -60, 0);
        let id = registry.track(slot, params().to_order()).unwrap();

        assert_eq!(id, order_id(&slot).unwrap());
        assert!(matches!(
            registry.track(slot, params().to_order()),
            Err(CloakError::OrderSlotOccupied(_))
        ));
    }
}
