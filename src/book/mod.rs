//! The per-symbol limit order book (C3 in the design overview).
//!
//! A single [`std::sync::Mutex`] protects the bid/ask maps and the id index —
//! one per-book mutex is sufficient given realistic feed write rates. Bids
//! are keyed descending by price, asks ascending, using
//! [`std::collections::BTreeMap`] so the best price is always the map's
//! first element in priority-iteration order. The id index is the sole
//! source of truth for "where does this order live" — levels are never
//! scanned to find an order by id.

mod error;
mod event;
mod level;
mod order;
mod registry;

pub use error::OrderBookError;
pub use event::{BookChange, L2Change, L3Event};
pub use level::PriceLevel;
pub use order::{Order, OrderId, Side};
pub use registry::BookRegistry;

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use rust_decimal::Decimal;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Namespace for synthetic order ids minted for L2-only books. Deterministic
/// in `(side, price)` so repeated `apply_l2` calls at the same price refer
/// to the same synthetic order.
const SYNTHETIC_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x3a, 0x4e, 0x6b, 0x8f, 0x0c, 0x1d, 0x4a, 0x2e, 0x9b, 0x77, 0x5d, 0x61, 0xf0, 0x02, 0x8c, 0x19,
]);

fn synthetic_l2_id(side: Side, price: Decimal) -> OrderId {
    Uuid::new_v5(&SYNTHETIC_ID_NAMESPACE, format!("{side}-{price}").as_bytes())
}

/// A callback invoked exactly once per mutating operation that changed
/// observable book state. Callbacks run synchronously on the applying
/// thread and must not re-enter the book.
pub type UpdateCallback = Box<dyn Fn(BookChange) + Send + Sync>;

#[derive(Debug, Default)]
struct BookState {
    bids: BTreeMap<Decimal, PriceLevel>,
    asks: BTreeMap<Decimal, PriceLevel>,
    index: HashMap<OrderId, (Side, Decimal)>,
    sequence: u64,
}

impl BookState {
    fn level_mut(&mut self, side: Side, price: Decimal) -> &mut BTreeMap<Decimal, PriceLevel> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    fn levels(&self, side: Side) -> &BTreeMap<Decimal, PriceLevel> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn best_bid(&self) -> Option<Decimal> {
        self.bids.keys().next_back().copied()
    }

    fn best_ask(&self) -> Option<Decimal> {
        self.asks.keys().next().copied()
    }

    fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid >= ask,
            _ => false,
        }
    }

    /// Inserts `order` into its side's level, creating the level if absent,
    /// and registers it in the index. Caller has already checked for a
    /// duplicate id.
    fn insert(&mut self, order: Order) {
        let (side, price, id) = (order.side(), order.price(), order.id());
        self.level_mut(side, price)
            .entry(price)
            .or_insert_with(|| PriceLevel::new(price))
            .add(order)
            .expect("price/duplicate already validated by caller");
        self.index.insert(id, (side, price));
    }

    /// Removes the order with `id`, evicting its level if it becomes empty.
    /// Returns the removed order and the level's resulting total size
    /// (`None` if the level was evicted).
    fn remove(&mut self, id: OrderId) -> Result<(Order, Side, Decimal, Option<Decimal>), OrderBookError> {
        let (side, price) = self
            .index
            .remove(&id)
            .ok_or(OrderBookError::OrderNotFound(id))?;
        let levels = self.level_mut(side, price);
        let order = levels
            .get_mut(&price)
            .expect("index is authoritative for (side, price)")
            .remove(id)?;
        let remaining = levels.get(&price).map(PriceLevel::total_size);
        if remaining == Some(Decimal::ZERO) || remaining.is_none() {
            levels.remove(&price);
        }
        let new_level_size = levels.get(&price).map(PriceLevel::total_size);
        Ok((order, side, price, new_level_size))
    }

    fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.index.clear();
    }
}

/// Per-symbol price-sorted order book with O(1) expected order lookup.
///
/// All public operations are safe to call from multiple reader threads
/// concurrently with a single writer thread. Callers that need several
/// related values for one rendered frame (best bid, best ask, top-N levels)
/// should use [`OrderBook::bid_levels`]/[`OrderBook::ask_levels`] or a
/// [`crate::snapshot::SnapshotPublisher`] rather than composing separate
/// getters, which would be a torn read.
pub struct OrderBook {
    symbol: String,
    state: Mutex<BookState>,
    callback: Mutex<Option<UpdateCallback>>,
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("symbol", &self.symbol)
            .finish_non_exhaustive()
    }
}

impl OrderBook {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            state: Mutex::new(BookState::default()),
            callback: Mutex::new(None),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Monotonic counter bumped once per observable mutation, under the same
    /// lock acquisition that performed the mutation.
    pub fn sequence(&self) -> u64 {
        self.state.lock().expect("book mutex poisoned").sequence
    }

    pub fn set_update_callback<F>(&self, callback: F)
    where
        F: Fn(BookChange) + Send + Sync + 'static,
    {
        *self.callback.lock().expect("callback mutex poisoned") = Some(Box::new(callback));
    }

    fn notify(&self, change: BookChange) {
        if let Some(cb) = self.callback.lock().expect("callback mutex poisoned").as_ref() {
            cb(change);
        }
    }

    /// Clears all state, either as an explicit reset or as the soft-resync
    /// trigger for a crossed-book invariant violation.
    pub fn clear(&self) {
        let mut state = self.state.lock().expect("book mutex poisoned");
        state.clear();
        state.sequence += 1;
        let sequence = state.sequence;
        drop(state);
        trace!(symbol = %self.symbol, "book cleared");
        self.notify(BookChange::Reset { sequence });
    }

    /// Adds a new resting order. Returns `false` (no-op) if `id` is already
    /// present.
    pub fn add_order(&self, order: Order) -> bool {
        let mut state = self.state.lock().expect("book mutex poisoned");
        if state.index.contains_key(&order.id()) {
            debug!(id = %order.id(), "add_order: duplicate id ignored");
            return false;
        }
        let (side, price) = (order.side(), order.price());
        state.insert(order);
        state.sequence += 1;
        let sequence = state.sequence;

        if state.is_crossed() {
            warn!(symbol = %self.symbol, "crossed book detected, clearing for resync");
            state.clear();
            state.sequence += 1;
            let reset_sequence = state.sequence;
            drop(state);
            self.notify(BookChange::Reset {
                sequence: reset_sequence,
            });
            return true;
        }

        let new_level_size = state.levels(side).get(&price).map(PriceLevel::total_size);
        drop(state);
        self.notify(BookChange::LevelUpdated {
            side,
            price,
            new_level_size,
            sequence,
        });
        true
    }

    /// Removes a resting order by id. Returns `false` if unknown.
    pub fn remove_order(&self, id: OrderId) -> bool {
        let mut state = self.state.lock().expect("book mutex poisoned");
        match state.remove(id) {
            Ok((_order, side, price, new_level_size)) => {
                state.sequence += 1;
                let sequence = state.sequence;
                drop(state);
                self.notify(BookChange::LevelUpdated {
                    side,
                    price,
                    new_level_size,
                    sequence,
                });
                true
            }
            Err(_) => {
                debug!(%id, "remove_order: unknown id ignored");
                false
            }
        }
    }

    /// Overwrites a resting order's size. `new_size <= 0` behaves like
    /// [`Self::remove_order`].
    pub fn modify_order(&self, id: OrderId, new_size: Decimal) -> bool {
        let mut state = self.state.lock().expect("book mutex poisoned");
        let Some(&(side, price)) = state.index.get(&id) else {
            debug!(%id, "modify_order: unknown id ignored");
            return false;
        };
        if new_size <= Decimal::ZERO {
            drop(state);
            return self.remove_order(id);
        }
        let levels = state.level_mut(side, price);
        let level = levels.get_mut(&price).expect("index is authoritative");
        if level.update_size(id, new_size).is_err() {
            return false;
        }
        state.sequence += 1;
        let sequence = state.sequence;
        let new_level_size = state.levels(side).get(&price).map(PriceLevel::total_size);
        drop(state);
        self.notify(BookChange::LevelUpdated {
            side,
            price,
            new_level_size,
            sequence,
        });
        true
    }

    /// Applies a normalized L3 event.
    pub fn apply_l3(&self, event: L3Event) -> bool {
        match event {
            L3Event::Open {
                id,
                side,
                price,
                size,
            } => self.add_order(Order::new(id, side, price, size, now_nanos())),
            L3Event::Done { id } => self.remove_order(id),
            L3Event::Change { id, new_size } => self.modify_order(id, new_size),
            L3Event::Match { maker_id, filled } => {
                let Some(current) = self.get_order(maker_id) else {
                    // Unknown maker id: silently ignored, but it is a
                    // candidate resync trigger.
                    debug!(id = %maker_id, "match: unknown maker id ignored");
                    return false;
                };
                let new_size = current.size() - filled;
                self.modify_order(maker_id, new_size)
            }
        }
    }

    /// Applies an aggregated L2 level change. A synthetic order id
    /// deterministic in `(side, price)` keeps the internal representation
    /// uniform with the L3 path.
    pub fn apply_l2(&self, change: L2Change) -> bool {
        let id = synthetic_l2_id(change.side, change.price);
        if change.size <= Decimal::ZERO {
            return self.remove_order(id);
        }
        if self.get_order(id).is_some() {
            self.modify_order(id, change.size)
        } else {
            self.add_order(Order::new(id, change.side, change.price, change.size, now_nanos()))
        }
    }

    /// Atomically replaces the entire book state. The lock is held for the
    /// full replacement so no interleaved update observes a partially reset
    /// book.
    pub fn apply_snapshot(&self, bids: &[(Decimal, Decimal)], asks: &[(Decimal, Decimal)]) {
        let mut state = self.state.lock().expect("book mutex poisoned");
        state.clear();
        for &(price, size) in bids {
            if size <= Decimal::ZERO {
                continue;
            }
            let id = synthetic_l2_id(Side::Buy, price);
            state.insert(Order::new(id, Side::Buy, price, size, now_nanos()));
        }
        for &(price, size) in asks {
            if size <= Decimal::ZERO {
                continue;
            }
            let id = synthetic_l2_id(Side::Sell, price);
            state.insert(Order::new(id, Side::Sell, price, size, now_nanos()));
        }
        state.sequence += 1;
        let sequence = state.sequence;
        drop(state);
        trace!(symbol = %self.symbol, bids = bids.len(), asks = asks.len(), "snapshot applied");
        self.notify(BookChange::Reset { sequence });
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.state.lock().expect("book mutex poisoned").best_bid()
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.state.lock().expect("book mutex poisoned").best_ask()
    }

    /// `best_ask - best_bid`, or zero when either side is empty.
    pub fn spread(&self) -> Decimal {
        let state = self.state.lock().expect("book mutex poisoned");
        match (state.best_bid(), state.best_ask()) {
            (Some(bid), Some(ask)) => ask - bid,
            _ => Decimal::ZERO,
        }
    }

    /// `(best_bid + best_ask) / 2`, or zero when either side is empty.
    pub fn midpoint(&self) -> Decimal {
        let state = self.state.lock().expect("book mutex poisoned");
        match (state.best_bid(), state.best_ask()) {
            (Some(bid), Some(ask)) => (bid + ask) / Decimal::TWO,
            _ => Decimal::ZERO,
        }
    }

    /// Top `n` bid levels in descending-priority order.
    pub fn bid_levels(&self, n: usize) -> Vec<(Decimal, Decimal)> {
        let state = self.state.lock().expect("book mutex poisoned");
        state
            .bids
            .iter()
            .rev()
            .take(n)
            .map(|(price, level)| (*price, level.total_size()))
            .collect()
    }

    /// Top `n` ask levels in ascending-priority order.
    pub fn ask_levels(&self, n: usize) -> Vec<(Decimal, Decimal)> {
        let state = self.state.lock().expect("book mutex poisoned");
        state
            .asks
            .iter()
            .take(n)
            .map(|(price, level)| (*price, level.total_size()))
            .collect()
    }

    pub fn get_order(&self, id: OrderId) -> Option<Order> {
        let state = self.state.lock().expect("book mutex poisoned");
        let &(side, price) = state.index.get(&id)?;
        state.levels(side).get(&price)?.find(id).cloned()
    }

    pub fn order_count(&self) -> usize {
        self.state.lock().expect("book mutex poisoned").index.len()
    }

    pub fn bid_level_count(&self) -> usize {
        self.state.lock().expect("book mutex poisoned").bids.len()
    }

    pub fn ask_level_count(&self) -> usize {
        self.state.lock().expect("book mutex poisoned").asks.len()
    }

    /// Snapshot of the top `n` levels on both sides plus the sequence they
    /// were read at — a single lock acquisition, avoiding the torn-read
    /// hazard of composing separate getters under concurrent writers.
    pub fn top_of_book(&self, n: usize) -> (Vec<(Decimal, Decimal)>, Vec<(Decimal, Decimal)>, u64) {
        let state = self.state.lock().expect("book mutex poisoned");
        let bids = state.bids.iter().rev().take(n).map(|(p, l)| (*p, l.total_size())).collect();
        let asks = state.asks.iter().take(n).map(|(p, l)| (*p, l.total_size())).collect();
        (bids, asks, state.sequence)
    }

    /// Debug/property-test helper: recomputes `order_count` and per-level
    /// `total_size` from scratch and compares against the maintained values.
    #[cfg(any(test, debug_assertions))]
    pub fn check_invariants(&self) -> bool {
        let state = self.state.lock().expect("book mutex poisoned");
        let level_order_count: usize = state
            .bids
            .values()
            .chain(state.asks.values())
            .map(PriceLevel::order_count)
            .sum();
        if level_order_count != state.index.len() {
            return false;
        }
        if !state.bids.values().chain(state.asks.values()).all(PriceLevel::check_invariant) {
            return false;
        }
        for (&id, &(side, price)) in &state.index {
            let Some(level) = state.levels(side).get(&price) else {
                return false;
            };
            if level.find(id).is_none() {
                return false;
            }
        }
        if state.bids.values().chain(state.asks.values()).any(PriceLevel::is_empty) {
            return false;
        }
        matches!((state.best_bid(), state.best_ask()), (None, _) | (_, None)) || state.best_bid() < state.best_ask()
    }
}

fn now_nanos() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn id() -> OrderId {
        Uuid::new_v4()
    }

    #[test]
    fn scenario_a_basic_add_best() {
        let book = OrderBook::new("BTC-USD");
        book.add_order(Order::new(id(), Side::Buy, dec!(100.0), dec!(1.5), 1));
        book.add_order(Order::new(id(), Side::Buy, dec!(99.0), dec!(2.5), 2));
        book.add_order(Order::new(id(), Side::Sell, dec!(101.0), dec!(1.0), 3));
        book.add_order(Order::new(id(), Side::Sell, dec!(102.0), dec!(2.0), 4));

        assert_eq!(book.best_bid(), Some(dec!(100.0)));
        assert_eq!(book.best_ask(), Some(dec!(101.0)));
        assert_eq!(book.spread(), dec!(1.0));
        assert_eq!(book.midpoint(), dec!(100.5));
        assert_eq!(
            book.bid_levels(10),
            vec![(dec!(100.0), dec!(1.5)), (dec!(99.0), dec!(2.5))]
        );
        assert_eq!(
            book.ask_levels(10),
            vec![(dec!(101.0), dec!(1.0)), (dec!(102.0), dec!(2.0))]
        );
        assert!(book.check_invariants());
    }

    #[test]
    fn scenario_b_match_partial_fill() {
        let book = OrderBook::new("BTC-USD");
        let b1 = id();
        book.add_order(Order::new(b1, Side::Buy, dec!(100.0), dec!(1.5), 1));
        book.apply_l3(L3Event::Match {
            maker_id: b1,
            filled: dec!(0.5),
        });
        assert_eq!(book.get_order(b1).unwrap().size(), dec!(1.0));
        assert_eq!(book.bid_levels(1), vec![(dec!(100.0), dec!(1.0))]);
    }

    #[test]
    fn scenario_c_match_full_fill() {
        let book = OrderBook::new("BTC-USD");
        let a1 = id();
        book.add_order(Order::new(a1, Side::Sell, dec!(101.0), dec!(1.0), 1));
        book.add_order(Order::new(id(), Side::Sell, dec!(102.0), dec!(2.0), 2));
        book.apply_l3(L3Event::Match {
            maker_id: a1,
            filled: dec!(1.0),
        });
        assert!(book.get_order(a1).is_none());
        assert_eq!(book.best_ask(), Some(dec!(102.0)));
        assert_eq!(book.ask_level_count(), 1);
    }

    #[test]
    fn scenario_d_l2_delete() {
        let book = OrderBook::new("BTC-USD");
        book.add_order(Order::new(id(), Side::Buy, dec!(100.0), dec!(1.5), 1));
        book.add_order(Order::new(id(), Side::Buy, dec!(99.0), dec!(2.5), 2));
        book.apply_l2(L2Change {
            side: Side::Buy,
            price: dec!(100.0),
            size: Decimal::ZERO,
        });
        assert_eq!(book.best_bid(), Some(dec!(99.0)));
    }

    #[test]
    fn scenario_e_snapshot_resync() {
        let book = OrderBook::new("BTC-USD");
        book.add_order(Order::new(id(), Side::Buy, dec!(100.0), dec!(1.5), 1));
        book.add_order(Order::new(id(), Side::Sell, dec!(101.0), dec!(1.0), 2));
        book.clear();
        book.apply_snapshot(&[(dec!(50), dec!(1))], &[(dec!(60), dec!(1))]);
        assert_eq!(book.order_count(), 2);
        assert_eq!(book.best_bid(), Some(dec!(50)));
        assert_eq!(book.best_ask(), Some(dec!(60)));
    }

    #[test]
    fn done_is_idempotent_with_open() {
        let book = OrderBook::new("BTC-USD");
        let before = (book.order_count(), book.bid_level_count());
        let oid = id();
        book.apply_l3(L3Event::Open {
            id: oid,
            side: Side::Buy,
            price: dec!(100.0),
            size: dec!(1.0),
        });
        book.apply_l3(L3Event::Done { id: oid });
        assert_eq!((book.order_count(), book.bid_level_count()), before);
    }

    #[test]
    fn reapplying_same_snapshot_is_a_noop_on_observable_state() {
        let book = OrderBook::new("BTC-USD");
        let bids = [(dec!(100.0), dec!(1.5)), (dec!(99.0), dec!(2.5))];
        let asks = [(dec!(101.0), dec!(1.0))];
        book.apply_snapshot(&bids, &asks);
        let before = (book.bid_levels(10), book.ask_levels(10), book.order_count());
        book.apply_snapshot(&bids, &asks);
        let after = (book.bid_levels(10), book.ask_levels(10), book.order_count());
        assert_eq!(before, after);
    }

    #[test]
    fn crossed_book_triggers_clear() {
        let book = OrderBook::new("BTC-USD");
        book.add_order(Order::new(id(), Side::Buy, dec!(100.0), dec!(1.0), 1));
        book.add_order(Order::new(id(), Side::Sell, dec!(101.0), dec!(1.0), 2));
        // A crossing bid arrives (upstream bug / out-of-order frame).
        book.add_order(Order::new(id(), Side::Buy, dec!(102.0), dec!(1.0), 3));
        assert_eq!(book.order_count(), 0);
        assert!(book.best_bid().is_none());
        assert!(book.best_ask().is_none());
    }

    #[test]
    fn unknown_match_maker_is_ignored() {
        let book = OrderBook::new("BTC-USD");
        let applied = book.apply_l3(L3Event::Match {
            maker_id: id(),
            filled: dec!(1.0),
        });
        assert!(!applied);
    }

    #[test]
    fn update_callback_fires_once_per_mutation() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let book = OrderBook::new("BTC-USD");
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        book.set_update_callback(move |_change| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        book.add_order(Order::new(id(), Side::Buy, dec!(100.0), dec!(1.0), 1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_and_apply_snapshot_notify_with_reset() {
        use std::sync::Arc;
        use std::sync::Mutex as StdMutex;

        let book = OrderBook::new("BTC-USD");
        let seen: Arc<StdMutex<Vec<BookChange>>> = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = seen.clone();
        book.set_update_callback(move |change| {
            seen_clone.lock().unwrap().push(change);
        });

        book.clear();
        book.apply_snapshot(&[(dec!(100.0), dec!(1.0))], &[(dec!(101.0), dec!(1.0))]);

        let recorded = seen.lock().unwrap();
        assert_eq!(recorded.len(), 2);
        assert!(recorded.iter().all(|c| matches!(c, BookChange::Reset { .. })));
    }

    #[test]
    fn crossed_book_resync_notifies_with_reset() {
        use std::sync::Arc;
        use std::sync::Mutex as StdMutex;

        let book = OrderBook::new("BTC-USD");
        book.add_order(Order::new(id(), Side::Buy, dec!(100.0), dec!(1.0), 1));
        book.add_order(Order::new(id(), Side::Sell, dec!(101.0), dec!(1.0), 2));

        let seen: Arc<StdMutex<Vec<BookChange>>> = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = seen.clone();
        book.set_update_callback(move |change| {
            seen_clone.lock().unwrap().push(change);
        });

        book.add_order(Order::new(id(), Side::Buy, dec!(102.0), dec!(1.0), 3));

        let recorded = seen.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert!(matches!(recorded[0], BookChange::Reset { .. }));
    }
}
