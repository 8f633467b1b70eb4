//! All orders resting at a single price.

use indexmap::IndexMap;
use rust_decimal::Decimal;

use super::error::OrderBookError;
use super::order::{Order, OrderId};

/// A single price level: the FIFO queue of orders resting at `price`, plus
/// an incrementally maintained aggregate size.
///
/// `orders` is an [`IndexMap`] so insertion order (FIFO priority) is
/// preserved for iteration while lookup/removal by id stays O(1) average —
/// the level never needs to scan its own orders to find one by id.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    price: Decimal,
    orders: IndexMap<OrderId, Order>,
    total_size: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            orders: IndexMap::new(),
            total_size: Decimal::ZERO,
        }
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn total_size(&self) -> Decimal {
        self.total_size
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn find(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    /// Orders in FIFO (insertion) order, for display or future matching.
    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    /// Append `order` to the FIFO queue.
    ///
    /// # Errors
    /// Returns [`OrderBookError::PriceMismatch`] if `order.price() !=
    /// self.price()`, or [`OrderBookError::DuplicateOrder`] if an order with
    /// the same id is already present.
    pub fn add(&mut self, order: Order) -> Result<(), OrderBookError> {
        if order.price() != self.price {
            return Err(OrderBookError::PriceMismatch {
                expected: self.price,
                actual: order.price(),
            });
        }
        if self.orders.contains_key(&order.id()) {
            return Err(OrderBookError::DuplicateOrder(order.id()));
        }
        self.total_size += order.size();
        self.orders.insert(order.id(), order);
        Ok(())
    }

    /// Remove and return the order with `id`.
    ///
    /// # Errors
    /// Returns [`OrderBookError::OrderNotFound`] if `id` is not present.
    pub fn remove(&mut self, id: OrderId) -> Result<Order, OrderBookError> {
        let order = self
            .orders
            .shift_remove(&id)
            .ok_or(OrderBookError::OrderNotFound(id))?;
        self.total_size -= order.size();
        Ok(order)
    }

    /// Set the resting size of order `id` to `new_size`.
    ///
    /// If `new_size <= 0` this is equivalent to [`Self::remove`] and returns
    /// the removed order; otherwise the order's size is updated in place and
    /// `None` is returned.
    ///
    /// # Errors
    /// Returns [`OrderBookError::OrderNotFound`] if `id` is not present.
    pub fn update_size(
        &mut self,
        id: OrderId,
        new_size: Decimal,
    ) -> Result<Option<Order>, OrderBookError> {
        if new_size <= Decimal::ZERO {
            return self.remove(id).map(Some);
        }
        let order = self
            .orders
            .get_mut(&id)
            .ok_or(OrderBookError::OrderNotFound(id))?;
        let old_size = order.size();
        order.set_size(new_size);
        self.total_size += new_size - old_size;
        Ok(None)
    }

    /// Debug/property-test helper: recompute `total_size` by summation and
    /// compare against the incrementally maintained value.
    #[cfg(any(test, debug_assertions))]
    pub fn check_invariant(&self) -> bool {
        let summed: Decimal = self.orders.values().map(Order::size).sum();
        summed == self.total_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::order::Side;
    use uuid::Uuid;

    fn order(price: Decimal, size: &str) -> Order {
        Order::new(Uuid::new_v4(), Side::Buy, price, size.parse().unwrap(), 1)
    }

    #[test]
    fn add_accumulates_total_size() {
        let price = Decimal::new(100, 0);
        let mut level = PriceLevel::new(price);
        level.add(order(price, "1.0")).unwrap();
        level.add(order(price, "2.5")).unwrap();
        assert_eq!(level.total_size(), Decimal::new(35, 1));
        assert_eq!(level.order_count(), 2);
        assert!(level.check_invariant());
    }

    #[test]
    fn add_rejects_price_mismatch() {
        let mut level = PriceLevel::new(Decimal::new(100, 0));
        let err = level.add(order(Decimal::new(101, 0), "1.0")).unwrap_err();
        assert!(matches!(err, OrderBookError::PriceMismatch { .. }));
    }

    #[test]
    fn add_rejects_duplicate_id() {
        let price = Decimal::new(100, 0);
        let mut level = PriceLevel::new(price);
        let o = order(price, "1.0");
        level.add(o.clone()).unwrap();
        assert!(level.add(o).is_err());
    }

    #[test]
    fn remove_decrements_total_and_evicts() {
        let price = Decimal::new(100, 0);
        let mut level = PriceLevel::new(price);
        let o = order(price, "1.0");
        let id = o.id();
        level.add(o).unwrap();
        let removed = level.remove(id).unwrap();
        assert_eq!(removed.id(), id);
        assert!(level.is_empty());
        assert_eq!(level.total_size(), Decimal::ZERO);
    }

    #[test]
    fn remove_unknown_is_error() {
        let mut level = PriceLevel::new(Decimal::new(100, 0));
        assert!(level.remove(Uuid::new_v4()).is_err());
    }

    #[test]
    fn update_size_zero_removes() {
        let price = Decimal::new(100, 0);
        let mut level = PriceLevel::new(price);
        let o = order(price, "1.0");
        let id = o.id();
        level.add(o).unwrap();
        let removed = level.update_size(id, Decimal::ZERO).unwrap();
        assert!(removed.is_some());
        assert!(level.is_empty());
    }

    #[test]
    fn update_size_nonzero_adjusts_total() {
        let price = Decimal::new(100, 0);
        let mut level = PriceLevel::new(price);
        let o = order(price, "1.0");
        let id = o.id();
        level.add(o).unwrap();
        let removed = level.update_size(id, Decimal::new(3, 0)).unwrap();
        assert!(removed.is_none());
        assert_eq!(level.total_size(), Decimal::new(3, 0));
        assert!(level.check_invariant());
    }

    #[test]
    fn fifo_iteration_order() {
        let price = Decimal::new(100, 0);
        let mut level = PriceLevel::new(price);
        let first = order(price, "1.0");
        let second = order(price, "2.0");
        let (first_id, second_id) = (first.id(), second.id());
        level.add(first).unwrap();
        level.add(second).unwrap();
        let ids: Vec<_> = level.iter().map(Order::id).collect();
        assert_eq!(ids, vec![first_id, second_id]);
    }
}
