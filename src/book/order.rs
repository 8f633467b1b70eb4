//! A single resting order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::error::OrderBookError;

/// Opaque order identifier, unique within a symbol.
///
/// Exchange-issued ids (the `order_id` / `maker_order_id` fields of the wire
/// protocol) are UUIDs; synthetic ids minted for L2-only books are
/// deterministic UUIDv5 values derived from `(side, price)`.
pub type OrderId = Uuid;

/// Which side of the book an order rests on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The opposite side.
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// A single resting order at a price level.
///
/// `id` and `price` are immutable after construction; a price change from
/// the feed is modeled as a cancel followed by an insert at the new price,
/// never as an in-place mutation of this field. `size` is the only field
/// `change`/`match` events are allowed to mutate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    side: Side,
    price: Decimal,
    size: Decimal,
    /// Monotonic nanoseconds at ingestion time.
    timestamp: u64,
}

impl Order {
    pub fn new(id: OrderId, side: Side, price: Decimal, size: Decimal, timestamp: u64) -> Self {
        Self {
            id,
            side,
            price,
            size,
            timestamp,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn size(&self) -> Decimal {
        self.size
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn is_alive(&self) -> bool {
        self.size > Decimal::ZERO
    }

    /// Reduce this order's resting size by `amount`, as `match` events do.
    ///
    /// # Errors
    /// Returns [`OrderBookError::InvalidOperation`] if `amount` is not
    /// positive or exceeds the order's current size.
    pub fn reduce_size(&mut self, amount: Decimal) -> Result<(), OrderBookError> {
        if amount <= Decimal::ZERO {
            return Err(OrderBookError::InvalidOperation {
                message: format!("reduce_size amount must be positive, got {amount}"),
            });
        }
        if amount > self.size {
            return Err(OrderBookError::InvalidOperation {
                message: format!(
                    "reduce_size amount {amount} exceeds order {} size {}",
                    self.id, self.size
                ),
            });
        }
        self.size -= amount;
        Ok(())
    }

    /// Overwrite the resting size, as `change` events do.
    pub fn set_size(&mut self, new_size: Decimal) {
        self.size = new_size;
    }
}
