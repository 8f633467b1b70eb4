//! The normalized L3 update vocabulary and the book-change notification.

use rust_decimal::Decimal;

use super::order::{OrderId, Side};

/// A single normalized level-3 event, as produced by
/// [`crate::feed::FeedNormalizer`] and consumed by
/// [`super::OrderBook::apply_l3`].
///
/// Each wire message type the normalizer recognizes maps to exactly one of
/// these variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum L3Event {
    /// `open` / `received`: a new resting order appears.
    Open {
        id: OrderId,
        side: Side,
        price: Decimal,
        size: Decimal,
    },
    /// `done`: an order leaves the book, fully canceled or filled.
    Done { id: OrderId },
    /// `change`: a resting order's size is overwritten.
    Change { id: OrderId, new_size: Decimal },
    /// `match`: the maker order's resting size is reduced by `filled`. The
    /// taker id is not tracked by this book (it was never resting).
    Match { maker_id: OrderId, filled: Decimal },
}

/// A single aggregated level-2 change, as applied by
/// [`super::OrderBook::apply_l2`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L2Change {
    pub side: Side,
    pub price: Decimal,
    /// New aggregated size at this price; zero deletes the level.
    pub size: Decimal,
}

/// Emitted to the book's update callback exactly once per mutating
/// operation that changed observable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookChange {
    /// A single level's aggregated size changed as a result of
    /// `add_order`/`remove_order`/`modify_order`.
    LevelUpdated {
        side: Side,
        price: Decimal,
        /// `None` when the level was evicted.
        new_level_size: Option<Decimal>,
        sequence: u64,
    },
    /// The entire book was reset: an explicit `clear()`, a crossed-book
    /// soft resync, or a full `apply_snapshot()` replacement. Callers
    /// should treat any previously held level state as stale and re-read
    /// it rather than trying to reconcile it against this event.
    Reset { sequence: u64 },
}
