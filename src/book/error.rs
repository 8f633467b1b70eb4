//! Order book error types.

use rust_decimal::Decimal;
use thiserror::Error;

use super::order::{OrderId, Side};

/// Errors that can occur within [`super::OrderBook`] operations.
///
/// These are logical/invariant errors: duplicate adds,
/// unknown ids, and the rare crossed-book case. None of them are fatal —
/// callers are expected to log at debug level and move on, since they are
/// routinely produced by reconnect races.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum OrderBookError {
    /// An order with this id is already resting in the book.
    #[error("duplicate order id: {0}")]
    DuplicateOrder(OrderId),

    /// No resting order has this id.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// An order was added to a level whose price doesn't match the order's.
    #[error("price mismatch: level is {expected}, order is {actual}")]
    PriceMismatch { expected: Decimal, actual: Decimal },

    /// An operation's argument was invalid for its own sake (e.g. a
    /// non-positive reduction amount).
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },

    /// Applying an update would leave the book crossed (best bid >= best
    /// ask). The book is cleared so the next snapshot re-establishes ground
    /// truth rather than surfacing a hard error to the caller.
    #[error("crossed book on {side}: {price} would cross opposite best {opposite_price}")]
    CrossedBook {
        side: Side,
        price: Decimal,
        opposite_price: Decimal,
    },
}
