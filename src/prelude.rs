//! Convenient re-exports of the crate's most commonly used types.
//!
//! ```
//! use marketbook::prelude::*;
//! ```

pub use crate::book::{
    BookChange, BookRegistry, L2Change, L3Event, Order, OrderBook, OrderBookError, OrderId, Side,
};
pub use crate::feed::{
    FeedError, FeedNormalizer, FeedSession, FeedSessionConfig, SessionState, Subscription,
    Transport,
};
pub use crate::metrics::{self, Metrics};
pub use crate::snapshot::{BookSnapshot, SnapshotPublisher};
