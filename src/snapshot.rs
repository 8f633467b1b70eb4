//! Thread-safe, read-mostly snapshot API for downstream consumers (C7).
//! Wraps a book handle so a renderer or metrics loop gets a single,
//! consistent read per acquisition instead of composing separate getters,
//! which would otherwise be a torn-read hazard under concurrent mutation.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::book::OrderBook;
use crate::metrics::{self, Metrics};

/// One consistent view of a book's top-of-book state, all read under a
/// single lock acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct BookSnapshot {
    pub symbol: String,
    pub bids: Vec<(Decimal, Decimal)>,
    pub asks: Vec<(Decimal, Decimal)>,
    /// The book's mutation sequence number at the instant this was read, so
    /// a consumer can detect whether a recomputed metric is stale.
    pub sequence: u64,
}

/// A thin, cheaply-cloneable read handle onto one book.
#[derive(Clone)]
pub struct SnapshotPublisher {
    book: Arc<OrderBook>,
}

impl SnapshotPublisher {
    pub fn new(book: Arc<OrderBook>) -> Self {
        Self { book }
    }

    /// The top `depth` levels on each side plus the sequence they were read
    /// at, in one lock acquisition.
    pub fn snapshot(&self, depth: usize) -> BookSnapshot {
        let (bids, asks, sequence) = self.book.top_of_book(depth);
        BookSnapshot {
            symbol: self.book.symbol().to_string(),
            bids,
            asks,
            sequence,
        }
    }

    /// The microstructure metrics computed from the top `depth`
    /// levels. `None` when either side is empty.
    pub fn compute_metrics(&self, depth: usize) -> Option<Metrics> {
        let snapshot = self.snapshot(depth);
        metrics::compute(&snapshot.bids, &snapshot.asks)
    }
}
