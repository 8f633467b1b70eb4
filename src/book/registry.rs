//! Symbol → book registry.
//!
//! A book is created lazily on first subscription and destroyed on
//! unsubscription. Lookups hand back a reference-counted
//! [`Arc`] so that an unsubscribe racing with a reader never invalidates the
//! book a reader is still holding.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::debug;

use super::OrderBook;

/// Symbol → `Arc<OrderBook>` map, plus the per-symbol parse-error counters:
/// per-message drops are counted but not individually surfaced.
///
/// This is also where a parse error lands when the symbol can be read from
/// the frame but no book has been created for it yet — the counter doesn't
/// require a book to exist.
#[derive(Debug, Default)]
pub struct BookRegistry {
    books: DashMap<String, Arc<OrderBook>>,
    error_counts: DashMap<String, AtomicU64>,
    /// Parse errors for frames whose symbol itself couldn't be read.
    unresolved_errors: AtomicU64,
}

impl BookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the book for `symbol`, creating it if this is the first
    /// subscription.
    pub fn get_or_create(&self, symbol: &str) -> Arc<OrderBook> {
        if let Some(book) = self.books.get(symbol) {
            return book.clone();
        }
        let book = Arc::new(OrderBook::new(symbol));
        self.books
            .entry(symbol.to_string())
            .or_insert(book)
            .clone()
    }

    /// Returns the book for `symbol` if one has been created.
    pub fn get(&self, symbol: &str) -> Option<Arc<OrderBook>> {
        self.books.get(symbol).map(|entry| entry.clone())
    }

    /// Destroys the book for `symbol`, per the unsubscribe lifecycle.
    /// Readers holding a clone of the `Arc` keep a valid (now orphaned) book.
    pub fn remove(&self, symbol: &str) {
        if self.books.remove(symbol).is_some() {
            debug!(symbol, "book removed from registry");
        }
    }

    pub fn symbols(&self) -> Vec<String> {
        self.books.iter().map(|e| e.key().clone()).collect()
    }

    pub fn book_count(&self) -> usize {
        self.books.len()
    }

    /// Records a dropped-message parse error. `symbol` is `None`
    /// when the frame's symbol field itself couldn't be read.
    pub fn record_parse_error(&self, symbol: Option<&str>) {
        match symbol {
            Some(symbol) => {
                self.error_counts
                    .entry(symbol.to_string())
                    .or_insert_with(|| AtomicU64::new(0))
                    .fetch_add(1, Ordering::Relaxed);
            }
            None => {
                self.unresolved_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Number of parse errors recorded against `symbol`.
    pub fn error_count(&self, symbol: &str) -> u64 {
        self.error_counts
            .get(symbol)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Parse errors for frames whose symbol could not be determined.
    pub fn unresolved_error_count(&self) -> u64 {
        self.unresolved_errors.load(Ordering::Relaxed)
    }
}
