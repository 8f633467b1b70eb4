//! Parses decoded wire frames and routes them to the correct book (C4).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::{debug, trace, warn};

use super::error::FeedError;
use super::message::WireMessage;
use crate::book::{BookRegistry, L2Change, L3Event};

/// The cached ticker summary for one symbol. Ticker frames update this
/// cache but never mutate the book itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickerSnapshot {
    pub best_bid: Decimal,
    pub best_bid_size: Decimal,
    pub best_ask: Decimal,
    pub best_ask_size: Decimal,
    pub sequence: u64,
}

/// Parses frames, dispatches by `type`, and applies the result to the
/// target book via the registry.
pub struct FeedNormalizer {
    registry: Arc<BookRegistry>,
    tickers: DashMap<String, TickerSnapshot>,
    ready: AtomicBool,
    upstream_error_count: AtomicU64,
}

impl FeedNormalizer {
    pub fn new(registry: Arc<BookRegistry>) -> Self {
        Self {
            registry,
            tickers: DashMap::new(),
            ready: AtomicBool::new(false),
            upstream_error_count: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<BookRegistry> {
        &self.registry
    }

    /// Becomes `true` on the first `subscriptions` acknowledgment.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn ticker(&self, symbol: &str) -> Option<TickerSnapshot> {
        self.tickers.get(symbol).map(|e| *e)
    }

    /// Number of `error`-typed frames received from the exchange (distinct
    /// from [`crate::book::BookRegistry::error_count`]'s parse-drop count).
    pub fn upstream_error_count(&self) -> u64 {
        self.upstream_error_count.load(Ordering::Relaxed)
    }

    /// Parses and applies one decoded text frame. On a parse failure the
    /// message is dropped whole (no partial apply) and the registry's
    /// per-symbol error counter is incremented — best-effort, since the
    /// symbol itself may not be extractable from malformed JSON.
    pub fn handle_frame(&self, frame: &str) -> Result<(), FeedError> {
        let message: WireMessage = serde_json::from_str(frame).map_err(|err| {
            let symbol = best_effort_product_id(frame);
            self.registry.record_parse_error(symbol.as_deref());
            warn!(error = %err, symbol = ?symbol, "dropping unparseable frame");
            FeedError::parse(err.to_string())
        })?;
        self.dispatch(message)
    }

    fn dispatch(&self, message: WireMessage) -> Result<(), FeedError> {
        match message {
            WireMessage::Subscriptions { channels } => {
                self.ready.store(true, Ordering::Release);
                debug!(count = channels.len(), "subscriptions acknowledged");
                Ok(())
            }
            WireMessage::Heartbeat { product_id, .. } => {
                trace!(symbol = %product_id, "heartbeat");
                Ok(())
            }
            WireMessage::Snapshot {
                product_id,
                bids,
                asks,
            } => {
                let book = self.registry.get_or_create(&product_id);
                let bids: Vec<(Decimal, Decimal)> =
                    bids.iter().map(|l| (l.price, l.size)).collect();
                let asks: Vec<(Decimal, Decimal)> =
                    asks.iter().map(|l| (l.price, l.size)).collect();
                book.apply_snapshot(&bids, &asks);
                Ok(())
            }
            WireMessage::L2Update {
                product_id,
                changes,
            } => {
                let book = self.registry.get_or_create(&product_id);
                for change in changes {
                    book.apply_l2(L2Change {
                        side: change.side,
                        price: change.price,
                        size: change.size,
                    });
                }
                Ok(())
            }
            WireMessage::Ticker {
                product_id,
                best_bid,
                best_bid_size,
                best_ask,
                best_ask_size,
                sequence,
            } => {
                self.tickers.insert(
                    product_id,
                    TickerSnapshot {
                        best_bid,
                        best_bid_size,
                        best_ask,
                        best_ask_size,
                        sequence,
                    },
                );
                Ok(())
            }
            WireMessage::Open {
                product_id,
                order_id,
                side,
                price,
                size,
            } => {
                let book = self.registry.get_or_create(&product_id);
                book.apply_l3(L3Event::Open {
                    id: order_id,
                    side,
                    price,
                    size,
                });
                Ok(())
            }
            WireMessage::Done {
                product_id,
                order_id,
            } => {
                let book = self.registry.get_or_create(&product_id);
                book.apply_l3(L3Event::Done { id: order_id });
                Ok(())
            }
            WireMessage::Match {
                product_id,
                maker_order_id,
                size,
            } => {
                let book = self.registry.get_or_create(&product_id);
                book.apply_l3(L3Event::Match {
                    maker_id: maker_order_id,
                    filled: size,
                });
                Ok(())
            }
            WireMessage::Change {
                product_id,
                order_id,
                new_size,
            } => {
                let book = self.registry.get_or_create(&product_id);
                book.apply_l3(L3Event::Change {
                    id: order_id,
                    new_size,
                });
                Ok(())
            }
            WireMessage::Error { message } => {
                self.upstream_error_count.fetch_add(1, Ordering::Relaxed);
                warn!(message, "upstream error frame");
                Err(FeedError::Upstream { message })
            }
        }
    }
}

fn best_effort_product_id(frame: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(frame)
        .ok()
        .and_then(|v| v.get("product_id").and_then(|s| s.as_str().map(str::to_string)))
}
