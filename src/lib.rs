//! A real-time level-3 (order-by-order) limit order book replica.
//!
//! This crate maintains a precise, queryable per-symbol order book fed by a
//! streaming cryptocurrency exchange market-data feed. It is a passive
//! replica of an exchange's public book — not a matching engine — used by
//! downstream analytics, visualization, and microstructure-signal code.
//!
//! # Components
//!
//! - [`book`] — the price-sorted, per-symbol [`book::OrderBook`] with O(1)
//!   expected order lookup, the L2/L3 update API, and the symbol
//!   [`book::BookRegistry`].
//! - [`feed`] — [`feed::FeedNormalizer`] (wire parsing) and
//!   [`feed::FeedSession`] (connect/subscribe/reconnect/heartbeat lifecycle)
//!   driven against an out-of-scope [`feed::Transport`].
//! - [`metrics`] — pure microstructure metrics (imbalance, VWAP, depth,
//!   spread in basis points, 1%-impact estimate) computed from a book
//!   snapshot.
//! - [`snapshot`] — [`snapshot::SnapshotPublisher`], a thread-safe
//!   read-mostly view for renderers and metrics consumers.
//!
//! # Non-goals
//!
//! Matching, order generation, persistence, historical replay, cross-venue
//! arbitrage, and authenticated endpoints are out of scope. The wire
//! transport (TLS/websocket framing), CLI parsing, and terminal rendering
//! are external collaborators referenced only through [`feed::Transport`]
//! and [`snapshot::SnapshotPublisher`].

pub mod book;
pub mod feed;
pub mod metrics;
pub mod prelude;
pub mod snapshot;
