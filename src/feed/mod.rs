//! Feed ingestion and normalization: wire parsing (C4) and session
//! lifecycle management (C5).

mod error;
mod message;
mod normalizer;
mod session;

pub use error::FeedError;
pub use message::{L2ChangeTuple, LevelTuple, OutboundMessage, WireMessage};
pub use normalizer::{FeedNormalizer, TickerSnapshot};
pub use session::{FeedSession, FeedSessionConfig, SessionState, Subscription, Transport};
