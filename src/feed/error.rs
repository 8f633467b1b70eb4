//! Feed-side error types: parse failures from the normalizer and transport
//! failures from the session.

use thiserror::Error;

/// Errors raised while normalizing a wire frame or driving the session's
/// transport. None of these are fatal to the process; each is logged and
/// handled according to its own recovery policy (drop the frame, reconnect,
/// or surface to the caller).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FeedError {
    /// A frame failed to parse as JSON, or a recognized `type` was missing a
    /// required field. The message is dropped whole, never partially
    /// applied.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The `type` field held a value the normalizer doesn't recognize.
    #[error("unrecognized message type: {type_name}")]
    UnknownType { type_name: String },

    /// The underlying transport reported a failure (disconnect, TLS
    /// failure, handshake failure). Drives the session into
    /// `Reconnecting`.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// No frame of any kind arrived within the configured idle window.
    #[error("heartbeat timeout after {elapsed_secs}s")]
    HeartbeatTimeout { elapsed_secs: u64 },

    /// An `error` frame was sent by the exchange itself. Surfaced to the
    /// session; never mutates a book.
    #[error("upstream error: {message}")]
    Upstream { message: String },
}

impl FeedError {
    pub fn parse(message: impl Into<String>) -> Self {
        FeedError::Parse {
            message: message.into(),
        }
    }
}
