//! The feed session lifecycle state machine (C5).
//!
//! The session drives an out-of-scope [`Transport`] (TLS + websocket
//! framing live outside this crate) through connect, subscribe, reconnect
//! and heartbeat. It doesn't parse frames or hold book state itself, but it
//! does own the one side effect a reconnect requires: clearing each
//! subscribed book so the snapshot that follows resubscription establishes
//! ground truth, rather than merging with stale pre-reconnect state.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::error::FeedError;
use super::message::OutboundMessage;
use crate::book::BookRegistry;

/// The out-of-scope transport capability: decoded text frames in, decoded
/// text frames out. A real implementation wraps a TLS + websocket client;
/// tests drive the session against an in-memory fake.
pub trait Transport: Send {
    fn connect(&mut self) -> Result<(), FeedError>;
    fn send_text(&mut self, frame: &str) -> Result<(), FeedError>;
    /// Non-blocking receive: `Ok(None)` when nothing is waiting.
    fn try_recv_text(&mut self) -> Result<Option<String>, FeedError>;
    fn is_connected(&self) -> bool;
    fn close(&mut self);
}

/// The session's lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Handshaking,
    Subscribing,
    Live,
    Reconnecting,
    Closed,
}

/// Tunable timing constants named explicitly so they are not magic numbers
/// buried in the state machine.
#[derive(Debug, Clone, Copy)]
pub struct FeedSessionConfig {
    pub idle_timeout: Duration,
    pub backoff_initial: Duration,
    pub backoff_cap: Duration,
    /// Jitter as a fraction of the computed delay, e.g. `0.2` for ±20%.
    pub backoff_jitter: f64,
}

impl Default for FeedSessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(10),
            backoff_initial: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(30),
            backoff_jitter: 0.2,
        }
    }
}

/// A `(symbol, channels)` pair the caller asked to subscribe to. Retained so
/// reconnection can transparently re-subscribe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub symbol: String,
    pub channels: Vec<String>,
}

/// Drives one feed connection's lifecycle. Thread-safe: `subscribe` can be
/// called from any thread while the session's own driving loop runs on
/// another.
///
/// Outbound subscribe/unsubscribe frames go through an unbounded
/// [`mpsc`] queue rather than straight to the [`Transport`] — enqueue never
/// blocks the producer beyond the channel's internal lock — the driving
/// loop is the only thing that owns the transport and calls
/// [`Self::try_recv_outbound`] to actually write to it.
pub struct FeedSession {
    config: FeedSessionConfig,
    registry: Arc<BookRegistry>,
    state: Mutex<SessionState>,
    subscriptions: Mutex<Vec<Subscription>>,
    last_frame_at: Mutex<Instant>,
    backoff_attempt: AtomicU32,
    outbound_tx: mpsc::UnboundedSender<String>,
    outbound_rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl FeedSession {
    /// `registry` is the same book registry the [`super::FeedNormalizer`]
    /// applies updates to, so a reconnect can clear each subscribed book
    /// before resubscribing.
    pub fn new(config: FeedSessionConfig, registry: Arc<BookRegistry>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        Self {
            config,
            registry,
            state: Mutex::new(SessionState::Disconnected),
            subscriptions: Mutex::new(Vec::new()),
            last_frame_at: Mutex::new(Instant::now()),
            backoff_attempt: AtomicU32::new(0),
            outbound_tx,
            outbound_rx: Mutex::new(outbound_rx),
        }
    }

    fn enqueue(&self, message: &OutboundMessage) {
        let frame = serde_json::to_string(message).expect("OutboundMessage always serializes");
        // The receiver is owned by this same struct, so send only fails if
        // we are mid-drop; either way there is nothing useful to do with
        // the error.
        let _ = self.outbound_tx.send(frame);
    }

    /// Pulls the next outbound frame queued by [`Self::subscribe`],
    /// [`Self::unsubscribe`], or a reconnect's resubscription, if any. The
    /// driving loop calls this to hand frames to the [`Transport`].
    pub fn try_recv_outbound(&self) -> Option<String> {
        self.outbound_rx
            .lock()
            .expect("session mutex poisoned")
            .try_recv()
            .ok()
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().expect("session mutex poisoned")
    }

    fn set_state(&self, new_state: SessionState) {
        let mut state = self.state.lock().expect("session mutex poisoned");
        debug!(from = ?*state, to = ?new_state, "session transition");
        *state = new_state;
    }

    /// Records a subscription request so it survives reconnection, and
    /// queues the outbound `subscribe` frame. Idempotent: re-subscribing to
    /// an already-tracked `(symbol, channels)` pair is a no-op that sends
    /// nothing new.
    pub fn subscribe(&self, symbol: impl Into<String>, channels: Vec<String>) {
        let sub = Subscription {
            symbol: symbol.into(),
            channels,
        };
        let mut subs = self.subscriptions.lock().expect("session mutex poisoned");
        if subs.contains(&sub) {
            return;
        }
        self.enqueue(&OutboundMessage::Subscribe {
            product_ids: vec![sub.symbol.clone()],
            channels: sub.channels.clone(),
        });
        subs.push(sub);
    }

    /// Drops the tracked subscription and queues the outbound `unsubscribe`
    /// frame. A no-op if `symbol` isn't currently tracked.
    pub fn unsubscribe(&self, symbol: &str) {
        let mut subs = self.subscriptions.lock().expect("session mutex poisoned");
        let Some(pos) = subs.iter().position(|s| s.symbol == symbol) else {
            return;
        };
        let removed = subs.remove(pos);
        drop(subs);
        self.enqueue(&OutboundMessage::Unsubscribe {
            product_ids: vec![removed.symbol],
            channels: removed.channels,
        });
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.subscriptions.lock().expect("session mutex poisoned").clone()
    }

    /// `Disconnected -> Connecting`. The caller is expected to actually dial
    /// the transport next and report the outcome via
    /// [`Self::on_transport_connected`].
    pub fn connect(&self) {
        self.set_state(SessionState::Connecting);
    }

    /// The transport reported a live socket. `Connecting -> Handshaking`.
    pub fn on_transport_connected(&self) {
        self.set_state(SessionState::Handshaking);
    }

    /// The protocol handshake completed. `Handshaking -> Live` (first
    /// connect) since there are no prior subscriptions to resubscribe to.
    pub fn on_handshake_complete(&self) {
        self.backoff_attempt.store(0, Ordering::Relaxed);
        self.touch();
        self.set_state(SessionState::Live);
        info!("feed session live");
    }

    /// Call whenever any frame (including heartbeats) arrives, to reset the
    /// idle clock.
    pub fn touch(&self) {
        *self.last_frame_at.lock().expect("session mutex poisoned") = Instant::now();
    }

    /// Whether the idle window has elapsed since the last received frame.
    pub fn is_idle(&self) -> bool {
        self.last_frame_at
            .lock()
            .expect("session mutex poisoned")
            .elapsed()
            >= self.config.idle_timeout
    }

    /// A transport error or heartbeat timeout moves a `Live` session into
    /// `Reconnecting` and returns the backoff delay to wait before the next
    /// connect attempt (initial 1s, doubling, capped at 30s, ±20% jitter).
    pub fn on_transport_error(&self) -> Duration {
        self.set_state(SessionState::Reconnecting);
        let attempt = self.backoff_attempt.fetch_add(1, Ordering::Relaxed);
        self.backoff_delay(attempt)
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self
            .config
            .backoff_initial
            .saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
            .min(self.config.backoff_cap);
        let jitter_fraction = pseudo_jitter_fraction();
        let offset = base.mul_f64(self.config.backoff_jitter * jitter_fraction.abs());
        if jitter_fraction.is_sign_negative() {
            base.saturating_sub(offset)
        } else {
            (base + offset).min(self.config.backoff_cap.mul_f64(1.0 + self.config.backoff_jitter))
        }
    }

    /// `Reconnecting -> Subscribing`: clears every book with a tracked
    /// subscription, then re-queues that subscription verbatim so the
    /// driving loop re-sends it over the fresh transport. Clearing first
    /// means the snapshot that follows resubscription establishes ground
    /// truth rather than merging with whatever the book held before the
    /// disconnect.
    pub fn on_reconnect_attempt(&self) {
        for sub in self.subscriptions.lock().expect("session mutex poisoned").iter() {
            if let Some(book) = self.registry.get(&sub.symbol) {
                book.clear();
            }
            self.enqueue(&OutboundMessage::Subscribe {
                product_ids: vec![sub.symbol.clone()],
                channels: sub.channels.clone(),
            });
        }
        self.set_state(SessionState::Subscribing);
    }

    /// `Subscribing -> Live`: resubscription completed.
    pub fn on_subscribed(&self) {
        self.backoff_attempt.store(0, Ordering::Relaxed);
        self.touch();
        self.set_state(SessionState::Live);
        info!("feed session resubscribed and live");
    }

    /// Terminal. Idempotent.
    pub fn close(&self) {
        self.set_state(SessionState::Closed);
        warn!("feed session closed");
    }
}

/// A value in `[-1.0, 1.0]` derived from the system clock rather than an
/// RNG dependency — this crate has no other use for randomness, so pulling
/// in `rand` for one jitter calculation isn't worth the dependency.
fn pseudo_jitter_fraction() -> f64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 2000) as f64 / 1000.0 - 1.0
}
