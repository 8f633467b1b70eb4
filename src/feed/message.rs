//! Wire message shapes recognized by [`super::normalizer::FeedNormalizer`].
//! JSON parsing itself is assumed available (`serde_json`); this
//! module only defines the shapes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::book::Side;

/// A decoded inbound frame, tagged by its `type` field. Fields not
/// recognized by a variant are ignored by `serde`; fields a variant
/// requires but the frame omits become a deserialize error, which the
/// normalizer turns into a dropped message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    Subscriptions {
        channels: Vec<serde_json::Value>,
    },
    Heartbeat {
        product_id: String,
        sequence: u64,
    },
    Snapshot {
        product_id: String,
        bids: Vec<LevelTuple>,
        asks: Vec<LevelTuple>,
    },
    #[serde(rename = "l2update")]
    L2Update {
        product_id: String,
        changes: Vec<L2ChangeTuple>,
    },
    Ticker {
        product_id: String,
        best_bid: Decimal,
        best_bid_size: Decimal,
        best_ask: Decimal,
        best_ask_size: Decimal,
        sequence: u64,
    },
    #[serde(alias = "received")]
    Open {
        product_id: String,
        order_id: Uuid,
        side: Side,
        price: Decimal,
        size: Decimal,
    },
    Done {
        product_id: String,
        order_id: Uuid,
    },
    Match {
        product_id: String,
        maker_order_id: Uuid,
        size: Decimal,
    },
    Change {
        product_id: String,
        order_id: Uuid,
        new_size: Decimal,
    },
    Error {
        message: String,
    },
}

impl WireMessage {
    /// The `product_id` this frame concerns, when it names one. `error` and
    /// `subscriptions` frames don't.
    pub fn product_id(&self) -> Option<&str> {
        match self {
            WireMessage::Heartbeat { product_id, .. }
            | WireMessage::Snapshot { product_id, .. }
            | WireMessage::L2Update { product_id, .. }
            | WireMessage::Ticker { product_id, .. }
            | WireMessage::Open { product_id, .. }
            | WireMessage::Done { product_id, .. }
            | WireMessage::Match { product_id, .. }
            | WireMessage::Change { product_id, .. } => Some(product_id),
            WireMessage::Subscriptions { .. } | WireMessage::Error { .. } => None,
        }
    }
}

/// A `[price, size]` or `[price, size, order_id]` level entry from a
/// `snapshot` message. `Decimal`'s own `Deserialize` already accepts either
/// a JSON string or JSON number for `price`/`size`, since the exchange
/// sends numeric fields as either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelTuple {
    pub price: Decimal,
    pub size: Decimal,
    pub order_id: Option<Uuid>,
}

impl<'de> Deserialize<'de> for LevelTuple {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct LevelTupleVisitor;

        impl<'de> serde::de::Visitor<'de> for LevelTupleVisitor {
            type Value = LevelTuple;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a [price, size] or [price, size, order_id] array")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let price: Decimal = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::invalid_length(0, &self))?;
                let size: Decimal = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::invalid_length(1, &self))?;
                let order_id: Option<Uuid> = seq.next_element::<Option<Uuid>>()?.flatten();
                Ok(LevelTuple {
                    price,
                    size,
                    order_id,
                })
            }
        }

        deserializer.deserialize_seq(LevelTupleVisitor)
    }
}

/// A `[side, price, size]` change entry from an `l2update` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L2ChangeTuple {
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
}

impl<'de> Deserialize<'de> for L2ChangeTuple {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ChangeVisitor;

        impl<'de> serde::de::Visitor<'de> for ChangeVisitor {
            type Value = L2ChangeTuple;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a [side, price, size] array")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let side: Side = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::invalid_length(0, &self))?;
                let price: Decimal = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::invalid_length(1, &self))?;
                let size: Decimal = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::invalid_length(2, &self))?;
                Ok(L2ChangeTuple { side, price, size })
            }
        }

        deserializer.deserialize_seq(ChangeVisitor)
    }
}

/// Outbound subscribe/unsubscribe request.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Subscribe {
        product_ids: Vec<String>,
        channels: Vec<String>,
    },
    Unsubscribe {
        product_ids: Vec<String>,
        channels: Vec<String>,
    },
}
