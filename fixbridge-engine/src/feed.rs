/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Live message feed.
//!
//! Every message the engine sends or receives is turned into a
//! [`FeedEntry`], kept in a bounded history and broadcast to subscribers.
//! Pushing never blocks; a slow subscriber only lags its own receiver.

use fixbridge_core::field::tags;
use fixbridge_core::message::{Message, MsgType};
use fixbridge_core::types::Timestamp;
use fixbridge_tagvalue::{encode_message, to_display};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Fields copied into every feed entry, when present.
pub const KEY_FIELDS: &[(u32, &str)] = &[
    (tags::CL_ORD_ID, "ClOrdID"),
    (tags::ORIG_CL_ORD_ID, "OrigClOrdID"),
    (tags::ORDER_ID, "OrderID"),
    (tags::SYMBOL, "Symbol"),
    (tags::SIDE, "Side"),
    (tags::ORD_TYPE, "OrdType"),
    (tags::ORDER_QTY, "OrderQty"),
    (tags::PRICE, "Price"),
    (tags::ORD_STATUS, "OrdStatus"),
    (tags::EXEC_ID, "ExecID"),
    (tags::TIME_IN_FORCE, "TimeInForce"),
    (tags::LAST_QTY, "LastQty"),
    (tags::LAST_PX, "LastPx"),
    (tags::LEAVES_QTY, "LeavesQty"),
    (tags::CUM_QTY, "CumQty"),
    (tags::AVG_PX, "AvgPx"),
    (tags::EXEC_TYPE, "ExecType"),
    (tags::TEXT, "Text"),
    (tags::TRANSACT_TIME, "TransactTime"),
    (tags::LAST_MKT, "LastMkt"),
    (tags::EXEC_TRANS_TYPE, "ExecTransType"),
];

const BROADCAST_CAPACITY: usize = 256;

/// Which way a message travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Received from the venue.
    Inbound,
    /// Sent to the venue.
    Outbound,
}

/// One message as shown to a UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    /// When the harness saw the message, FIX UTC format.
    pub timestamp: String,
    /// Inbound or outbound.
    pub direction: Direction,
    /// MsgType as on the wire.
    pub msg_type: String,
    /// Message type name, e.g. `ExecutionReport`.
    pub msg_type_name: String,
    /// Full tag=value text with SOH shown as `|`.
    pub raw: String,
    /// Key fields by name.
    pub fields: BTreeMap<String, String>,
}

impl FeedEntry {
    /// Builds an entry from a message.
    #[must_use]
    pub fn from_message(direction: Direction, message: &Message, begin_string: &str) -> Self {
        let msg_type = message.msg_type().unwrap_or_default();
        let raw = match encode_message(message, begin_string) {
            Ok(bytes) => to_display(&bytes),
            Err(_) => message.to_string(),
        };
        Self {
            timestamp: Timestamp::now().format_millis().to_string(),
            direction,
            msg_type: msg_type.as_str().to_string(),
            msg_type_name: type_name(&msg_type).to_string(),
            raw,
            fields: key_fields(message),
        }
    }

    /// Returns a key field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Copies the [`KEY_FIELDS`] present in `message`.
#[must_use]
pub fn key_fields(message: &Message) -> BTreeMap<String, String> {
    KEY_FIELDS
        .iter()
        .filter_map(|(tag, name)| {
            message
                .get_field(*tag)
                .map(|value| ((*name).to_string(), value.to_string()))
        })
        .collect()
}

fn type_name(msg_type: &MsgType) -> &str {
    match msg_type {
        MsgType::Heartbeat => "Heartbeat",
        MsgType::TestRequest => "TestRequest",
        MsgType::ResendRequest => "ResendRequest",
        MsgType::Reject => "Reject",
        MsgType::SequenceReset => "SequenceReset",
        MsgType::Logout => "Logout",
        MsgType::ExecutionReport => "ExecutionReport",
        MsgType::OrderCancelReject => "OrderCancelReject",
        MsgType::Logon => "Logon",
        MsgType::NewOrderSingle => "NewOrderSingle",
        MsgType::OrderCancelRequest => "OrderCancelRequest",
        MsgType::OrderCancelReplaceRequest => "OrderCancelReplaceRequest",
        MsgType::OrderStatusRequest => "OrderStatusRequest",
        MsgType::BusinessMessageReject => "BusinessMessageReject",
        MsgType::Custom(s) => s.as_str(),
    }
}

/// Bounded history plus broadcast of [`FeedEntry`] values.
///
/// Cloning shares the same feed.
#[derive(Debug, Clone)]
pub struct MessageFeed {
    inner: Arc<FeedInner>,
}

#[derive(Debug)]
struct FeedInner {
    history: Mutex<VecDeque<FeedEntry>>,
    capacity: usize,
    tx: broadcast::Sender<FeedEntry>,
}

impl MessageFeed {
    /// Creates a feed keeping the last `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(FeedInner {
                history: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
                capacity: capacity.max(1),
                tx,
            }),
        }
    }

    /// Records a message and notifies subscribers.
    pub fn publish(&self, direction: Direction, message: &Message, begin_string: &str) {
        self.push(FeedEntry::from_message(direction, message, begin_string));
    }

    /// Records an entry and notifies subscribers.
    pub fn push(&self, entry: FeedEntry) {
        {
            let mut history = self.inner.history.lock();
            if history.len() == self.inner.capacity {
                history.pop_front();
            }
            history.push_back(entry.clone());
        }
        // No subscribers is not an error.
        let _ = self.inner.tx.send(entry);
    }

    /// Returns the retained entries, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<FeedEntry> {
        self.inner.history.lock().iter().cloned().collect()
    }

    /// Subscribes to entries pushed from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEntry> {
        self.inner.tx.subscribe()
    }

    /// Returns the number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.history.lock().len()
    }

    /// Returns true if nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.history.lock().is_empty()
    }

    /// Drops the retained history.
    pub fn clear(&self) {
        self.inner.history.lock().clear();
    }
}

impl Default for MessageFeed {
    fn default() -> Self {
        Self::new(1_000)
    }
}
