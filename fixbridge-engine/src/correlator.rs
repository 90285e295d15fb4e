/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Order correlation.
//!
//! Every order or cancel registers its ClOrdID before it is sent. When the
//! matching execution report or cancel reject arrives, the coordinating task
//! resolves the entry: the payload goes into the response store and the
//! caller's waiter is woken. A caller that gives up removes its entry, so a
//! later response is stored but wakes nobody.
//!
//! [`Correlator`] is the state itself and is owned by the coordinating task.
//! [`CorrelatorHandle`] is what callers hold; it reaches the state only by
//! sending commands through the event bridge.

use crate::bridge::{BridgeSender, Envelope};
use fixbridge_core::error::{BridgeError, Result};
use fixbridge_core::message::Message;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// A registered request waiting for its response.
#[derive(Debug)]
pub struct PendingRequest {
    /// ClOrdID of the request.
    pub correlation_id: String,
    /// When the request was registered.
    pub created_at: Instant,
    seq: u64,
    waiter: oneshot::Sender<Message>,
}

/// The caller's side of a pending request.
#[derive(Debug)]
pub struct Waiter {
    correlation_id: String,
    rx: oneshot::Receiver<Message>,
}

impl Waiter {
    /// Returns the correlation id this waiter belongs to.
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Waits up to `timeout` for the response.
    ///
    /// If the pending entry is dropped without a response, for example when
    /// the coordinating task stops, the wait still runs to its deadline.
    ///
    /// # Errors
    /// Returns `BridgeError::ResponseTimeout` when the deadline passes first.
    pub async fn wait(self, timeout: Duration) -> Result<Message> {
        let deadline = tokio::time::Instant::now() + timeout;
        match tokio::time::timeout_at(deadline, self.rx).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => {
                tokio::time::sleep_until(deadline).await;
                Err(timed_out(self.correlation_id, timeout))
            }
            Err(_) => Err(timed_out(self.correlation_id, timeout)),
        }
    }
}

fn timed_out(correlation_id: String, timeout: Duration) -> BridgeError {
    BridgeError::ResponseTimeout {
        correlation_id,
        timeout_ms: timeout.as_millis() as u64,
    }
}

/// Correlation id to pending request.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    entries: HashMap<String, PendingRequest>,
    next_seq: u64,
}

impl CorrelationTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pending request.
    ///
    /// # Errors
    /// Returns `BridgeError::DuplicateCorrelationId` if the id is already
    /// pending; the existing entry is left untouched.
    pub fn register(&mut self, correlation_id: &str) -> Result<Waiter> {
        if let Some(existing) = self.entries.get(correlation_id) {
            if !existing.waiter.is_closed() {
                return Err(BridgeError::DuplicateCorrelationId(
                    correlation_id.to_string(),
                ));
            }
            debug!(correlation_id, "replacing entry whose caller went away");
        }
        let (tx, rx) = oneshot::channel();
        self.next_seq += 1;
        self.entries.insert(
            correlation_id.to_string(),
            PendingRequest {
                correlation_id: correlation_id.to_string(),
                created_at: Instant::now(),
                seq: self.next_seq,
                waiter: tx,
            },
        );
        Ok(Waiter {
            correlation_id: correlation_id.to_string(),
            rx,
        })
    }

    /// Removes and returns the entry for `correlation_id`.
    pub fn take(&mut self, correlation_id: &str) -> Option<PendingRequest> {
        self.entries.remove(correlation_id)
    }

    /// Returns true if `correlation_id` is pending.
    #[must_use]
    pub fn contains(&self, correlation_id: &str) -> bool {
        self.entries.contains_key(correlation_id)
    }

    /// Returns the pending ids in registration order.
    #[must_use]
    pub fn pending_ids(&self) -> Vec<String> {
        let mut pending: Vec<&PendingRequest> = self.entries.values().collect();
        pending.sort_unstable_by_key(|p| p.seq);
        pending.into_iter().map(|p| p.correlation_id.clone()).collect()
    }

    /// Drops every entry, returning how many there were.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Returns the number of pending requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Last response per correlation id, evicting the oldest id past capacity.
#[derive(Debug)]
pub struct ResponseStore {
    responses: HashMap<String, Message>,
    order: VecDeque<String>,
    capacity: usize,
}

impl ResponseStore {
    /// Creates a store holding at most `capacity` ids (minimum one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            responses: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Stores `payload`, replacing any earlier response for the id.
    pub fn insert(&mut self, correlation_id: &str, payload: Message) {
        if let Some(existing) = self.responses.get_mut(correlation_id) {
            *existing = payload;
            return;
        }
        self.responses.insert(correlation_id.to_string(), payload);
        self.order.push_back(correlation_id.to_string());
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.responses.remove(&oldest);
            }
        }
    }

    /// Returns the stored response for `correlation_id`.
    #[must_use]
    pub fn get(&self, correlation_id: &str) -> Option<&Message> {
        self.responses.get(correlation_id)
    }

    /// Returns the number of stored responses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

/// Correlation table plus response store.
#[derive(Debug)]
pub struct Correlator {
    table: CorrelationTable,
    store: ResponseStore,
}

impl Correlator {
    /// Creates a correlator whose store keeps `store_capacity` responses.
    #[must_use]
    pub fn new(store_capacity: usize) -> Self {
        Self {
            table: CorrelationTable::new(),
            store: ResponseStore::new(store_capacity),
        }
    }

    /// Registers a pending request.
    ///
    /// # Errors
    /// Returns `BridgeError::DuplicateCorrelationId` if the id is pending.
    pub fn register(&mut self, correlation_id: &str) -> Result<Waiter> {
        self.table.register(correlation_id)
    }

    /// Stores `payload` and wakes the waiter for `correlation_id`, if any.
    ///
    /// Returns true if a waiter received the payload. Unknown ids and waiters
    /// that already gave up only update the store.
    pub fn resolve(&mut self, correlation_id: &str, payload: Message) -> bool {
        let pending = self.table.take(correlation_id);
        let woke = match pending {
            Some(pending) => {
                let waited = pending.created_at.elapsed();
                let delivered = pending.waiter.send(payload.clone()).is_ok();
                debug!(
                    correlation_id,
                    waited_ms = waited.as_millis() as u64,
                    delivered,
                    "resolved pending request"
                );
                delivered
            }
            None => {
                debug!(correlation_id, "stored response with no waiter");
                false
            }
        };
        self.store.insert(correlation_id, payload);
        woke
    }

    /// Removes a pending request without resolving it.
    pub fn deregister(&mut self, correlation_id: &str) -> bool {
        self.table.take(correlation_id).is_some()
    }

    /// Returns the stored response for `correlation_id`.
    #[must_use]
    pub fn response(&self, correlation_id: &str) -> Option<&Message> {
        self.store.get(correlation_id)
    }

    /// Returns the correlation table.
    #[must_use]
    pub const fn table(&self) -> &CorrelationTable {
        &self.table
    }

    /// Returns the response store.
    #[must_use]
    pub const fn store(&self) -> &ResponseStore {
        &self.store
    }

    /// Drops every pending request. Their waiters run to their deadlines.
    pub fn abandon_pending(&mut self) -> usize {
        let dropped = self.table.clear();
        if dropped > 0 {
            warn!(dropped, "abandoned pending requests");
        }
        dropped
    }
}

/// Caller-side access to the correlator through the event bridge.
#[derive(Debug, Clone)]
pub struct CorrelatorHandle {
    bridge: BridgeSender,
}

impl CorrelatorHandle {
    /// Creates a handle that talks to the task consuming `bridge`.
    #[must_use]
    pub const fn new(bridge: BridgeSender) -> Self {
        Self { bridge }
    }

    /// Registers `correlation_id` and returns its waiter.
    ///
    /// # Errors
    /// Returns `BridgeError::DuplicateCorrelationId` if already pending, or
    /// `BridgeError::BridgeClosed` if the coordinating task is gone.
    pub async fn register(&self, correlation_id: &str) -> Result<Waiter> {
        let (reply, rx) = oneshot::channel();
        self.bridge.enqueue(Envelope::Register {
            correlation_id: correlation_id.to_string(),
            reply,
        })?;
        rx.await.map_err(|_| BridgeError::BridgeClosed)?
    }

    /// Removes `correlation_id` and waits for the removal to be applied.
    ///
    /// Returns true if an entry was removed. A closed bridge counts as
    /// removed, since the table went with it.
    pub async fn deregister(&self, correlation_id: &str) -> bool {
        let (reply, rx) = oneshot::channel();
        let sent = self.bridge.enqueue(Envelope::Deregister {
            correlation_id: correlation_id.to_string(),
            reply,
        });
        if sent.is_err() {
            return true;
        }
        rx.await.unwrap_or(true)
    }

    /// Queues removal of `correlation_id` without waiting for it.
    ///
    /// Safe to call from `Drop`: it never blocks and ignores a closed bridge.
    pub fn forget(&self, correlation_id: &str) {
        let (reply, _) = oneshot::channel();
        let _ = self.bridge.enqueue(Envelope::Deregister {
            correlation_id: correlation_id.to_string(),
            reply,
        });
    }

    /// Hands `payload` to the coordinating task for resolution.
    ///
    /// # Errors
    /// Returns `BridgeError::BridgeClosed` if the coordinating task is gone.
    pub fn resolve(&self, correlation_id: &str, payload: Message) -> Result<()> {
        self.bridge.enqueue(Envelope::Execution {
            correlation_id: correlation_id.to_string(),
            payload,
        })
    }

    /// Waits for `waiter`, removing its entry if the deadline passes.
    ///
    /// # Errors
    /// Returns `BridgeError::ResponseTimeout` if no response arrived in time.
    pub async fn await_response(&self, waiter: Waiter, timeout: Duration) -> Result<Message> {
        let correlation_id = waiter.correlation_id().to_string();
        match waiter.wait(timeout).await {
            Ok(payload) => Ok(payload),
            Err(e) => {
                self.deregister(&correlation_id).await;
                warn!(
                    correlation_id = %correlation_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "response timed out"
                );
                Err(e)
            }
        }
    }

    /// Returns a copy of the stored response for `correlation_id`.
    ///
    /// # Errors
    /// Returns `BridgeError::BridgeClosed` if the coordinating task is gone.
    pub async fn stored_response(&self, correlation_id: &str) -> Result<Option<Message>> {
        let (reply, rx) = oneshot::channel();
        self.bridge.enqueue(Envelope::Query {
            correlation_id: correlation_id.to_string(),
            reply,
        })?;
        rx.await.map_err(|_| BridgeError::BridgeClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixbridge_core::field::tags;
    use fixbridge_core::message::MsgType;

    fn report(status: &str) -> Message {
        let mut msg = Message::with_msg_type(MsgType::ExecutionReport);
        msg.set_field(tags::ORD_STATUS, "2");
        msg.set_field(tags::TEXT, status);
        msg
    }

    #[tokio::test]
    async fn test_resolve_before_timeout_returns_payload() {
        let mut correlator = Correlator::new(16);
        let waiter = correlator.register("ORD-1").unwrap();

        assert!(correlator.resolve("ORD-1", report("FILLED")));
        let payload = waiter.wait(Duration::from_secs(5)).await.unwrap();

        assert_eq!(payload, report("FILLED"));
        assert!(correlator.table().is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_times_out_no_earlier_than_deadline() {
        let mut correlator = Correlator::new(16);
        let waiter = correlator.register("ORD-2").unwrap();

        let started = tokio::time::Instant::now();
        let err = waiter.wait(Duration::from_millis(100)).await.unwrap_err();
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(
            err,
            BridgeError::ResponseTimeout {
                correlation_id: "ORD-2".to_string(),
                timeout_ms: 100,
            }
        );

        assert!(correlator.deregister("ORD-2"));
        assert!(!correlator.resolve("ORD-2", report("LATE")));
        assert_eq!(correlator.response("ORD-2"), Some(&report("LATE")));
    }

    #[test]
    fn test_resolve_unregistered_only_stores() {
        let mut correlator = Correlator::new(16);
        assert!(!correlator.resolve("UNKNOWN", report("NEW")));
        assert_eq!(correlator.store().len(), 1);
        assert!(correlator.table().is_empty());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut correlator = Correlator::new(16);
        let _first = correlator.register("ORD-1").unwrap();
        assert_eq!(
            correlator.register("ORD-1").unwrap_err(),
            BridgeError::DuplicateCorrelationId("ORD-1".to_string())
        );
        assert_eq!(correlator.table().len(), 1);
    }

    #[test]
    fn test_entry_of_dropped_waiter_is_reusable() {
        let mut correlator = Correlator::new(16);
        drop(correlator.register("ORD-1").unwrap());

        let _second = correlator.register("ORD-1").unwrap();
        assert_eq!(correlator.table().len(), 1);
        assert!(correlator.resolve("ORD-1", report("FILLED")));
    }

    #[test]
    fn test_pending_ids_in_registration_order() {
        let mut table = CorrelationTable::new();
        let _w: Vec<_> = ["C", "A", "B"]
            .iter()
            .map(|id| table.register(id).unwrap())
            .collect();
        assert_eq!(table.pending_ids(), vec!["C", "A", "B"]);
        assert!(table.take("A").is_some());
        assert_eq!(table.pending_ids(), vec!["C", "B"]);
        assert_eq!(table.clear(), 2);
    }

    #[test]
    fn test_store_evicts_oldest() {
        let mut store = ResponseStore::new(2);
        store.insert("A", report("1"));
        store.insert("B", report("2"));
        store.insert("A", report("3"));
        store.insert("C", report("4"));

        assert!(store.get("A").is_none());
        assert_eq!(store.get("B"), Some(&report("2")));
        assert_eq!(store.get("C"), Some(&report("4")));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_abandoned_waiter_still_waits_out_deadline() {
        let mut correlator = Correlator::new(4);
        let waiter = correlator.register("ORD-3").unwrap();
        assert_eq!(correlator.abandon_pending(), 1);

        let started = tokio::time::Instant::now();
        let err = waiter.wait(Duration::from_millis(50)).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
