/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! In-process loopback engine.
//!
//! [`LoopbackEngine`] stands in for a real FIX engine connected to a venue.
//! Messages handed to `send_to_target` are stamped, passed through
//! `to_admin` / `to_app`, encoded to tag=value bytes and decoded again on a
//! venue thread, which answers the way a simple matching venue would. Venue
//! messages take the same wire round trip before they reach the application.
//! Every callback into the application runs on that venue thread, as it
//! would on a real engine's thread.

use crate::application::{Application, SessionId};
use crate::engine::{EngineFactory, SessionEngine};
use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, unbounded};
use fixbridge_core::error::{BridgeError, Result};
use fixbridge_core::field::tags;
use fixbridge_core::message::{Message, MsgType};
use fixbridge_core::types::Timestamp;
use fixbridge_session::config::SessionConfig;
use fixbridge_session::sequence::SequenceCounter;
use fixbridge_tagvalue::{Decoder, encode_message};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

const ORD_STATUS_NEW: char = '0';
const ORD_STATUS_FILLED: char = '2';
const ORD_STATUS_CANCELED: char = '4';
const ORD_STATUS_REJECTED: char = '8';
const EXEC_TYPE_NEW: char = '0';
const EXEC_TYPE_CANCELED: char = '4';
const EXEC_TYPE_REJECTED: char = '8';
const EXEC_TYPE_TRADE: char = 'F';
const CXL_REJ_TOO_LATE: u32 = 0;
const CXL_REJ_UNKNOWN_ORDER: u32 = 1;

/// How the venue answers a NewOrderSingle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FillMode {
    /// One execution report, fully filled.
    #[default]
    Fill,
    /// One execution report acknowledging the order as new.
    Ack,
    /// No answer at all.
    Silent,
    /// One execution report rejecting the order.
    Reject,
}

/// Venue behavior of a [`LoopbackEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopbackBehavior {
    /// Answer the logon; if false the session never logs on.
    pub respond_to_logon: bool,
    /// Answer to new orders.
    pub fill_mode: FillMode,
    /// Answer every cancel with an OrderCancelReject.
    pub reject_cancels: bool,
    /// Refuse every application message at `send_to_target`.
    pub refuse_sends: bool,
    /// Send a ResendRequest for `(begin, end)` right after logon.
    pub resend_after_logon: Option<(u64, u64)>,
    /// Fill price for orders without a limit price.
    pub fill_price: Decimal,
}

impl Default for LoopbackBehavior {
    fn default() -> Self {
        Self {
            respond_to_logon: true,
            fill_mode: FillMode::Fill,
            reject_cancels: false,
            refuse_sends: false,
            resend_after_logon: None,
            fill_price: Decimal::from(100),
        }
    }
}

impl LoopbackBehavior {
    /// A venue that never answers the logon.
    #[must_use]
    pub fn unreachable() -> Self {
        Self {
            respond_to_logon: false,
            ..Self::default()
        }
    }

    /// Sets the answer to new orders.
    #[must_use]
    pub const fn with_fill_mode(mut self, mode: FillMode) -> Self {
        self.fill_mode = mode;
        self
    }

    /// Rejects every cancel.
    #[must_use]
    pub const fn with_reject_cancels(mut self, reject: bool) -> Self {
        self.reject_cancels = reject;
        self
    }

    /// Refuses application messages at `send_to_target`.
    #[must_use]
    pub const fn with_refuse_sends(mut self, refuse: bool) -> Self {
        self.refuse_sends = refuse;
        self
    }

    /// Requests a resend of `begin..=end` right after logon.
    #[must_use]
    pub const fn with_resend_after_logon(mut self, begin: u64, end: u64) -> Self {
        self.resend_after_logon = Some((begin, end));
        self
    }

    /// Sets the fill price for market orders.
    #[must_use]
    pub const fn with_fill_price(mut self, price: Decimal) -> Self {
        self.fill_price = price;
        self
    }
}

enum VenueEvent {
    /// Wire bytes sent by the client.
    Received(Bytes),
    /// A message to deliver to the client as if the venue sent it.
    Inject(Message),
    /// The venue ends the session on its own.
    Logout,
    Stop,
}

/// Encodes `message` and decodes the bytes back, checksum included.
fn wire(message: &Message, begin_string: &str) -> Result<Bytes> {
    let bytes = encode_message(message, begin_string)
        .map_err(|e| BridgeError::Engine(format!("cannot encode message: {e}")))?;
    Ok(bytes.freeze())
}

fn unwire(bytes: &[u8], begin_string: &str) -> Result<Message> {
    let mut message = Decoder::new(bytes).decode()?;
    message.set_field(tags::BEGIN_STRING, begin_string);
    Ok(message)
}

/// In-process engine with a simulated venue.
pub struct LoopbackEngine {
    application: Arc<dyn Application>,
    session_id: SessionId,
    heartbeat_interval: u64,
    behavior: LoopbackBehavior,
    outgoing: SequenceCounter,
    logged_on: Arc<AtomicBool>,
    venue_tx: Mutex<Option<Sender<VenueEvent>>>,
    venue_thread: Mutex<Option<JoinHandle<()>>>,
    sent: Mutex<Vec<Message>>,
}

impl std::fmt::Debug for LoopbackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackEngine")
            .field("session_id", &self.session_id)
            .field("behavior", &self.behavior)
            .field("logged_on", &self.logged_on.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl LoopbackEngine {
    /// Creates an engine for `config` reporting to `application`.
    #[must_use]
    pub fn new(
        config: &SessionConfig,
        application: Arc<dyn Application>,
        behavior: LoopbackBehavior,
    ) -> Self {
        Self {
            application,
            session_id: config.session_id(),
            heartbeat_interval: config.heartbeat_interval_secs(),
            behavior,
            outgoing: SequenceCounter::new(),
            logged_on: Arc::new(AtomicBool::new(false)),
            venue_tx: Mutex::new(None),
            venue_thread: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Returns the session this engine reports for.
    #[must_use]
    pub const fn session(&self) -> &SessionId {
        &self.session_id
    }

    /// Returns true between the venue's logon and logout.
    #[must_use]
    pub fn is_logged_on(&self) -> bool {
        self.logged_on.load(Ordering::Acquire)
    }

    /// Delivers `message` to the application as if the venue had sent it.
    ///
    /// Returns false if the engine is not running.
    pub fn inject(&self, message: Message) -> bool {
        self.venue_tx
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.send(VenueEvent::Inject(message)).is_ok())
    }

    /// Makes the venue log the session out, as an exchange closing it would.
    ///
    /// Returns false if the engine is not running.
    pub fn venue_logout(&self) -> bool {
        self.venue_tx
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.send(VenueEvent::Logout).is_ok())
    }

    /// Returns every message sent so far, as stamped.
    #[must_use]
    pub fn sent_messages(&self) -> Vec<Message> {
        self.sent.lock().clone()
    }

    /// Returns how many messages of `msg_type` were sent.
    #[must_use]
    pub fn sent_count(&self, msg_type: &MsgType) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.msg_type().as_ref() == Some(msg_type))
            .count()
    }

    fn stamp(&self, message: &mut Message) {
        message.set_field(tags::BEGIN_STRING, &self.session_id.begin_string);
        message.set_field(tags::SENDER_COMP_ID, &self.session_id.sender_comp_id);
        message.set_field(tags::TARGET_COMP_ID, &self.session_id.target_comp_id);
        message.set_field(tags::MSG_SEQ_NUM, self.outgoing.allocate());
        message.set_field(tags::SENDING_TIME, Timestamp::now().format_millis());
    }
}

impl SessionEngine for LoopbackEngine {
    fn start(&self) -> Result<()> {
        let mut venue_tx = self.venue_tx.lock();
        if venue_tx.is_some() {
            return Err(BridgeError::Engine("loopback engine already started".to_string()));
        }
        self.application.on_create(&self.session_id);

        let (tx, rx) = unbounded();
        let venue = Venue {
            application: Arc::clone(&self.application),
            session_id: self.session_id.clone(),
            heartbeat_interval: self.heartbeat_interval,
            behavior: self.behavior.clone(),
            incoming: SequenceCounter::new(),
            logged_on: Arc::clone(&self.logged_on),
            orders: HashMap::new(),
            ids: AtomicU64::new(1),
        };
        let thread = thread::Builder::new()
            .name("fixbridge-loopback".to_string())
            .spawn(move || venue.run(rx))
            .map_err(|e| BridgeError::Engine(format!("cannot spawn venue thread: {e}")))?;
        *venue_tx = Some(tx);
        *self.venue_thread.lock() = Some(thread);
        drop(venue_tx);

        let mut logon = Message::with_msg_type(MsgType::Logon);
        logon.set_field(tags::ENCRYPT_METHOD, 0);
        logon.set_field(tags::HEART_BT_INT, self.heartbeat_interval);
        if !self.send_to_target(&logon, &self.session_id) {
            return Err(BridgeError::Engine("venue did not accept logon".to_string()));
        }
        info!(session = %self.session_id, "loopback engine started");
        Ok(())
    }

    fn stop(&self) {
        let Some(tx) = self.venue_tx.lock().take() else {
            return;
        };
        let _ = tx.send(VenueEvent::Stop);
        drop(tx);
        if let Some(thread) = self.venue_thread.lock().take() {
            let _ = thread.join();
        }
        if self.logged_on.swap(false, Ordering::AcqRel) {
            self.application.on_logout(&self.session_id);
        }
        debug!(session = %self.session_id, "loopback engine stopped");
    }

    fn send_to_target(&self, message: &Message, _session_id: &SessionId) -> bool {
        let venue_tx = self.venue_tx.lock();
        let Some(tx) = venue_tx.as_ref() else {
            return false;
        };
        let admin = message.msg_type().is_some_and(|t| t.is_admin());
        if !admin && self.behavior.refuse_sends {
            return false;
        }

        let mut outgoing = message.clone();
        self.stamp(&mut outgoing);
        if admin {
            self.application.to_admin(&mut outgoing, &self.session_id);
        } else {
            self.application.to_app(&mut outgoing, &self.session_id);
        }
        let bytes = match wire(&outgoing, &self.session_id.begin_string) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "loopback engine dropped outgoing message");
                return false;
            }
        };
        self.sent.lock().push(outgoing);
        tx.send(VenueEvent::Received(bytes)).is_ok()
    }
}

impl Drop for LoopbackEngine {
    fn drop(&mut self) {
        if let Some(tx) = self.venue_tx.get_mut().take() {
            let _ = tx.send(VenueEvent::Stop);
        }
    }
}

/// The venue side, owned by the venue thread.
struct Venue {
    application: Arc<dyn Application>,
    session_id: SessionId,
    heartbeat_interval: u64,
    behavior: LoopbackBehavior,
    incoming: SequenceCounter,
    logged_on: Arc<AtomicBool>,
    /// Open orders by ClOrdID with their OrdStatus.
    orders: HashMap<String, (Message, char)>,
    ids: AtomicU64,
}

impl Venue {
    fn run(mut self, rx: Receiver<VenueEvent>) {
        for event in rx {
            match event {
                VenueEvent::Received(bytes) => {
                    match unwire(&bytes, &self.session_id.begin_string) {
                        Ok(message) => self.on_received(&message),
                        Err(e) => warn!(error = %e, "venue cannot decode message"),
                    }
                }
                VenueEvent::Inject(message) => self.deliver(message),
                VenueEvent::Logout => self.on_logout(),
                VenueEvent::Stop => break,
            }
        }
    }

    fn on_received(&mut self, message: &Message) {
        match message.msg_type() {
            Some(MsgType::Logon) => self.on_logon(message),
            Some(MsgType::Logout) => self.on_logout(),
            Some(MsgType::NewOrderSingle) => self.on_new_order(message),
            Some(MsgType::OrderCancelRequest) => self.on_cancel(message),
            Some(other) => debug!(msg_type = %other, "venue ignores message"),
            None => warn!("venue received message without MsgType"),
        }
    }

    fn on_logon(&mut self, request: &Message) {
        if !self.behavior.respond_to_logon {
            debug!("venue ignores logon");
            return;
        }
        let mut reply = Message::with_msg_type(MsgType::Logon);
        reply.set_field(tags::ENCRYPT_METHOD, 0);
        reply.set_field(tags::HEART_BT_INT, self.heartbeat_interval);
        if request.get_field(tags::RESET_SEQ_NUM_FLAG) == Some("Y") {
            self.incoming.reset();
            reply.set_bool(tags::RESET_SEQ_NUM_FLAG, true);
        }
        self.deliver(reply);
        self.logged_on.store(true, Ordering::Release);
        self.application.on_logon(&self.session_id);

        if let Some((begin, end)) = self.behavior.resend_after_logon {
            let mut resend = Message::with_msg_type(MsgType::ResendRequest);
            resend.set_field(tags::BEGIN_SEQ_NO, begin);
            resend.set_field(tags::END_SEQ_NO, end);
            self.deliver(resend);
        }
    }

    fn on_logout(&mut self) {
        self.deliver(Message::with_msg_type(MsgType::Logout));
        if self.logged_on.swap(false, Ordering::AcqRel) {
            self.application.on_logout(&self.session_id);
        }
    }

    fn on_new_order(&mut self, order: &Message) {
        let Some(cl_ord_id) = order.get_field(tags::CL_ORD_ID).map(str::to_string) else {
            warn!("venue received order without ClOrdID");
            return;
        };
        let qty: Decimal = order.get_field_as(tags::ORDER_QTY).unwrap_or(Decimal::ZERO);
        let report = match self.behavior.fill_mode {
            FillMode::Silent => {
                self.orders.insert(cl_ord_id, (order.clone(), ORD_STATUS_NEW));
                return;
            }
            FillMode::Ack => {
                self.orders.insert(cl_ord_id, (order.clone(), ORD_STATUS_NEW));
                let mut report = self.execution_report(order, EXEC_TYPE_NEW, ORD_STATUS_NEW);
                report.set_field(tags::CUM_QTY, 0);
                report.set_field(tags::LEAVES_QTY, qty);
                report.set_field(tags::AVG_PX, 0);
                report
            }
            FillMode::Fill => {
                self.orders.insert(cl_ord_id, (order.clone(), ORD_STATUS_FILLED));
                let px: Decimal = order
                    .get_field_as(tags::PRICE)
                    .unwrap_or(self.behavior.fill_price);
                let mut report = self.execution_report(order, EXEC_TYPE_TRADE, ORD_STATUS_FILLED);
                report.set_field(tags::LAST_QTY, qty);
                report.set_field(tags::LAST_PX, px);
                report.set_field(tags::CUM_QTY, qty);
                report.set_field(tags::LEAVES_QTY, 0);
                report.set_field(tags::AVG_PX, px);
                report.set_field(tags::LAST_MKT, "LOOP");
                report
            }
            FillMode::Reject => {
                let mut report =
                    self.execution_report(order, EXEC_TYPE_REJECTED, ORD_STATUS_REJECTED);
                report.set_field(tags::CUM_QTY, 0);
                report.set_field(tags::LEAVES_QTY, 0);
                report.set_field(tags::TEXT, "rejected by loopback venue");
                report
            }
        };
        self.deliver(report);
    }

    fn on_cancel(&mut self, cancel: &Message) {
        let cl_ord_id = cancel.get_field(tags::CL_ORD_ID).unwrap_or_default();
        let orig = cancel.get_field(tags::ORIG_CL_ORD_ID).unwrap_or_default();

        let status = self.orders.get(orig).map(|(_, status)| *status);
        let reason = match status {
            _ if self.behavior.reject_cancels => Some((CXL_REJ_TOO_LATE, "cancel refused")),
            None => Some((CXL_REJ_UNKNOWN_ORDER, "unknown order")),
            Some(ORD_STATUS_NEW) => None,
            Some(_) => Some((CXL_REJ_TOO_LATE, "order already closed")),
        };

        let response = if let Some((code, text)) = reason {
            let mut reject = Message::with_msg_type(MsgType::OrderCancelReject);
            reject.set_field(tags::ORDER_ID, "NONE");
            reject.set_field(tags::CL_ORD_ID, cl_ord_id);
            reject.set_field(tags::ORIG_CL_ORD_ID, orig);
            reject.set_field(tags::ORD_STATUS, status.unwrap_or(ORD_STATUS_REJECTED));
            reject.set_field(tags::CXL_REJ_REASON, code);
            reject.set_field(tags::TEXT, text);
            reject
        } else {
            let Some((order, status)) = self.orders.get_mut(orig) else {
                return;
            };
            *status = ORD_STATUS_CANCELED;
            let qty = order.get_field(tags::ORDER_QTY).unwrap_or("0").to_string();
            let order = order.clone();
            let mut report = self.execution_report(&order, EXEC_TYPE_CANCELED, ORD_STATUS_CANCELED);
            report.set_field(tags::CL_ORD_ID, cl_ord_id);
            report.set_field(tags::ORIG_CL_ORD_ID, orig);
            report.set_field(tags::CUM_QTY, 0);
            report.set_field(tags::LEAVES_QTY, 0);
            report.set_field(tags::ORDER_QTY, qty);
            report
        };
        self.deliver(response);
    }

    fn execution_report(&self, order: &Message, exec_type: char, ord_status: char) -> Message {
        let n = self.ids.fetch_add(1, Ordering::Relaxed);
        let mut report = Message::with_msg_type(MsgType::ExecutionReport);
        report.set_field(tags::ORDER_ID, format_args!("LB-{n}"));
        report.set_field(tags::EXEC_ID, format_args!("LBX-{n}"));
        report.set_field(tags::EXEC_TRANS_TYPE, '0');
        report.set_field(tags::EXEC_TYPE, exec_type);
        report.set_field(tags::ORD_STATUS, ord_status);
        for tag in [
            tags::CL_ORD_ID,
            tags::SYMBOL,
            tags::SIDE,
            tags::ORD_TYPE,
            tags::ORDER_QTY,
            tags::PRICE,
            tags::TIME_IN_FORCE,
        ] {
            if let Some(value) = order.get_field(tag) {
                report.set_field(tag, value);
            }
        }
        report.set_field(tags::TRANSACT_TIME, Timestamp::now().format_millis());
        report
    }

    /// Stamps `message` as sent by the venue and runs the receive callback.
    fn deliver(&self, mut message: Message) {
        let counterparty = self.session_id.reversed();
        message.set_field(tags::BEGIN_STRING, &counterparty.begin_string);
        message.set_field(tags::SENDER_COMP_ID, &counterparty.sender_comp_id);
        message.set_field(tags::TARGET_COMP_ID, &counterparty.target_comp_id);
        message.set_field(tags::MSG_SEQ_NUM, self.incoming.allocate());
        message.set_field(tags::SENDING_TIME, Timestamp::now().format_millis());

        let received = wire(&message, &counterparty.begin_string)
            .and_then(|bytes| unwire(&bytes, &counterparty.begin_string));
        let message = match received {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "venue message lost on the wire");
                return;
            }
        };

        let admin = message.msg_type().is_some_and(|t| t.is_admin());
        let result = if admin {
            self.application.from_admin(&message, &self.session_id)
        } else {
            self.application.from_app(&message, &self.session_id)
        };
        if let Err(reason) = result {
            warn!(code = reason.code, text = %reason.text, "application rejected message");
        }
    }
}

/// Builds [`LoopbackEngine`]s and keeps the last one for inspection.
#[derive(Debug, Default)]
pub struct LoopbackFactory {
    behavior: LoopbackBehavior,
    last: Mutex<Option<Arc<LoopbackEngine>>>,
}

impl LoopbackFactory {
    /// Creates a factory whose engines behave as `behavior`.
    #[must_use]
    pub fn new(behavior: LoopbackBehavior) -> Self {
        Self {
            behavior,
            last: Mutex::new(None),
        }
    }

    /// Returns the most recently created engine.
    #[must_use]
    pub fn last_engine(&self) -> Option<Arc<LoopbackEngine>> {
        self.last.lock().clone()
    }
}

impl EngineFactory for LoopbackFactory {
    fn create(
        &self,
        config: &SessionConfig,
        application: Arc<dyn Application>,
    ) -> Result<Arc<dyn SessionEngine>> {
        let engine = Arc::new(LoopbackEngine::new(
            config,
            application,
            self.behavior.clone(),
        ));
        *self.last.lock() = Some(Arc::clone(&engine));
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::RejectReason;
    use fixbridge_core::types::CompId;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
        received: Mutex<Vec<Message>>,
    }

    impl Recorder {
        fn wait_for(&self, count: usize) {
            wait_until(|| self.received.lock().len() >= count);
        }
    }

    fn wait_until(condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !condition() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }

    impl Application for Recorder {
        fn on_create(&self, _session_id: &SessionId) {
            self.events.lock().push("create".to_string());
        }

        fn on_logon(&self, _session_id: &SessionId) {
            self.events.lock().push("logon".to_string());
        }

        fn on_logout(&self, _session_id: &SessionId) {
            self.events.lock().push("logout".to_string());
        }

        fn to_admin(&self, _message: &mut Message, _session_id: &SessionId) {}

        fn from_admin(&self, message: &Message, _session_id: &SessionId) -> std::result::Result<(), RejectReason> {
            self.received.lock().push(message.clone());
            Ok(())
        }

        fn to_app(&self, _message: &mut Message, _session_id: &SessionId) {}

        fn from_app(&self, message: &Message, _session_id: &SessionId) -> std::result::Result<(), RejectReason> {
            self.received.lock().push(message.clone());
            Ok(())
        }
    }

    fn engine(behavior: LoopbackBehavior) -> (Arc<Recorder>, LoopbackEngine) {
        let recorder = Arc::new(Recorder::default());
        let config = SessionConfig::new(
            CompId::new("CLIENT").unwrap(),
            CompId::new("VENUE").unwrap(),
            "FIX.4.4",
        );
        let engine = LoopbackEngine::new(&config, recorder.clone(), behavior);
        (recorder, engine)
    }

    fn order(cl_ord_id: &str) -> Message {
        let mut msg = Message::with_msg_type(MsgType::NewOrderSingle);
        msg.set_field(tags::CL_ORD_ID, cl_ord_id);
        msg.set_field(tags::SYMBOL, "AAPL");
        msg.set_field(tags::SIDE, '1');
        msg.set_field(tags::ORDER_QTY, 10);
        msg.set_field(tags::PRICE, "12.5");
        msg
    }

    #[test]
    fn test_logon_handshake() {
        let (recorder, engine) = engine(LoopbackBehavior::default());
        engine.start().unwrap();
        wait_until(|| recorder.events.lock().len() == 2);

        assert!(engine.is_logged_on());
        assert_eq!(*recorder.events.lock(), vec!["create", "logon"]);
        let reply = recorder.received.lock()[0].clone();
        assert_eq!(reply.msg_type(), Some(MsgType::Logon));
        assert_eq!(reply.get_field(tags::SENDER_COMP_ID), Some("VENUE"));
        assert_eq!(reply.get_field(tags::MSG_SEQ_NUM), Some("1"));
        assert_eq!(engine.sent_count(&MsgType::Logon), 1);

        engine.stop();
        assert!(!engine.is_logged_on());
        assert_eq!(recorder.events.lock().last().map(String::as_str), Some("logout"));
        assert!(!engine.send_to_target(&order("X"), engine.session()));
    }

    #[test]
    fn test_fill_uses_limit_price() {
        let (recorder, engine) = engine(LoopbackBehavior::default());
        engine.start().unwrap();
        assert!(engine.send_to_target(&order("ORD-1"), engine.session()));
        recorder.wait_for(2);

        let report = recorder.received.lock()[1].clone();
        assert_eq!(report.msg_type(), Some(MsgType::ExecutionReport));
        assert_eq!(report.get_field(tags::CL_ORD_ID), Some("ORD-1"));
        assert_eq!(report.get_field(tags::ORD_STATUS), Some("2"));
        assert_eq!(report.get_field(tags::LAST_PX), Some("12.5"));
        assert_eq!(report.get_field(tags::LEAVES_QTY), Some("0"));
        engine.stop();
    }

    #[test]
    fn test_cancel_of_acked_order() {
        let (recorder, engine) = engine(LoopbackBehavior::default().with_fill_mode(FillMode::Ack));
        engine.start().unwrap();
        engine.send_to_target(&order("ORD-1"), engine.session());

        let mut cancel = Message::with_msg_type(MsgType::OrderCancelRequest);
        cancel.set_field(tags::CL_ORD_ID, "C-1");
        cancel.set_field(tags::ORIG_CL_ORD_ID, "ORD-1");
        engine.send_to_target(&cancel, engine.session());

        let mut unknown = cancel.clone();
        unknown.set_field(tags::CL_ORD_ID, "C-2");
        unknown.set_field(tags::ORIG_CL_ORD_ID, "NOPE");
        engine.send_to_target(&unknown, engine.session());
        recorder.wait_for(4);

        let received = recorder.received.lock().clone();
        assert_eq!(received[2].get_field(tags::CL_ORD_ID), Some("C-1"));
        assert_eq!(received[2].get_field(tags::ORD_STATUS), Some("4"));
        assert_eq!(received[3].msg_type(), Some(MsgType::OrderCancelReject));
        assert_eq!(received[3].get_field(tags::CXL_REJ_REASON), Some("1"));
        engine.stop();
    }

    #[test]
    fn test_refused_sends_only_affect_app_messages() {
        let (_recorder, engine) = engine(LoopbackBehavior::default().with_refuse_sends(true));
        engine.start().unwrap();
        assert!(!engine.send_to_target(&order("ORD-1"), engine.session()));
        assert!(engine.send_to_target(&Message::with_msg_type(MsgType::Heartbeat), engine.session()));
        engine.stop();
    }

    #[test]
    fn test_messages_cross_the_wire() {
        let (recorder, engine) = engine(LoopbackBehavior::default());
        engine.start().unwrap();
        recorder.wait_for(1);

        let mut garbled = Message::with_msg_type(MsgType::ExecutionReport);
        garbled.set_field(tags::CL_ORD_ID, "ORD-\u{1}1");
        assert!(engine.inject(garbled.clone()));
        assert!(!engine.send_to_target(&garbled, engine.session()));
        assert!(engine.send_to_target(&order("ORD-2"), engine.session()));
        recorder.wait_for(2);

        let received = recorder.received.lock().clone();
        assert_eq!(received.len(), 2);
        let report = &received[1];
        assert_eq!(report.get_field(tags::CL_ORD_ID), Some("ORD-2"));
        assert_eq!(report.get_field(tags::BEGIN_STRING), Some("FIX.4.4"));
        assert!(!report.has_field(tags::CHECK_SUM));
        assert!(!report.has_field(tags::BODY_LENGTH));
        engine.stop();
    }

    #[test]
    fn test_venue_logout() {
        let (recorder, engine) = engine(LoopbackBehavior::default());
        engine.start().unwrap();
        wait_until(|| engine.is_logged_on());

        assert!(engine.venue_logout());
        wait_until(|| recorder.events.lock().len() == 3);
        assert!(!engine.is_logged_on());
        assert_eq!(recorder.events.lock().last().map(String::as_str), Some("logout"));
        let last = recorder.received.lock().last().cloned().unwrap();
        assert_eq!(last.msg_type(), Some(MsgType::Logout));

        engine.stop();
        assert!(!engine.venue_logout());
    }

    #[test]
    fn test_double_start_fails() {
        let (_recorder, engine) = engine(LoopbackBehavior::unreachable());
        engine.start().unwrap();
        assert!(matches!(engine.start(), Err(BridgeError::Engine(_))));
        engine.stop();
        engine.stop();
    }
}
