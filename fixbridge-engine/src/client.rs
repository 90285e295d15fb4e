/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session lifecycle controller.
//!
//! [`FixClient`] drives one engine session through
//! `Idle → Starting → LoggedOn → Stopping → Idle` and turns each order or
//! cancel into a request/response round trip:
//!
//! 1. register the ClOrdID with the correlator
//! 2. build the request in a pooled buffer and hand it to the engine
//! 3. wait, bounded by the response timeout, for the matching report
//!
//! Everything the engine reports goes through the event bridge to a single
//! dispatcher task, which is the only writer of the correlation table and
//! the session handle.

use crate::admin::AdminWorkerPool;
use crate::application::SessionId;
use crate::bridge::EventBridge;
use crate::correlator::{Correlator, CorrelatorHandle};
use crate::dispatcher::Dispatcher;
use crate::engine::{EngineFactory, SessionEngine};
use crate::feed::MessageFeed;
use crate::handler::BridgeApplication;
use crate::orders::{CancelRequest, NewOrder, new_cancel_id, new_cl_ord_id};
use crate::outbound::OutboundStore;
use async_trait::async_trait;
use fixbridge_core::error::{BridgeError, Result};
use fixbridge_core::field::tags;
use fixbridge_core::message::{Message, MsgType};
use fixbridge_session::config::{BridgeConfig, SessionConfig};
use fixbridge_session::handle::SessionHandle;
use fixbridge_session::heartbeat::HeartbeatScheduler;
use fixbridge_session::pool::MessagePool;
use fixbridge_session::state::{LifecycleState, StateCell};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A matched response to an order or cancel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderResponse {
    /// ClOrdID the request was sent with.
    pub cl_ord_id: String,
    /// The execution report or cancel reject that answered it.
    pub report: Message,
}

impl OrderResponse {
    /// Returns OrdStatus (39) of the report, if present.
    #[must_use]
    pub fn ord_status(&self) -> Option<&str> {
        self.report.get_field(tags::ORD_STATUS)
    }

    /// Returns true if the report is an OrderCancelReject.
    #[must_use]
    pub fn is_cancel_reject(&self) -> bool {
        self.report.msg_type() == Some(MsgType::OrderCancelReject)
    }
}

/// Order entry against a FIX session.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Connects and waits for logon.
    async fn start(&self) -> Result<()>;

    /// Logs out and releases everything `start` created. Idempotent.
    async fn stop(&self) -> Result<()>;

    /// Sends a NewOrderSingle and waits for its first execution report.
    async fn send_order(&self, order: &NewOrder) -> Result<OrderResponse>;

    /// Sends an OrderCancelRequest and waits for the report or reject.
    async fn cancel_order(&self, cancel: &CancelRequest) -> Result<OrderResponse>;

    /// Returns the lifecycle state.
    fn state(&self) -> LifecycleState;

    /// Returns the live session, if logged on.
    fn session_id(&self) -> Option<SessionId>;

    /// Returns true while logged on with a live session.
    ///
    /// The state stays `LoggedOn` after the venue logs out until `stop` runs,
    /// but the session is gone.
    fn is_connected(&self) -> bool {
        self.state() == LifecycleState::LoggedOn && self.session_id().is_some()
    }
}

/// What `start` created and `stop` tears down.
struct Running {
    engine: Arc<dyn SessionEngine>,
    correlator: CorrelatorHandle,
    dispatcher: JoinHandle<Correlator>,
    shutdown: CancellationToken,
    heartbeat: Option<HeartbeatScheduler>,
    admin: Option<AdminWorkerPool>,
}

/// FIX session client with order correlation.
pub struct FixClient {
    session_config: SessionConfig,
    config: BridgeConfig,
    factory: Arc<dyn EngineFactory>,
    state: StateCell,
    session: SessionHandle,
    pool: Arc<MessagePool>,
    feed: MessageFeed,
    outbound: Arc<OutboundStore>,
    running: Mutex<Option<Running>>,
}

impl std::fmt::Debug for FixClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixClient")
            .field("session", &self.session_config.session_id())
            .field("state", &self.state.get())
            .field("live", &self.session.is_live())
            .finish_non_exhaustive()
    }
}

impl FixClient {
    /// Creates an idle client.
    ///
    /// # Arguments
    /// * `session_config` - Engine session settings
    /// * `config` - Harness timeouts and sizes
    /// * `factory` - Builds the engine session on `start`
    #[must_use]
    pub fn new(
        session_config: SessionConfig,
        config: BridgeConfig,
        factory: Arc<dyn EngineFactory>,
    ) -> Self {
        let feed = MessageFeed::new(config.feed_history);
        Self::with_feed(session_config, config, factory, feed)
    }

    /// Creates an idle client publishing into an existing feed.
    #[must_use]
    pub fn with_feed(
        session_config: SessionConfig,
        config: BridgeConfig,
        factory: Arc<dyn EngineFactory>,
        feed: MessageFeed,
    ) -> Self {
        Self {
            pool: Arc::new(MessagePool::new(config.pool_capacity, config.pool_preallocate)),
            outbound: Arc::new(OutboundStore::new(config.outbound_store_capacity)),
            session_config,
            config,
            factory,
            state: StateCell::new(),
            session: SessionHandle::new(),
            feed,
            running: Mutex::new(None),
        }
    }

    /// Returns the engine session settings.
    #[must_use]
    pub const fn session_config(&self) -> &SessionConfig {
        &self.session_config
    }

    /// Returns the harness settings.
    #[must_use]
    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    /// Returns the live session, if logged on.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.get()
    }

    /// Returns true while logged on and the venue has not logged out.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == LifecycleState::LoggedOn && self.session.get().is_some()
    }

    /// Returns the message feed.
    #[must_use]
    pub const fn feed(&self) -> &MessageFeed {
        &self.feed
    }

    /// Returns the store of sent application messages.
    #[must_use]
    pub fn outbound(&self) -> &OutboundStore {
        &self.outbound
    }

    /// Returns the shared buffer pool.
    #[must_use]
    pub fn pool(&self) -> &Arc<MessagePool> {
        &self.pool
    }

    /// Returns true while the harness heartbeat thread is running.
    #[must_use]
    pub fn heartbeat_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .and_then(|r| r.heartbeat.as_ref())
            .is_some_and(HeartbeatScheduler::is_running)
    }

    /// Returns the number of heartbeats sent by the harness this session.
    #[must_use]
    pub fn heartbeats_sent(&self) -> u64 {
        self.running
            .lock()
            .as_ref()
            .and_then(|r| r.heartbeat.as_ref())
            .map_or(0, HeartbeatScheduler::sent)
    }

    /// Returns the last response stored under `correlation_id`, including
    /// responses that arrived after their caller timed out.
    ///
    /// # Errors
    /// Returns `BridgeError::NotConnected` if the client is not running.
    pub async fn stored_response(&self, correlation_id: &str) -> Result<Option<Message>> {
        let correlator = self.correlator()?;
        correlator.stored_response(correlation_id).await
    }

    /// Connects and waits for the logon to be dispatched.
    ///
    /// On success the harness heartbeat is running and the state is
    /// `LoggedOn`.
    ///
    /// # Errors
    /// Returns `BridgeError::InvalidState` unless idle, the factory or engine
    /// error if the session cannot be created or started, and
    /// `BridgeError::ConnectionTimeout` if no logon arrives within the logon
    /// timeout. In every error case the client is back in `Idle`.
    pub async fn start(&self) -> Result<()> {
        self.state
            .transition(LifecycleState::Idle, LifecycleState::Starting)?;
        info!(session = %self.session_config.session_id(), addr = %self.session_config.addr(), "starting");

        if let Err(e) = self.launch().await {
            warn!(error = %e, "start failed");
            let running = self.running.lock().take();
            if let Some(running) = running {
                self.teardown(running, false).await;
            }
            self.session.clear();
            self.state.force(LifecycleState::Idle);
            return Err(e);
        }

        self.state
            .transition(LifecycleState::Starting, LifecycleState::LoggedOn)?;
        if let Some(session_id) = self.session.get() {
            info!(session = %session_id, "logged on");
        }
        Ok(())
    }

    async fn launch(&self) -> Result<()> {
        let (bridge_tx, bridge_rx) = EventBridge::channel();
        let shutdown = bridge_rx.shutdown_token();
        let (admin_queue, admin_jobs) = AdminWorkerPool::channel();
        let (logon_tx, mut logon_rx) = watch::channel(None);

        let application = BridgeApplication::new(
            bridge_tx.clone(),
            admin_queue,
            self.feed.clone(),
            Arc::clone(&self.outbound),
            self.session_config.begin_string.clone(),
        )
        .with_reset_on_logon(self.session_config.reset_on_logon);

        let dispatcher = tokio::spawn(
            Dispatcher::new(
                bridge_rx,
                Correlator::new(self.config.response_store_capacity),
                self.session.clone(),
                logon_tx,
            )
            .run(),
        );

        let engine = match self
            .factory
            .create(&self.session_config, Arc::new(application))
        {
            Ok(engine) => engine,
            Err(e) => {
                shutdown.cancel();
                dispatcher.abort();
                return Err(e);
            }
        };

        *self.running.lock() = Some(Running {
            engine: Arc::clone(&engine),
            correlator: CorrelatorHandle::new(bridge_tx),
            dispatcher,
            shutdown,
            heartbeat: None,
            admin: None,
        });

        let admin = AdminWorkerPool::spawn(
            admin_jobs,
            self.config.admin_workers,
            Arc::clone(&engine),
            Arc::clone(&self.pool),
        )?;
        self.update_running(|running| running.admin = Some(admin))?;

        engine.start()?;

        let timeout = self.config.logon_timeout;
        let logged_on = matches!(
            tokio::time::timeout(timeout, logon_rx.wait_for(Option::is_some)).await,
            Ok(Ok(_))
        );
        if !logged_on {
            return Err(BridgeError::ConnectionTimeout {
                timeout_ms: timeout.as_millis() as u64,
            });
        }

        let heartbeat = HeartbeatScheduler::spawn(
            self.session.clone(),
            self.config.heartbeat_interval,
            self.config.heartbeat_ceiling,
            heartbeat_sender(engine, Arc::clone(&self.pool)),
        )?;
        self.update_running(|running| running.heartbeat = Some(heartbeat))
    }

    /// Sends a NewOrderSingle and waits for its execution report.
    ///
    /// The ClOrdID is the order's own if set, otherwise a generated one.
    ///
    /// # Errors
    /// - `BridgeError::NotConnected` unless logged on
    /// - `BridgeError::InvalidOrder` if the order is inconsistent
    /// - `BridgeError::DuplicateCorrelationId` if the ClOrdID is pending
    /// - `BridgeError::SendFailed` if the engine refused the message
    /// - `BridgeError::ResponseTimeout` if no report arrived in time
    pub async fn send_order(&self, order: &NewOrder) -> Result<OrderResponse> {
        self.state.ensure_logged_on()?;
        order.validate()?;
        let cl_ord_id = order.cl_ord_id.clone().unwrap_or_else(new_cl_ord_id);
        info!(
            cl_ord_id = %cl_ord_id,
            symbol = %order.symbol,
            side = %order.side,
            qty = %order.quantity,
            "sending order"
        );
        let report = self
            .round_trip(&cl_ord_id, &MsgType::NewOrderSingle, |message| {
                order.write_to(&cl_ord_id, message);
            })
            .await?;
        Ok(OrderResponse { cl_ord_id, report })
    }

    /// Sends an OrderCancelRequest and waits for the execution report or
    /// cancel reject carrying the cancel's ClOrdID.
    ///
    /// # Errors
    /// Same as [`FixClient::send_order`].
    pub async fn cancel_order(&self, cancel: &CancelRequest) -> Result<OrderResponse> {
        self.state.ensure_logged_on()?;
        cancel.validate()?;
        let cl_ord_id = cancel.cl_ord_id.clone().unwrap_or_else(new_cancel_id);
        info!(
            cl_ord_id = %cl_ord_id,
            orig_cl_ord_id = %cancel.orig_cl_ord_id,
            "sending cancel"
        );
        let report = self
            .round_trip(&cl_ord_id, &MsgType::OrderCancelRequest, |message| {
                cancel.write_to(&cl_ord_id, message);
            })
            .await?;
        Ok(OrderResponse { cl_ord_id, report })
    }

    async fn round_trip(
        &self,
        correlation_id: &str,
        msg_type: &MsgType,
        write: impl FnOnce(&mut Message),
    ) -> Result<Message> {
        let (engine, correlator) = {
            let running = self.running.lock();
            let running = running.as_ref().ok_or(BridgeError::NotConnected)?;
            (Arc::clone(&running.engine), running.correlator.clone())
        };
        let session_id = self.session.get().ok_or(BridgeError::NotConnected)?;

        let waiter = correlator.register(correlation_id).await?;
        let guard = PendingGuard::new(&correlator, correlation_id);
        let sent = {
            let mut message = self.pool.checkout();
            write(&mut *message);
            engine.send_to_target(&message, &session_id)
        };
        if !sent {
            correlator.deregister(correlation_id).await;
            guard.disarm();
            warn!(correlation_id, msg_type = %msg_type, "engine refused message");
            return Err(BridgeError::SendFailed {
                msg_type: msg_type.to_string(),
                reason: "engine refused the message".to_string(),
            });
        }
        debug!(correlation_id, "awaiting response");
        let response = correlator
            .await_response(waiter, self.config.response_timeout)
            .await;
        guard.disarm();
        response
    }

    /// Logs out and stops the engine, heartbeat and admin workers.
    ///
    /// Valid in any state and idempotent. Calls still waiting for a
    /// response are not woken; they time out on their own.
    ///
    /// The dispatcher is cancelled before the Logout goes out, so the venue's
    /// Logout reply reaches the feed but never the dispatcher or correlator.
    ///
    /// # Errors
    /// Currently infallible; the `Result` leaves room for engines whose
    /// shutdown can fail.
    pub async fn stop(&self) -> Result<()> {
        let running = self.running.lock().take();
        let Some(running) = running else {
            self.session.clear();
            self.state.force(LifecycleState::Idle);
            debug!("stop with nothing running");
            return Ok(());
        };
        let previous = self.state.force(LifecycleState::Stopping);
        info!(from = %previous, "stopping");
        self.teardown(running, true).await;
        self.state.force(LifecycleState::Idle);
        info!("stopped");
        Ok(())
    }

    async fn teardown(&self, running: Running, send_logout: bool) {
        let Running {
            engine,
            correlator: _,
            mut dispatcher,
            shutdown,
            heartbeat,
            admin,
        } = running;
        let join_timeout = self.config.join_timeout;

        shutdown.cancel();
        match tokio::time::timeout(join_timeout, &mut dispatcher).await {
            Ok(Ok(correlator)) => {
                debug!(stored = correlator.store().len(), "dispatcher joined");
            }
            Ok(Err(e)) => warn!(error = %e, "dispatcher task failed"),
            Err(_) => {
                warn!("dispatcher did not stop in time, aborting");
                dispatcher.abort();
            }
        }

        if send_logout && let Some(session_id) = self.session.get() {
            let sent = {
                let mut logout = self.pool.checkout();
                logout.set_msg_type(&MsgType::Logout);
                engine.send_to_target(&logout, &session_id)
            };
            if sent {
                debug!(session = %session_id, "logout sent");
                tokio::time::sleep(self.config.logout_grace).await;
            } else {
                warn!(session = %session_id, "engine refused logout");
            }
        }

        engine.stop();
        self.session.clear();

        let joined = tokio::task::spawn_blocking(move || {
            let heartbeat_ok = heartbeat.is_none_or(|mut h| h.stop(join_timeout));
            let admin_ok = admin.is_none_or(|mut a| a.shutdown(join_timeout));
            heartbeat_ok && admin_ok
        })
        .await;
        if !matches!(joined, Ok(true)) {
            warn!("background workers did not stop cleanly");
        }
    }

    fn correlator(&self) -> Result<CorrelatorHandle> {
        self.running
            .lock()
            .as_ref()
            .map(|running| running.correlator.clone())
            .ok_or(BridgeError::NotConnected)
    }

    fn update_running(&self, update: impl FnOnce(&mut Running)) -> Result<()> {
        let mut running = self.running.lock();
        let running = running.as_mut().ok_or(BridgeError::NotConnected)?;
        update(running);
        Ok(())
    }
}

impl Drop for FixClient {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.shutdown.cancel();
            running.engine.stop();
            self.session.clear();
        }
    }
}

fn heartbeat_sender(
    engine: Arc<dyn SessionEngine>,
    pool: Arc<MessagePool>,
) -> impl FnMut(&SessionId) -> Result<()> + Send + 'static {
    move |session_id: &SessionId| -> Result<()> {
        let mut heartbeat = pool.checkout();
        heartbeat.set_msg_type(&MsgType::Heartbeat);
        if engine.send_to_target(&heartbeat, session_id) {
            Ok(())
        } else {
            Err(BridgeError::SendFailed {
                msg_type: MsgType::Heartbeat.to_string(),
                reason: "engine refused heartbeat".to_string(),
            })
        }
    }
}

/// Removes a registered correlation id if the round trip is abandoned.
///
/// A caller that drops `send_order` mid-flight, through a timeout wrapper or
/// a cancelled request handler, never reaches the deregistration at the end
/// of the wait.
struct PendingGuard<'a> {
    correlator: &'a CorrelatorHandle,
    correlation_id: &'a str,
    armed: bool,
}

impl<'a> PendingGuard<'a> {
    fn new(correlator: &'a CorrelatorHandle, correlation_id: &'a str) -> Self {
        Self {
            correlator,
            correlation_id,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!(correlation_id = self.correlation_id, "round trip abandoned");
            self.correlator.forget(self.correlation_id);
        }
    }
}

#[async_trait]
impl OrderGateway for FixClient {
    async fn start(&self) -> Result<()> {
        FixClient::start(self).await
    }

    async fn stop(&self) -> Result<()> {
        FixClient::stop(self).await
    }

    async fn send_order(&self, order: &NewOrder) -> Result<OrderResponse> {
        FixClient::send_order(self, order).await
    }

    async fn cancel_order(&self, cancel: &CancelRequest) -> Result<OrderResponse> {
        FixClient::cancel_order(self, cancel).await
    }

    fn state(&self) -> LifecycleState {
        FixClient::state(self)
    }

    fn session_id(&self) -> Option<SessionId> {
        FixClient::session_id(self)
    }

    fn is_connected(&self) -> bool {
        FixClient::is_connected(self)
    }
}
