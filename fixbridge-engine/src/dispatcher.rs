/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! The coordinating task.
//!
//! Consumes the event bridge, owns the [`Correlator`], and is the only
//! writer of the session handle while it runs.

use crate::application::SessionId;
use crate::bridge::{BridgeReceiver, Envelope};
use crate::correlator::Correlator;
use fixbridge_session::handle::SessionHandle;
use tokio::sync::watch;
use tracing::{debug, info};

/// Bridge consumer and correlation state.
#[derive(Debug)]
pub struct Dispatcher {
    bridge: BridgeReceiver,
    correlator: Correlator,
    session: SessionHandle,
    logon: watch::Sender<Option<SessionId>>,
}

impl Dispatcher {
    /// Creates a dispatcher.
    ///
    /// `logon` mirrors the session handle for callers waiting on logon.
    #[must_use]
    pub fn new(
        bridge: BridgeReceiver,
        correlator: Correlator,
        session: SessionHandle,
        logon: watch::Sender<Option<SessionId>>,
    ) -> Self {
        Self {
            bridge,
            correlator,
            session,
            logon,
        }
    }

    /// Runs until the bridge is shut down.
    ///
    /// Returns the correlator with any requests still pending dropped.
    pub async fn run(mut self) -> Correlator {
        debug!("dispatcher started");
        while let Some(envelope) = self.bridge.dequeue().await {
            self.dispatch(envelope);
        }
        self.correlator.abandon_pending();
        debug!(stored = self.correlator.store().len(), "dispatcher stopped");
        self.correlator
    }

    /// Applies one envelope.
    pub fn dispatch(&mut self, envelope: Envelope) {
        match envelope {
            Envelope::Logon(session_id) => {
                info!(session = %session_id, "logon");
                self.session.set(session_id.clone());
                self.logon.send_replace(Some(session_id));
            }
            Envelope::Logout(session_id) => {
                info!(session = %session_id, "logout");
                self.session.clear();
                self.logon.send_replace(None);
            }
            Envelope::Execution {
                correlation_id,
                payload,
            } => {
                self.correlator.resolve(&correlation_id, payload);
            }
            Envelope::Register {
                correlation_id,
                reply,
            } => {
                // A caller that stopped listening leaves no entry behind.
                if let Err(Ok(_)) = reply.send(self.correlator.register(&correlation_id)) {
                    self.correlator.deregister(&correlation_id);
                }
            }
            Envelope::Deregister {
                correlation_id,
                reply,
            } => {
                let _ = reply.send(self.correlator.deregister(&correlation_id));
            }
            Envelope::Query {
                correlation_id,
                reply,
            } => {
                let _ = reply.send(self.correlator.response(&correlation_id).cloned());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::EventBridge;
    use crate::correlator::CorrelatorHandle;
    use fixbridge_core::error::BridgeError;
    use fixbridge_core::field::tags;
    use fixbridge_core::message::{Message, MsgType};
    use std::time::Duration;

    fn filled() -> Message {
        let mut msg = Message::with_msg_type(MsgType::ExecutionReport);
        msg.set_field(tags::CL_ORD_ID, "ORD-1");
        msg.set_field(tags::ORD_STATUS, "2");
        msg
    }

    fn spawn_dispatcher() -> (
        CorrelatorHandle,
        SessionHandle,
        watch::Receiver<Option<SessionId>>,
        tokio_util::sync::CancellationToken,
        tokio::task::JoinHandle<Correlator>,
    ) {
        let (tx, rx) = EventBridge::channel();
        let token = rx.shutdown_token();
        let session = SessionHandle::new();
        let (logon_tx, logon_rx) = watch::channel(None);
        let dispatcher = Dispatcher::new(rx, Correlator::new(64), session.clone(), logon_tx);
        let task = tokio::spawn(dispatcher.run());
        (CorrelatorHandle::new(tx), session, logon_rx, token, task)
    }

    #[tokio::test]
    async fn test_round_trip_through_bridge() {
        let (handle, _session, _logon, token, task) = spawn_dispatcher();

        let waiter = handle.register("ORD-1").await.unwrap();
        let resolver = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            resolver.resolve("ORD-1", filled()).unwrap();
        });

        let payload = handle
            .await_response(waiter, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(payload, filled());

        token.cancel();
        let correlator = task.await.unwrap();
        assert!(correlator.table().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_then_late_resolve_is_stored_only() {
        let (handle, _session, _logon, token, task) = spawn_dispatcher();

        let waiter = handle.register("ORD-2").await.unwrap();
        let err = handle
            .await_response(waiter, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::ResponseTimeout { .. }));

        handle.resolve("ORD-2", filled()).unwrap();
        assert_eq!(handle.stored_response("ORD-2").await.unwrap(), Some(filled()));
        assert!(!handle.deregister("ORD-2").await);

        token.cancel();
        let correlator = task.await.unwrap();
        assert!(correlator.table().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_register_through_bridge() {
        let (handle, _session, _logon, token, _task) = spawn_dispatcher();
        let _first = handle.register("DUP").await.unwrap();
        assert_eq!(
            handle.register("DUP").await.unwrap_err(),
            BridgeError::DuplicateCorrelationId("DUP".to_string())
        );
        token.cancel();
    }

    #[tokio::test]
    async fn test_forget_frees_the_id() {
        let (handle, _session, _logon, token, task) = spawn_dispatcher();
        let _waiter = handle.register("ORD-F").await.unwrap();

        handle.forget("ORD-F");
        assert!(!handle.deregister("ORD-F").await);
        let _again = handle.register("ORD-F").await.unwrap();

        token.cancel();
        let correlator = task.await.unwrap();
        assert!(correlator.table().is_empty());
    }

    #[tokio::test]
    async fn test_logon_and_logout_update_session() {
        let (tx, rx) = EventBridge::channel();
        let token = rx.shutdown_token();
        let session = SessionHandle::new();
        let (logon_tx, mut logon_rx) = watch::channel(None);
        let task = tokio::spawn(
            Dispatcher::new(rx, Correlator::new(8), session.clone(), logon_tx).run(),
        );

        let id = SessionId::new("FIX.4.4", "CLIENT", "VENUE");
        tx.enqueue(Envelope::Logon(id.clone())).unwrap();
        logon_rx.wait_for(Option::is_some).await.unwrap();
        assert_eq!(session.get(), Some(id.clone()));

        tx.enqueue(Envelope::Logout(id)).unwrap();
        logon_rx.wait_for(Option::is_none).await.unwrap();
        assert!(!session.is_live());

        token.cancel();
        task.await.unwrap();
        assert_eq!(
            CorrelatorHandle::new(tx).register("AFTER").await.unwrap_err(),
            BridgeError::BridgeClosed
        );
    }
}
