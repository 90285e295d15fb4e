/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Event bridge between engine callbacks and the coordinating task.
//!
//! Engine callbacks run on the engine's thread and must return quickly, so
//! they only enqueue an [`Envelope`]. A single consumer task dequeues the
//! envelopes in order and owns everything they touch. Callers that need to
//! change the correlation table send commands through the same queue, which
//! keeps that table single-writer.

use crate::application::SessionId;
use crate::correlator::Waiter;
use fixbridge_core::error::{BridgeError, Result};
use fixbridge_core::message::Message;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// One event or command for the coordinating task.
#[derive(Debug)]
pub enum Envelope {
    /// The engine reported a logon.
    Logon(SessionId),
    /// The engine reported a logout.
    Logout(SessionId),
    /// A response keyed by correlation id.
    Execution {
        /// ClOrdID the response refers to.
        correlation_id: String,
        /// The decoded response.
        payload: Message,
    },
    /// Register a pending request.
    Register {
        /// Correlation id to register.
        correlation_id: String,
        /// Receives the waiter, or the duplicate error.
        reply: oneshot::Sender<Result<Waiter>>,
    },
    /// Remove a pending request without resolving it.
    Deregister {
        /// Correlation id to remove.
        correlation_id: String,
        /// Receives whether an entry was removed.
        reply: oneshot::Sender<bool>,
    },
    /// Read a stored response.
    Query {
        /// Correlation id to look up.
        correlation_id: String,
        /// Receives a copy of the stored payload.
        reply: oneshot::Sender<Option<Message>>,
    },
}

impl Envelope {
    /// Returns a short name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Logon(_) => "logon",
            Self::Logout(_) => "logout",
            Self::Execution { .. } => "execution",
            Self::Register { .. } => "register",
            Self::Deregister { .. } => "deregister",
            Self::Query { .. } => "query",
        }
    }
}

/// Constructor for a bridge's two ends.
#[derive(Debug)]
pub struct EventBridge;

impl EventBridge {
    /// Creates an unbounded bridge.
    #[must_use]
    pub fn channel() -> (BridgeSender, BridgeReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            BridgeSender { tx },
            BridgeReceiver {
                rx,
                shutdown: CancellationToken::new(),
            },
        )
    }
}

/// Producer end. Cheap to clone, usable from any thread.
#[derive(Debug, Clone)]
pub struct BridgeSender {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl BridgeSender {
    /// Enqueues an envelope without blocking.
    ///
    /// # Errors
    /// Returns `BridgeError::BridgeClosed` once the consumer has shut down.
    pub fn enqueue(&self, envelope: Envelope) -> Result<()> {
        self.tx.send(envelope).map_err(|_| BridgeError::BridgeClosed)
    }

    /// Returns true once the consumer has shut down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer end, owned by the coordinating task.
#[derive(Debug)]
pub struct BridgeReceiver {
    rx: mpsc::UnboundedReceiver<Envelope>,
    shutdown: CancellationToken,
}

impl BridgeReceiver {
    /// Returns a token that shuts the bridge down when cancelled.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Waits for the next envelope.
    ///
    /// Returns `None` once the bridge is shut down or every sender is gone.
    /// After shutdown further enqueues fail; envelopes already queued are
    /// discarded.
    pub async fn dequeue(&mut self) -> Option<Envelope> {
        if self.shutdown.is_cancelled() {
            self.rx.close();
            return None;
        }
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => {
                self.rx.close();
                None
            }
            envelope = self.rx.recv() => envelope,
        }
    }

    /// Returns the number of queued envelopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
