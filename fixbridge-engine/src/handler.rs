/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Engine callbacks.
//!
//! [`BridgeApplication`] runs on the engine's thread. It never touches the
//! correlation table: it records the message in the feed, then either
//! enqueues an [`Envelope`] or queues admin work, and returns.

use crate::admin::{AdminQueue, GapFillJob};
use crate::application::{Application, RejectReason, SessionId};
use crate::bridge::{BridgeSender, Envelope};
use crate::feed::{Direction, MessageFeed};
use crate::orders::new_message_id;
use crate::outbound::OutboundStore;
use fixbridge_core::error::BridgeError;
use fixbridge_core::field::tags;
use fixbridge_core::message::{Message, MsgType};
use fixbridge_core::types::SeqNum;
use fixbridge_tagvalue::{encode_message, to_display};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The harness side of the engine callback surface.
#[derive(Debug)]
pub struct BridgeApplication {
    bridge: BridgeSender,
    admin: AdminQueue,
    feed: MessageFeed,
    outbound: Arc<OutboundStore>,
    reset_on_logon: bool,
    begin_string: String,
}

impl BridgeApplication {
    /// Creates the callback handler.
    #[must_use]
    pub fn new(
        bridge: BridgeSender,
        admin: AdminQueue,
        feed: MessageFeed,
        outbound: Arc<OutboundStore>,
        begin_string: impl Into<String>,
    ) -> Self {
        Self {
            bridge,
            admin,
            feed,
            outbound,
            reset_on_logon: true,
            begin_string: begin_string.into(),
        }
    }

    /// Sets whether outgoing Logon messages carry ResetSeqNumFlag=Y.
    #[must_use]
    pub fn with_reset_on_logon(mut self, reset: bool) -> Self {
        self.reset_on_logon = reset;
        self
    }

    fn enqueue(&self, envelope: Envelope) {
        let kind = envelope.kind();
        match self.bridge.enqueue(envelope) {
            Ok(()) => {}
            // Expected once the client has stopped.
            Err(BridgeError::BridgeClosed) => debug!(kind, "bridge closed, dropping engine event"),
            Err(e) => error!(kind, error = %e, "dropping engine event"),
        }
    }

    fn publish(&self, direction: Direction, message: &Message) {
        self.feed.publish(direction, message, &self.begin_string);
    }

    fn on_execution_report(&self, message: &Message) {
        let Some(cl_ord_id) = message.get_field(tags::CL_ORD_ID) else {
            warn!("execution report without ClOrdID, dropped");
            return;
        };
        debug!(
            cl_ord_id,
            ord_status = message.get_field(tags::ORD_STATUS).unwrap_or("?"),
            "execution report"
        );
        self.enqueue(Envelope::Execution {
            correlation_id: cl_ord_id.to_string(),
            payload: message.clone(),
        });
    }

    fn on_cancel_reject(&self, message: &Message) {
        let Some(cl_ord_id) = message.get_field(tags::CL_ORD_ID) else {
            warn!("cancel reject without ClOrdID, dropped");
            return;
        };
        warn!(
            cl_ord_id,
            reason = message.get_field(tags::CXL_REJ_REASON).unwrap_or("?"),
            text = message.get_field(tags::TEXT).unwrap_or(""),
            "order cancel rejected"
        );
        self.enqueue(Envelope::Execution {
            correlation_id: cl_ord_id.to_string(),
            payload: message.clone(),
        });
    }
}

impl Application for BridgeApplication {
    fn on_create(&self, session_id: &SessionId) {
        info!(session = %session_id, "session created");
    }

    fn on_logon(&self, session_id: &SessionId) {
        self.enqueue(Envelope::Logon(session_id.clone()));
    }

    fn on_logout(&self, session_id: &SessionId) {
        self.enqueue(Envelope::Logout(session_id.clone()));
    }

    fn to_admin(&self, message: &mut Message, _session_id: &SessionId) {
        if self.reset_on_logon && message.msg_type() == Some(MsgType::Logon) {
            message.set_bool(tags::RESET_SEQ_NUM_FLAG, true);
            debug!("ResetSeqNumFlag=Y set on logon");
        }
        self.publish(Direction::Outbound, message);
    }

    fn from_admin(&self, message: &Message, session_id: &SessionId) -> Result<(), RejectReason> {
        self.publish(Direction::Inbound, message);
        if message.msg_type() == Some(MsgType::ResendRequest) {
            match GapFillJob::from_resend_request(message, session_id) {
                Ok(job) => {
                    info!(
                        session = %session_id,
                        begin = job.begin_seq_no,
                        end = job.end_seq_no,
                        "resend request"
                    );
                    if let Err(e) = self.admin.submit(job) {
                        warn!(error = %e, "gap fill not queued");
                    }
                }
                Err(e) => warn!(error = %e, "ignoring resend request"),
            }
        }
        Ok(())
    }

    fn to_app(&self, message: &mut Message, _session_id: &SessionId) {
        self.publish(Direction::Outbound, message);
        if let Ok(seq) = message.get_field_as::<u64>(tags::MSG_SEQ_NUM) {
            let text = match encode_message(message, &self.begin_string) {
                Ok(bytes) => to_display(&bytes),
                Err(_) => message.to_string(),
            };
            self.outbound.insert(SeqNum::new(seq), text);
        }
    }

    fn from_app(&self, message: &Message, _session_id: &SessionId) -> Result<(), RejectReason> {
        self.publish(Direction::Inbound, message);
        match message.msg_type() {
            Some(MsgType::ExecutionReport) => self.on_execution_report(message),
            Some(MsgType::OrderCancelReject) => self.on_cancel_reject(message),
            other => {
                let correlation_id = new_message_id();
                debug!(
                    msg_type = other.as_ref().map_or("?", MsgType::as_str),
                    correlation_id = %correlation_id,
                    "unsolicited application message"
                );
                self.enqueue(Envelope::Execution {
                    correlation_id,
                    payload: message.clone(),
                });
            }
        }
        Ok(())
    }
}
