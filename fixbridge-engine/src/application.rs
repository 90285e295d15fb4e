/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Application callback interface.
//!
//! This module defines the callbacks a FIX engine invokes on its own thread,
//! following the QuickFIX pattern. Callbacks are synchronous: the engine
//! waits for each one to return before it reads the next message, so an
//! implementation must hand work off rather than block.

use fixbridge_core::message::Message;

pub use fixbridge_session::handle::SessionId;

/// Why an inbound message was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectReason {
    /// SessionRejectReason (373) value.
    pub code: u32,
    /// Text (58) sent back with the reject.
    pub text: String,
    /// RefTagID (371), when a single field is at fault.
    pub ref_tag: Option<u32>,
}

impl RejectReason {
    /// Creates a reject with no reference tag.
    #[must_use]
    pub fn new(code: u32, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
            ref_tag: None,
        }
    }

    /// Names the offending field.
    #[must_use]
    pub const fn with_ref_tag(mut self, tag: u32) -> Self {
        self.ref_tag = Some(tag);
        self
    }
}

/// Callbacks from the engine thread.
///
/// Every method runs on the thread that reads the socket, so an
/// implementation returns quickly and does its work elsewhere.
pub trait Application: Send + Sync {
    /// Called when the engine creates the session.
    fn on_create(&self, session_id: &SessionId);

    /// The counterparty accepted the logon.
    fn on_logon(&self, session_id: &SessionId);

    /// The session ended, by logout or by disconnect.
    fn on_logout(&self, session_id: &SessionId);

    /// An outgoing session-level message, before it is encoded.
    ///
    /// Fields set here go on the wire, e.g. ResetSeqNumFlag on Logon.
    fn to_admin(&self, message: &mut Message, session_id: &SessionId);

    /// An inbound session-level message.
    ///
    /// # Errors
    /// Returning `Err` makes the engine reject the message.
    #[allow(clippy::wrong_self_convention)]
    fn from_admin(&self, message: &Message, session_id: &SessionId) -> Result<(), RejectReason>;

    /// An outgoing application message, after sequencing.
    fn to_app(&self, message: &mut Message, session_id: &SessionId);

    /// An inbound application message.
    ///
    /// # Errors
    /// Returning `Err` makes the engine reject the message.
    #[allow(clippy::wrong_self_convention)]
    fn from_app(&self, message: &Message, session_id: &SessionId) -> Result<(), RejectReason>;
}

/// Accepts everything and does nothing.
#[derive(Debug, Default)]
pub struct NoOpApplication;

impl Application for NoOpApplication {
    fn on_create(&self, _session_id: &SessionId) {}

    fn on_logon(&self, _session_id: &SessionId) {}

    fn on_logout(&self, _session_id: &SessionId) {}

    fn to_admin(&self, _message: &mut Message, _session_id: &SessionId) {}

    fn from_admin(&self, _message: &Message, _session_id: &SessionId) -> Result<(), RejectReason> {
        Ok(())
    }

    fn to_app(&self, _message: &mut Message, _session_id: &SessionId) {}

    fn from_app(&self, _message: &Message, _session_id: &SessionId) -> Result<(), RejectReason> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixbridge_core::message::MsgType;

    #[test]
    fn test_reject_reason() {
        let reason = RejectReason::new(5, "Value is incorrect").with_ref_tag(54);
        assert_eq!(reason.code, 5);
        assert_eq!(reason.text, "Value is incorrect");
        assert_eq!(reason.ref_tag, Some(54));
        assert_eq!(RejectReason::new(11, "Invalid MsgType").ref_tag, None);
    }

    #[test]
    fn test_noop_application() {
        let app = NoOpApplication;
        let session_id = SessionId::new("FIX.4.4", "CLIENT", "VENUE");
        let mut msg = Message::with_msg_type(MsgType::Heartbeat);

        app.on_create(&session_id);
        app.to_admin(&mut msg, &session_id);
        assert_eq!(msg.field_count(), 1);
        assert!(app.from_app(&msg, &session_id).is_ok());
    }
}
