/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session identity and the live session handle.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId {
    /// BeginString (FIX version).
    pub begin_string: String,
    /// Sender CompID.
    pub sender_comp_id: String,
    /// Target CompID.
    pub target_comp_id: String,
    /// Optional sender sub ID.
    pub sender_sub_id: Option<String>,
    /// Optional target sub ID.
    pub target_sub_id: Option<String>,
}

impl SessionId {
    /// Creates a new session ID.
    #[must_use]
    pub fn new(
        begin_string: impl Into<String>,
        sender_comp_id: impl Into<String>,
        target_comp_id: impl Into<String>,
    ) -> Self {
        Self {
            begin_string: begin_string.into(),
            sender_comp_id: sender_comp_id.into(),
            target_comp_id: target_comp_id.into(),
            sender_sub_id: None,
            target_sub_id: None,
        }
    }

    /// Returns the same session seen from the counterparty's side.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            begin_string: self.begin_string.clone(),
            sender_comp_id: self.target_comp_id.clone(),
            target_comp_id: self.sender_comp_id.clone(),
            sender_sub_id: self.target_sub_id.clone(),
            target_sub_id: self.sender_sub_id.clone(),
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}->{}",
            self.begin_string, self.sender_comp_id, self.target_comp_id
        )
    }
}

/// The live session, present only while logged on.
///
/// Cloning shares the slot. Only the event dispatcher writes it; every other
/// holder takes a read lock and copies the identity out.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<Option<SessionId>>>,
}

impl SessionHandle {
    /// Creates an empty handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the logged-on session.
    pub fn set(&self, session_id: SessionId) {
        *self.inner.write() = Some(session_id);
    }

    /// Clears the session, returning the one that was live.
    pub fn clear(&self) -> Option<SessionId> {
        self.inner.write().take()
    }

    /// Returns a copy of the live session, if any.
    #[must_use]
    pub fn get(&self) -> Option<SessionId> {
        self.inner.read().clone()
    }

    /// Returns true while a session is logged on.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.inner.read().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id() {
        let id = SessionId::new("FIX.4.4", "SENDER", "TARGET");
        assert_eq!(id.begin_string, "FIX.4.4");
        assert_eq!(id.to_string(), "FIX.4.4:SENDER->TARGET");
        assert_eq!(id.reversed().to_string(), "FIX.4.4:TARGET->SENDER");
    }

    #[test]
    fn test_handle_is_shared_between_clones() {
        let handle = SessionHandle::new();
        let reader = handle.clone();
        assert!(!reader.is_live());

        handle.set(SessionId::new("FIX.4.4", "A", "B"));
        assert_eq!(reader.get().unwrap().sender_comp_id, "A");

        assert!(handle.clear().is_some());
        assert!(reader.get().is_none());
        assert!(handle.clear().is_none());
    }
}
