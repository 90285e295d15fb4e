/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Message types for the FIX protocol.
//!
//! This module provides:
//! - [`MsgType`]: The message types the harness sends or reacts to
//! - [`Message`]: A mutable, reusable message split into header and body

use crate::error::DecodeError;
use crate::field::{Field, tags};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt::{self, Write as _};
use std::str::FromStr;

/// FIX message types handled by the harness.
///
/// Anything else is carried as `Custom(String)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MsgType {
    /// Heartbeat (0) - Session level.
    #[default]
    Heartbeat,
    /// Test Request (1) - Session level.
    TestRequest,
    /// Resend Request (2) - Session level.
    ResendRequest,
    /// Reject (3) - Session level.
    Reject,
    /// Sequence Reset (4) - Session level.
    SequenceReset,
    /// Logout (5) - Session level.
    Logout,
    /// Execution Report (8).
    ExecutionReport,
    /// Order Cancel Reject (9).
    OrderCancelReject,
    /// Logon (A) - Session level.
    Logon,
    /// New Order Single (D).
    NewOrderSingle,
    /// Order Cancel Request (F).
    OrderCancelRequest,
    /// Order Cancel/Replace Request (G).
    OrderCancelReplaceRequest,
    /// Order Status Request (H).
    OrderStatusRequest,
    /// Business Message Reject (j).
    BusinessMessageReject,
    /// Custom or unknown message type.
    Custom(String),
}

impl FromStr for MsgType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "0" => Self::Heartbeat,
            "1" => Self::TestRequest,
            "2" => Self::ResendRequest,
            "3" => Self::Reject,
            "4" => Self::SequenceReset,
            "5" => Self::Logout,
            "8" => Self::ExecutionReport,
            "9" => Self::OrderCancelReject,
            "A" => Self::Logon,
            "D" => Self::NewOrderSingle,
            "F" => Self::OrderCancelRequest,
            "G" => Self::OrderCancelReplaceRequest,
            "H" => Self::OrderStatusRequest,
            "j" => Self::BusinessMessageReject,
            other => Self::Custom(other.to_string()),
        })
    }
}

impl MsgType {
    /// Returns the wire representation of this message type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Heartbeat => "0",
            Self::TestRequest => "1",
            Self::ResendRequest => "2",
            Self::Reject => "3",
            Self::SequenceReset => "4",
            Self::Logout => "5",
            Self::ExecutionReport => "8",
            Self::OrderCancelReject => "9",
            Self::Logon => "A",
            Self::NewOrderSingle => "D",
            Self::OrderCancelRequest => "F",
            Self::OrderCancelReplaceRequest => "G",
            Self::OrderStatusRequest => "H",
            Self::BusinessMessageReject => "j",
            Self::Custom(s) => s.as_str(),
        }
    }

    /// Returns true if this is an administrative message.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            Self::Heartbeat
                | Self::TestRequest
                | Self::ResendRequest
                | Self::Reject
                | Self::SequenceReset
                | Self::Logout
                | Self::Logon
        )
    }

    /// Returns true if this is an application message.
    #[must_use]
    pub fn is_app(&self) -> bool {
        !self.is_admin()
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A mutable FIX message.
///
/// Header tags (see [`tags::is_header`]) and body tags are kept in separate
/// ordered lists so the encoder can emit them in wire order regardless of
/// the order they were set in. Setting an existing tag overwrites its value
/// in place, reusing the value's allocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    header: FieldList,
    body: FieldList,
}

type FieldList = SmallVec<[Field; 16]>;

impl Message {
    /// Creates an empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty message of the given type.
    #[must_use]
    pub fn with_msg_type(msg_type: MsgType) -> Self {
        let mut message = Self::new();
        message.set_msg_type(&msg_type);
        message
    }

    /// Returns the message type, if set.
    #[must_use]
    pub fn msg_type(&self) -> Option<MsgType> {
        self.get_field(tags::MSG_TYPE)
            .map(|s| s.parse().unwrap_or_else(|e| match e {}))
    }

    /// Sets the message type (tag 35).
    pub fn set_msg_type(&mut self, msg_type: &MsgType) {
        self.set_field(tags::MSG_TYPE, msg_type.as_str());
    }

    /// Sets a field, replacing any existing value for the tag.
    ///
    /// # Arguments
    /// * `tag` - The field tag number
    /// * `value` - Any displayable value; it is rendered to wire text
    pub fn set_field(&mut self, tag: u32, value: impl fmt::Display) {
        let list = self.list_mut(tag);
        if let Some(existing) = list.iter_mut().find(|f| f.tag == tag) {
            existing.value.clear();
            let _ = write!(existing.value, "{value}");
        } else {
            list.push(Field::new(tag, value.to_string()));
        }
    }

    /// Sets a boolean field using FIX 'Y'/'N'.
    pub fn set_bool(&mut self, tag: u32, value: bool) {
        self.set_field(tag, if value { "Y" } else { "N" });
    }

    /// Gets a field value by tag.
    #[must_use]
    pub fn get_field(&self, tag: u32) -> Option<&str> {
        self.list(tag)
            .iter()
            .find(|f| f.tag == tag)
            .map(Field::as_str)
    }

    /// Gets a field value parsed as the specified type.
    ///
    /// # Errors
    /// Returns `DecodeError` if the field is not found or cannot be parsed.
    pub fn get_field_as<T: FromStr>(&self, tag: u32) -> Result<T, DecodeError> {
        self.list(tag)
            .iter()
            .find(|f| f.tag == tag)
            .ok_or(DecodeError::MissingRequiredField { tag })?
            .parse()
    }

    /// Returns true if the tag is present.
    #[must_use]
    pub fn has_field(&self, tag: u32) -> bool {
        self.list(tag).iter().any(|f| f.tag == tag)
    }

    /// Removes a field, returning its value if it was present.
    pub fn remove_field(&mut self, tag: u32) -> Option<String> {
        let list = self.list_mut(tag);
        let index = list.iter().position(|f| f.tag == tag)?;
        Some(list.remove(index).value)
    }

    /// Removes every field from the message.
    ///
    /// The inline storage is kept so the message can be reused.
    pub fn clear(&mut self) {
        self.header.clear();
        self.body.clear();
    }

    /// Returns true if the message has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.body.is_empty()
    }

    /// Returns the total number of fields.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.header.len() + self.body.len()
    }

    /// Returns the header fields in insertion order.
    pub fn header_fields(&self) -> impl Iterator<Item = &Field> {
        self.header.iter()
    }

    /// Returns the body fields in insertion order.
    pub fn body_fields(&self) -> impl Iterator<Item = &Field> {
        self.body.iter()
    }

    /// Returns all fields, header first.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.header.iter().chain(self.body.iter())
    }

    fn list(&self, tag: u32) -> &[Field] {
        if tags::is_header(tag) {
            &self.header
        } else {
            &self.body
        }
    }

    fn list_mut(&mut self, tag: u32) -> &mut FieldList {
        if tags::is_header(tag) {
            &mut self.header
        } else {
            &mut self.body
        }
    }
}

impl fmt::Display for Message {
    /// Renders the fields with `|` in place of SOH, for logs and the feed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for field in self.fields() {
            write!(f, "{field}|")?;
        }
        Ok(())
    }
}
