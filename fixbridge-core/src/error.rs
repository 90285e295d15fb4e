/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Error types for the FixBridge harness.
//!
//! This module provides a unified error hierarchy using `thiserror`:
//! [`BridgeError`] covers session and order round-trip failures, while
//! [`DecodeError`] and [`EncodeError`] cover the tag=value codec.

use thiserror::Error;

/// Result type alias using [`BridgeError`] as the error type.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Top-level error type for all FixBridge operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Logon was not observed within the deadline.
    #[error("logon not observed within {timeout_ms} milliseconds")]
    ConnectionTimeout {
        /// The logon deadline in milliseconds.
        timeout_ms: u64,
    },

    /// Operation attempted without a live session.
    #[error("not connected")]
    NotConnected,

    /// The engine refused to transmit a message.
    #[error("send failed for {msg_type} message: {reason}")]
    SendFailed {
        /// MsgType of the message that could not be sent.
        msg_type: String,
        /// Description of the failure.
        reason: String,
    },

    /// No matching response arrived within the deadline.
    #[error("no response for {correlation_id} within {timeout_ms} milliseconds")]
    ResponseTimeout {
        /// The correlation identifier that timed out.
        correlation_id: String,
        /// The response deadline in milliseconds.
        timeout_ms: u64,
    },

    /// A request with the same correlation identifier is already pending.
    #[error("correlation id already pending: {0}")]
    DuplicateCorrelationId(String),

    /// Resend or gap-fill handling failed. Never surfaced to order callers.
    #[error("transient admin error: {0}")]
    TransientAdmin(String),

    /// The controller is not in the state required by the operation.
    #[error("invalid session state: expected {expected}, current {current}")]
    InvalidState {
        /// Expected state for the operation.
        expected: String,
        /// Current controller state.
        current: String,
    },

    /// The order parameters are inconsistent.
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    /// The engine collaborator failed.
    #[error("engine error: {0}")]
    Engine(String),

    /// The event bridge has been shut down.
    #[error("event bridge closed")]
    BridgeClosed,

    /// Session or harness configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Error during message decoding.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Error during message encoding.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
}

impl BridgeError {
    /// Returns true if the error is one of the deadline expiries.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::ResponseTimeout { .. }
        )
    }
}

/// Errors that occur during FIX message decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Message buffer is incomplete, need more data.
    #[error("incomplete message, need more data")]
    Incomplete,

    /// Invalid BeginString field (tag 8).
    #[error("invalid begin string: expected 8=FIX.x.y")]
    InvalidBeginString,

    /// Missing BodyLength field (tag 9).
    #[error("missing body length field (tag 9)")]
    MissingBodyLength,

    /// Invalid BodyLength value.
    #[error("invalid body length value")]
    InvalidBodyLength,

    /// Missing MsgType field (tag 35).
    #[error("missing msg type field (tag 35)")]
    MissingMsgType,

    /// Checksum mismatch between calculated and declared values.
    #[error("checksum mismatch: calculated {calculated}, declared {declared}")]
    ChecksumMismatch {
        /// Calculated checksum value.
        calculated: u8,
        /// Declared checksum value in message.
        declared: u8,
    },

    /// Invalid tag format (not a valid integer).
    #[error("invalid tag format: {0}")]
    InvalidTag(String),

    /// Missing required field.
    #[error("missing required field: tag {tag}")]
    MissingRequiredField {
        /// The tag number of the missing field.
        tag: u32,
    },

    /// Invalid field value for the expected type.
    #[error("invalid field value for tag {tag}: {reason}")]
    InvalidFieldValue {
        /// The tag number of the field.
        tag: u32,
        /// Description of why the value is invalid.
        reason: String,
    },

    /// Invalid UTF-8 in a field value.
    #[error("invalid utf-8 in field: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// Errors that occur during FIX message encoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Missing required field during encoding.
    #[error("missing required field: tag {tag}")]
    MissingRequiredField {
        /// The tag number of the missing field.
        tag: u32,
    },

    /// Field value cannot be placed on the wire.
    #[error("invalid field value for tag {tag}: {reason}")]
    InvalidFieldValue {
        /// The tag number of the field.
        tag: u32,
        /// Description of why the value is invalid.
        reason: String,
    },
}
