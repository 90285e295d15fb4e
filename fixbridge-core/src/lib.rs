/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # FixBridge Core
//!
//! Core message model, field types, and error definitions for the FixBridge
//! test harness.
//!
//! This crate provides the building blocks shared by every FixBridge crate:
//! - **Error types**: `BridgeError` for harness operations, `DecodeError` and
//!   `EncodeError` for the tag=value codec
//! - **Fields**: Standard tag constants and the owned [`Field`] type
//! - **Messages**: [`MsgType`] and the mutable, reusable [`Message`] buffer
//! - **Core types**: `Timestamp`, `CompId`, `SeqNum`, `Side`, `OrdType`, `TimeInForce`
//!
//! ## Reusable Buffers
//!
//! [`Message`] is designed to be cleared and refilled, so the session layer
//! can keep a pool of them instead of allocating one per order.

pub mod error;
pub mod field;
pub mod message;
pub mod types;

pub use error::{BridgeError, DecodeError, EncodeError, Result};
pub use field::{Field, tags};
pub use message::{Message, MsgType};
pub use types::{CompId, OrdType, SeqNum, Side, TimeInForce, Timestamp};
