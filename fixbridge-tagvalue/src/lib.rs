/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # FixBridge Tag-Value
//!
//! FIX tag=value encoding and decoding for [`Message`] buffers.
//!
//! The harness never frames bytes for the wire itself; that is the engine's
//! job. This crate exists so the harness can show the raw text of every
//! message on the live feed, and so test engines can turn text back into
//! messages.
//!
//! ## Features
//!
//! - **Wire ordering**: BeginString, BodyLength, MsgType, remaining header, body, CheckSum
//! - **Fast scanning**: Uses `memchr` for delimiter search
//! - **Display form**: Renders SOH as `|` for logs and UIs

pub mod checksum;
pub mod decoder;
pub mod encoder;

pub use checksum::Checksum;
pub use decoder::{Decoder, decode_display};
pub use encoder::{Encoder, encode_message, to_display};
pub use fixbridge_core::message::Message;
