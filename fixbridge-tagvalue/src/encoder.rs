/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! FIX message encoder.
//!
//! Turns a [`Message`] into tag=value bytes, adding BeginString, BodyLength
//! and CheckSum.

use crate::checksum::Checksum;
use bytes::{BufMut, BytesMut};
use fixbridge_core::error::EncodeError;
use fixbridge_core::field::tags;
use fixbridge_core::message::Message;

/// SOH (Start of Header) delimiter used in FIX messages.
pub const SOH: u8 = 0x01;

/// Incremental tag=value body builder.
///
/// Fields are appended in call order; [`Encoder::finish`] prepends the
/// BeginString/BodyLength prefix and appends the CheckSum trailer.
#[derive(Debug)]
pub struct Encoder {
    /// Buffer for the message body (between BodyLength and CheckSum).
    body: BytesMut,
}

impl Encoder {
    /// Creates an encoder with room for a typical order message.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Creates an encoder with pre-allocated body capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            body: BytesMut::with_capacity(capacity),
        }
    }

    /// Appends one `tag=value<SOH>` field.
    #[inline]
    pub fn put_field(&mut self, tag: u32, value: &str) {
        let mut tag_buf = itoa::Buffer::new();
        self.body.put_slice(tag_buf.format(tag).as_bytes());
        self.body.put_u8(b'=');
        self.body.put_slice(value.as_bytes());
        self.body.put_u8(SOH);
    }

    /// Returns the current body length.
    #[inline]
    #[must_use]
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Wraps the body with header prefix and checksum trailer.
    #[must_use]
    pub fn finish(self, begin_string: &str) -> BytesMut {
        let mut len_buf = itoa::Buffer::new();
        let body_len = len_buf.format(self.body.len());

        let mut out = BytesMut::with_capacity(self.body.len() + begin_string.len() + 24);
        out.put_slice(b"8=");
        out.put_slice(begin_string.as_bytes());
        out.put_u8(SOH);
        out.put_slice(b"9=");
        out.put_slice(body_len.as_bytes());
        out.put_u8(SOH);
        out.put_slice(&self.body);

        let checksum = Checksum::of(&out);
        out.put_slice(b"10=");
        out.put_slice(&checksum.to_digits());
        out.put_u8(SOH);
        out
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encodes a message in wire order.
///
/// MsgType is written first, then the remaining header fields, then the body.
/// BeginString, BodyLength and CheckSum already present on the message are
/// ignored and recomputed. A BeginString on the message wins over the
/// `begin_string` argument.
///
/// # Errors
/// Returns `EncodeError::MissingRequiredField` if MsgType is not set, and
/// `EncodeError::InvalidFieldValue` if a value contains SOH.
pub fn encode_message(message: &Message, begin_string: &str) -> Result<BytesMut, EncodeError> {
    let msg_type = message
        .get_field(tags::MSG_TYPE)
        .ok_or(EncodeError::MissingRequiredField {
            tag: tags::MSG_TYPE,
        })?;

    let mut encoder = Encoder::new();
    encoder.put_field(tags::MSG_TYPE, msg_type);

    let computed = |tag: u32| {
        matches!(
            tag,
            tags::BEGIN_STRING | tags::BODY_LENGTH | tags::MSG_TYPE | tags::CHECK_SUM
        )
    };
    for field in message.fields().filter(|f| !computed(f.tag)) {
        if field.value.as_bytes().contains(&SOH) {
            return Err(EncodeError::InvalidFieldValue {
                tag: field.tag,
                reason: "value contains SOH".to_string(),
            });
        }
        encoder.put_field(field.tag, &field.value);
    }

    let begin_string = message
        .get_field(tags::BEGIN_STRING)
        .unwrap_or(begin_string);
    Ok(encoder.finish(begin_string))
}

/// Renders encoded bytes for humans, replacing SOH with `|`.
#[must_use]
pub fn to_display(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).replace(SOH as char, "|")
}
