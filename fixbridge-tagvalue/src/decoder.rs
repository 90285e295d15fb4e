/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! FIX message decoder.
//!
//! Parses tag=value text into an owned [`Message`]. The delimiter is SOH by
//! default; `|` can be selected for text copied out of logs.

use crate::checksum::Checksum;
use crate::encoder::SOH;
use fixbridge_core::error::DecodeError;
use fixbridge_core::field::tags;
use fixbridge_core::message::Message;
use memchr::memchr;

/// Equals sign delimiter between tag and value.
pub const EQUALS: u8 = b'=';

/// Tag=value decoder over a byte buffer.
#[derive(Debug)]
pub struct Decoder<'a> {
    /// Input buffer.
    input: &'a [u8],
    /// Current position in the buffer.
    offset: usize,
    /// Field delimiter.
    delimiter: u8,
    /// Whether to validate checksums.
    validate_checksum: bool,
}

impl<'a> Decoder<'a> {
    /// Creates a new decoder for the given input buffer.
    #[inline]
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            offset: 0,
            delimiter: SOH,
            validate_checksum: true,
        }
    }

    /// Sets whether to validate checksums during decoding.
    #[inline]
    #[must_use]
    pub const fn with_checksum_validation(mut self, validate: bool) -> Self {
        self.validate_checksum = validate;
        self
    }

    /// Uses `delimiter` instead of SOH between fields.
    ///
    /// The checksum is computed over the bytes as given, so text with a
    /// substituted delimiter should be decoded with validation disabled.
    #[inline]
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Decodes one complete message.
    ///
    /// BeginString and BodyLength are validated for position but not kept;
    /// the returned message holds MsgType, the rest of the header and the body.
    ///
    /// # Errors
    /// Returns `DecodeError` if the message is malformed or incomplete.
    pub fn decode(&mut self) -> Result<Message, DecodeError> {
        let start = self.offset;

        let (tag, begin_string) = self.next_field()?.ok_or(DecodeError::Incomplete)?;
        if tag != tags::BEGIN_STRING || !begin_string.starts_with("FIX") {
            return Err(DecodeError::InvalidBeginString);
        }

        let (tag, body_length) = self.next_field()?.ok_or(DecodeError::MissingBodyLength)?;
        if tag != tags::BODY_LENGTH {
            return Err(DecodeError::MissingBodyLength);
        }
        body_length
            .parse::<usize>()
            .map_err(|_| DecodeError::InvalidBodyLength)?;

        let (tag, msg_type) = self.next_field()?.ok_or(DecodeError::MissingMsgType)?;
        if tag != tags::MSG_TYPE {
            return Err(DecodeError::MissingMsgType);
        }

        let mut message = Message::new();
        message.set_field(tags::MSG_TYPE, msg_type);

        loop {
            let field_start = self.offset;
            match self.next_field()? {
                Some((tags::CHECK_SUM, declared)) => {
                    if self.validate_checksum {
                        let declared = Checksum::from_digits(declared.as_bytes()).ok_or_else(
                            || DecodeError::InvalidFieldValue {
                                tag: tags::CHECK_SUM,
                                reason: "invalid checksum format".to_string(),
                            },
                        )?;
                        let calculated = Checksum::of(&self.input[start..field_start]);
                        if calculated != declared {
                            return Err(DecodeError::ChecksumMismatch {
                                calculated: calculated.0,
                                declared: declared.0,
                            });
                        }
                    }
                    return Ok(message);
                }
                Some((tag, value)) => message.set_field(tag, value),
                None if self.validate_checksum => return Err(DecodeError::Incomplete),
                None => return Ok(message),
            }
        }
    }

    /// Parses the next field from the buffer.
    ///
    /// # Returns
    /// `Ok(None)` when the buffer is exhausted or ends mid-field.
    ///
    /// # Errors
    /// Returns `DecodeError::InvalidTag` or `DecodeError::InvalidUtf8` for
    /// malformed fields.
    pub fn next_field(&mut self) -> Result<Option<(u32, &'a str)>, DecodeError> {
        let remaining = &self.input[self.offset.min(self.input.len())..];
        let Some(eq_pos) = memchr(EQUALS, remaining) else {
            return Ok(None);
        };
        let value_start = eq_pos + 1;
        let Some(delim_pos) = memchr(self.delimiter, &remaining[value_start..]) else {
            return Ok(None);
        };

        let tag_bytes = &remaining[..eq_pos];
        let tag = parse_tag(tag_bytes).ok_or_else(|| {
            DecodeError::InvalidTag(String::from_utf8_lossy(tag_bytes).into_owned())
        })?;
        let value = std::str::from_utf8(&remaining[value_start..value_start + delim_pos])?;

        self.offset += value_start + delim_pos + 1;
        Ok(Some((tag, value)))
    }

    /// Returns the current offset in the buffer.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }
}

/// Decodes display text (fields separated by `|`) without checksum validation.
///
/// # Errors
/// Returns `DecodeError` if the text is not a tag=value message.
pub fn decode_display(text: &str) -> Result<Message, DecodeError> {
    Decoder::new(text.as_bytes())
        .with_delimiter(b'|')
        .with_checksum_validation(false)
        .decode()
}

/// Parses a tag number from ASCII digits.
#[inline]
fn parse_tag(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || bytes.len() > 10 {
        return None;
    }
    bytes.iter().try_fold(0u32, |acc, &b| {
        if b.is_ascii_digit() {
            acc.checked_mul(10)?.checked_add(u32::from(b - b'0'))
        } else {
            None
        }
    })
}
