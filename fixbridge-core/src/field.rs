/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Field tags and owned field values.
//!
//! This module provides:
//! - [`tags`]: Constants for the standard tags the harness reads and writes
//! - [`Field`]: An owned tag=value pair with typed accessors

use crate::error::DecodeError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Standard FIX tag numbers used by the harness.
pub mod tags {
    /// Average fill price.
    pub const AVG_PX: u32 = 6;
    /// BeginString.
    pub const BEGIN_STRING: u32 = 8;
    /// BodyLength.
    pub const BODY_LENGTH: u32 = 9;
    /// CheckSum.
    pub const CHECK_SUM: u32 = 10;
    /// Client order identifier.
    pub const CL_ORD_ID: u32 = 11;
    /// Cumulative filled quantity.
    pub const CUM_QTY: u32 = 14;
    /// BeginSeqNo of a ResendRequest.
    pub const BEGIN_SEQ_NO: u32 = 7;
    /// EndSeqNo of a ResendRequest.
    pub const END_SEQ_NO: u32 = 16;
    /// Execution identifier.
    pub const EXEC_ID: u32 = 17;
    /// Execution transaction type (FIX 4.2).
    pub const EXEC_TRANS_TYPE: u32 = 20;
    /// Handling instruction.
    pub const HANDL_INST: u32 = 21;
    /// Last filled price.
    pub const LAST_PX: u32 = 31;
    /// Last filled quantity.
    pub const LAST_QTY: u32 = 32;
    /// Message sequence number.
    pub const MSG_SEQ_NUM: u32 = 34;
    /// Message type.
    pub const MSG_TYPE: u32 = 35;
    /// NewSeqNo of a SequenceReset.
    pub const NEW_SEQ_NO: u32 = 36;
    /// Venue order identifier.
    pub const ORDER_ID: u32 = 37;
    /// Order quantity.
    pub const ORDER_QTY: u32 = 38;
    /// Order status.
    pub const ORD_STATUS: u32 = 39;
    /// Order type.
    pub const ORD_TYPE: u32 = 40;
    /// Original client order identifier.
    pub const ORIG_CL_ORD_ID: u32 = 41;
    /// Possible duplicate flag.
    pub const POSS_DUP_FLAG: u32 = 43;
    /// Limit price.
    pub const PRICE: u32 = 44;
    /// Sender CompID.
    pub const SENDER_COMP_ID: u32 = 49;
    /// Sender sub ID.
    pub const SENDER_SUB_ID: u32 = 50;
    /// Sending time.
    pub const SENDING_TIME: u32 = 52;
    /// Side.
    pub const SIDE: u32 = 54;
    /// Symbol.
    pub const SYMBOL: u32 = 55;
    /// Target CompID.
    pub const TARGET_COMP_ID: u32 = 56;
    /// Target sub ID.
    pub const TARGET_SUB_ID: u32 = 57;
    /// Free text.
    pub const TEXT: u32 = 58;
    /// Time in force.
    pub const TIME_IN_FORCE: u32 = 59;
    /// Transaction time.
    pub const TRANSACT_TIME: u32 = 60;
    /// Possible resend flag.
    pub const POSS_RESEND: u32 = 97;
    /// Encrypt method.
    pub const ENCRYPT_METHOD: u32 = 98;
    /// Cancel reject reason.
    pub const CXL_REJ_REASON: u32 = 102;
    /// Heartbeat interval.
    pub const HEART_BT_INT: u32 = 108;
    /// Test request identifier.
    pub const TEST_REQ_ID: u32 = 112;
    /// Original sending time.
    pub const ORIG_SENDING_TIME: u32 = 122;
    /// Gap fill flag.
    pub const GAP_FILL_FLAG: u32 = 123;
    /// Reset sequence number flag.
    pub const RESET_SEQ_NUM_FLAG: u32 = 141;
    /// Execution type.
    pub const EXEC_TYPE: u32 = 150;
    /// Remaining open quantity.
    pub const LEAVES_QTY: u32 = 151;
    /// Market of the last fill.
    pub const LAST_MKT: u32 = 30;

    /// Returns true if the tag belongs to the standard header.
    #[must_use]
    pub const fn is_header(tag: u32) -> bool {
        matches!(
            tag,
            BEGIN_STRING
                | BODY_LENGTH
                | MSG_TYPE
                | SENDER_COMP_ID
                | TARGET_COMP_ID
                | MSG_SEQ_NUM
                | SENDER_SUB_ID
                | TARGET_SUB_ID
                | SENDING_TIME
                | POSS_DUP_FLAG
                | POSS_RESEND
                | ORIG_SENDING_TIME
        )
    }
}

/// An owned tag=value pair.
///
/// Values are kept in their wire text form; the typed accessors parse on
/// demand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// The field tag number.
    pub tag: u32,
    /// The field value as wire text.
    pub value: String,
}

impl Field {
    /// Creates a new field.
    #[must_use]
    pub fn new(tag: u32, value: impl Into<String>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    /// Returns the value as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Parses the value as the specified type.
    ///
    /// # Errors
    /// Returns `DecodeError::InvalidFieldValue` if parsing fails.
    pub fn parse<T: FromStr>(&self) -> Result<T, DecodeError> {
        self.value
            .parse()
            .map_err(|_| DecodeError::InvalidFieldValue {
                tag: self.tag,
                reason: format!(
                    "failed to parse '{}' as {}",
                    self.value,
                    std::any::type_name::<T>()
                ),
            })
    }

    /// Returns the value as a u64.
    ///
    /// # Errors
    /// Returns `DecodeError::InvalidFieldValue` if the value is not a valid integer.
    pub fn as_u64(&self) -> Result<u64, DecodeError> {
        self.parse()
    }

    /// Returns the value as a Decimal.
    ///
    /// # Errors
    /// Returns `DecodeError::InvalidFieldValue` if the value is not a valid decimal.
    pub fn as_decimal(&self) -> Result<Decimal, DecodeError> {
        self.parse()
    }

    /// Returns the value as a bool (FIX uses 'Y'/'N').
    ///
    /// # Errors
    /// Returns `DecodeError::InvalidFieldValue` if the value is not 'Y' or 'N'.
    pub fn as_bool(&self) -> Result<bool, DecodeError> {
        match self.value.as_str() {
            "Y" => Ok(true),
            "N" => Ok(false),
            _ => Err(DecodeError::InvalidFieldValue {
                tag: self.tag,
                reason: "expected 'Y' or 'N'".to_string(),
            }),
        }
    }

    /// Returns the value as a single character.
    ///
    /// # Errors
    /// Returns `DecodeError::InvalidFieldValue` if the value is not a single ASCII character.
    pub fn as_char(&self) -> Result<char, DecodeError> {
        let bytes = self.value.as_bytes();
        if bytes.len() == 1 && bytes[0].is_ascii() {
            Ok(bytes[0] as char)
        } else {
            Err(DecodeError::InvalidFieldValue {
                tag: self.tag,
                reason: "expected single ASCII character".to_string(),
            })
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.tag, self.value)
    }
}
