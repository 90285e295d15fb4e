/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Order and cancel requests.
//!
//! [`NewOrder`] and [`CancelRequest`] describe what the caller wants; they
//! are written into a pooled [`Message`] right before sending.

use fixbridge_core::error::{BridgeError, Result};
use fixbridge_core::field::tags;
use fixbridge_core::message::{Message, MsgType};
use fixbridge_core::types::{OrdType, Side, TimeInForce, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// HandlInst value for automated execution with no broker intervention.
pub const HANDL_INST_AUTOMATED: char = '1';

/// Generates a ClOrdID for a new order: the first 16 characters of a UUID.
#[must_use]
pub fn new_cl_ord_id() -> String {
    let mut id = Uuid::new_v4().to_string();
    id.truncate(16);
    id
}

/// Generates a ClOrdID for a cancel: `C-` and 8 UUID characters.
#[must_use]
pub fn new_cancel_id() -> String {
    let mut id = Uuid::new_v4().to_string();
    id.truncate(8);
    format!("C-{id}")
}

/// Generates the key under which an unsolicited message is stored.
#[must_use]
pub fn new_message_id() -> String {
    let mut id = format!("MSG-{}", Uuid::new_v4());
    id.truncate(16);
    id
}

/// A NewOrderSingle request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    /// Instrument symbol.
    pub symbol: String,
    /// Buy or sell.
    pub side: Side,
    /// Market or limit.
    pub order_type: OrdType,
    /// Order quantity.
    pub quantity: Decimal,
    /// Limit price, required for limit orders and ignored otherwise.
    #[serde(default)]
    pub price: Option<Decimal>,
    /// Time in force.
    #[serde(default)]
    pub time_in_force: TimeInForce,
    /// ClOrdID to use instead of a generated one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cl_ord_id: Option<String>,
}

impl NewOrder {
    /// Creates a market order.
    #[must_use]
    pub fn market(symbol: impl Into<String>, side: Side, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrdType::Market,
            quantity,
            price: None,
            time_in_force: TimeInForce::Day,
            cl_ord_id: None,
        }
    }

    /// Creates a limit order.
    #[must_use]
    pub fn limit(symbol: impl Into<String>, side: Side, quantity: Decimal, price: Decimal) -> Self {
        Self {
            order_type: OrdType::Limit,
            price: Some(price),
            ..Self::market(symbol, side, quantity)
        }
    }

    /// Sets the time in force.
    #[must_use]
    pub fn with_time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = time_in_force;
        self
    }

    /// Uses `cl_ord_id` instead of a generated id.
    #[must_use]
    pub fn with_cl_ord_id(mut self, cl_ord_id: impl Into<String>) -> Self {
        self.cl_ord_id = Some(cl_ord_id.into());
        self
    }

    /// Checks the request before anything is registered or sent.
    ///
    /// # Errors
    /// Returns `BridgeError::InvalidOrder` for an empty symbol, a
    /// non-positive quantity, or a limit order without a positive price.
    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(BridgeError::InvalidOrder("symbol is required".to_string()));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(BridgeError::InvalidOrder(format!(
                "quantity must be positive, got {}",
                self.quantity
            )));
        }
        if self.order_type == OrdType::Limit {
            match self.price {
                Some(price) if price > Decimal::ZERO => {}
                Some(price) => {
                    return Err(BridgeError::InvalidOrder(format!(
                        "limit price must be positive, got {price}"
                    )));
                }
                None => {
                    return Err(BridgeError::InvalidOrder(
                        "limit order requires a price".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Writes the NewOrderSingle fields into `message`.
    ///
    /// Price is only written for limit orders.
    pub fn write_to(&self, cl_ord_id: &str, message: &mut Message) {
        message.set_msg_type(&MsgType::NewOrderSingle);
        message.set_field(tags::CL_ORD_ID, cl_ord_id);
        message.set_field(tags::HANDL_INST, HANDL_INST_AUTOMATED);
        message.set_field(tags::SYMBOL, &self.symbol);
        message.set_field(tags::SIDE, self.side);
        message.set_field(tags::TRANSACT_TIME, Timestamp::now().format_millis());
        message.set_field(tags::ORD_TYPE, self.order_type);
        message.set_field(tags::ORDER_QTY, self.quantity);
        message.set_field(tags::TIME_IN_FORCE, self.time_in_force);
        if self.order_type == OrdType::Limit
            && let Some(price) = self.price
        {
            message.set_field(tags::PRICE, price);
        }
    }
}

/// An OrderCancelRequest for a previously sent order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    /// ClOrdID of the order to cancel.
    pub orig_cl_ord_id: String,
    /// Instrument symbol.
    pub symbol: String,
    /// Side of the original order.
    pub side: Side,
    /// Quantity of the original order.
    pub quantity: Decimal,
    /// ClOrdID to use instead of a generated one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cl_ord_id: Option<String>,
}

impl CancelRequest {
    /// Creates a cancel request.
    #[must_use]
    pub fn new(
        orig_cl_ord_id: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        quantity: Decimal,
    ) -> Self {
        Self {
            orig_cl_ord_id: orig_cl_ord_id.into(),
            symbol: symbol.into(),
            side,
            quantity,
            cl_ord_id: None,
        }
    }

    /// Uses `cl_ord_id` instead of a generated id.
    #[must_use]
    pub fn with_cl_ord_id(mut self, cl_ord_id: impl Into<String>) -> Self {
        self.cl_ord_id = Some(cl_ord_id.into());
        self
    }

    /// Checks the request before anything is registered or sent.
    ///
    /// # Errors
    /// Returns `BridgeError::InvalidOrder` if the original ClOrdID or symbol
    /// is empty.
    pub fn validate(&self) -> Result<()> {
        if self.orig_cl_ord_id.trim().is_empty() {
            return Err(BridgeError::InvalidOrder(
                "original ClOrdID is required".to_string(),
            ));
        }
        if self.symbol.trim().is_empty() {
            return Err(BridgeError::InvalidOrder("symbol is required".to_string()));
        }
        Ok(())
    }

    /// Writes the OrderCancelRequest fields into `message`.
    pub fn write_to(&self, cl_ord_id: &str, message: &mut Message) {
        message.set_msg_type(&MsgType::OrderCancelRequest);
        message.set_field(tags::ORIG_CL_ORD_ID, &self.orig_cl_ord_id);
        message.set_field(tags::CL_ORD_ID, cl_ord_id);
        message.set_field(tags::SYMBOL, &self.symbol);
        message.set_field(tags::SIDE, self.side);
        message.set_field(tags::TRANSACT_TIME, Timestamp::now().format_millis());
        message.set_field(tags::ORDER_QTY, self.quantity);
    }
}
