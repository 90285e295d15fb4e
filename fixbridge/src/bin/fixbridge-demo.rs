/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Connects to the loopback venue, sends a limit order, cancels it and
//! prints the message feed.
//!
//! Session settings come from `FIX_SENDER`, `FIX_TARGET`, `FIX_VERSION`,
//! `FIX_HOST` and `FIX_PORT`.

use anyhow::Context;
use fixbridge::init_logging;
use fixbridge::prelude::*;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let client = ClientBuilder::from_env()?
        .with_loopback(LoopbackBehavior::default().with_fill_mode(FillMode::Ack))
        .with_logon_timeout(Duration::from_secs(5))
        .with_response_timeout(Duration::from_secs(5))
        .build()?;

    client.start().await.context("logon failed")?;
    if let Some(session) = client.session_id() {
        info!(session = %session, "connected");
    }

    let order = NewOrder::limit("AAPL", Side::Sell, Decimal::from(100), Decimal::new(15025, 2))
        .with_time_in_force(TimeInForce::Day);
    let response = client.send_order(&order).await.context("order failed")?;
    info!(
        cl_ord_id = %response.cl_ord_id,
        ord_status = response.ord_status().unwrap_or("?"),
        "order acknowledged"
    );

    let cancel = CancelRequest::new(
        response.cl_ord_id.clone(),
        order.symbol.clone(),
        order.side,
        order.quantity,
    );
    match client.cancel_order(&cancel).await {
        Ok(response) if response.is_cancel_reject() => {
            warn!(cl_ord_id = %response.cl_ord_id, "cancel rejected");
        }
        Ok(response) => info!(cl_ord_id = %response.cl_ord_id, "order canceled"),
        Err(e) => warn!(error = %e, "cancel failed"),
    }

    for entry in client.feed().snapshot() {
        println!("{}", serde_json::to_string(&entry)?);
    }

    client.stop().await?;
    Ok(())
}
