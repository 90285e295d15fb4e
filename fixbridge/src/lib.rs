/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # FixBridge
//!
//! Session event bridge and order correlation for a FIX test harness.
//!
//! A FIX engine delivers session and application events on its own thread.
//! FixBridge moves those events onto an async coordinating task, matches
//! execution reports and cancel rejects to the order calls waiting for them,
//! and drives logon, heartbeats and logout around the engine.
//!
//! ## Features
//!
//! - **Non-blocking callbacks**: Engine callbacks only enqueue
//! - **Order correlation**: Each `send_order` waits for its own report
//! - **Bounded resources**: Pooled message buffers and a FIFO response store
//! - **Live feed**: Every message in and out, as text, for a UI
//! - **Loopback venue**: An in-process engine for tests and demos
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fixbridge::prelude::*;
//!
//! let client = ClientBuilder::from_env()?
//!     .with_loopback(LoopbackBehavior::default())
//!     .build()?;
//! client.start().await?;
//! let order = NewOrder::limit("AAPL", Side::Sell, Decimal::from(100), Decimal::from(150));
//! let response = client.send_order(&order).await?;
//! println!("{} -> {:?}", response.cl_ord_id, response.ord_status());
//! client.stop().await?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`]: Message model, field tags, types and errors
//! - [`tagvalue`]: Tag=value encoding and decoding
//! - [`session`]: Configuration, buffer pool, heartbeat and lifecycle state
//! - [`engine`]: Event bridge, correlator, client and UI service

pub mod core {
    //! Message model, field tags, types and errors.
    pub use fixbridge_core::*;
}

pub mod tagvalue {
    //! Tag=value encoding and decoding.
    pub use fixbridge_tagvalue::*;
}

pub mod session {
    //! Configuration, buffer pool, heartbeat and lifecycle state.
    pub use fixbridge_session::*;
}

pub mod engine {
    //! Event bridge, correlator, client and UI service.
    pub use fixbridge_engine::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Core types
    pub use fixbridge_core::{
        BridgeError, CompId, Message, MsgType, OrdType, Result, SeqNum, Side, TimeInForce,
        Timestamp, tags,
    };

    // Tag-value encoding
    pub use fixbridge_tagvalue::{Decoder, Encoder};

    // Session
    pub use fixbridge_session::{BridgeConfig, LifecycleState, MessagePool, SessionConfig};

    // Engine
    pub use fixbridge_engine::{
        Application, CancelRequest, ClientBuilder, FeedEntry, FillMode, FixClient, FixService,
        LoopbackBehavior, NewOrder, OrderGateway, OrderResponse,
    };

    pub use rust_decimal::Decimal;
}

/// Initializes `tracing` output filtered by `RUST_LOG`, at INFO by default.
///
/// Calling it more than once is harmless.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .try_init();
}
