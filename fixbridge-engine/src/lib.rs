/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # FixBridge Engine
//!
//! Session event bridge and order correlation for a FIX test harness.
//!
//! The FIX engine runs the wire protocol on its own thread and calls back
//! into the harness synchronously. This crate turns those callbacks into
//! events on a single coordinating task, matches execution reports and
//! cancel rejects to the order calls waiting for them, and drives the
//! session lifecycle around it.
//!
//! This crate provides:
//! - **Application trait**: Callback interface the engine invokes
//! - **Engine traits**: What the harness needs from a FIX engine
//! - **Event bridge**: Non-blocking handoff from the callback thread
//! - **Correlator**: Pending requests, waiters and stored responses
//! - **Client**: `start` / `send_order` / `cancel_order` / `stop`
//! - **Service**: Success-or-error operations and a live feed for a UI
//! - **Loopback engine**: An in-process venue for tests and demos

pub mod admin;
pub mod application;
pub mod bridge;
pub mod builder;
pub mod client;
pub mod correlator;
pub mod dispatcher;
pub mod engine;
pub mod feed;
pub mod handler;
pub mod loopback;
pub mod orders;
pub mod outbound;
pub mod service;

pub use application::{Application, NoOpApplication, RejectReason, SessionId};
pub use bridge::{BridgeReceiver, BridgeSender, Envelope, EventBridge};
pub use builder::ClientBuilder;
pub use client::{FixClient, OrderGateway, OrderResponse};
pub use correlator::{Correlator, CorrelatorHandle, Waiter};
pub use engine::{EngineFactory, SessionEngine};
pub use feed::{Direction, FeedEntry, MessageFeed};
pub use handler::BridgeApplication;
pub use loopback::{FillMode, LoopbackBehavior, LoopbackEngine, LoopbackFactory};
pub use orders::{CancelRequest, NewOrder};
pub use service::{ConnectionStatus, FixService, OperationResult};
