/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # FixBridge Session
//!
//! Session-scoped building blocks for the FixBridge harness.
//!
//! The wire protocol belongs to the engine; this crate holds what the harness
//! keeps per session on its own side:
//! - **Configuration**: Engine session settings and harness timeouts
//! - **Session handle**: The live session identity, shared read-mostly
//! - **Buffer pool**: Lock-free pool of reusable [`Message`] buffers
//! - **Heartbeat**: Background liveness sender with a bounded join
//! - **Lifecycle state**: Atomic `Idle → Starting → LoggedOn → Stopping` cell
//! - **Sequence counter**: Outgoing MsgSeqNum allocation for in-process engines
//!
//! [`Message`]: fixbridge_core::Message

pub mod config;
pub mod handle;
pub mod heartbeat;
pub mod pool;
pub mod sequence;
pub mod state;

pub use config::{BridgeConfig, SessionConfig};
pub use handle::{SessionHandle, SessionId};
pub use heartbeat::{HeartbeatScheduler, HeartbeatSender};
pub use pool::{MessagePool, PooledMessage};
pub use sequence::SequenceCounter;
pub use state::{LifecycleState, StateCell};
