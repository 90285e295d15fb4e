/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Session and harness configuration.
//!
//! [`SessionConfig`] is what the engine needs to build a session.
//! [`BridgeConfig`] holds the harness's own deadlines and sizes.

use crate::handle::SessionId;
use fixbridge_core::error::{BridgeError, Result};
use fixbridge_core::types::CompId;
use std::env;
use std::time::Duration;

/// Default venue host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default venue port.
pub const DEFAULT_PORT: u16 = 9876;

/// Default FIX version.
pub const DEFAULT_BEGIN_STRING: &str = "FIX.4.4";

/// Configuration for an engine session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sender CompID (tag 49).
    pub sender_comp_id: CompId,
    /// Target CompID (tag 56).
    pub target_comp_id: CompId,
    /// FIX version BeginString (e.g., "FIX.4.4").
    pub begin_string: String,
    /// Venue host name.
    pub host: String,
    /// Venue port.
    pub port: u16,
    /// HeartBtInt negotiated by the engine at logon.
    pub heartbeat_interval: Duration,
    /// Whether outgoing Logon carries ResetSeqNumFlag=Y.
    pub reset_on_logon: bool,
    /// Optional sender sub ID (tag 50).
    pub sender_sub_id: Option<String>,
    /// Optional target sub ID (tag 57).
    pub target_sub_id: Option<String>,
}

impl SessionConfig {
    /// Creates a new session configuration with required fields.
    ///
    /// # Arguments
    /// * `sender_comp_id` - The sender CompID
    /// * `target_comp_id` - The target CompID
    /// * `begin_string` - The FIX version string
    #[must_use]
    pub fn new(
        sender_comp_id: CompId,
        target_comp_id: CompId,
        begin_string: impl Into<String>,
    ) -> Self {
        Self {
            sender_comp_id,
            target_comp_id,
            begin_string: begin_string.into(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            heartbeat_interval: Duration::from_secs(30),
            reset_on_logon: true,
            sender_sub_id: None,
            target_sub_id: None,
        }
    }

    /// Loads a client configuration from the environment.
    ///
    /// Reads `FIX_HOST`, `FIX_PORT`, `FIX_SENDER`, `FIX_TARGET` and
    /// `FIX_VERSION`, falling back to `127.0.0.1:9876`, `CLIENT`, `SERVER`
    /// and `FIX.4.4`.
    ///
    /// # Errors
    /// Returns `BridgeError::Config` if a CompID is empty or too long, or the
    /// port is not a number.
    pub fn from_env() -> Result<Self> {
        let sender = env::var("FIX_SENDER").unwrap_or_else(|_| "CLIENT".to_string());
        let target = env::var("FIX_TARGET").unwrap_or_else(|_| "SERVER".to_string());
        let version =
            env::var("FIX_VERSION").unwrap_or_else(|_| DEFAULT_BEGIN_STRING.to_string());

        let mut config = Self::new(comp_id(&sender)?, comp_id(&target)?, version);
        if let Ok(host) = env::var("FIX_HOST") {
            config.host = host;
        }
        if let Ok(port) = env::var("FIX_PORT") {
            config.port = port
                .parse()
                .map_err(|_| BridgeError::Config(format!("invalid FIX_PORT '{port}'")))?;
        }
        Ok(config)
    }

    /// Replaces the CompIDs, as a connect request from the UI does.
    ///
    /// # Errors
    /// Returns `BridgeError::Config` if either CompID is invalid.
    pub fn with_comp_ids(mut self, sender: &str, target: &str) -> Result<Self> {
        self.sender_comp_id = comp_id(sender)?;
        self.target_comp_id = comp_id(target)?;
        Ok(self)
    }

    /// Sets the venue address.
    #[must_use]
    pub fn with_address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets whether to reset sequence numbers on logon.
    #[must_use]
    pub const fn with_reset_on_logon(mut self, reset: bool) -> Self {
        self.reset_on_logon = reset;
        self
    }

    /// Sets the sender sub ID.
    #[must_use]
    pub fn with_sender_sub_id(mut self, sub_id: impl Into<String>) -> Self {
        self.sender_sub_id = Some(sub_id.into());
        self
    }

    /// Sets the target sub ID.
    #[must_use]
    pub fn with_target_sub_id(mut self, sub_id: impl Into<String>) -> Self {
        self.target_sub_id = Some(sub_id.into());
        self
    }

    /// Returns the heartbeat interval in seconds.
    #[must_use]
    pub fn heartbeat_interval_secs(&self) -> u64 {
        self.heartbeat_interval.as_secs()
    }

    /// Returns the socket address string.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the identity the engine will report for this session.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        let mut id = SessionId::new(
            self.begin_string.as_str(),
            self.sender_comp_id.as_str(),
            self.target_comp_id.as_str(),
        );
        id.sender_sub_id.clone_from(&self.sender_sub_id);
        id.target_sub_id.clone_from(&self.target_sub_id);
        id
    }
}

fn comp_id(value: &str) -> Result<CompId> {
    CompId::new(value).ok_or_else(|| BridgeError::Config(format!("invalid CompID '{value}'")))
}

/// Deadlines and sizes used by the harness itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// How long `start` waits for the logon to be dispatched.
    pub logon_timeout: Duration,
    /// How long an order or cancel waits for its response.
    pub response_timeout: Duration,
    /// Cadence of the harness heartbeat.
    pub heartbeat_interval: Duration,
    /// Longest single sleep of the heartbeat loop.
    pub heartbeat_ceiling: Duration,
    /// Wait after sending Logout before stopping the engine.
    pub logout_grace: Duration,
    /// Bound on joining each background worker during stop.
    pub join_timeout: Duration,
    /// Maximum number of idle buffers kept by the pool.
    pub pool_capacity: usize,
    /// Idle buffers created up front.
    pub pool_preallocate: usize,
    /// Threads answering resend requests with gap fills.
    pub admin_workers: usize,
    /// Maximum number of stored responses before the oldest is evicted.
    pub response_store_capacity: usize,
    /// Number of feed entries kept for late subscribers.
    pub feed_history: usize,
    /// Number of outgoing application messages kept by sequence number.
    pub outbound_store_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            logon_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(10),
            heartbeat_ceiling: Duration::from_secs(1),
            logout_grace: Duration::from_millis(500),
            join_timeout: Duration::from_millis(500),
            pool_capacity: 20,
            pool_preallocate: 10,
            admin_workers: 4,
            response_store_capacity: 10_000,
            feed_history: 1_000,
            outbound_store_capacity: 10_000,
        }
    }
}

impl BridgeConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the logon timeout.
    #[must_use]
    pub const fn with_logon_timeout(mut self, timeout: Duration) -> Self {
        self.logon_timeout = timeout;
        self
    }

    /// Sets the order and cancel response timeout.
    #[must_use]
    pub const fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Sets the heartbeat cadence and the loop's sleep ceiling.
    #[must_use]
    pub const fn with_heartbeat(mut self, interval: Duration, ceiling: Duration) -> Self {
        self.heartbeat_interval = interval;
        self.heartbeat_ceiling = ceiling;
        self
    }

    /// Sets the logout grace period.
    #[must_use]
    pub const fn with_logout_grace(mut self, grace: Duration) -> Self {
        self.logout_grace = grace;
        self
    }

    /// Sets the worker join timeout.
    #[must_use]
    pub const fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Sets the buffer pool capacity and pre-allocation.
    #[must_use]
    pub const fn with_pool(mut self, capacity: usize, preallocate: usize) -> Self {
        self.pool_capacity = capacity;
        self.pool_preallocate = preallocate;
        self
    }

    /// Sets the number of admin worker threads.
    #[must_use]
    pub const fn with_admin_workers(mut self, workers: usize) -> Self {
        self.admin_workers = workers;
        self
    }

    /// Sets the response store capacity.
    #[must_use]
    pub const fn with_response_store_capacity(mut self, capacity: usize) -> Self {
        self.response_store_capacity = capacity;
        self
    }

    /// Sets the feed history size.
    #[must_use]
    pub const fn with_feed_history(mut self, history: usize) -> Self {
        self.feed_history = history;
        self
    }

    /// Sets the outbound store capacity.
    #[must_use]
    pub const fn with_outbound_store_capacity(mut self, capacity: usize) -> Self {
        self.outbound_store_capacity = capacity;
        self
    }
}
