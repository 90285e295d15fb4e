/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Client builder for fluent configuration.
//!
//! This module provides a builder API for assembling a [`FixClient`] or a
//! [`FixService`] from session settings, harness settings and an engine.

use crate::client::FixClient;
use crate::engine::EngineFactory;
use crate::feed::MessageFeed;
use crate::loopback::{LoopbackBehavior, LoopbackFactory};
use crate::service::FixService;
use fixbridge_core::error::{BridgeError, Result};
use fixbridge_session::config::{BridgeConfig, SessionConfig};
use std::sync::Arc;
use std::time::Duration;

/// Builder for a [`FixClient`].
pub struct ClientBuilder {
    /// Engine session settings.
    session: SessionConfig,
    /// Harness timeouts and sizes.
    config: BridgeConfig,
    /// Engine constructor.
    factory: Option<Arc<dyn EngineFactory>>,
    /// Feed to publish into instead of a new one.
    feed: Option<MessageFeed>,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("session", &self.session)
            .field("config", &self.config)
            .field("has_engine", &self.factory.is_some())
            .finish_non_exhaustive()
    }
}

impl ClientBuilder {
    /// Creates a builder for `session` with default harness settings.
    #[must_use]
    pub fn new(session: SessionConfig) -> Self {
        Self {
            session,
            config: BridgeConfig::default(),
            factory: None,
            feed: None,
        }
    }

    /// Creates a builder from `FIX_*` environment variables.
    ///
    /// # Errors
    /// Returns `BridgeError::Config` if a variable holds an invalid value.
    pub fn from_env() -> Result<Self> {
        SessionConfig::from_env().map(Self::new)
    }

    /// Replaces the harness settings.
    #[must_use]
    pub fn with_config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the engine constructor.
    #[must_use]
    pub fn with_engine(mut self, factory: Arc<dyn EngineFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Uses an in-process loopback venue.
    #[must_use]
    pub fn with_loopback(self, behavior: LoopbackBehavior) -> Self {
        self.with_engine(Arc::new(LoopbackFactory::new(behavior)))
    }

    /// Publishes into `feed`.
    #[must_use]
    pub fn with_feed(mut self, feed: MessageFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Sets the logon timeout.
    #[must_use]
    pub fn with_logon_timeout(mut self, timeout: Duration) -> Self {
        self.config.logon_timeout = timeout;
        self
    }

    /// Sets the order and cancel response timeout.
    #[must_use]
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.config.response_timeout = timeout;
        self
    }

    /// Returns the session settings.
    #[must_use]
    pub const fn session(&self) -> &SessionConfig {
        &self.session
    }

    /// Returns the harness settings.
    #[must_use]
    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Builds an idle client.
    ///
    /// # Errors
    /// Returns `BridgeError::Config` if no engine was set.
    pub fn build(self) -> Result<FixClient> {
        let factory = self.factory.ok_or_else(no_engine)?;
        Ok(match self.feed {
            Some(feed) => FixClient::with_feed(self.session, self.config, factory, feed),
            None => FixClient::new(self.session, self.config, factory),
        })
    }

    /// Builds a UI service whose connections use this builder's settings.
    ///
    /// # Errors
    /// Returns `BridgeError::Config` if no engine was set.
    pub fn build_service(self) -> Result<FixService> {
        let factory = self.factory.ok_or_else(no_engine)?;
        Ok(FixService::new(self.session, self.config, factory))
    }
}

fn no_engine() -> BridgeError {
    BridgeError::Config("no engine configured".to_string())
}
