/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! The FIX engine as seen by the harness.
//!
//! The engine owns the socket, sequence numbers and message store. The
//! harness only starts and stops it and hands it messages to send.

use crate::application::{Application, SessionId};
use fixbridge_core::error::Result;
use fixbridge_core::message::Message;
use fixbridge_session::config::SessionConfig;
use std::sync::Arc;

/// A running FIX engine session.
pub trait SessionEngine: Send + Sync {
    /// Begins connecting. Logon is reported later through
    /// [`Application::on_logon`].
    ///
    /// # Errors
    /// Returns an error if the engine cannot begin connecting.
    fn start(&self) -> Result<()>;

    /// Stops the session and its engine thread.
    fn stop(&self);

    /// Queues `message` for `session_id`.
    ///
    /// The engine fills in the standard header and calls `to_admin` or
    /// `to_app` before sending. Returns false if the message was refused.
    fn send_to_target(&self, message: &Message, session_id: &SessionId) -> bool;
}

/// Builds an engine session from configuration.
pub trait EngineFactory: Send + Sync {
    /// Creates an engine that will report to `application`.
    ///
    /// # Errors
    /// Returns an error if the configuration cannot be used.
    fn create(
        &self,
        config: &SessionConfig,
        application: Arc<dyn Application>,
    ) -> Result<Arc<dyn SessionEngine>>;
}

impl<F> EngineFactory for F
where
    F: Fn(&SessionConfig, Arc<dyn Application>) -> Result<Arc<dyn SessionEngine>> + Send + Sync,
{
    fn create(
        &self,
        config: &SessionConfig,
        application: Arc<dyn Application>,
    ) -> Result<Arc<dyn SessionEngine>> {
        self(config, application)
    }
}
