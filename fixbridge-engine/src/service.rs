/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Operations for a UI.
//!
//! [`FixService`] owns at most one connected client and answers every
//! operation with an [`OperationResult`] rather than an error, the shape a
//! web front end consumes. The message feed outlives individual
//! connections so a reconnect keeps the history.

use crate::client::{FixClient, OrderGateway, OrderResponse};
use crate::engine::EngineFactory;
use crate::feed::{FeedEntry, MessageFeed, key_fields};
use crate::orders::{CancelRequest, NewOrder};
use fixbridge_core::error::{BridgeError, Result};
use fixbridge_session::config::{BridgeConfig, SessionConfig};
use fixbridge_session::state::LifecycleState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tracing::{error, info, warn};

/// Builds a gateway for one connection, publishing into the shared feed.
pub type Connector =
    Arc<dyn Fn(SessionConfig, MessageFeed) -> Result<Arc<dyn OrderGateway>> + Send + Sync>;

/// Outcome of a UI operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Human-readable outcome on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// ClOrdID of the order or cancel sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cl_ord_id: Option<String>,
    /// Key fields of the matching report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<BTreeMap<String, String>>,
}

impl OperationResult {
    /// A success with an optional message.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// A failure.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    fn sent(cl_ord_id: String) -> Self {
        Self {
            success: true,
            cl_ord_id: Some(cl_ord_id),
            ..Self::default()
        }
    }

    fn answered(response: &OrderResponse) -> Self {
        Self {
            report: Some(key_fields(&response.report)),
            ..Self::sent(response.cl_ord_id.clone())
        }
    }
}

/// Connection status for a UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    /// True while logged on.
    pub connected: bool,
    /// Lifecycle state name.
    pub state: String,
    /// Live session, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
}

/// Single-connection service over a [`FixClient`].
pub struct FixService {
    base: SessionConfig,
    feed: MessageFeed,
    connector: Connector,
    client: Mutex<Option<Arc<dyn OrderGateway>>>,
}

impl std::fmt::Debug for FixService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixService")
            .field("base", &self.base.session_id())
            .field("feed", &self.feed.len())
            .finish_non_exhaustive()
    }
}

impl FixService {
    /// Creates a service connecting [`FixClient`]s built by `factory`.
    #[must_use]
    pub fn new(base: SessionConfig, config: BridgeConfig, factory: Arc<dyn EngineFactory>) -> Self {
        let feed = MessageFeed::new(config.feed_history);
        let connector: Connector = Arc::new(move |session: SessionConfig, feed: MessageFeed| {
            let client = FixClient::with_feed(session, config.clone(), Arc::clone(&factory), feed);
            Ok(Arc::new(client) as Arc<dyn OrderGateway>)
        });
        Self::with_connector(base, feed, connector)
    }

    /// Creates a service with a custom gateway constructor.
    #[must_use]
    pub fn with_connector(base: SessionConfig, feed: MessageFeed, connector: Connector) -> Self {
        Self {
            base,
            feed,
            connector,
            client: Mutex::new(None),
        }
    }

    /// Connects, optionally overriding the CompIDs of the base configuration.
    ///
    /// Empty overrides are ignored.
    pub async fn connect(&self, sender: Option<&str>, target: Option<&str>) -> OperationResult {
        let mut slot = self.client.lock().await;
        if let Some(existing) = slot.as_ref() {
            if existing.is_connected() {
                return OperationResult::failed("Already connected");
            }
            // A session the venue dropped still holds its workers.
            if let Err(e) = existing.stop().await {
                warn!(error = %e, "stopping stale client failed");
            }
            *slot = None;
        }

        let session = match self.session_config(sender, target) {
            Ok(session) => session,
            Err(e) => return OperationResult::failed(format!("Error updating config: {e}")),
        };
        info!(session = %session.session_id(), "connecting");

        let client = match (self.connector)(session, self.feed.clone()) {
            Ok(client) => client,
            Err(e) => return OperationResult::failed(e.to_string()),
        };
        match client.start().await {
            Ok(()) => {
                *slot = Some(client);
                OperationResult::ok("Connected to FIX server")
            }
            Err(e) => {
                error!(error = %e, "connect failed");
                OperationResult::failed(format!("Failed to connect: {e}"))
            }
        }
    }

    /// Disconnects the current client.
    pub async fn disconnect(&self) -> OperationResult {
        let Some(client) = self.client.lock().await.take() else {
            return OperationResult::failed("Not connected");
        };
        match client.stop().await {
            Ok(()) => OperationResult::ok("Disconnected"),
            Err(e) => OperationResult::failed(e.to_string()),
        }
    }

    /// Returns the connection status.
    pub async fn status(&self) -> ConnectionStatus {
        let slot = self.client.lock().await;
        match slot.as_ref() {
            Some(client) => {
                let state = client.state();
                ConnectionStatus {
                    connected: client.is_connected(),
                    state: state.to_string(),
                    session: client.session_id().map(|s| s.to_string()),
                }
            }
            None => ConnectionStatus {
                connected: false,
                state: LifecycleState::Idle.to_string(),
                session: None,
            },
        }
    }

    /// Returns the retained feed entries, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<FeedEntry> {
        self.feed.snapshot()
    }

    /// Subscribes to feed entries from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEntry> {
        self.feed.subscribe()
    }

    /// Returns the shared feed.
    #[must_use]
    pub const fn feed(&self) -> &MessageFeed {
        &self.feed
    }

    /// Sends an order.
    ///
    /// A missing report is not a failure: the order went out and whatever
    /// arrives later still shows up in the feed.
    pub async fn send_order(&self, order: &NewOrder) -> OperationResult {
        let Some(client) = self.connected().await else {
            return OperationResult::failed("Not connected");
        };
        match client.send_order(order).await {
            Ok(response) => OperationResult::answered(&response),
            Err(BridgeError::ResponseTimeout { correlation_id, .. }) => {
                OperationResult::sent(correlation_id)
            }
            Err(e) => {
                error!(error = %e, "send order failed");
                OperationResult::failed(e.to_string())
            }
        }
    }

    /// Cancels an order. A missing response is a failure.
    pub async fn cancel_order(&self, cancel: &CancelRequest) -> OperationResult {
        let Some(client) = self.connected().await else {
            return OperationResult::failed("Not connected");
        };
        match client.cancel_order(cancel).await {
            Ok(response) => OperationResult::answered(&response),
            Err(BridgeError::ResponseTimeout { .. }) => {
                OperationResult::failed("No cancel response received")
            }
            Err(e) => {
                error!(error = %e, "cancel order failed");
                OperationResult::failed(e.to_string())
            }
        }
    }

    async fn connected(&self) -> Option<Arc<dyn OrderGateway>> {
        self.client
            .lock()
            .await
            .as_ref()
            .filter(|client| client.is_connected())
            .cloned()
    }

    fn session_config(&self, sender: Option<&str>, target: Option<&str>) -> Result<SessionConfig> {
        let sender = sender.filter(|s| !s.trim().is_empty());
        let target = target.filter(|s| !s.trim().is_empty());
        if sender.is_none() && target.is_none() {
            return Ok(self.base.clone());
        }
        let sender = sender.unwrap_or(self.base.sender_comp_id.as_str());
        let target = target.unwrap_or(self.base.target_comp_id.as_str());
        info!(sender, target, "overriding CompIDs");
        self.base.clone().with_comp_ids(sender, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::SessionId;
    use async_trait::async_trait;
    use fixbridge_core::types::{CompId, Side};
    use parking_lot::Mutex as SyncMutex;
    use rust_decimal::Decimal;

    /// Gateway that logs on instantly and times out every request.
    struct SilentGateway {
        session: SessionId,
        state: SyncMutex<LifecycleState>,
    }

    #[async_trait]
    impl OrderGateway for SilentGateway {
        async fn start(&self) -> Result<()> {
            *self.state.lock() = LifecycleState::LoggedOn;
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            *self.state.lock() = LifecycleState::Idle;
            Ok(())
        }

        async fn send_order(&self, order: &NewOrder) -> Result<OrderResponse> {
            Err(BridgeError::ResponseTimeout {
                correlation_id: order.cl_ord_id.clone().unwrap_or_default(),
                timeout_ms: 1,
            })
        }

        async fn cancel_order(&self, _cancel: &CancelRequest) -> Result<OrderResponse> {
            Err(BridgeError::ResponseTimeout {
                correlation_id: "C-1".to_string(),
                timeout_ms: 1,
            })
        }

        fn state(&self) -> LifecycleState {
            *self.state.lock()
        }

        fn session_id(&self) -> Option<SessionId> {
            (self.state() == LifecycleState::LoggedOn).then(|| self.session.clone())
        }
    }

    fn service() -> FixService {
        let base = SessionConfig::new(
            CompId::new("CLIENT").unwrap(),
            CompId::new("SERVER").unwrap(),
            "FIX.4.4",
        );
        let connector: Connector = Arc::new(|session: SessionConfig, _feed: MessageFeed| {
            Ok(Arc::new(SilentGateway {
                session: session.session_id(),
                state: SyncMutex::new(LifecycleState::Idle),
            }) as Arc<dyn OrderGateway>)
        });
        FixService::with_connector(base, MessageFeed::new(10), connector)
    }

    #[tokio::test]
    async fn test_connect_twice_and_disconnect() {
        let service = service();
        assert_eq!(service.disconnect().await, OperationResult::failed("Not connected"));

        let first = service.connect(Some("TRADER"), None).await;
        assert_eq!(first, OperationResult::ok("Connected to FIX server"));
        let status = service.status().await;
        assert!(status.connected);
        assert_eq!(status.session.as_deref(), Some("FIX.4.4:TRADER->SERVER"));

        assert_eq!(
            service.connect(None, None).await,
            OperationResult::failed("Already connected")
        );
        assert_eq!(service.disconnect().await, OperationResult::ok("Disconnected"));
        assert!(!service.status().await.connected);
    }

    #[tokio::test]
    async fn test_invalid_comp_id_override() {
        let service = service();
        let too_long = "X".repeat(100);
        let result = service.connect(Some(&too_long), Some("")).await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Error updating config"));
    }

    #[tokio::test]
    async fn test_timeouts_differ_for_orders_and_cancels() {
        let service = service();
        let order = NewOrder::market("AAPL", Side::Buy, Decimal::from(1)).with_cl_ord_id("ORD-7");
        assert_eq!(service.send_order(&order).await, OperationResult::failed("Not connected"));

        service.connect(None, None).await;
        let sent = service.send_order(&order).await;
        assert!(sent.success);
        assert_eq!(sent.cl_ord_id.as_deref(), Some("ORD-7"));
        assert!(sent.report.is_none());

        let cancel = CancelRequest::new("ORD-7", "AAPL", Side::Buy, Decimal::from(1));
        assert_eq!(
            service.cancel_order(&cancel).await,
            OperationResult::failed("No cancel response received")
        );
    }

    #[test]
    fn test_result_json_shape() {
        let json = serde_json::to_value(OperationResult::failed("Not connected")).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "error": "Not connected"}));

        let json = serde_json::to_value(OperationResult::sent("ORD-1".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "clOrdId": "ORD-1"}));
    }
}
