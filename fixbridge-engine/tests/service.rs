/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! UI service operations against the loopback venue.

use fixbridge_core::types::{CompId, Side};
use fixbridge_engine::{
    CancelRequest, ClientBuilder, FillMode, FixService, LoopbackBehavior, LoopbackFactory,
    NewOrder, OperationResult,
};
use fixbridge_session::SessionConfig;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn session() -> SessionConfig {
    SessionConfig::new(
        CompId::new("CLIENT").unwrap(),
        CompId::new("SERVER").unwrap(),
        "FIX.4.4",
    )
}

fn service(behavior: LoopbackBehavior) -> FixService {
    ClientBuilder::new(session())
        .with_loopback(behavior)
        .with_logon_timeout(Duration::from_millis(300))
        .with_response_timeout(Duration::from_millis(300))
        .build_service()
        .unwrap()
}

#[tokio::test]
async fn test_connect_order_cancel_disconnect() {
    let service = service(LoopbackBehavior::default().with_fill_mode(FillMode::Ack));
    assert!(!service.status().await.connected);

    assert_eq!(
        service.connect(Some("DESK1"), None).await,
        OperationResult::ok("Connected to FIX server")
    );
    let status = service.status().await;
    assert!(status.connected);
    assert_eq!(status.state, "LoggedOn");
    assert_eq!(status.session.as_deref(), Some("FIX.4.4:DESK1->SERVER"));
    assert_eq!(
        service.connect(None, None).await,
        OperationResult::failed("Already connected")
    );

    let order = NewOrder::limit("AAPL", Side::Buy, Decimal::from(5), Decimal::from(10));
    let sent = service.send_order(&order).await;
    assert!(sent.success);
    let cl_ord_id = sent.cl_ord_id.clone().unwrap();
    assert_eq!(sent.report.unwrap()["OrdStatus"], "0");

    let cancel = CancelRequest::new(cl_ord_id, "AAPL", Side::Buy, Decimal::from(5));
    let canceled = service.cancel_order(&cancel).await;
    assert!(canceled.success);
    assert_eq!(canceled.report.unwrap()["OrdStatus"], "4");

    let messages = service.messages();
    assert!(messages.iter().any(|e| e.msg_type_name == "NewOrderSingle"));
    assert!(messages.iter().any(|e| e.msg_type_name == "OrderCancelRequest"));

    assert_eq!(service.disconnect().await, OperationResult::ok("Disconnected"));
    assert_eq!(
        service.disconnect().await,
        OperationResult::failed("Not connected")
    );
    // History survives the connection.
    assert!(service.messages().len() >= messages.len());
}

#[tokio::test]
async fn test_unanswered_order_and_cancel() {
    let service = service(LoopbackBehavior::default().with_fill_mode(FillMode::Silent));
    service.connect(None, None).await;

    let order = NewOrder::market("AAPL", Side::Sell, Decimal::from(1)).with_cl_ord_id("ORD-S");
    let sent = service.send_order(&order).await;
    assert!(sent.success);
    assert_eq!(sent.cl_ord_id.as_deref(), Some("ORD-S"));
    assert!(sent.report.is_none());

    let cancel = CancelRequest::new("ORD-S", "AAPL", Side::Sell, Decimal::from(1));
    let response = service.cancel_order(&cancel).await;
    assert!(response.success, "silent venue still answers cancels of open orders");

    service.disconnect().await;
}

#[tokio::test]
async fn test_failed_connect() {
    let service = service(LoopbackBehavior::unreachable());
    let result = service.connect(None, None).await;
    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Failed to connect: logon not observed within 300 milliseconds")
    );
    assert!(!service.status().await.connected);

    let order = NewOrder::market("AAPL", Side::Buy, Decimal::from(1));
    assert_eq!(
        service.send_order(&order).await,
        OperationResult::failed("Not connected")
    );
}

#[tokio::test]
async fn test_subscribers_see_live_messages() {
    let service = service(LoopbackBehavior::default());
    let mut rx = service.subscribe();
    service.connect(None, None).await;

    let entry = rx.recv().await.unwrap();
    assert_eq!(entry.msg_type_name, "Logon");
    service.disconnect().await;
}

#[tokio::test]
async fn test_reconnect_after_venue_logout() {
    let factory = Arc::new(LoopbackFactory::new(LoopbackBehavior::default()));
    let service = ClientBuilder::new(session())
        .with_engine(factory.clone())
        .with_logon_timeout(Duration::from_millis(300))
        .with_response_timeout(Duration::from_millis(300))
        .build_service()
        .unwrap();

    assert_eq!(
        service.connect(None, None).await,
        OperationResult::ok("Connected to FIX server")
    );
    assert!(factory.last_engine().unwrap().venue_logout());

    let deadline = Instant::now() + Duration::from_secs(2);
    while service.status().await.connected && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let status = service.status().await;
    assert!(!status.connected);
    assert!(status.session.is_none());

    let order = NewOrder::market("AAPL", Side::Buy, Decimal::from(1));
    assert_eq!(
        service.send_order(&order).await,
        OperationResult::failed("Not connected")
    );

    assert_eq!(
        service.connect(None, None).await,
        OperationResult::ok("Connected to FIX server")
    );
    assert!(service.status().await.connected);
    assert_eq!(service.disconnect().await, OperationResult::ok("Disconnected"));
}
