/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Client lifecycle and order round trips against the loopback venue.

use fixbridge_core::error::BridgeError;
use fixbridge_core::field::tags;
use fixbridge_core::message::{Message, MsgType};
use fixbridge_core::types::{CompId, Side, TimeInForce};
use fixbridge_engine::feed::Direction;
use fixbridge_engine::{
    CancelRequest, FillMode, FixClient, LoopbackBehavior, LoopbackEngine, LoopbackFactory,
    NewOrder,
};
use fixbridge_session::{BridgeConfig, LifecycleState, SessionConfig};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn session() -> SessionConfig {
    SessionConfig::new(
        CompId::new("CLIENT").unwrap(),
        CompId::new("VENUE").unwrap(),
        "FIX.4.4",
    )
}

fn config() -> BridgeConfig {
    BridgeConfig::default()
        .with_logon_timeout(Duration::from_millis(500))
        .with_response_timeout(Duration::from_millis(500))
        .with_logout_grace(Duration::from_millis(20))
        .with_join_timeout(Duration::from_millis(500))
}

fn client(behavior: LoopbackBehavior, config: BridgeConfig) -> (FixClient, Arc<LoopbackFactory>) {
    let factory = Arc::new(LoopbackFactory::new(behavior));
    let client = FixClient::new(session(), config, factory.clone());
    (client, factory)
}

fn engine(factory: &LoopbackFactory) -> Arc<LoopbackEngine> {
    factory.last_engine().expect("engine created")
}

async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

fn limit(cl_ord_id: &str) -> NewOrder {
    NewOrder::limit("AAPL", Side::Sell, Decimal::from(100), Decimal::new(15050, 2))
        .with_time_in_force(TimeInForce::Day)
        .with_cl_ord_id(cl_ord_id)
}

#[tokio::test]
async fn test_filled_order_returns_its_report() {
    let (client, factory) = client(LoopbackBehavior::default(), config());
    client.start().await.unwrap();
    assert_eq!(client.state(), LifecycleState::LoggedOn);

    let response = client.send_order(&limit("ORD-1")).await.unwrap();
    assert_eq!(response.cl_ord_id, "ORD-1");
    assert_eq!(response.ord_status(), Some("2"));
    assert_eq!(response.report.get_field(tags::LAST_PX), Some("150.50"));

    let stored = client.stored_response("ORD-1").await.unwrap();
    assert_eq!(stored, Some(response.report.clone()));

    let sent = engine(&factory).sent_messages();
    let order = sent
        .iter()
        .find(|m| m.msg_type() == Some(MsgType::NewOrderSingle))
        .unwrap();
    assert_eq!(order.get_field(tags::HANDL_INST), Some("1"));
    assert_eq!(order.get_field(tags::PRICE), Some("150.50"));

    client.stop().await.unwrap();
    assert_eq!(client.state(), LifecycleState::Idle);
}

#[tokio::test]
async fn test_late_report_is_stored_but_not_delivered() {
    let config = config().with_response_timeout(Duration::from_millis(200));
    let (client, factory) = client(
        LoopbackBehavior::default().with_fill_mode(FillMode::Silent),
        config,
    );
    client.start().await.unwrap();

    let started = Instant::now();
    let err = client.send_order(&limit("ORD-2")).await.unwrap_err();
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(
        err,
        BridgeError::ResponseTimeout {
            correlation_id: "ORD-2".to_string(),
            timeout_ms: 200,
        }
    );

    let mut late = Message::with_msg_type(MsgType::ExecutionReport);
    late.set_field(tags::CL_ORD_ID, "ORD-2");
    late.set_field(tags::ORD_STATUS, "2");
    assert!(engine(&factory).inject(late));

    let mut stored = None;
    for _ in 0..100 {
        stored = client.stored_response("ORD-2").await.unwrap();
        if stored.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let stored = stored.expect("late report stored");
    assert_eq!(stored.get_field(tags::ORD_STATUS), Some("2"));

    // The id is free again after the timeout.
    let err = client.send_order(&limit("ORD-2")).await.unwrap_err();
    assert!(matches!(err, BridgeError::ResponseTimeout { .. }));

    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_abandoned_order_frees_its_id() {
    let config = config().with_response_timeout(Duration::from_millis(300));
    let (client, _factory) = client(
        LoopbackBehavior::default().with_fill_mode(FillMode::Silent),
        config,
    );
    client.start().await.unwrap();

    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), client.send_order(&limit("ORD-L"))).await;
    assert!(abandoned.is_err());

    let err = client.send_order(&limit("ORD-L")).await.unwrap_err();
    assert_eq!(
        err,
        BridgeError::ResponseTimeout {
            correlation_id: "ORD-L".to_string(),
            timeout_ms: 300,
        }
    );
    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_failed_start_leaves_nothing_running() {
    let config = config()
        .with_logon_timeout(Duration::from_millis(200))
        .with_heartbeat(Duration::from_millis(20), Duration::from_millis(5));
    let (client, factory) = client(LoopbackBehavior::unreachable(), config);

    let err = client.start().await.unwrap_err();
    assert_eq!(err, BridgeError::ConnectionTimeout { timeout_ms: 200 });
    assert_eq!(client.state(), LifecycleState::Idle);
    assert!(client.session_id().is_none());
    assert!(!client.heartbeat_running());

    let engine = engine(&factory);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(engine.sent_count(&MsgType::Heartbeat), 0);
    assert!(!engine.inject(Message::with_msg_type(MsgType::Heartbeat)));

    assert_eq!(
        client.send_order(&limit("ORD-X")).await.unwrap_err(),
        BridgeError::NotConnected
    );
}

#[tokio::test]
async fn test_stop_without_start() {
    let (client, factory) = client(LoopbackBehavior::default(), config());
    client.stop().await.unwrap();
    client.stop().await.unwrap();
    assert_eq!(client.state(), LifecycleState::Idle);
    assert!(factory.last_engine().is_none());
}

#[tokio::test]
async fn test_restart_after_stop() {
    let (client, factory) = client(LoopbackBehavior::default(), config());
    client.start().await.unwrap();
    client.stop().await.unwrap();
    let first = engine(&factory);
    assert_eq!(first.sent_count(&MsgType::Logout), 1);

    client.start().await.unwrap();
    assert!(!Arc::ptr_eq(&first, &engine(&factory)));
    let response = client.send_order(&limit("ORD-R")).await.unwrap();
    assert_eq!(response.ord_status(), Some("2"));
    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_cancel_round_trip() {
    let (client, _factory) = client(
        LoopbackBehavior::default().with_fill_mode(FillMode::Ack),
        config(),
    );
    client.start().await.unwrap();

    let ack = client.send_order(&limit("ORD-3")).await.unwrap();
    assert_eq!(ack.ord_status(), Some("0"));

    let cancel = CancelRequest::new("ORD-3", "AAPL", Side::Sell, Decimal::from(100));
    let canceled = client.cancel_order(&cancel).await.unwrap();
    assert!(canceled.cl_ord_id.starts_with("C-"));
    assert_eq!(canceled.ord_status(), Some("4"));
    assert_eq!(canceled.report.get_field(tags::ORIG_CL_ORD_ID), Some("ORD-3"));
    assert!(!canceled.is_cancel_reject());

    // Already canceled.
    let again = client.cancel_order(&cancel).await.unwrap();
    assert!(again.is_cancel_reject());
    assert_eq!(again.report.get_field(tags::CXL_REJ_REASON), Some("0"));

    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_cancel_reject_resolves_cancel() {
    let (client, _factory) = client(
        LoopbackBehavior::default()
            .with_fill_mode(FillMode::Ack)
            .with_reject_cancels(true),
        config(),
    );
    client.start().await.unwrap();
    client.send_order(&limit("ORD-4")).await.unwrap();

    let cancel =
        CancelRequest::new("ORD-4", "AAPL", Side::Sell, Decimal::from(100)).with_cl_ord_id("C-OWN");
    let response = client.cancel_order(&cancel).await.unwrap();
    assert_eq!(response.cl_ord_id, "C-OWN");
    assert!(response.is_cancel_reject());
    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_refused_send_is_reported() {
    let (client, _factory) = client(
        LoopbackBehavior::default().with_refuse_sends(true),
        config(),
    );
    client.start().await.unwrap();
    let err = client.send_order(&limit("ORD-5")).await.unwrap_err();
    assert!(matches!(err, BridgeError::SendFailed { ref msg_type, .. } if msg_type == "D"));
    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_invalid_order_is_not_sent() {
    let (client, factory) = client(LoopbackBehavior::default(), config());
    client.start().await.unwrap();

    let mut order = limit("ORD-6");
    order.price = None;
    assert!(matches!(
        client.send_order(&order).await,
        Err(BridgeError::InvalidOrder(_))
    ));
    assert_eq!(engine(&factory).sent_count(&MsgType::NewOrderSingle), 0);
    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_orders_get_their_own_reports() {
    let (client, _factory) = client(LoopbackBehavior::default(), config());
    let client = Arc::new(client);
    client.start().await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..16 {
        let client = Arc::clone(&client);
        tasks.push(tokio::spawn(async move {
            let order = NewOrder::market("MSFT", Side::Buy, Decimal::from(i + 1));
            client.send_order(&order).await
        }));
    }
    for (i, task) in tasks.into_iter().enumerate() {
        let response = task.await.unwrap().unwrap();
        assert_eq!(response.cl_ord_id.len(), 16);
        assert_eq!(
            response.report.get_field(tags::CL_ORD_ID),
            Some(response.cl_ord_id.as_str())
        );
        assert_eq!(
            response.report.get_field(tags::ORDER_QTY),
            Some((i + 1).to_string().as_str())
        );
    }
    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_does_not_wake_pending_orders() {
    let config = config().with_response_timeout(Duration::from_millis(300));
    let (client, _factory) = client(
        LoopbackBehavior::default().with_fill_mode(FillMode::Silent),
        config,
    );
    let client = Arc::new(client);
    client.start().await.unwrap();

    let pending = {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            let started = Instant::now();
            let result = client.send_order(&limit("ORD-7")).await;
            (result, started.elapsed())
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.stop().await.unwrap();

    let (result, elapsed) = pending.await.unwrap();
    assert!(matches!(result, Err(BridgeError::ResponseTimeout { .. })));
    assert!(elapsed >= Duration::from_millis(300));
}

#[tokio::test]
async fn test_resend_request_is_answered_with_gap_fill() {
    let (client, factory) = client(
        LoopbackBehavior::default().with_resend_after_logon(1, 5),
        config(),
    );
    client.start().await.unwrap();
    let engine = engine(&factory);

    assert!(eventually(|| engine.sent_count(&MsgType::SequenceReset) == 1).await);
    let gap_fill = engine
        .sent_messages()
        .into_iter()
        .find(|m| m.msg_type() == Some(MsgType::SequenceReset))
        .unwrap();
    assert_eq!(gap_fill.get_field(tags::NEW_SEQ_NO), Some("6"));
    assert_eq!(gap_fill.get_field(tags::GAP_FILL_FLAG), Some("Y"));
    assert_eq!(gap_fill.get_field(tags::TARGET_COMP_ID), Some("VENUE"));

    // Admin traffic never reaches order callers.
    let response = client.send_order(&limit("ORD-8")).await.unwrap();
    assert_eq!(response.ord_status(), Some("2"));
    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_heartbeat_cadence_and_stop() {
    let config = config().with_heartbeat(Duration::from_millis(100), Duration::from_millis(10));
    let (client, factory) = client(LoopbackBehavior::default(), config);
    client.start().await.unwrap();
    assert!(client.heartbeat_running());
    let engine = engine(&factory);

    tokio::time::sleep(Duration::from_millis(350)).await;
    let sent = engine.sent_count(&MsgType::Heartbeat);
    assert!((2..=4).contains(&sent), "sent {sent} heartbeats");

    client.stop().await.unwrap();
    assert!(!client.heartbeat_running());
    let after_stop = engine.sent_count(&MsgType::Heartbeat);
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(engine.sent_count(&MsgType::Heartbeat), after_stop);
}

#[tokio::test]
async fn test_logon_carries_reset_flag() {
    let (client, factory) = client(LoopbackBehavior::default(), config());
    client.start().await.unwrap();
    let logon = engine(&factory).sent_messages().remove(0);
    assert_eq!(logon.msg_type(), Some(MsgType::Logon));
    assert_eq!(logon.get_field(tags::RESET_SEQ_NUM_FLAG), Some("Y"));
    client.stop().await.unwrap();

    let (client, factory) = {
        let factory = Arc::new(LoopbackFactory::new(LoopbackBehavior::default()));
        let client = FixClient::new(session().with_reset_on_logon(false), config(), factory.clone());
        (client, factory)
    };
    client.start().await.unwrap();
    let logon = engine(&factory).sent_messages().remove(0);
    assert!(!logon.has_field(tags::RESET_SEQ_NUM_FLAG));
    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_feed_and_outbound_store() {
    let (client, _factory) = client(LoopbackBehavior::default(), config());
    let mut rx = client.feed().subscribe();
    client.start().await.unwrap();
    client.send_order(&limit("ORD-9")).await.unwrap();

    let entries = client.feed().snapshot();
    let order = entries
        .iter()
        .find(|e| e.msg_type == "D")
        .expect("order in feed");
    assert_eq!(order.direction, Direction::Outbound);
    assert_eq!(order.field("ClOrdID"), Some("ORD-9"));
    assert!(order.raw.contains("|35=D|"));

    let report = entries
        .iter()
        .find(|e| e.msg_type == "8")
        .expect("report in feed");
    assert_eq!(report.direction, Direction::Inbound);
    assert_eq!(report.field("OrdStatus"), Some("2"));

    let json = serde_json::to_value(report).unwrap();
    assert_eq!(json["direction"], "inbound");
    assert_eq!(json["fields"]["ClOrdID"], "ORD-9");

    let first = rx.recv().await.unwrap();
    assert_eq!(first.msg_type_name, "Logon");
    assert!(!client.outbound().is_empty());

    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_logout_reply_after_stop_only_reaches_the_feed() {
    let config = config().with_logout_grace(Duration::from_millis(100));
    let (client, _factory) = client(LoopbackBehavior::default(), config);
    client.start().await.unwrap();
    assert!(client.is_connected());

    client.stop().await.unwrap();
    assert!(!client.is_connected());
    let reply = client
        .feed()
        .snapshot()
        .into_iter()
        .find(|e| e.msg_type == "5" && e.direction == Direction::Inbound);
    assert!(reply.is_some(), "venue logout reply is in the feed");
}
