//! End-to-end tests of the live connection against the in-memory broker.
//!
//! Every test runs on a paused clock, so reconnect delays and heart-beat
//! windows elapse instantly once all tasks are idle.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use auralink_core::mock::{MockBroker, MockSensorSource, MockSession, MockTransport, sample_reading};
use auralink_core::stomp::Command;
use auralink_core::{
    ConnectionOptions, ConnectionState, Dashboard, DeviceStatusEvent, LiveConnection,
    SensorReading, Subscription,
};

const WAIT: Duration = Duration::from_secs(60);
const SENSORS: &str = "/topic/sensors";
const STATUS: &str = "/topic/status";

fn setup() -> (LiveConnection, MockTransport, MockBroker) {
    let (transport, broker) = MockTransport::new();
    let connection = LiveConnection::new(transport.clone(), ConnectionOptions::default()).unwrap();
    (connection, transport, broker)
}

async fn accept(broker: &mut MockBroker) -> MockSession {
    timeout(WAIT, broker.accept())
        .await
        .expect("no connection attempt")
        .expect("transport dropped")
}

async fn wait_for_state(connection: &LiveConnection, state: ConnectionState) {
    let mut rx = connection.watch_state();
    timeout(WAIT, rx.wait_for(|s| *s == state))
        .await
        .expect("state change timed out")
        .expect("state channel closed");
}

fn reading_json(device_id: &str, timestamp: i64) -> String {
    serde_json::to_string(&sample_reading(device_id, timestamp)).unwrap()
}

fn collect_readings(
    connection: &LiveConnection,
) -> (Subscription, mpsc::UnboundedReceiver<SensorReading>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sub = connection.on_sensor_data(move |reading| {
        let _ = tx.send(reading.clone());
    });
    (sub, rx)
}

async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    timeout(WAIT, rx.recv())
        .await
        .expect("no event delivered")
        .expect("listener dropped")
}

#[tokio::test(start_paused = true)]
async fn test_handshake_subscribes_and_announces() {
    let (connection, _transport, mut broker) = setup();
    connection.connect();

    let mut session = accept(&mut broker).await;
    let connect = session.accept_stomp().await.unwrap();
    assert_eq!(connect.get("heart-beat"), Some("4000,4000"));
    assert!(connect.get("accept-version").unwrap().contains("1.2"));

    let subscriptions = session.read_subscriptions().await.unwrap();
    let pairs: Vec<_> = subscriptions
        .iter()
        .map(|f| (f.get("id").unwrap(), f.get("destination").unwrap()))
        .collect();
    assert_eq!(pairs, [("sub-0", SENSORS), ("sub-1", STATUS)]);

    let handshake = session.expect(Command::Send).await.unwrap();
    assert_eq!(handshake.get("destination"), Some("/app/connect"));
    let body: serde_json::Value = serde_json::from_str(&handshake.body).unwrap();
    assert_eq!(body["clientId"], connection.client_id());
    assert!(body["timestamp"].as_i64().unwrap() > 0);

    wait_for_state(&connection, ConnectionState::Connected).await;
    assert!(connection.is_connected());
    connection.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_delivers_events_in_order() {
    let (connection, _transport, mut broker) = setup();
    let (_readings_sub, mut readings) = collect_readings(&connection);
    let (status_tx, mut statuses) = mpsc::unbounded_channel::<DeviceStatusEvent>();
    let _status_sub = connection.on_status(move |status| {
        let _ = status_tx.send(status.clone());
    });
    connection.connect();

    let mut session = accept(&mut broker).await;
    session.complete_handshake().await.unwrap();

    for ts in 1..=3 {
        session.publish(SENSORS, &reading_json("esp32-lab", ts)).unwrap();
    }
    let ack = format!(
        r#"{{"type":"connection_ack","message":"Connected","clientId":"{}","timestamp":1}}"#,
        connection.client_id()
    );
    session.publish(STATUS, &ack).unwrap();

    for ts in 1..=3 {
        assert_eq!(next(&mut readings).await.timestamp, ts);
    }
    let status = next(&mut statuses).await;
    assert!(status.acknowledges(connection.client_id()));

    connection.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_malformed_payload_keeps_subscription() {
    let (connection, _transport, mut broker) = setup();
    let (_sub, mut readings) = collect_readings(&connection);
    connection.connect();

    let mut session = accept(&mut broker).await;
    session.complete_handshake().await.unwrap();

    session.publish(SENSORS, "{not json").unwrap();
    session.send_raw("garbage that is not a frame\0").unwrap();
    session.publish(SENSORS, &reading_json("A", 42)).unwrap();

    assert_eq!(next(&mut readings).await.timestamp, 42);
    assert!(connection.is_connected());
    connection.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_oversized_content_length_is_dropped() {
    let (connection, transport, mut broker) = setup();
    let (_sub, mut readings) = collect_readings(&connection);
    connection.connect();

    let mut session = accept(&mut broker).await;
    session.complete_handshake().await.unwrap();
    wait_for_state(&connection, ConnectionState::Connected).await;

    session
        .send_raw(format!("MESSAGE\ncontent-length:{}\n\n\0", usize::MAX))
        .unwrap();
    session.publish(SENSORS, &reading_json("A", 7)).unwrap();

    assert_eq!(next(&mut readings).await.timestamp, 7);
    assert!(connection.is_connected());
    assert_eq!(transport.open_count(), 1);
    connection.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_resubscribes_after_reconnect() {
    let (connection, transport, mut broker) = setup();
    let (_sub, mut readings) = collect_readings(&connection);
    connection.connect();

    let mut first = accept(&mut broker).await;
    let first_handshake = first.complete_handshake().await.unwrap();
    wait_for_state(&connection, ConnectionState::Connected).await;

    first.close();
    wait_for_state(&connection, ConnectionState::Disconnected).await;

    let mut second = accept(&mut broker).await;
    let second_handshake = second.complete_handshake().await.unwrap();
    assert!(first_handshake.body.contains(connection.client_id()));
    assert!(second_handshake.body.contains(connection.client_id()));
    assert_eq!(transport.open_count(), 2);

    second.publish(SENSORS, &reading_json("A", 7)).unwrap();
    assert_eq!(next(&mut readings).await.timestamp, 7);
    connection.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_waits_fixed_delay() {
    let (connection, transport, mut broker) = setup();
    connection.connect();

    let mut session = accept(&mut broker).await;
    session.complete_handshake().await.unwrap();
    wait_for_state(&connection, ConnectionState::Connected).await;

    let dropped_at = tokio::time::Instant::now();
    session.close();
    let _second = accept(&mut broker).await;

    assert!(dropped_at.elapsed() >= Duration::from_secs(5));
    assert_eq!(transport.open_count(), 2);
    connection.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_opens_are_retried() {
    let (connection, transport, mut broker) = setup();
    transport.fail_next_opens(3);
    connection.connect();

    let mut session = accept(&mut broker).await;
    session.complete_handshake().await.unwrap();
    wait_for_state(&connection, ConnectionState::Connected).await;

    assert_eq!(transport.open_count(), 4);
    connection.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_broker_error_triggers_reconnect() {
    let (connection, transport, mut broker) = setup();
    connection.connect();

    let mut first = accept(&mut broker).await;
    first.complete_handshake().await.unwrap();
    first.send_error("session expired").unwrap();

    let mut second = accept(&mut broker).await;
    second.complete_handshake().await.unwrap();
    assert_eq!(transport.open_count(), 2);
    connection.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribed_listener_receives_nothing() {
    let (connection, _transport, mut broker) = setup();
    let removed_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&removed_calls);
    let removed = connection.on_sensor_data(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let (_kept, mut readings) = collect_readings(&connection);
    connection.connect();

    let mut session = accept(&mut broker).await;
    session.complete_handshake().await.unwrap();

    session.publish(SENSORS, &reading_json("A", 1)).unwrap();
    next(&mut readings).await;
    assert_eq!(removed_calls.load(Ordering::SeqCst), 1);

    removed.unsubscribe();
    removed.unsubscribe();
    session.publish(SENSORS, &reading_json("A", 2)).unwrap();
    next(&mut readings).await;
    assert_eq!(removed_calls.load(Ordering::SeqCst), 1);

    connection.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_panicking_listener_does_not_block_others() {
    let (connection, _transport, mut broker) = setup();
    let _bad = connection.on_sensor_data(|_| panic!("listener failure"));
    let (_good, mut readings) = collect_readings(&connection);
    connection.connect();

    let mut session = accept(&mut broker).await;
    session.complete_handshake().await.unwrap();
    session.publish(SENSORS, &reading_json("A", 1)).unwrap();
    session.publish(SENSORS, &reading_json("A", 2)).unwrap();

    assert_eq!(next(&mut readings).await.timestamp, 1);
    assert_eq!(next(&mut readings).await.timestamp, 2);
    connection.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_is_graceful() {
    let (connection, _transport, mut broker) = setup();
    connection.connect();

    let mut session = accept(&mut broker).await;
    session.complete_handshake().await.unwrap();
    wait_for_state(&connection, ConnectionState::Connected).await;

    connection.disconnect().await;

    let first = session.expect(Command::Unsubscribe).await.unwrap();
    let second = session.expect(Command::Unsubscribe).await.unwrap();
    assert_eq!(first.get("id"), Some("sub-0"));
    assert_eq!(second.get("id"), Some("sub-1"));
    session.expect(Command::Disconnect).await.unwrap();
    assert!(session.next_frame().await.is_none());
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_handshake_closes_link() {
    let (connection, _transport, mut broker) = setup();
    connection.connect();

    let mut session = accept(&mut broker).await;
    session.expect(Command::Connect).await.unwrap();
    assert_eq!(connection.state(), ConnectionState::Connecting);

    connection.disconnect().await;

    let mut unsubscribed = Vec::new();
    loop {
        let frame = session.next_frame().await.expect("link closed before DISCONNECT");
        match frame.command {
            Command::Unsubscribe => unsubscribed.push(frame.get("id").unwrap().to_string()),
            Command::Disconnect => break,
            other => panic!("unexpected {} after cancel", other),
        }
    }
    assert_eq!(unsubscribed, ["sub-0", "sub-1"]);
    assert!(session.next_frame().await.is_none());
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_connect_and_disconnect_are_idempotent() {
    let (connection, transport, mut broker) = setup();

    connection.disconnect().await;
    assert_eq!(connection.state(), ConnectionState::Disconnected);

    connection.connect();
    connection.connect();
    let mut session = accept(&mut broker).await;
    session.complete_handshake().await.unwrap();
    wait_for_state(&connection, ConnectionState::Connected).await;
    connection.connect();

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(transport.open_count(), 1);

    connection.disconnect().await;
    connection.disconnect().await;
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_while_retrying() {
    let (connection, transport, _broker) = setup();
    transport.fail_next_opens(u32::MAX);
    connection.connect();

    tokio::time::sleep(Duration::from_secs(12)).await;
    connection.disconnect().await;
    let attempts = transport.open_count();
    assert!(attempts >= 2);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.open_count(), attempts);
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_silent_server_trips_heartbeat_watchdog() {
    let (connection, transport, mut broker) = setup();
    connection.connect();

    let mut session = accept(&mut broker).await;
    session.accept_stomp_with_heartbeat("4000,4000").await.unwrap();
    session.read_subscriptions().await.unwrap();
    session.expect(Command::Send).await.unwrap();
    wait_for_state(&connection, ConnectionState::Connected).await;

    // No inbound traffic: the link is declared dead and a new one is opened.
    let _second = accept(&mut broker).await;
    assert_eq!(transport.open_count(), 2);
    connection.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_dashboard_follows_push_channel() {
    let source = MockSensorSource::new();
    source.set_snapshot(vec![sample_reading("A", 10), sample_reading("B", 10)]);
    source.set_history("A", vec![sample_reading("A", 10)]);
    let dashboard = Dashboard::new(source);
    dashboard.load().await.unwrap();

    let (connection, _transport, mut broker) = setup();
    let _feed = dashboard.attach(&connection);
    let mut view = dashboard.subscribe();
    let _ = view.borrow_and_update();
    connection.connect();

    let mut session = accept(&mut broker).await;
    session.complete_handshake().await.unwrap();
    session.publish(SENSORS, &reading_json("C", 11)).unwrap();
    session.publish(SENSORS, &reading_json("A", 12)).unwrap();

    let state = timeout(
        WAIT,
        view.wait_for(|v| v.latest.as_ref().is_some_and(|r| r.timestamp == 12)),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();
    assert_eq!(state.devices, ["A", "B", "C"]);
    assert_eq!(state.history.len(), 2);
    assert!(state.history.iter().all(|r| r.device_id == "A"));

    connection.disconnect().await;
}
