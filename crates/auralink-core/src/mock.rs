//! Test doubles for the push channel and the REST backend.
//!
//! These let the connection and the state components be exercised without a
//! running backend.
//!
//! - [`MockTransport`] / [`MockBroker`] / [`MockSession`]: an in-memory
//!   transport. The test plays the broker side of each link.
//! - [`MockSensorSource`]: a [`SensorSource`] with a configurable snapshot and
//!   per-device histories.
//! - [`MockEmailBackend`]: an in-memory mailbox implementing [`EmailBackend`].
//!
//! # Features
//!
//! - **Failure injection**: fail the next N link opens, or any REST call
//! - **Latency simulation**: delay link opens or individual history fetches
//! - **Call counting**: assert how many requests a component made

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use auralink_types::{
    AirQualityStatus, ApiMessage, EmailMessage, EmailRequest, EmailStats, HealthStatus, Priority,
    SensorReading,
};

use crate::error::{Error, Result};
use crate::http::{ApiError, ApiResult};
use crate::stomp::{self, Command, Frame, Incoming};
use crate::traits::{EmailBackend, SensorSource};
use crate::transport::{Link, Transport};

// ==========================================================================
// Push channel
// ==========================================================================

struct TransportInner {
    sessions: mpsc::UnboundedSender<MockSession>,
    fail_opens: AtomicU32,
    open_latency_ms: AtomicU64,
    open_count: AtomicU32,
}

/// In-memory [`Transport`]. Every successful open hands a [`MockSession`] to
/// the paired [`MockBroker`].
///
/// # Example
///
/// ```
/// use auralink_core::{ConnectionOptions, LiveConnection, MockTransport};
///
/// #[tokio::main]
/// async fn main() {
///     let (transport, mut broker) = MockTransport::new();
///     let connection = LiveConnection::new(transport, ConnectionOptions::default()).unwrap();
///     connection.connect();
///
///     let mut session = broker.accept().await.unwrap();
///     session.complete_handshake().await.unwrap();
///     connection.disconnect().await;
/// }
/// ```
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<TransportInner>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("open_count", &self.open_count())
            .finish()
    }
}

impl MockTransport {
    /// Create a transport and the broker that receives its sessions.
    pub fn new() -> (Self, MockBroker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            inner: Arc::new(TransportInner {
                sessions: tx,
                fail_opens: AtomicU32::new(0),
                open_latency_ms: AtomicU64::new(0),
                open_count: AtomicU32::new(0),
            }),
        };
        (transport, MockBroker { sessions: rx })
    }

    /// Fail the next `count` open attempts.
    pub fn fail_next_opens(&self, count: u32) {
        self.inner.fail_opens.store(count, Ordering::SeqCst);
    }

    /// Delay every open by `latency`.
    pub fn set_open_latency(&self, latency: Duration) {
        self.inner
            .open_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Number of open attempts so far, failed ones included.
    pub fn open_count(&self) -> u32 {
        self.inner.open_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self) -> Result<Box<dyn Link>> {
        self.inner.open_count.fetch_add(1, Ordering::SeqCst);

        let latency = self.inner.open_latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        let failing = self
            .inner
            .fail_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::Transport("mock open failure".to_string()));
        }

        let (to_server, inbound) = mpsc::unbounded_channel();
        let (outbound, from_server) = mpsc::unbounded_channel();
        let session = MockSession {
            inbound,
            outbound: Some(outbound),
            pending: VecDeque::new(),
            subscriptions: Vec::new(),
            message_seq: 0,
        };
        self.inner
            .sessions
            .send(session)
            .map_err(|_| Error::Transport("mock broker dropped".to_string()))?;

        Ok(Box::new(MockLink {
            tx: Some(to_server),
            rx: from_server,
        }))
    }

    fn describe(&self) -> String {
        "mock://broker".to_string()
    }
}

struct MockLink {
    tx: Option<mpsc::UnboundedSender<String>>,
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl Link for MockLink {
    async fn send(&mut self, payload: String) -> Result<()> {
        self.tx
            .as_ref()
            .ok_or(Error::NotConnected)?
            .send(payload)
            .map_err(|_| Error::ConnectionClosed)
    }

    async fn recv(&mut self) -> Result<Option<String>> {
        Ok(self.rx.recv().await)
    }

    async fn close(&mut self) -> Result<()> {
        self.tx = None;
        Ok(())
    }
}

/// Broker side of a [`MockTransport`].
pub struct MockBroker {
    sessions: mpsc::UnboundedReceiver<MockSession>,
}

impl MockBroker {
    /// Wait for the client to open the next link.
    pub async fn accept(&mut self) -> Option<MockSession> {
        self.sessions.recv().await
    }
}

/// Broker side of one link.
pub struct MockSession {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    pending: VecDeque<Frame>,
    subscriptions: Vec<(String, String)>,
    message_seq: u64,
}

impl MockSession {
    /// Next frame sent by the client, skipping heart-beats and malformed data.
    ///
    /// Returns `None` once the client has closed the link.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Some(frame);
            }
            let text = self.inbound.recv().await?;
            if let Ok(items) = stomp::decode_all(&text) {
                self.pending.extend(items.into_iter().filter_map(|item| match item {
                    Incoming::Frame(frame) => Some(frame),
                    Incoming::Heartbeat => None,
                }));
            }
        }
    }

    /// Next frame, which must be a `command` frame.
    pub async fn expect(&mut self, command: Command) -> Result<Frame> {
        match self.next_frame().await {
            Some(frame) if frame.command == command => Ok(frame),
            Some(frame) => Err(Error::Frame(format!(
                "expected {}, got {}",
                command, frame.command
            ))),
            None => Err(Error::ConnectionClosed),
        }
    }

    /// Send raw text to the client.
    pub fn send_raw(&self, text: impl Into<String>) -> Result<()> {
        self.outbound
            .as_ref()
            .ok_or(Error::ConnectionClosed)?
            .send(text.into())
            .map_err(|_| Error::ConnectionClosed)
    }

    pub fn send_frame(&self, frame: &Frame) -> Result<()> {
        self.send_raw(frame.encode())
    }

    /// Answer CONNECT with CONNECTED, heart-beats disabled.
    pub async fn accept_stomp(&mut self) -> Result<Frame> {
        self.accept_stomp_with_heartbeat("0,0").await
    }

    /// Answer CONNECT with CONNECTED advertising `heart_beat`.
    pub async fn accept_stomp_with_heartbeat(&mut self, heart_beat: &str) -> Result<Frame> {
        let connect = self.expect(Command::Connect).await?;
        self.send_frame(
            &Frame::new(Command::Connected)
                .header("version", "1.2")
                .header("heart-beat", heart_beat),
        )?;
        Ok(connect)
    }

    /// Read the two SUBSCRIBE frames and remember their ids.
    pub async fn read_subscriptions(&mut self) -> Result<Vec<Frame>> {
        let mut frames = Vec::with_capacity(2);
        for _ in 0..2 {
            let frame = self.expect(Command::Subscribe).await?;
            let id = frame.get("id").unwrap_or_default().to_string();
            let destination = frame.get("destination").unwrap_or_default().to_string();
            self.subscriptions.push((id, destination));
            frames.push(frame);
        }
        Ok(frames)
    }

    /// CONNECT, both SUBSCRIBEs and the handshake SEND, which is returned.
    pub async fn complete_handshake(&mut self) -> Result<Frame> {
        self.accept_stomp().await?;
        self.read_subscriptions().await?;
        self.expect(Command::Send).await
    }

    /// Deliver `body` as a MESSAGE on the subscription for `destination`.
    pub fn publish(&mut self, destination: &str, body: &str) -> Result<()> {
        let id = self
            .subscriptions
            .iter()
            .find(|(_, d)| d == destination)
            .map(|(id, _)| id.clone())
            .ok_or_else(|| Error::Frame(format!("no subscription for {}", destination)))?;
        self.message_seq += 1;
        let frame = Frame::new(Command::Message)
            .header("destination", destination)
            .header("subscription", id)
            .header("message-id", format!("mock-{}", self.message_seq))
            .header("content-type", "application/json")
            .with_body(body);
        self.send_frame(&frame)
    }

    /// Send an ERROR frame.
    pub fn send_error(&self, message: &str) -> Result<()> {
        self.send_frame(&Frame::new(Command::Error).header("message", message))
    }

    /// Close the server side of the link.
    pub fn close(&mut self) {
        self.outbound = None;
    }
}

// ==========================================================================
// REST fakes
// ==========================================================================

fn server_error() -> ApiError {
    ApiError::Api {
        status: 500,
        message: "mock failure".to_string(),
    }
}

fn not_found(what: &str) -> ApiError {
    ApiError::Api {
        status: 404,
        message: format!("{} not found", what),
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// A reading with plausible values.
pub fn sample_reading(device_id: &str, timestamp: i64) -> SensorReading {
    SensorReading {
        device_id: device_id.to_string(),
        timestamp,
        temperature: 22.5,
        humidity: 45.0,
        air_quality_raw: Some(480),
        co2: 620,
        nh3: 2,
        ch4: 5,
        co: 1,
        air_quality_status: AirQualityStatus::Good,
        motion_detected: false,
        received_at: None,
    }
}

/// A received, unread message.
pub fn sample_email(id: &str) -> EmailMessage {
    EmailMessage {
        id: id.to_string(),
        from: "sensor-ops@example.com".to_string(),
        to: vec!["me@example.com".to_string()],
        subject: format!("Message {}", id),
        body: "Body".to_string(),
        status: "RECEIVED".to_string(),
        received_at: Some("2024-06-10T08:00:00".to_string()),
        priority: Some("MEDIUM".to_string()),
        ..Default::default()
    }
}

/// In-memory [`SensorSource`].
#[derive(Debug, Default)]
pub struct MockSensorSource {
    snapshot: RwLock<Vec<SensorReading>>,
    histories: RwLock<HashMap<String, Vec<SensorReading>>>,
    history_delays: RwLock<HashMap<String, Duration>>,
    should_fail: AtomicBool,
    history_should_fail: AtomicBool,
    history_calls: AtomicU32,
}

impl MockSensorSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_snapshot(&self, readings: Vec<SensorReading>) {
        *write(&self.snapshot) = readings;
    }

    /// Set the history of one device, newest first.
    pub fn set_history(&self, device_id: &str, readings: Vec<SensorReading>) {
        write(&self.histories).insert(device_id.to_string(), readings);
    }

    /// Delay history responses for one device.
    pub fn set_history_delay(&self, device_id: &str, delay: Duration) {
        write(&self.history_delays).insert(device_id.to_string(), delay);
    }

    /// Fail every request.
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    /// Fail history requests only.
    pub fn set_history_should_fail(&self, fail: bool) {
        self.history_should_fail.store(fail, Ordering::SeqCst);
    }

    pub fn history_calls(&self) -> u32 {
        self.history_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SensorSource for MockSensorSource {
    async fn all_sensors(&self) -> ApiResult<Vec<SensorReading>> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        Ok(read(&self.snapshot).clone())
    }

    async fn sensor(&self, device_id: &str) -> ApiResult<Option<SensorReading>> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        Ok(read(&self.snapshot)
            .iter()
            .find(|r| r.device_id == device_id)
            .cloned())
    }

    async fn history(&self, device_id: &str) -> ApiResult<Vec<SensorReading>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        let delay = read(&self.history_delays).get(device_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.should_fail.load(Ordering::SeqCst)
            || self.history_should_fail.load(Ordering::SeqCst)
        {
            return Err(server_error());
        }
        Ok(read(&self.histories)
            .get(device_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// In-memory [`EmailBackend`].
#[derive(Debug, Default)]
pub struct MockEmailBackend {
    sent: RwLock<Vec<EmailMessage>>,
    received: RwLock<Vec<EmailMessage>>,
    incoming: RwLock<Vec<EmailMessage>>,
    should_fail: AtomicBool,
    fail_mutations: AtomicBool,
    request_count: AtomicU32,
    mark_read_calls: AtomicU32,
    received_delay: RwLock<Option<Duration>>,
}

impl MockEmailBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_received(&self, messages: Vec<EmailMessage>) {
        *write(&self.received) = messages;
    }

    pub fn set_sent(&self, messages: Vec<EmailMessage>) {
        *write(&self.sent) = messages;
    }

    /// Messages that the next [`fetch`](EmailBackend::fetch) moves into the inbox.
    pub fn queue_incoming(&self, message: EmailMessage) {
        write(&self.incoming).push(message);
    }

    /// Fail every request.
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    /// Fail mark-read and delete requests only.
    pub fn set_fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    /// Delay the unfiltered received list by `delay`.
    pub fn set_received_delay(&self, delay: Duration) {
        *write(&self.received_delay) = Some(delay);
    }

    pub fn request_count(&self) -> u32 {
        self.request_count.load(Ordering::SeqCst)
    }

    pub fn mark_read_calls(&self) -> u32 {
        self.mark_read_calls.load(Ordering::SeqCst)
    }

    /// Server-side copy of a received message.
    pub fn received_message(&self, id: &str) -> Option<EmailMessage> {
        read(&self.received).iter().find(|m| m.id == id).cloned()
    }

    fn begin(&self) -> ApiResult<()> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        Ok(())
    }

    fn begin_mutation(&self) -> ApiResult<()> {
        self.begin()?;
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        Ok(())
    }

    fn record_sent(&self, to: Vec<String>, subject: String, body: String) -> EmailMessage {
        let message = EmailMessage {
            id: uuid::Uuid::new_v4().to_string(),
            from: "auralink@example.com".to_string(),
            to,
            subject,
            body,
            status: "SENT".to_string(),
            sent_at: Some("2024-06-10T08:00:00".to_string()),
            ..Default::default()
        };
        write(&self.sent).push(message.clone());
        message
    }
}

fn message(text: &str) -> ApiMessage {
    ApiMessage {
        message: text.to_string(),
        count: None,
    }
}

#[async_trait]
impl EmailBackend for MockEmailBackend {
    async fn send(&self, request: &EmailRequest) -> ApiResult<EmailMessage> {
        self.begin()?;
        let mut sent = self.record_sent(
            request.to.clone(),
            request.subject.clone(),
            request.body.clone(),
        );
        sent.cc = request.cc.clone();
        sent.bcc = request.bcc.clone();
        sent.is_html = request.is_html;
        Ok(sent)
    }

    async fn send_simple(&self, to: &str, subject: &str, body: &str) -> ApiResult<EmailMessage> {
        self.begin()?;
        Ok(self.record_sent(vec![to.to_string()], subject.to_string(), body.to_string()))
    }

    async fn send_alert(
        &self,
        to: &str,
        alert_type: &str,
        message: &str,
    ) -> ApiResult<EmailMessage> {
        self.begin()?;
        Ok(self.record_sent(
            vec![to.to_string()],
            format!("AuraLink Sensor Alert: {}", alert_type),
            message.to_string(),
        ))
    }

    async fn sent(&self) -> ApiResult<Vec<EmailMessage>> {
        self.begin()?;
        Ok(read(&self.sent).clone())
    }

    async fn sent_by_id(&self, id: &str) -> ApiResult<Option<EmailMessage>> {
        self.begin()?;
        Ok(read(&self.sent).iter().find(|m| m.id == id).cloned())
    }

    async fn received(&self) -> ApiResult<Vec<EmailMessage>> {
        self.begin()?;
        let delay = *read(&self.received_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(read(&self.received).clone())
    }

    async fn received_by_id(&self, id: &str) -> ApiResult<Option<EmailMessage>> {
        self.begin()?;
        Ok(self.received_message(id))
    }

    async fn by_priority(&self, priority: Priority) -> ApiResult<Vec<EmailMessage>> {
        self.begin()?;
        Ok(read(&self.received)
            .iter()
            .filter(|m| m.priority() == Some(priority))
            .cloned()
            .collect())
    }

    async fn search(&self, query: &str) -> ApiResult<Vec<EmailMessage>> {
        self.begin()?;
        let query = query.to_lowercase();
        let matches = |m: &&EmailMessage| {
            m.subject.to_lowercase().contains(&query)
                || m.body.to_lowercase().contains(&query)
                || m.from.to_lowercase().contains(&query)
        };
        let received = read(&self.received);
        let sent = read(&self.sent);
        Ok(received
            .iter()
            .chain(sent.iter())
            .filter(matches)
            .cloned()
            .collect())
    }

    async fn stats(&self) -> ApiResult<EmailStats> {
        self.begin()?;
        let sent = read(&self.sent);
        let received = read(&self.received);
        Ok(EmailStats {
            sent_count: sent.len() as u64,
            received_count: received.len() as u64,
            unread_count: received.iter().filter(|m| !m.is_read).count() as u64,
            failed_count: sent.iter().filter(|m| m.is_failed()).count() as u64,
        })
    }

    async fn fetch(&self) -> ApiResult<Vec<EmailMessage>> {
        self.begin()?;
        let fetched: Vec<_> = write(&self.incoming).drain(..).collect();
        write(&self.received).extend(fetched.iter().cloned());
        Ok(fetched)
    }

    async fn mark_read(&self, id: &str) -> ApiResult<ApiMessage> {
        self.mark_read_calls.fetch_add(1, Ordering::SeqCst);
        self.begin_mutation()?;
        let mut received = write(&self.received);
        let email = received
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| not_found("Email"))?;
        email.is_read = true;
        Ok(message("Email marked as read"))
    }

    async fn mark_all_read(&self) -> ApiResult<ApiMessage> {
        self.begin_mutation()?;
        let mut count = 0;
        for email in write(&self.received).iter_mut().filter(|m| !m.is_read) {
            email.is_read = true;
            count += 1;
        }
        Ok(ApiMessage {
            message: "All emails marked as read".to_string(),
            count: Some(count),
        })
    }

    async fn delete_sent(&self, id: &str) -> ApiResult<ApiMessage> {
        self.begin_mutation()?;
        let mut sent = write(&self.sent);
        let before = sent.len();
        sent.retain(|m| m.id != id);
        if sent.len() == before {
            return Err(not_found("Sent email"));
        }
        Ok(message("Sent email deleted successfully"))
    }

    async fn delete_received(&self, id: &str) -> ApiResult<ApiMessage> {
        self.begin_mutation()?;
        let mut received = write(&self.received);
        let before = received.len();
        received.retain(|m| m.id != id);
        if received.len() == before {
            return Err(not_found("Received email"));
        }
        Ok(message("Received email deleted successfully"))
    }

    async fn clear_sent(&self) -> ApiResult<ApiMessage> {
        self.begin_mutation()?;
        write(&self.sent).clear();
        Ok(message("Sent emails cleared successfully"))
    }

    async fn clear_received(&self) -> ApiResult<ApiMessage> {
        self.begin_mutation()?;
        write(&self.received).clear();
        Ok(message("Received emails cleared successfully"))
    }

    async fn reprocess(&self, id: &str) -> ApiResult<Option<EmailMessage>> {
        self.begin()?;
        let mut received = write(&self.received);
        Ok(received.iter_mut().find(|m| m.id == id).map(|m| {
            m.summary = Some(format!("Summary of {}", m.subject));
            m.clone()
        }))
    }

    async fn reprocess_all(&self) -> ApiResult<Vec<EmailMessage>> {
        self.begin()?;
        let mut received = write(&self.received);
        for m in received.iter_mut() {
            m.summary = Some(format!("Summary of {}", m.subject));
        }
        Ok(received.clone())
    }

    async fn health(&self) -> ApiResult<HealthStatus> {
        self.begin()?;
        Ok(HealthStatus {
            status: "UP".to_string(),
            service: "Email Service".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_transport_round_trip() {
        let (transport, mut broker) = MockTransport::new();
        let mut link = transport.open().await.unwrap();
        let mut session = broker.accept().await.unwrap();

        link.send(Frame::new(Command::Connect).encode()).await.unwrap();
        let connect = session.accept_stomp().await.unwrap();
        assert_eq!(connect.command, Command::Connect);

        let reply = link.recv().await.unwrap().unwrap();
        assert!(reply.starts_with("CONNECTED\n"));
        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_transport_failure_injection() {
        let (transport, _broker) = MockTransport::new();
        transport.fail_next_opens(2);
        assert!(transport.open().await.is_err());
        assert!(transport.open().await.is_err());
        assert!(transport.open().await.is_ok());
        assert_eq!(transport.open_count(), 3);
    }

    #[tokio::test]
    async fn test_closing_either_side() {
        let (transport, mut broker) = MockTransport::new();
        let mut link = transport.open().await.unwrap();
        let mut session = broker.accept().await.unwrap();

        session.close();
        assert_eq!(link.recv().await.unwrap(), None);

        link.close().await.unwrap();
        assert!(session.next_frame().await.is_none());
        assert!(link.send("x".into()).await.is_err());
    }

    #[tokio::test]
    async fn test_publish_requires_subscription() {
        let (transport, mut broker) = MockTransport::new();
        let _link = transport.open().await.unwrap();
        let mut session = broker.accept().await.unwrap();
        assert!(session.publish("/topic/sensors", "{}").is_err());
    }

    #[tokio::test]
    async fn test_mock_sensor_source() {
        let source = MockSensorSource::new();
        source.set_snapshot(vec![sample_reading("A", 1)]);
        source.set_history("A", vec![sample_reading("A", 1)]);

        assert_eq!(source.all_sensors().await.unwrap().len(), 1);
        assert!(source.sensor("A").await.unwrap().is_some());
        assert!(source.sensor("Z").await.unwrap().is_none());
        assert!(source.history("Z").await.unwrap().is_empty());
        assert_eq!(source.history_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_email_backend_stats_and_delete() {
        let backend = MockEmailBackend::new();
        backend.set_received(vec![sample_email("1"), sample_email("2")]);
        backend.mark_read("1").await.unwrap();

        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.received_count, 2);
        assert_eq!(stats.unread_count, 1);

        let err = backend.delete_received("nope").await.unwrap_err();
        assert!(err.is_not_found());
        backend.delete_received("2").await.unwrap();
        assert_eq!(backend.received().await.unwrap().len(), 1);
    }
}
