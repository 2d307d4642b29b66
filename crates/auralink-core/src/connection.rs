//! The live push connection.
//!
//! [`LiveConnection`] owns one logical STOMP session to the backend. A
//! background task opens a link through the configured [`Transport`],
//! performs the STOMP handshake, subscribes both topics, announces the client
//! and then pumps inbound frames into the [`CallbackRegistry`]. When the link
//! drops, the task waits for the reconnect delay and starts over; callers
//! never see connection errors, which are only logged.
//!
//! ```text
//! disconnected ──connect()──▶ connecting ──CONNECTED──▶ connected
//!      ▲                          │                         │
//!      └──── error / delay ───────┴──────── link lost ──────┘
//! ```
//!
//! One connection is meant to be shared by every consumer. Listeners attach
//! and detach through [`on_sensor_data`](LiveConnection::on_sensor_data) and
//! [`on_status`](LiveConnection::on_status) without affecting the session.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, sleep, sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use auralink_types::{DeviceStatusEvent, SensorReading};

use crate::error::{Error, Result};
use crate::reconnect::ReconnectOptions;
use crate::registry::{CallbackRegistry, Subscription};
use crate::router::{RoutedEvent, TopicConfig, TopicRouter, generate_client_id, now_millis};
use crate::stomp::{self, Command, Frame, HeartBeat, Incoming};
use crate::transport::{Link, Transport, TransportMode, WebSocketTransport};

/// Default push endpoint of a locally running backend.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080/ws";

/// Heart-beat interval offered in each direction.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(4);

/// Time allowed for opening the link and completing the STOMP handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// STOMP versions offered in CONNECT.
const ACCEPT_VERSION: &str = "1.2,1.1,1.0";

/// Options for the live connection.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Reconnection policy.
    pub reconnect: ReconnectOptions,
    /// Interval at which we offer to send heart-beats.
    pub heartbeat_send: Duration,
    /// Interval at which we want to receive heart-beats.
    pub heartbeat_receive: Duration,
    /// Timeout for each of link open and STOMP handshake.
    pub connect_timeout: Duration,
    /// Broker destinations.
    pub topics: TopicConfig,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            reconnect: ReconnectOptions::default(),
            heartbeat_send: DEFAULT_HEARTBEAT,
            heartbeat_receive: DEFAULT_HEARTBEAT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            topics: TopicConfig::default(),
        }
    }
}

impl ConnectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn reconnect(mut self, reconnect: ReconnectOptions) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Set the heart-beat intervals. Zero disables a direction.
    #[must_use]
    pub fn heartbeat(mut self, send: Duration, receive: Duration) -> Self {
        self.heartbeat_send = send;
        self.heartbeat_receive = receive;
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn topics(mut self, topics: TopicConfig) -> Self {
        self.topics = topics;
        self
    }

    /// Validate the options and return an error if invalid.
    pub fn validate(&self) -> Result<()> {
        self.reconnect.validate()?;
        self.topics.validate()?;
        if self.connect_timeout.is_zero() {
            return Err(Error::invalid_config("connect_timeout must be > 0"));
        }
        Ok(())
    }

    fn heart_beat(&self) -> HeartBeat {
        HeartBeat::new(self.heartbeat_send, self.heartbeat_receive)
    }
}

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        })
    }
}

struct SessionHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Everything the session task needs, cloned out of the connection.
#[derive(Clone)]
struct Session {
    transport: Arc<dyn Transport>,
    options: ConnectionOptions,
    router: TopicRouter,
    registry: CallbackRegistry,
    state: Arc<watch::Sender<ConnectionState>>,
}

/// A shared, self-healing push connection.
pub struct LiveConnection {
    transport: Arc<dyn Transport>,
    options: ConnectionOptions,
    router: TopicRouter,
    registry: CallbackRegistry,
    state: Arc<watch::Sender<ConnectionState>>,
    session: Mutex<Option<SessionHandle>>,
}

impl LiveConnection {
    /// Create a connection over `transport`. Nothing is opened until
    /// [`connect`](Self::connect).
    pub fn new<T: Transport + 'static>(transport: T, options: ConnectionOptions) -> Result<Self> {
        options.validate()?;
        let router = TopicRouter::new(options.topics.clone(), generate_client_id());
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Ok(Self {
            transport: Arc::new(transport),
            options,
            router,
            registry: CallbackRegistry::new(),
            state: Arc::new(state),
            session: Mutex::new(None),
        })
    }

    /// Create a connection to a WebSocket endpoint such as [`DEFAULT_ENDPOINT`].
    pub fn websocket(endpoint: &str, mode: TransportMode, options: ConnectionOptions) -> Result<Self> {
        Self::new(WebSocketTransport::new(endpoint, mode)?, options)
    }

    /// Identifier announced in the handshake. Stable across reconnects.
    pub fn client_id(&self) -> &str {
        self.router.client_id()
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// The listener registry shared by this connection.
    pub fn registry(&self) -> &CallbackRegistry {
        &self.registry
    }

    /// Register a listener for sensor readings.
    pub fn on_sensor_data<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SensorReading) + Send + Sync + 'static,
    {
        self.registry.on_sensor_data(callback)
    }

    /// Register a listener for device status notices.
    pub fn on_status<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&DeviceStatusEvent) + Send + Sync + 'static,
    {
        self.registry.on_status(callback)
    }

    /// Start the session task.
    ///
    /// Has no effect while a session is connecting, connected or waiting to
    /// reconnect. Must be called from within a Tokio runtime.
    pub fn connect(&self) {
        let mut slot = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.as_ref()
            && !handle.task.is_finished()
        {
            debug!("connect() ignored, session already active");
            return;
        }

        let cancel = CancellationToken::new();
        let session = Session {
            transport: Arc::clone(&self.transport),
            options: self.options.clone(),
            router: self.router.clone(),
            registry: self.registry.clone(),
            state: Arc::clone(&self.state),
        };
        session.set_state(ConnectionState::Connecting);
        let task = tokio::spawn(session.run(cancel.clone()));
        *slot = Some(SessionHandle { cancel, task });
    }

    /// Stop the session task, closing the link gracefully if connected.
    ///
    /// Has no effect when no session is running.
    pub async fn disconnect(&self) {
        let handle = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            debug!("disconnect() ignored, no session");
            return;
        };

        handle.cancel.cancel();
        if let Err(e) = handle.task.await {
            warn!("Session task ended abnormally: {}", e);
        }
        self.state.send_replace(ConnectionState::Disconnected);
        info!("Disconnected from {}", self.transport.describe());
    }
}

impl Drop for LiveConnection {
    fn drop(&mut self) {
        if let Some(handle) = self
            .session
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.cancel.cancel();
        }
    }
}

impl fmt::Debug for LiveConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveConnection")
            .field("remote", &self.transport.describe())
            .field("client_id", &self.client_id())
            .field("state", &self.state())
            .finish()
    }
}

/// Negotiated `(send_every, expect_every)` heart-beat intervals.
type Negotiated = (Option<Duration>, Option<Duration>);

/// Why the pump stopped.
enum PumpExit {
    Cancelled,
    Lost(Error),
}

impl Session {
    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!("Connection state: {} -> {}", current, next);
            *current = next;
            true
        });
    }

    async fn run(self, cancel: CancellationToken) {
        let remote = self.transport.describe();
        let mut failures: u32 = 0;

        loop {
            self.set_state(ConnectionState::Connecting);
            match self.establish(&cancel).await {
                Ok(None) => break,
                Ok(Some((link, heartbeat))) => {
                    failures = 0;
                    self.set_state(ConnectionState::Connected);
                    info!("Connected to {} as {}", remote, self.router.client_id());
                    match self.pump(link, heartbeat, &cancel).await {
                        PumpExit::Cancelled => break,
                        PumpExit::Lost(e) => warn!("Connection to {} lost: {}", remote, e),
                    }
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    if e.is_transient() {
                        warn!("Connection attempt {} to {} failed: {}", failures, remote, e);
                    } else {
                        error!("Connection attempt {} to {} failed: {}", failures, remote, e);
                    }
                }
            }

            self.set_state(ConnectionState::Disconnected);
            if !self.options.reconnect.should_retry(failures) {
                warn!("Giving up on {} after {} failed attempts", remote, failures);
                break;
            }
            let delay = self.options.reconnect.delay;
            info!("Reconnecting to {} in {:?}", remote, delay);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(delay) => {}
            }
        }

        self.set_state(ConnectionState::Disconnected);
        debug!("Session task for {} stopped", remote);
    }

    /// Open a link, complete the STOMP handshake and subscribe.
    ///
    /// Returns `None` when cancelled. A link cancelled mid-handshake is
    /// closed with UNSUBSCRIBE and DISCONNECT like a live one.
    async fn establish(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<(Box<dyn Link>, Negotiated)>> {
        let limit = self.options.connect_timeout;
        let opened = tokio::select! {
            _ = cancel.cancelled() => return Ok(None),
            opened = timeout(limit, self.transport.open()) => opened,
        };
        let mut link = opened.map_err(|_| Error::timeout("open link", limit))??;

        let handshake = tokio::select! {
            _ = cancel.cancelled() => None,
            result = self.handshake(link.as_mut()) => Some(result),
        };
        match handshake {
            Some(Ok(negotiated)) => Ok(Some((link, negotiated))),
            Some(Err(e)) => Err(e),
            None => {
                debug!("Cancelled during handshake");
                self.close_gracefully(link.as_mut()).await;
                Ok(None)
            }
        }
    }

    async fn handshake(&self, link: &mut dyn Link) -> Result<Negotiated> {
        let limit = self.options.connect_timeout;
        let ours = self.options.heart_beat();
        let connect = Frame::new(Command::Connect)
            .header("accept-version", ACCEPT_VERSION)
            .header("heart-beat", ours.header_value());
        link.send(connect.encode()).await?;

        let server = timeout(limit, await_connected(link))
            .await
            .map_err(|_| Error::timeout("STOMP handshake", limit))??;
        let negotiated = ours.negotiate(server);
        debug!("Negotiated heart-beat {:?} (server offered {:?})", negotiated, server);

        for frame in self.router.subscribe_frames() {
            link.send(frame.encode()).await?;
        }
        link.send(self.router.handshake_frame(now_millis())?.encode())
            .await?;

        Ok(negotiated)
    }

    async fn pump(
        &self,
        mut link: Box<dyn Link>,
        (send_every, expect_every): Negotiated,
        cancel: &CancellationToken,
    ) -> PumpExit {
        let mut send_tick = send_every.map(|every| {
            let mut tick = interval_at(Instant::now() + every, every);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tick
        });
        let silence_limit = expect_every.map(|every| every * 2);
        let mut last_inbound = Instant::now();

        loop {
            let deadline = silence_limit.map(|limit| last_inbound + limit);
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.close_gracefully(link.as_mut()).await;
                    return PumpExit::Cancelled;
                }
                _ = next_tick(&mut send_tick) => {
                    if let Err(e) = link.send("\n".to_string()).await {
                        return PumpExit::Lost(e);
                    }
                }
                _ = wait_until(deadline) => {
                    let limit = silence_limit.unwrap_or_default();
                    return PumpExit::Lost(Error::HeartbeatTimeout(limit));
                }
                received = link.recv() => match received {
                    Ok(Some(text)) => {
                        last_inbound = Instant::now();
                        if let Err(e) = self.handle_inbound(&text) {
                            return PumpExit::Lost(e);
                        }
                    }
                    Ok(None) => return PumpExit::Lost(Error::ConnectionClosed),
                    Err(e) => return PumpExit::Lost(e),
                },
            }
        }
    }

    /// Process one transport message. Only a broker ERROR ends the session.
    fn handle_inbound(&self, text: &str) -> Result<()> {
        let incoming = match stomp::decode_all(text) {
            Ok(incoming) => incoming,
            Err(e) => {
                warn!("Dropping malformed frame: {}", e);
                return Ok(());
            }
        };

        for item in incoming {
            let frame = match item {
                Incoming::Heartbeat => continue,
                Incoming::Frame(frame) => frame,
            };
            match frame.command {
                Command::Message => match self.router.route(&frame) {
                    Some(Ok(event)) => {
                        if let RoutedEvent::Status(status) = &event
                            && status.acknowledges(self.router.client_id())
                        {
                            info!("Server acknowledged client: {}", status.message);
                        }
                        self.registry.dispatch(&event);
                    }
                    Some(Err(e)) => error!("Dropping message: {}", e),
                    None => {}
                },
                Command::Error => {
                    return Err(Error::Broker {
                        message: frame.get("message").unwrap_or_default().to_string(),
                        details: frame.body,
                    });
                }
                _ => debug!("Ignoring frame: {}", frame),
            }
        }
        Ok(())
    }

    async fn close_gracefully(&self, link: &mut dyn Link) {
        let mut frames = self.router.unsubscribe_frames();
        frames.push(Frame::new(Command::Disconnect));
        for frame in frames {
            if let Err(e) = link.send(frame.encode()).await {
                debug!("Could not send {} during shutdown: {}", frame.command, e);
                break;
            }
        }
        if let Err(e) = link.close().await {
            debug!("Error closing link: {}", e);
        }
    }
}

/// Wait for CONNECTED, returning the server's heart-beat offer.
async fn await_connected(link: &mut dyn Link) -> Result<HeartBeat> {
    loop {
        let text = link.recv().await?.ok_or(Error::ConnectionClosed)?;
        for item in stomp::decode_all(&text)? {
            let Incoming::Frame(frame) = item else {
                continue;
            };
            match frame.command {
                Command::Connected => {
                    debug!(
                        "STOMP session established (version {})",
                        frame.get("version").unwrap_or("1.0")
                    );
                    return Ok(frame
                        .get("heart-beat")
                        .and_then(HeartBeat::parse)
                        .unwrap_or_default());
                }
                Command::Error => {
                    return Err(Error::Broker {
                        message: frame.get("message").unwrap_or_default().to_string(),
                        details: frame.body,
                    });
                }
                _ => debug!("Ignoring {} before CONNECTED", frame.command),
            }
        }
    }
}

async fn next_tick(tick: &mut Option<Interval>) {
    match tick {
        Some(tick) => {
            tick.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ConnectionOptions::default();
        assert_eq!(options.heartbeat_send, Duration::from_secs(4));
        assert_eq!(options.heartbeat_receive, Duration::from_secs(4));
        assert_eq!(options.connect_timeout, Duration::from_secs(10));
        assert_eq!(options.reconnect.delay, Duration::from_secs(5));
        assert!(options.reconnect.max_attempts.is_none());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_validation() {
        let options = ConnectionOptions::new().connect_timeout(Duration::ZERO);
        assert!(matches!(options.validate(), Err(Error::InvalidConfig(_))));

        let options = ConnectionOptions::new()
            .reconnect(ReconnectOptions::fixed_delay(Duration::ZERO));
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_heart_beat_header() {
        let options = ConnectionOptions::new().heartbeat(Duration::ZERO, Duration::from_secs(10));
        assert_eq!(options.heart_beat().header_value(), "0,10000");
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_websocket_constructor_rejects_bad_url() {
        let result = LiveConnection::websocket(
            "localhost:8080/ws",
            TransportMode::SockJs,
            ConnectionOptions::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_new_connection_is_disconnected() {
        let connection = LiveConnection::websocket(
            DEFAULT_ENDPOINT,
            TransportMode::SockJs,
            ConnectionOptions::default(),
        )
        .unwrap();
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert!(connection.client_id().starts_with("auralink-client-"));
    }
}
