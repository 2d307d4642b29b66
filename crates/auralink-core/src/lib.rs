//! Client library for the AuraLink air-quality monitor.
//!
//! This crate keeps a terminal or desktop front end in sync with the AuraLink
//! backend: a live STOMP push channel for sensor readings and device status,
//! plus typed REST clients for sensors and email.
//!
//! # Features
//!
//! - **Live connection**: one shared STOMP session over SockJS or a plain
//!   WebSocket, with heart-beats and automatic reconnection
//! - **Listener fan-out**: any number of independent callbacks, each removable
//!   through its own [`Subscription`]
//! - **Dashboard state**: device registry and bounded history reconciled from
//!   REST snapshots and push events, with stale-response protection
//! - **REST clients**: [`SensorApi`] and [`EmailClient`] behind the
//!   [`SensorSource`] and [`EmailBackend`] traits, plus [`QuoteClient`]
//! - **Email state**: an [`Inbox`] with optimistic mark-as-read and a
//!   cancellable auto-refresh
//! - **Test doubles**: in-memory transport and backends in [`mock`]
//!
//! # Layers
//!
//! | Layer | Module |
//! |-------|--------|
//! | Frame codecs | [`stomp`], [`sockjs`] |
//! | Socket | [`transport`] |
//! | Topics and listeners | [`router`], [`registry`] |
//! | Session lifecycle | [`connection`], [`reconnect`] |
//! | State | [`reconcile`], [`dashboard`], [`inbox`], [`compose`] |
//! | REST | [`http`], [`sensors`], [`email`], [`quotes`] |
//!
//! # Quick Start
//!
//! ```no_run
//! use auralink_core::{ConnectionOptions, Dashboard, LiveConnection, SensorApi, TransportMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dashboard = Dashboard::new(SensorApi::new("http://localhost:8080")?);
//!     let view = dashboard.load().await?;
//!     println!("Devices: {:?}", view.devices);
//!
//!     let connection = LiveConnection::websocket(
//!         "http://localhost:8080/ws",
//!         TransportMode::SockJs,
//!         ConnectionOptions::default(),
//!     )?;
//!     let _feed = dashboard.attach(&connection);
//!     connection.connect();
//!
//!     let mut updates = dashboard.subscribe();
//!     while updates.changed().await.is_ok() {
//!         if let Some(latest) = &updates.borrow().latest {
//!             println!("{} CO2 {} ppm", latest.device_id, latest.co2);
//!         }
//!     }
//!
//!     connection.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod compose;
pub mod connection;
pub mod dashboard;
pub mod email;
pub mod error;
pub mod http;
pub mod inbox;
pub mod mock;
pub mod quotes;
pub mod reconcile;
pub mod reconnect;
pub mod registry;
pub mod router;
pub mod sensors;
pub mod sockjs;
pub mod stomp;
pub mod traits;
pub mod transport;

// Core exports
pub use connection::{ConnectionOptions, ConnectionState, LiveConnection};
pub use error::{Error, Result};
pub use http::{ApiError, ApiResult, HttpClient};
pub use registry::{CallbackRegistry, Subscription};
pub use traits::{EmailBackend, SensorSource};

pub use compose::{AlertForm, ComposeForm, SubmitError, ValidationError};
pub use dashboard::{CHART_POINTS, Dashboard, DashboardView};
pub use email::EmailClient;
pub use inbox::{AUTO_REFRESH_INTERVAL, AutoRefresh, Inbox, InboxView};
pub use mock::{MockBroker, MockEmailBackend, MockSensorSource, MockSession, MockTransport};
pub use quotes::QuoteClient;
pub use reconcile::{DashboardState, DeviceRegistry, HISTORY_CAPACITY, HistoryBuffer};
pub use reconnect::ReconnectOptions;
pub use router::{RoutedEvent, Topic, TopicConfig, TopicRouter};
pub use sensors::SensorApi;
pub use transport::{Link, Transport, TransportMode, WebSocketTransport};

// Re-export from auralink-types
pub use auralink_types::{
    AirQualityStatus, ApiMessage, DeviceStatusEvent, EmailMessage, EmailRequest, EmailStats,
    Handshake, HealthStatus, Priority, Quote, SensorReading,
};
