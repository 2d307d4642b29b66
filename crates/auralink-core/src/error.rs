//! Error types for auralink-core.
//!
//! This module defines the errors surfaced by the live push connection and by
//! the state components built on top of it. REST failures have their own type,
//! [`ApiError`](crate::http::ApiError), which converts into [`Error`].
//!
//! # Recovery
//!
//! | Error Type | Strategy |
//! |------------|----------|
//! | [`Error::WebSocket`] | Reconnect after the fixed delay |
//! | [`Error::Transport`] | Reconnect after the fixed delay |
//! | [`Error::ConnectionClosed`] | Reconnect after the fixed delay |
//! | [`Error::HeartbeatTimeout`] | Reconnect after the fixed delay |
//! | [`Error::Broker`] | Reconnect; the broker closes the socket after an ERROR frame |
//! | [`Error::Frame`] | Drop the frame, keep the connection |
//! | [`Error::Decode`] | Drop the message, keep the subscription |
//! | [`Error::InvalidConfig`] | Do not retry; fix configuration |
//!
//! None of these are raised synchronously from [`LiveConnection::connect`];
//! connection errors are logged by the session task.
//!
//! [`LiveConnection::connect`]: crate::connection::LiveConnection::connect

use std::time::Duration;

use thiserror::Error;

use crate::http::ApiError;

/// Errors that can occur in the AuraLink client.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// WebSocket protocol or I/O error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Transport-level failure not covered by the WebSocket layer.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The peer closed the link.
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// Operation attempted while no link is established.
    #[error("Not connected")]
    NotConnected,

    /// No inbound traffic within the negotiated heart-beat window.
    #[error("No heart-beat from server within {0:?}")]
    HeartbeatTimeout(Duration),

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// A STOMP frame could not be parsed.
    #[error("Malformed STOMP frame: {0}")]
    Frame(String),

    /// A SockJS envelope could not be parsed.
    #[error("Malformed SockJS frame: {0}")]
    SockJs(String),

    /// The broker answered with an ERROR frame.
    #[error("Broker error: {message}")]
    Broker {
        /// Value of the `message` header.
        message: String,
        /// Frame body, usually a longer description.
        details: String,
    },

    /// A message body did not match the schema of its topic.
    #[error("Failed to decode {topic} payload: {source}")]
    Decode {
        /// Name of the topic the message arrived on.
        topic: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A device id that is not in the device registry.
    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// REST request failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Result type alias using auralink-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Whether the session task should reconnect after this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::WebSocket(_)
                | Error::Transport(_)
                | Error::ConnectionClosed
                | Error::NotConnected
                | Error::HeartbeatTimeout(_)
                | Error::Timeout { .. }
                | Error::Broker { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::timeout("connect", Duration::from_secs(10));
        assert_eq!(err.to_string(), "Operation 'connect' timed out after 10s");

        let err = Error::Broker {
            message: "Access denied".into(),
            details: String::new(),
        };
        assert_eq!(err.to_string(), "Broker error: Access denied");

        let err = Error::UnknownDevice("esp32-x".into());
        assert_eq!(err.to_string(), "Unknown device: esp32-x");
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::ConnectionClosed.is_transient());
        assert!(Error::HeartbeatTimeout(Duration::from_secs(8)).is_transient());
        assert!(!Error::invalid_config("bad").is_transient());
        assert!(!Error::Frame("x".into()).is_transient());
    }

    #[test]
    fn test_decode_error_names_topic() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::Decode {
            topic: "sensor-readings",
            source,
        };
        assert!(err.to_string().starts_with("Failed to decode sensor-readings payload"));
    }
}
