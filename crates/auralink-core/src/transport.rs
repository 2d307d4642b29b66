//! Socket transports carrying STOMP text frames.
//!
//! [`Transport`] is the seam between the live connection and the network: the
//! session task asks it for a fresh [`Link`] on every connection attempt.
//! [`WebSocketTransport`] talks to the real backend; [`MockTransport`] is the
//! in-memory test double.
//!
//! [`MockTransport`]: crate::mock::MockTransport

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::sockjs::{self, SockJsFrame};

/// Factory for links to the push endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a new link. Called once per connection attempt.
    async fn open(&self) -> Result<Box<dyn Link>>;

    /// Human-readable description of the remote end, for logs.
    fn describe(&self) -> String;
}

/// One open, bidirectional text link.
#[async_trait]
pub trait Link: Send {
    /// Send one STOMP payload.
    async fn send(&mut self, payload: String) -> Result<()>;

    /// Receive the next STOMP payload, or `None` once the peer has closed the link.
    ///
    /// Must be cancel-safe: dropping the future must not lose received data.
    async fn recv(&mut self) -> Result<Option<String>>;

    /// Close the link.
    async fn close(&mut self) -> Result<()>;
}

/// How STOMP frames are carried over the WebSocket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// SockJS WebSocket transport (`{endpoint}/{server}/{session}/websocket`).
    #[default]
    SockJs,
    /// Raw WebSocket (`{endpoint}/websocket`).
    WebSocket,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::SockJs => f.write_str("sockjs"),
            TransportMode::WebSocket => f.write_str("websocket"),
        }
    }
}

impl FromStr for TransportMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sockjs" => Ok(TransportMode::SockJs),
            "websocket" | "ws" => Ok(TransportMode::WebSocket),
            other => Err(Error::invalid_config(format!(
                "unknown transport '{}', expected sockjs or websocket",
                other
            ))),
        }
    }
}

/// Convert an `http(s)://` or `ws(s)://` URL into its WebSocket form.
pub fn websocket_url(url: &str) -> Result<String> {
    let url = url.trim_end_matches('/');
    if let Some(rest) = url.strip_prefix("http://") {
        Ok(format!("ws://{}", rest))
    } else if let Some(rest) = url.strip_prefix("https://") {
        Ok(format!("wss://{}", rest))
    } else if url.starts_with("ws://") || url.starts_with("wss://") {
        Ok(url.to_string())
    } else {
        Err(Error::invalid_config(format!(
            "URL must start with http://, https://, ws:// or wss://, got: {}",
            url
        )))
    }
}

/// WebSocket transport to a SockJS-enabled STOMP endpoint.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    endpoint: String,
    mode: TransportMode,
}

impl WebSocketTransport {
    /// Create a transport for `endpoint`, e.g. `http://localhost:8080/ws`.
    pub fn new(endpoint: &str, mode: TransportMode) -> Result<Self> {
        Ok(Self {
            endpoint: websocket_url(endpoint)?,
            mode,
        })
    }

    /// The normalized `ws://` endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    fn connect_url(&self) -> String {
        match self.mode {
            TransportMode::SockJs => sockjs::session_url(&self.endpoint),
            TransportMode::WebSocket => format!("{}/websocket", self.endpoint),
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self) -> Result<Box<dyn Link>> {
        let url = self.connect_url();
        debug!("Opening WebSocket to {}", url);
        let (ws, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        Ok(Box::new(WebSocketLink {
            ws,
            sockjs: self.mode == TransportMode::SockJs,
            pending: VecDeque::new(),
        }))
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.endpoint, self.mode)
    }
}

struct WebSocketLink {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    sockjs: bool,
    /// Messages unpacked from a SockJS array but not yet returned.
    pending: VecDeque<String>,
}

impl WebSocketLink {
    /// Returns `Ok(false)` when the SockJS session was closed by the server.
    fn unpack(&mut self, text: &str) -> Result<bool> {
        if !self.sockjs {
            self.pending.push_back(text.to_string());
            return Ok(true);
        }
        match sockjs::decode(text)? {
            SockJsFrame::Open => debug!("SockJS session open"),
            SockJsFrame::Heartbeat => debug!("SockJS heart-beat"),
            SockJsFrame::Messages(messages) => self.pending.extend(messages),
            SockJsFrame::Close { code, reason } => {
                info!("SockJS session closed by server: {} {}", code, reason);
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl Link for WebSocketLink {
    async fn send(&mut self, payload: String) -> Result<()> {
        let text = if self.sockjs {
            sockjs::encode(&[payload])?
        } else {
            payload
        };
        self.ws.send(Message::text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(message) = self.pending.pop_front() {
                return Ok(Some(message));
            }
            let text = match self.ws.next().await {
                None | Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(Message::Text(text))) => text.as_str().to_string(),
                Some(Ok(Message::Binary(data))) => String::from_utf8(data.to_vec())
                    .map_err(|e| Error::Transport(format!("non-UTF-8 binary message: {}", e)))?,
                Some(Ok(_)) => continue,
            };
            if !self.unpack(&text)? {
                return Ok(None);
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self.ws.close(None).await {
            Ok(())
            | Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
            | Err(tokio_tungstenite::tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_url_conversion() {
        assert_eq!(
            websocket_url("http://localhost:8080/ws").unwrap(),
            "ws://localhost:8080/ws"
        );
        assert_eq!(
            websocket_url("https://example.com/ws/").unwrap(),
            "wss://example.com/ws"
        );
        assert_eq!(
            websocket_url("ws://example.com/ws").unwrap(),
            "ws://example.com/ws"
        );
        assert!(matches!(
            websocket_url("localhost:8080/ws"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_transport_mode_parse() {
        assert_eq!("sockjs".parse::<TransportMode>().unwrap(), TransportMode::SockJs);
        assert_eq!(
            "WebSocket".parse::<TransportMode>().unwrap(),
            TransportMode::WebSocket
        );
        assert!("xhr".parse::<TransportMode>().is_err());
        assert_eq!(TransportMode::default().to_string(), "sockjs");
    }

    #[test]
    fn test_raw_websocket_url() {
        let transport =
            WebSocketTransport::new("http://localhost:8080/ws", TransportMode::WebSocket).unwrap();
        assert_eq!(transport.connect_url(), "ws://localhost:8080/ws/websocket");
        assert_eq!(
            transport.describe(),
            "ws://localhost:8080/ws (websocket)"
        );
    }

    #[test]
    fn test_sockjs_url_is_fresh_per_attempt() {
        let transport =
            WebSocketTransport::new("http://localhost:8080/ws", TransportMode::SockJs).unwrap();
        let first = transport.connect_url();
        assert!(first.starts_with("ws://localhost:8080/ws/"));
        assert!(first.ends_with("/websocket"));
    }
}
