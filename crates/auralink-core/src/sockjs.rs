//! SockJS WebSocket-transport framing.
//!
//! The backend exposes its STOMP endpoint through SockJS. Over the WebSocket
//! transport every server message is prefixed by a one-letter frame type:
//!
//! | Frame | Meaning |
//! |-------|---------|
//! | `o` | session open |
//! | `h` | SockJS heart-beat |
//! | `a["m1","m2"]` | array of application messages |
//! | `m"m1"` | single application message |
//! | `c[3000,"Go away!"]` | session closed |
//!
//! Client messages are sent as a JSON array of strings.

use rand::Rng;
use rand::distr::Alphanumeric;

use crate::error::{Error, Result};

/// A decoded SockJS frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SockJsFrame {
    Open,
    Heartbeat,
    Messages(Vec<String>),
    Close { code: u16, reason: String },
}

/// Decode one SockJS server frame.
pub fn decode(text: &str) -> Result<SockJsFrame> {
    let mut chars = text.chars();
    let kind = chars
        .next()
        .ok_or_else(|| Error::SockJs("empty frame".to_string()))?;
    let payload = chars.as_str();

    match kind {
        'o' => Ok(SockJsFrame::Open),
        'h' => Ok(SockJsFrame::Heartbeat),
        'a' => serde_json::from_str::<Vec<String>>(payload)
            .map(SockJsFrame::Messages)
            .map_err(|e| Error::SockJs(format!("bad message array: {}", e))),
        'm' => serde_json::from_str::<String>(payload)
            .map(|m| SockJsFrame::Messages(vec![m]))
            .map_err(|e| Error::SockJs(format!("bad message: {}", e))),
        'c' => {
            let (code, reason): (u16, String) = serde_json::from_str(payload)
                .map_err(|e| Error::SockJs(format!("bad close frame: {}", e)))?;
            Ok(SockJsFrame::Close { code, reason })
        }
        other => Err(Error::SockJs(format!("unknown frame type '{}'", other))),
    }
}

/// Encode client messages for sending.
pub fn encode(messages: &[String]) -> Result<String> {
    serde_json::to_string(messages).map_err(|e| Error::SockJs(e.to_string()))
}

/// Build a fresh session URL below a SockJS endpoint.
///
/// `endpoint` must already use a `ws://` or `wss://` scheme. Each call picks a
/// new random server id (000-999) and session id.
pub fn session_url(endpoint: &str) -> String {
    let mut rng = rand::rng();
    let server: u16 = rng.random_range(0..1000);
    let session: String = (&mut rng)
        .sample_iter(Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!(
        "{}/{:03}/{}/websocket",
        endpoint.trim_end_matches('/'),
        server,
        session
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_control_frames() {
        assert_eq!(decode("o").unwrap(), SockJsFrame::Open);
        assert_eq!(decode("h").unwrap(), SockJsFrame::Heartbeat);
        assert_eq!(
            decode(r#"c[3000,"Go away!"]"#).unwrap(),
            SockJsFrame::Close {
                code: 3000,
                reason: "Go away!".to_string()
            }
        );
    }

    #[test]
    fn test_decode_message_array() {
        let frame = decode(r#"a["CONNECTED\nversion:1.2\n\n\u0000","\n"]"#).unwrap();
        assert_eq!(
            frame,
            SockJsFrame::Messages(vec![
                "CONNECTED\nversion:1.2\n\n\0".to_string(),
                "\n".to_string()
            ])
        );
    }

    #[test]
    fn test_decode_single_message() {
        assert_eq!(
            decode(r#"m"hello""#).unwrap(),
            SockJsFrame::Messages(vec!["hello".to_string()])
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("").is_err());
        assert!(decode("x").is_err());
        assert!(decode("a[1,2]").is_err());
        assert!(decode("c[]").is_err());
    }

    #[test]
    fn test_encode_escapes_nul() {
        let encoded = encode(&["SEND\n\n\0".to_string()]).unwrap();
        assert_eq!(encoded, r#"["SEND\n\n\u0000"]"#);
    }

    #[test]
    fn test_session_url_shape() {
        let url = session_url("ws://localhost:8080/ws/");
        let rest = url.strip_prefix("ws://localhost:8080/ws/").unwrap();
        let parts: Vec<&str> = rest.split('/').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 3);
        assert!(parts[0].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2], "websocket");
    }
}
