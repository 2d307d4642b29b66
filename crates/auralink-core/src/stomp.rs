//! STOMP 1.2 frame codec.
//!
//! Frames are text: a command line, `name:value` header lines, a blank line,
//! the body, and a terminating NUL. A message consisting only of end-of-line
//! characters is a heart-beat.
//!
//! Header values are escaped (`\\`, `\n`, `\r`, `\c`) on every frame except
//! `CONNECT` and `CONNECTED`. When a `content-length` header is present the
//! body is read by length, otherwise up to the first NUL.

use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};

/// STOMP frame command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    // Client frames
    Connect,
    Stomp,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    Disconnect,
    // Server frames
    Connected,
    Message,
    Receipt,
    Error,
}

impl Command {
    /// The command as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Ack => "ACK",
            Command::Nack => "NACK",
            Command::Begin => "BEGIN",
            Command::Commit => "COMMIT",
            Command::Abort => "ABORT",
            Command::Disconnect => "DISCONNECT",
            Command::Connected => "CONNECTED",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    /// Parse a wire command.
    pub fn parse(s: &str) -> Option<Self> {
        let command = match s {
            "CONNECT" => Command::Connect,
            "STOMP" => Command::Stomp,
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "ACK" => Command::Ack,
            "NACK" => Command::Nack,
            "BEGIN" => Command::Begin,
            "COMMIT" => Command::Commit,
            "ABORT" => Command::Abort,
            "DISCONNECT" => Command::Disconnect,
            "CONNECTED" => Command::Connected,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            _ => return None,
        };
        Some(command)
    }

    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    /// Headers in wire order. Repeated names are kept; the first one wins on lookup.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// One unit decoded from a transport message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Heartbeat,
    Frame(Frame),
}

impl Frame {
    /// Create a frame with no headers and an empty body.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Append a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Look up a header value. The first occurrence wins.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Serialize the frame including the trailing NUL.
    ///
    /// A `content-length` header is added for non-empty bodies unless one is
    /// already present.
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            push_header_part(&mut out, name, escape);
            out.push(':');
            push_header_part(&mut out, value, escape);
            out.push('\n');
        }
        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.push_str("content-length:");
            out.push_str(&self.body.len().to_string());
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parse exactly one frame. Leading end-of-line characters are skipped.
    pub fn decode(text: &str) -> Result<Self> {
        let (frame, _) = decode_one(text.trim_start_matches(['\r', '\n']))?;
        Ok(frame)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        if let Some(destination) = self.get("destination") {
            write!(f, " {}", destination)?;
        }
        if !self.body.is_empty() {
            write!(f, " ({} bytes)", self.body.len())?;
        }
        Ok(())
    }
}

/// Decode every frame carried by one transport message.
///
/// A message made only of end-of-line characters yields a single
/// [`Incoming::Heartbeat`].
pub fn decode_all(text: &str) -> Result<Vec<Incoming>> {
    let mut rest = text.trim_start_matches(['\r', '\n']);
    if rest.is_empty() {
        return Ok(vec![Incoming::Heartbeat]);
    }

    let mut out = Vec::new();
    while !rest.is_empty() {
        let (frame, consumed) = decode_one(rest)?;
        out.push(Incoming::Frame(frame));
        rest = rest[consumed..].trim_start_matches(['\r', '\n']);
    }
    Ok(out)
}

/// Returns the frame and the number of bytes consumed, NUL included.
fn decode_one(text: &str) -> Result<(Frame, usize)> {
    let header_end = text
        .find("\n\n")
        .map(|i| (i, 2))
        .into_iter()
        .chain(text.find("\r\n\r\n").map(|i| (i, 4)))
        .min_by_key(|(i, _)| *i)
        .ok_or_else(|| Error::Frame("missing blank line after headers".to_string()))?;
    let (head, body_start) = (&text[..header_end.0], header_end.0 + header_end.1);

    let mut lines = head.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));
    let command_line = lines.next().unwrap_or_default();
    let command = Command::parse(command_line)
        .ok_or_else(|| Error::Frame(format!("unknown command '{}'", command_line)))?;

    let unescape = command.escapes_headers();
    let mut headers = Vec::new();
    for line in lines {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::Frame(format!("header without colon: '{}'", line)))?;
        if unescape {
            headers.push((unescape_header(name)?, unescape_header(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .map(|(_, v)| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| Error::Frame(format!("invalid content-length '{}'", v)))
        })
        .transpose()?;

    let remaining = &text[body_start..];
    let body_len = match content_length {
        Some(len) => {
            if remaining.len() <= len || !remaining.is_char_boundary(len) {
                return Err(Error::Frame(format!(
                    "body shorter than content-length {}",
                    len
                )));
            }
            if remaining.as_bytes()[len] != 0 {
                return Err(Error::Frame("missing NUL after body".to_string()));
            }
            len
        }
        None => remaining
            .find('\0')
            .ok_or_else(|| Error::Frame("missing NUL terminator".to_string()))?,
    };

    let frame = Frame {
        command,
        headers,
        body: remaining[..body_len].to_string(),
    };
    Ok((frame, body_start + body_len + 1))
}

fn push_header_part(out: &mut String, s: &str, escape: bool) {
    if !escape {
        out.push_str(s);
        return;
    }
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            _ => out.push(c),
        }
    }
}

fn unescape_header(s: &str) -> Result<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(Error::Frame(format!(
                    "undefined escape sequence '\\{}'",
                    other.map(String::from).unwrap_or_default()
                )));
            }
        }
    }
    Ok(out)
}

/// Heart-beat intervals in milliseconds, as carried by the `heart-beat` header.
///
/// The first value is what the sender can emit, the second what it wants to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartBeat {
    pub send_ms: u64,
    pub receive_ms: u64,
}

impl HeartBeat {
    pub fn new(send: Duration, receive: Duration) -> Self {
        Self {
            send_ms: send.as_millis() as u64,
            receive_ms: receive.as_millis() as u64,
        }
    }

    /// Parse a `heart-beat` header value such as `4000,4000`.
    pub fn parse(value: &str) -> Option<Self> {
        let (send, receive) = value.split_once(',')?;
        Some(Self {
            send_ms: send.trim().parse().ok()?,
            receive_ms: receive.trim().parse().ok()?,
        })
    }

    /// Header value form.
    pub fn header_value(&self) -> String {
        format!("{},{}", self.send_ms, self.receive_ms)
    }

    /// Negotiate with the server's advertised heart-beat.
    ///
    /// Returns `(send_every, expect_every)`; `None` disables that direction.
    pub fn negotiate(&self, server: HeartBeat) -> (Option<Duration>, Option<Duration>) {
        let pick = |ours: u64, theirs: u64| {
            (ours != 0 && theirs != 0).then(|| Duration::from_millis(ours.max(theirs)))
        };
        (
            pick(self.send_ms, server.receive_ms),
            pick(self.receive_ms, server.send_ms),
        )
    }
}
