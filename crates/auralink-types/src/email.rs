//! Email data exchanged with the backend's `/api/email` resource.
//!
//! The backend owns the lifecycle of every message; the client only displays
//! them, marks them read, or deletes them by id.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};
use crate::types::Priority;

/// A sent or received email as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct EmailMessage {
    pub id: String,
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    #[cfg_attr(feature = "serde", serde(alias = "html"))]
    pub is_html: bool,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub sent_at: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub received_at: Option<String>,
    pub attachment_names: Vec<String>,
    /// Delivery status, e.g. `SENT`, `FAILED`, `RECEIVED`.
    pub status: String,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub error_message: Option<String>,
    /// AI-generated summary (at most 80 characters).
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub summary: Option<String>,
    /// AI-assigned priority label as sent by the backend.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub priority: Option<String>,
    #[cfg_attr(feature = "serde", serde(alias = "read"))]
    pub is_read: bool,
}

impl EmailMessage {
    /// Parsed priority, or `None` when absent or unrecognised.
    #[must_use]
    pub fn priority(&self) -> Option<Priority> {
        self.priority.as_deref().and_then(|p| p.parse().ok())
    }

    /// Whether the backend reported a delivery failure for this message.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status.eq_ignore_ascii_case("FAILED")
    }

    /// The most relevant timestamp: received time for inbound mail, sent time otherwise.
    #[must_use]
    pub fn timestamp(&self) -> Option<&str> {
        self.received_at.as_deref().or(self.sent_at.as_deref())
    }
}

/// Body of `POST /api/email/send`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct EmailRequest {
    pub to: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub cc: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub is_html: bool,
}

impl EmailRequest {
    /// Check the fields the backend requires before anything is sent.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::MissingField`] naming the first empty required field.
    pub fn validate(&self) -> ParseResult<()> {
        if self.to.iter().all(|addr| addr.trim().is_empty()) {
            return Err(ParseError::MissingField("to"));
        }
        if self.subject.trim().is_empty() {
            return Err(ParseError::MissingField("subject"));
        }
        if self.body.trim().is_empty() {
            return Err(ParseError::MissingField("body"));
        }
        Ok(())
    }
}

/// Counters returned by `GET /api/email/stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct EmailStats {
    pub sent_count: u64,
    pub received_count: u64,
    pub unread_count: u64,
    pub failed_count: u64,
}

/// `{ "message": ... }` acknowledgement, optionally with an affected-row count.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ApiMessage {
    pub message: String,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub count: Option<u64>,
}

/// Response of `GET /api/email/health`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
}
