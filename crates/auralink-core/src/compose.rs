//! Compose and alert forms.
//!
//! Forms hold raw user input and are checked locally before anything is
//! sent, so a missing required field never costs a round-trip.
//!
//! # Example
//!
//! ```
//! use auralink_core::compose::{ComposeForm, ValidationError};
//!
//! let form = ComposeForm {
//!     to: "ops@example.com, , lab@example.com".into(),
//!     subject: "CO2 report".into(),
//!     body: "See attached.".into(),
//!     ..Default::default()
//! };
//! let request = form.to_request().unwrap();
//! assert_eq!(request.to, ["ops@example.com", "lab@example.com"]);
//!
//! let empty = ComposeForm::default();
//! assert_eq!(empty.to_request(), Err(ValidationError::MissingField("to")));
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use auralink_types::{EmailMessage, EmailRequest, ParseError};

use crate::http::ApiError;
use crate::traits::EmailBackend;

/// Form input rejected before submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid email address in {field}: {address}")]
    InvalidAddress { field: &'static str, address: String },

    #[error(transparent)]
    Request(ParseError),
}

impl From<ParseError> for ValidationError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::MissingField(field) => Self::MissingField(field),
            other => Self::Request(other),
        }
    }
}

/// Failure of a form submission.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Split a comma-separated address list, trimming entries and dropping empty ones.
pub fn split_addresses(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(String::from)
        .collect()
}

fn looks_like_address(addr: &str) -> bool {
    match addr.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !addr.contains(char::is_whitespace)
        }
        None => false,
    }
}

fn checked_addresses(field: &'static str, input: &str) -> Result<Vec<String>, ValidationError> {
    let addresses = split_addresses(input);
    if let Some(bad) = addresses.iter().find(|a| !looks_like_address(a)) {
        return Err(ValidationError::InvalidAddress {
            field,
            address: bad.clone(),
        });
    }
    Ok(addresses)
}

fn required(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

/// The compose form. Recipient fields are comma-separated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeForm {
    pub to: String,
    #[serde(default)]
    pub cc: String,
    #[serde(default)]
    pub bcc: String,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub is_html: bool,
}

impl ComposeForm {
    /// Validate and build the request body for `POST /email/send`.
    ///
    /// Addresses are checked first, then the fields the backend requires.
    pub fn to_request(&self) -> Result<EmailRequest, ValidationError> {
        let request = EmailRequest {
            to: checked_addresses("to", &self.to)?,
            cc: checked_addresses("cc", &self.cc)?,
            bcc: checked_addresses("bcc", &self.bcc)?,
            subject: self.subject.trim().to_string(),
            body: self.body.clone(),
            is_html: self.is_html,
        };
        request.validate()?;
        Ok(request)
    }

    /// Validate, then send through `backend`.
    pub async fn submit<E: EmailBackend + ?Sized>(
        &self,
        backend: &E,
    ) -> Result<EmailMessage, SubmitError> {
        let request = self.to_request()?;
        Ok(backend.send(&request).await?)
    }
}

/// The sensor alert form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertForm {
    pub to: String,
    pub alert_type: String,
    pub message: String,
}

impl AlertForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        required("to", &self.to)?;
        if !looks_like_address(self.to.trim()) {
            return Err(ValidationError::InvalidAddress {
                field: "to",
                address: self.to.trim().to_string(),
            });
        }
        required("alertType", &self.alert_type)?;
        required("message", &self.message)
    }

    /// Validate, then send through `backend`.
    pub async fn submit<E: EmailBackend + ?Sized>(
        &self,
        backend: &E,
    ) -> Result<EmailMessage, SubmitError> {
        self.validate()?;
        Ok(backend
            .send_alert(self.to.trim(), self.alert_type.trim(), &self.message)
            .await?)
    }
}
