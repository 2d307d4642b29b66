//! Reconnection policy for the live connection.
//!
//! The session task consults [`ReconnectOptions`] after every lost or failed
//! link. The default mirrors the backend's expectations: retry every five
//! seconds, forever.

use std::time::Duration;

use crate::error::{Error, Result};

/// Delay between reconnection attempts used by [`ReconnectOptions::default`].
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Options for automatic reconnection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectOptions {
    /// Fixed delay between a lost link and the next attempt.
    pub delay: Duration,
    /// Maximum number of consecutive failed attempts (None = unlimited).
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        Self::fixed_delay(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retry forever every `delay`.
    pub fn fixed_delay(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    /// Set maximum number of reconnection attempts.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Whether another attempt is allowed after `failures` consecutive failures.
    pub fn should_retry(&self, failures: u32) -> bool {
        self.max_attempts.is_none_or(|max| failures < max)
    }

    /// Validate the options and return an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.delay.is_zero() {
            return Err(Error::invalid_config("reconnect delay must be > 0"));
        }
        if self.max_attempts == Some(0) {
            return Err(Error::invalid_config("max_attempts must be > 0"));
        }
        Ok(())
    }
}
