//! Command implementations for the CLI.

mod config;
mod email;
mod sensors;
mod watch;

pub use config::cmd_config;
pub use email::cmd_email;
pub use sensors::{cmd_history, cmd_quote, cmd_sensors};
pub use watch::cmd_watch;

use auralink_core::{TopicConfig, TransportMode};

/// Resolved backend location shared by every networked command.
#[derive(Debug, Clone)]
pub struct Backend {
    /// REST base URL.
    pub url: String,
    /// Push channel endpoint.
    pub endpoint: String,
    pub transport: TransportMode,
    pub topics: TopicConfig,
}
