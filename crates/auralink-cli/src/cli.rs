//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};

use auralink_core::TransportMode;
use auralink_types::Priority;

#[derive(Parser)]
#[command(name = "auralink")]
#[command(author, version, about = "CLI for the AuraLink air-quality monitor", long_about = None)]
pub struct Cli {
    /// Backend base URL (overrides the config file)
    #[arg(long, global = true, env = "AURALINK_URL")]
    pub url: Option<String>,

    /// Push channel transport (sockjs, websocket)
    #[arg(long, global = true)]
    pub transport: Option<TransportMode>,

    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the latest reading of every device
    Sensors,

    /// Show the recorded history of a device
    History {
        /// Device id
        device: String,

        /// Show at most this many readings (0 for all)
        #[arg(short = 'n', long, default_value = "0")]
        limit: usize,

        /// Plot the CO2 trend of the most recent readings instead of listing them
        #[arg(long)]
        chart: bool,
    },

    /// Follow live readings over the push channel
    Watch(WatchOptions),

    /// Ask the backend for a quote inspired by a device's latest reading
    Quote {
        /// Device id (defaults to the configured device)
        device: Option<String>,
    },

    /// Send, list and manage email
    Email {
        #[command(subcommand)]
        action: EmailAction,
    },

    /// Manage CLI configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Debug, Clone, Args)]
pub struct WatchOptions {
    /// Device to follow (defaults to the configured device, then the first one seen)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Stop after this many updates (0 for unlimited)
    #[arg(short = 'n', long, default_value = "0")]
    pub count: u32,
}

/// Email subcommands
#[derive(Subcommand)]
pub enum EmailAction {
    /// Compose and send an email
    Send {
        /// Recipients, comma-separated
        #[arg(long, default_value = "")]
        to: String,
        #[arg(long, default_value = "")]
        cc: String,
        #[arg(long, default_value = "")]
        bcc: String,
        #[arg(short, long, default_value = "")]
        subject: String,
        #[arg(short, long, default_value = "")]
        body: String,
        /// Send the body as HTML
        #[arg(long)]
        html: bool,
    },

    /// Send a sensor alert
    Alert {
        #[arg(long, default_value = "")]
        to: String,
        /// Alert category, e.g. CO2 or Temperature
        #[arg(long, default_value = "")]
        alert_type: String,
        #[arg(short, long, default_value = "")]
        message: String,
    },

    /// List sent email
    Sent,

    /// List received email
    Received {
        /// Only show one priority (high, medium, low)
        #[arg(short, long)]
        priority: Option<Priority>,
    },

    /// Show one message
    Show {
        id: String,
        /// Look in sent mail instead of received mail
        #[arg(long)]
        sent: bool,
    },

    /// Ask the backend to fetch new mail from the server
    Fetch,

    /// Show mailbox statistics
    Stats,

    /// Search subject, body and sender
    Search { query: String },

    /// Mark a received message as read
    Read { id: String },

    /// Mark every received message as read
    ReadAll,

    /// Delete one message
    Delete {
        id: String,
        /// Delete from sent mail instead of received mail
        #[arg(long)]
        sent: bool,
    },

    /// Delete every sent or received message
    Clear {
        #[arg(long, conflicts_with = "received", required_unless_present = "received")]
        sent: bool,
        #[arg(long)]
        received: bool,
    },

    /// Re-run AI summarisation and prioritisation
    Reprocess {
        /// Message id
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        id: Option<String>,
        /// Reprocess every received message
        #[arg(long)]
        all: bool,
    },

    /// Print the inbox
    Inbox {
        /// Keep running and re-print on every auto-refresh
        #[arg(short, long)]
        follow: bool,
    },

    /// Check that the email service is up
    Health,
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Set the backend base URL
    SetUrl { url: String },

    /// Set the device `watch` follows by default
    SetDevice { device: String },

    /// Initialize default configuration
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_watch() {
        let cli = Cli::try_parse_from(["auralink", "--transport", "ws", "watch", "-d", "lab", "-n", "5"])
            .unwrap();
        assert_eq!(cli.transport, Some(TransportMode::WebSocket));
        match cli.command {
            Commands::Watch(opts) => {
                assert_eq!(opts.device.as_deref(), Some("lab"));
                assert_eq!(opts.count, 5);
            }
            _ => panic!("expected watch"),
        }
    }

    #[test]
    fn test_parse_history_chart_and_quote() {
        let cli = Cli::try_parse_from(["auralink", "history", "lab", "--chart", "-n", "10"]).unwrap();
        match cli.command {
            Commands::History { device, limit, chart } => {
                assert_eq!(device, "lab");
                assert_eq!(limit, 10);
                assert!(chart);
            }
            _ => panic!("expected history"),
        }

        let cli = Cli::try_parse_from(["auralink", "quote"]).unwrap();
        assert!(matches!(cli.command, Commands::Quote { device: None }));
    }

    #[test]
    fn test_parse_priority_filter() {
        let cli = Cli::try_parse_from(["auralink", "email", "received", "--priority", "high"]).unwrap();
        match cli.command {
            Commands::Email {
                action: EmailAction::Received { priority },
            } => assert_eq!(priority, Some(Priority::High)),
            _ => panic!("expected email received"),
        }
    }

    #[test]
    fn test_clear_requires_a_mailbox() {
        assert!(Cli::try_parse_from(["auralink", "email", "clear"]).is_err());
        assert!(Cli::try_parse_from(["auralink", "email", "clear", "--sent", "--received"]).is_err());
        assert!(Cli::try_parse_from(["auralink", "email", "clear", "--sent"]).is_ok());
    }

    #[test]
    fn test_reprocess_requires_target() {
        assert!(Cli::try_parse_from(["auralink", "email", "reprocess"]).is_err());
        assert!(Cli::try_parse_from(["auralink", "email", "reprocess", "--all"]).is_ok());
        assert!(Cli::try_parse_from(["auralink", "email", "reprocess", "abc"]).is_ok());
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["auralink", "-v", "-q", "sensors"]).is_err());
    }
}
