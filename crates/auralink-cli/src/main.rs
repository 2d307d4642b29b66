use std::io;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod format;

use cli::{Cli, Commands};
use commands::{Backend, cmd_config, cmd_email, cmd_history, cmd_quote, cmd_sensors, cmd_watch};
use config::{Config, resolve_endpoint, resolve_transport, resolve_url};
use format::FormatOptions;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle completions command early (before tracing init)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "auralink", &mut io::stdout());
        return Ok(());
    }

    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config = Config::load();
    let url = resolve_url(cli.url.as_deref(), &config);
    let backend = Backend {
        endpoint: resolve_endpoint(&url, &config),
        transport: resolve_transport(cli.transport, &config),
        topics: config.topics.apply(),
        url,
    };
    let opts = FormatOptions::new(cli.no_color || config.no_color, cli.json);
    tracing::debug!("Using backend {}", backend.url);

    match cli.command {
        Commands::Sensors => cmd_sensors(&backend, &opts).await,
        Commands::History {
            device,
            limit,
            chart,
        } => cmd_history(&backend, &device, limit, chart, &opts).await,
        Commands::Watch(watch) => {
            let device = watch.device.or(config.device);
            cmd_watch(&backend, device, watch.count, cli.quiet, &opts).await
        }
        Commands::Quote { device } => cmd_quote(&backend, device.or(config.device), &opts).await,
        Commands::Email { action } => cmd_email(&backend, action, cli.quiet, &opts).await,
        Commands::Config { action } => cmd_config(action, cli.url.as_deref()),
        Commands::Completions { .. } => {
            // Already handled above
            unreachable!()
        }
    }
}
