//! Watch command implementation.
//!
//! Loads the dashboard over REST, then follows the push channel. The
//! connection reconnects on its own; this loop only prints what changes.

use anyhow::{Context, Result, bail};
use auralink_core::{ConnectionOptions, Dashboard, LiveConnection, SensorApi};

use super::Backend;
use crate::format::{FormatOptions, format_reading_line, format_status_event};

pub async fn cmd_watch(
    backend: &Backend,
    device: Option<String>,
    count: u32,
    quiet: bool,
    opts: &FormatOptions,
) -> Result<()> {
    let dashboard = Dashboard::new(SensorApi::new(&backend.url)?);
    let view = dashboard
        .load()
        .await
        .context("Failed to load sensor snapshot")?;

    if let Some(device) = device.as_deref()
        && view.selected.as_deref() != Some(device)
    {
        if !view.devices.iter().any(|d| d == device) {
            bail!(
                "Unknown device '{}'. Known devices: {}",
                device,
                if view.devices.is_empty() {
                    "none".to_string()
                } else {
                    view.devices.join(", ")
                }
            );
        }
        dashboard.select_device(device).await?;
    }

    let options = ConnectionOptions::new().topics(backend.topics.clone());
    let connection = LiveConnection::websocket(&backend.endpoint, backend.transport, options)
        .context("Invalid push channel configuration")?;

    let _feed = dashboard.attach(&connection);
    let status_opts = *opts;
    let _status = connection.on_status(move |event| {
        if let Ok(line) = format_status_event(event, &status_opts) {
            eprint!("{}", line);
        }
    });

    let mut views = dashboard.subscribe();
    let mut seen_devices = view.devices.len();
    let mut last = dashboard.view().latest;
    if let Some(reading) = &last {
        println!("{}", format_reading_line(reading, opts));
    }

    if !quiet {
        eprintln!(
            "Watching {} via {} ({}). Press Ctrl+C to stop.",
            dashboard.view().selected.as_deref().unwrap_or("first device seen"),
            backend.endpoint,
            backend.transport,
        );
    }
    connection.connect();

    let mut updates: u32 = 0;
    loop {
        if count > 0 && updates >= count {
            if !quiet {
                eprintln!("Completed {} updates.", updates);
            }
            break;
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nShutting down...");
                break;
            }
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        let current = views.borrow_and_update().clone();
        for device in current.devices.iter().skip(seen_devices) {
            if !quiet {
                eprintln!("New device: {}", device);
            }
        }
        seen_devices = current.devices.len();

        let Some(latest) = current.latest else {
            continue;
        };
        if last
            .as_ref()
            .is_some_and(|previous| previous.same_measurement(&latest))
        {
            continue;
        }
        println!("{}", format_reading_line(&latest, opts));
        last = Some(latest);
        updates += 1;
    }

    connection.disconnect().await;
    Ok(())
}
