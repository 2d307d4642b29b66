//! Snapshot, history and quote commands.

use anyhow::{Context, Result, bail};
use auralink_core::{CHART_POINTS, DashboardView, QuoteClient, SensorApi, SensorSource};

use super::Backend;
use crate::format::{FormatOptions, format_co2_trend, format_quote, format_readings};

pub async fn cmd_sensors(backend: &Backend, opts: &FormatOptions) -> Result<()> {
    let api = SensorApi::new(&backend.url)?;
    let readings = api
        .all_sensors()
        .await
        .context("Failed to load sensor snapshot")?;
    print!("{}", format_readings(&readings, opts)?);
    Ok(())
}

pub async fn cmd_history(
    backend: &Backend,
    device: &str,
    limit: usize,
    chart: bool,
    opts: &FormatOptions,
) -> Result<()> {
    let api = SensorApi::new(&backend.url)?;
    let mut readings = api
        .history(device)
        .await
        .with_context(|| format!("Failed to load history for {}", device))?;
    if chart {
        let view = DashboardView {
            history: readings,
            ..Default::default()
        };
        let points = if limit > 0 { limit } else { CHART_POINTS };
        print!("{}", format_co2_trend(&view.chart_series(points), opts)?);
        return Ok(());
    }
    if limit > 0 {
        readings.truncate(limit);
    }
    print!("{}", format_readings(&readings, opts)?);
    Ok(())
}

pub async fn cmd_quote(backend: &Backend, device: Option<String>, opts: &FormatOptions) -> Result<()> {
    let Some(device) = device else {
        bail!("No device given. Pass one or run `auralink config set-device <id>`");
    };
    let quotes = QuoteClient::new(&backend.url)?;
    let quote = quotes
        .generate_for_device(&device)
        .await
        .with_context(|| format!("Failed to generate a quote for {}", device))?;
    match quote {
        Some(quote) => print!("{}", format_quote(&quote, opts)?),
        None => bail!("No reading recorded for {} yet", device),
    }
    Ok(())
}
