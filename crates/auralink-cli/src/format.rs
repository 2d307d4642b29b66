//! Output formatting for text and JSON output.

use anyhow::Result;
use owo_colors::OwoColorize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use auralink_types::{
    AirQualityStatus, DeviceStatusEvent, EmailMessage, EmailStats, Priority, Quote, SensorReading,
};

/// Formatting options for output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
    /// Emit JSON instead of text.
    pub json: bool,
}

impl FormatOptions {
    pub fn new(no_color: bool, json: bool) -> Self {
        Self { no_color, json }
    }

    /// Serialize value to a pretty JSON string with a trailing newline.
    pub fn as_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(value)? + "\n")
    }
}

fn hex_rgb(hex: &str) -> (u8, u8, u8) {
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|c| u8::from_str_radix(c, 16).ok())
            .unwrap_or(0x9e)
    };
    (channel(1), channel(3), channel(5))
}

/// Air-quality label, coloured like the dashboard indicator.
#[must_use]
pub fn format_status(status: AirQualityStatus, no_color: bool) -> String {
    if no_color {
        return status.to_string();
    }
    let (r, g, b) = hex_rgb(status.color_hex());
    let label = status.as_str().truecolor(r, g, b).to_string();
    if status.is_alarming() {
        label.bold().to_string()
    } else {
        label
    }
}

/// Producer timestamp (milliseconds) as RFC 3339, or the raw value if out of range.
#[must_use]
pub fn format_timestamp(millis: i64) -> String {
    OffsetDateTime::from_unix_timestamp(millis.div_euclid(1000))
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_else(|| millis.to_string())
}

/// One line per reading.
#[must_use]
pub fn format_reading_line(reading: &SensorReading, opts: &FormatOptions) -> String {
    let device = if opts.no_color {
        reading.device_id.clone()
    } else {
        reading.device_id.cyan().to_string()
    };
    let motion = if reading.motion_detected { "motion" } else { "-" };
    format!(
        "{}  {:<16}  {:>5.1}°C  {:>3.0}%  CO2 {:>5} ppm  NH3 {:>3}  CH4 {:>3}  CO {:>3}  {:<6}  {}",
        format_timestamp(reading.timestamp),
        device,
        reading.temperature,
        reading.humidity,
        reading.co2,
        reading.nh3,
        reading.ch4,
        reading.co,
        motion,
        format_status(reading.air_quality_status, opts.no_color),
    )
}

pub fn format_readings(readings: &[SensorReading], opts: &FormatOptions) -> Result<String> {
    if opts.json {
        return opts.as_json(readings);
    }
    if readings.is_empty() {
        return Ok("No sensor data available.\n".to_string());
    }
    let mut out = String::new();
    for reading in readings {
        out.push_str(&format_reading_line(reading, opts));
        out.push('\n');
    }
    Ok(out)
}

const SPARKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// CO2 sparkline over `series`, which must be oldest first.
pub fn format_co2_trend(series: &[&SensorReading], opts: &FormatOptions) -> Result<String> {
    if opts.json {
        return opts.as_json(series);
    }
    let (Some(min), Some(max)) = (
        series.iter().map(|r| r.co2).min(),
        series.iter().map(|r| r.co2).max(),
    ) else {
        return Ok("No sensor data available.\n".to_string());
    };
    let span = i64::from(max) - i64::from(min);
    let top = SPARKS.len() as i64 - 1;
    let line: String = series
        .iter()
        .map(|r| {
            let level = if span == 0 {
                0
            } else {
                (i64::from(r.co2) - i64::from(min)) * top / span
            };
            SPARKS[level as usize]
        })
        .collect();
    let line = match series.last() {
        Some(last) if !opts.no_color && last.air_quality_status.is_alarming() => {
            line.red().to_string()
        }
        _ => line,
    };
    Ok(format!(
        "CO2 {}  {} to {} ppm over {} readings\n",
        line,
        min,
        max,
        series.len()
    ))
}

pub fn format_quote(quote: &Quote, opts: &FormatOptions) -> Result<String> {
    if opts.json {
        return opts.as_json(quote);
    }
    let text = if opts.no_color {
        format!("\"{}\"", quote.text)
    } else {
        format!("\"{}\"", quote.text).italic().to_string()
    };
    let mut out = format!("{}\n", text);
    if !quote.context.is_empty() {
        out.push_str(&format!("  {}\n", quote.context));
    }
    if let Some(reading) = &quote.sensor_data {
        out.push_str(&format!("  {}\n", format_reading_line(reading, opts)));
    }
    Ok(out)
}

pub fn format_status_event(event: &DeviceStatusEvent, opts: &FormatOptions) -> Result<String> {
    if opts.json {
        return opts.as_json(event);
    }
    let kind = if opts.no_color {
        event.kind.clone()
    } else {
        event.kind.yellow().to_string()
    };
    Ok(format!("[{}] {}\n", kind, event.message))
}

fn priority_label(message: &EmailMessage, no_color: bool) -> String {
    let Some(priority) = message.priority() else {
        return "-".to_string();
    };
    let label = format!("{:<6}", priority.as_str());
    if no_color {
        return label;
    }
    match priority {
        Priority::High => label.red().bold().to_string(),
        Priority::Medium => label.yellow().to_string(),
        Priority::Low => label.dimmed().to_string(),
    }
}

pub fn format_email_list(messages: &[EmailMessage], opts: &FormatOptions) -> Result<String> {
    if opts.json {
        return opts.as_json(messages);
    }
    if messages.is_empty() {
        return Ok("No messages.\n".to_string());
    }

    let mut out = String::new();
    for m in messages {
        let marker = if m.is_read || m.received_at.is_none() { " " } else { "*" };
        let peer = match m.received_at {
            Some(_) => m.from.clone(),
            None => m.to.join(", "),
        };
        let subject = if !m.is_read && !opts.no_color && m.received_at.is_some() {
            m.subject.bold().to_string()
        } else {
            m.subject.clone()
        };
        out.push_str(&format!(
            "{} {:<36}  {}  {:<28}  {}",
            marker,
            m.id,
            priority_label(m, opts.no_color),
            peer,
            subject,
        ));
        if m.is_failed() {
            let failed = if opts.no_color {
                "FAILED".to_string()
            } else {
                "FAILED".red().to_string()
            };
            out.push_str(&format!("  {}", failed));
        }
        out.push('\n');
        if let Some(summary) = &m.summary {
            out.push_str(&format!("    {}\n", summary));
        }
    }
    Ok(out)
}

pub fn format_email_detail(message: &EmailMessage, opts: &FormatOptions) -> Result<String> {
    if opts.json {
        return opts.as_json(message);
    }
    let mut out = String::new();
    out.push_str(&format!("From:     {}\n", message.from));
    out.push_str(&format!("To:       {}\n", message.to.join(", ")));
    if !message.cc.is_empty() {
        out.push_str(&format!("Cc:       {}\n", message.cc.join(", ")));
    }
    out.push_str(&format!("Subject:  {}\n", message.subject));
    if let Some(at) = message.timestamp() {
        out.push_str(&format!("Date:     {}\n", at));
    }
    out.push_str(&format!("Status:   {}\n", message.status));
    if let Some(error) = &message.error_message {
        out.push_str(&format!("Error:    {}\n", error));
    }
    out.push_str(&format!("Priority: {}\n", priority_label(message, opts.no_color)));
    if let Some(summary) = &message.summary {
        out.push_str(&format!("Summary:  {}\n", summary));
    }
    if !message.attachment_names.is_empty() {
        out.push_str(&format!(
            "Attached: {}\n",
            message.attachment_names.join(", ")
        ));
    }
    out.push('\n');
    out.push_str(&message.body);
    out.push('\n');
    Ok(out)
}

pub fn format_stats(stats: &EmailStats, opts: &FormatOptions) -> Result<String> {
    if opts.json {
        return opts.as_json(stats);
    }
    Ok(format!(
        "Sent:     {}\nReceived: {}\nUnread:   {}\nFailed:   {}\n",
        stats.sent_count, stats.received_count, stats.unread_count, stats.failed_count
    ))
}
