//! Email command implementations.

use anyhow::{Context, Result, bail};
use auralink_core::{
    AUTO_REFRESH_INTERVAL, AlertForm, ComposeForm, EmailBackend, EmailClient, Inbox,
};
use auralink_types::EmailMessage;
use owo_colors::OwoColorize;

use super::Backend;
use crate::cli::EmailAction;
use crate::format::{FormatOptions, format_email_detail, format_email_list, format_stats};

pub async fn cmd_email(
    backend: &Backend,
    action: EmailAction,
    quiet: bool,
    opts: &FormatOptions,
) -> Result<()> {
    let client = EmailClient::new(&backend.url)?;

    match action {
        EmailAction::Send {
            to,
            cc,
            bcc,
            subject,
            body,
            html,
        } => {
            let form = ComposeForm {
                to,
                cc,
                bcc,
                subject,
                body,
                is_html: html,
            };
            let sent = form.submit(&client).await?;
            report_sent(&sent, opts)?;
        }
        EmailAction::Alert {
            to,
            alert_type,
            message,
        } => {
            let form = AlertForm {
                to,
                alert_type,
                message,
            };
            let sent = form.submit(&client).await?;
            report_sent(&sent, opts)?;
        }
        EmailAction::Sent => {
            let messages = client.sent().await.context("Failed to load sent email")?;
            print!("{}", format_email_list(&messages, opts)?);
        }
        EmailAction::Received { priority } => {
            let inbox = Inbox::new(client);
            inbox.set_priority_filter(priority);
            inbox
                .refresh_received()
                .await
                .context("Failed to load received email")?;
            print!("{}", format_email_list(&inbox.view().received, opts)?);
        }
        EmailAction::Show { id, sent } => {
            let message = if sent {
                client.sent_by_id(&id).await?
            } else {
                client.received_by_id(&id).await?
            };
            match message {
                Some(message) => print!("{}", format_email_detail(&message, opts)?),
                None => bail!("No message with id {}", id),
            }
        }
        EmailAction::Fetch => {
            let inbox = Inbox::new(client);
            let count = inbox
                .fetch_new()
                .await
                .context("Failed to fetch new email")?;
            if !quiet {
                eprintln!("Fetched {} new messages.", count);
            }
            print!("{}", format_email_list(&inbox.view().received, opts)?);
        }
        EmailAction::Stats => {
            let stats = client.stats().await.context("Failed to load statistics")?;
            print!("{}", format_stats(&stats, opts)?);
        }
        EmailAction::Search { query } => {
            let messages = client.search(&query).await.context("Search failed")?;
            print!("{}", format_email_list(&messages, opts)?);
        }
        EmailAction::Read { id } => {
            Inbox::new(client)
                .mark_read(&id)
                .await
                .with_context(|| format!("Failed to mark {} as read", id))?;
            if !quiet {
                eprintln!("Marked {} as read.", id);
            }
        }
        EmailAction::ReadAll => {
            let inbox = Inbox::new(client);
            inbox.refresh_received().await?;
            let count = inbox.mark_all_read().await?;
            if !quiet {
                eprintln!("Marked {} messages as read.", count);
            }
        }
        EmailAction::Delete { id, sent } => {
            let inbox = Inbox::new(client);
            if sent {
                inbox.delete_sent(&id).await?;
            } else {
                inbox.delete_received(&id).await?;
            }
            if !quiet {
                eprintln!("Deleted {}.", id);
            }
        }
        EmailAction::Clear { sent, .. } => {
            let reply = if sent {
                client.clear_sent().await?
            } else {
                client.clear_received().await?
            };
            if !quiet {
                eprintln!("{}", reply.message);
            }
        }
        EmailAction::Reprocess { id, all } => {
            let messages = if all {
                client.reprocess_all().await?
            } else {
                let id = id.unwrap_or_default();
                match client.reprocess(&id).await? {
                    Some(message) => vec![message],
                    None => bail!("No message with id {}", id),
                }
            };
            print!("{}", format_email_list(&messages, opts)?);
        }
        EmailAction::Inbox { follow } => {
            let inbox = Inbox::new(client);
            inbox
                .refresh_all()
                .await
                .context("Failed to load mailbox")?;
            print_inbox(&inbox, opts)?;
            if follow {
                follow_inbox(&inbox, quiet, opts).await?;
            }
        }
        EmailAction::Health => {
            let health = client
                .health()
                .await
                .context("Email service health check failed")?;
            if opts.json {
                print!("{}", opts.as_json(&health)?);
            } else {
                println!("{}: {}", health.service, health.status);
            }
        }
    }
    Ok(())
}

fn report_sent(message: &EmailMessage, opts: &FormatOptions) -> Result<()> {
    if opts.json {
        print!("{}", opts.as_json(message)?);
        return Ok(());
    }
    if message.is_failed() {
        bail!(
            "Sending failed: {}",
            message.error_message.as_deref().unwrap_or("unknown error")
        );
    }
    let status = if opts.no_color {
        message.status.clone()
    } else {
        message.status.green().to_string()
    };
    println!("{} {} ({})", status, message.subject, message.id);
    Ok(())
}

fn print_inbox<E: EmailBackend + 'static>(inbox: &Inbox<E>, opts: &FormatOptions) -> Result<()> {
    let view = inbox.view();
    if opts.json {
        print!("{}", opts.as_json(&view.received)?);
        return Ok(());
    }
    if let Some(stats) = &view.stats {
        print!("{}", format_stats(stats, opts)?);
        println!();
    }
    println!("Unread ({})", view.unread_count());
    let unread: Vec<_> = view.unread().cloned().collect();
    print!("{}", format_email_list(&unread, opts)?);
    let read: Vec<_> = view.read().cloned().collect();
    if !read.is_empty() {
        println!("\nRead ({})", read.len());
        print!("{}", format_email_list(&read, opts)?);
    }
    Ok(())
}

async fn follow_inbox<E: EmailBackend + 'static>(
    inbox: &Inbox<E>,
    quiet: bool,
    opts: &FormatOptions,
) -> Result<()> {
    let mut views = inbox.subscribe();
    let refresh = inbox.start_auto_refresh(AUTO_REFRESH_INTERVAL);
    if !quiet {
        eprintln!(
            "Refreshing every {}s. Press Ctrl+C to stop.",
            AUTO_REFRESH_INTERVAL.as_secs()
        );
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nShutting down...");
                break;
            }
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let _ = views.borrow_and_update();
                println!();
                print_inbox(inbox, opts)?;
            }
        }
    }

    refresh.shutdown().await;
    Ok(())
}
