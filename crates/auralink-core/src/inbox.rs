//! Email view state.
//!
//! [`Inbox`] caches the sent and received lists plus the mailbox statistics
//! and applies user actions against an [`EmailBackend`]. Marking a message as
//! read is optimistic and rolled back if the backend refuses; deletions only
//! take effect locally once the backend has confirmed them.
//!
//! [`AutoRefresh`] keeps the received list and statistics fresh on a fixed
//! interval until stopped or dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use auralink_types::{EmailMessage, EmailStats, Priority};

use crate::http::ApiResult;
use crate::traits::EmailBackend;

/// Interval of the email list auto-refresh.
pub const AUTO_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Read-only snapshot of the mailbox.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboxView {
    pub received: Vec<EmailMessage>,
    pub sent: Vec<EmailMessage>,
    pub stats: Option<EmailStats>,
    /// When set, `received` only holds messages of this priority.
    pub priority_filter: Option<Priority>,
}

impl InboxView {
    pub fn unread(&self) -> impl Iterator<Item = &EmailMessage> {
        self.received.iter().filter(|m| !m.is_read)
    }

    pub fn read(&self) -> impl Iterator<Item = &EmailMessage> {
        self.received.iter().filter(|m| m.is_read)
    }

    pub fn unread_count(&self) -> usize {
        self.unread().count()
    }

    pub fn find_received(&self, id: &str) -> Option<&EmailMessage> {
        self.received.iter().find(|m| m.id == id)
    }
}

/// Shared mailbox state. Clones share the same cache.
pub struct Inbox<E> {
    backend: Arc<E>,
    state: Arc<Mutex<InboxView>>,
    view: Arc<watch::Sender<InboxView>>,
    /// Bumped by every received-list request and filter change. Only the
    /// response carrying the current value may replace the list.
    received_generation: Arc<AtomicU64>,
}

impl<E> Clone for Inbox<E> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            state: Arc::clone(&self.state),
            view: Arc::clone(&self.view),
            received_generation: Arc::clone(&self.received_generation),
        }
    }
}

impl<E: EmailBackend + 'static> Inbox<E> {
    pub fn new(backend: E) -> Self {
        Self::with_backend(Arc::new(backend))
    }

    pub fn with_backend(backend: Arc<E>) -> Self {
        let (view, _) = watch::channel(InboxView::default());
        Self {
            backend,
            state: Arc::new(Mutex::new(InboxView::default())),
            view: Arc::new(view),
            received_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn backend(&self) -> &E {
        &self.backend
    }

    /// Current snapshot.
    pub fn view(&self) -> InboxView {
        self.view.borrow().clone()
    }

    /// Observe changes.
    pub fn subscribe(&self) -> watch::Receiver<InboxView> {
        self.view.subscribe()
    }

    /// Restrict the received list to one priority. Takes effect on the next refresh.
    ///
    /// A received-list request still in flight is discarded when it completes.
    pub fn set_priority_filter(&self, priority: Option<Priority>) {
        self.update(|state| {
            self.received_generation.fetch_add(1, Ordering::SeqCst);
            state.priority_filter = priority;
        });
    }

    /// Reload the received list, honouring the priority filter.
    ///
    /// When a newer request or a filter change overtakes this one, its
    /// response is dropped and the list is left as is.
    pub async fn refresh_received(&self) -> ApiResult<()> {
        let (ticket, received) = self.fetch_received().await?;
        debug!("Loaded {} received emails", received.len());
        self.apply_received(ticket, received);
        Ok(())
    }

    pub async fn refresh_sent(&self) -> ApiResult<()> {
        let sent = self.backend.sent().await?;
        self.update(|state| state.sent = sent);
        Ok(())
    }

    pub async fn refresh_stats(&self) -> ApiResult<()> {
        let stats = self.backend.stats().await?;
        self.update(|state| state.stats = Some(stats));
        Ok(())
    }

    /// Reload sent, received and statistics concurrently.
    ///
    /// Nothing is replaced unless all three requests succeed.
    pub async fn refresh_all(&self) -> ApiResult<()> {
        let (sent, (ticket, received), stats) = tokio::try_join!(
            self.backend.sent(),
            self.fetch_received(),
            self.backend.stats(),
        )?;
        self.update(|state| {
            state.sent = sent;
            if self.is_current(ticket) {
                state.received = received;
            } else {
                debug!("Dropping stale received list");
            }
            state.stats = Some(stats);
        });
        Ok(())
    }

    /// Ask the backend to poll the mail server, then reload the received list.
    ///
    /// Returns the number of newly fetched messages.
    pub async fn fetch_new(&self) -> ApiResult<usize> {
        let fetched = self.backend.fetch().await?;
        info!("Fetched {} new emails", fetched.len());
        self.refresh_received().await?;
        Ok(fetched.len())
    }

    /// Mark one received message as read.
    ///
    /// The local flag flips immediately and reverts if the backend call fails.
    /// Messages already marked read cause no request.
    pub async fn mark_read(&self, id: &str) -> ApiResult<()> {
        let flipped = self.update(|state| {
            match state.received.iter_mut().find(|m| m.id == id) {
                Some(m) if m.is_read => None,
                Some(m) => {
                    m.is_read = true;
                    Some(true)
                }
                None => Some(false),
            }
        });
        let Some(flipped) = flipped else {
            debug!("Email {} already read", id);
            return Ok(());
        };

        match self.backend.mark_read(id).await {
            Ok(_) => {
                if flipped {
                    self.update(|state| {
                        if let Some(stats) = state.stats.as_mut() {
                            stats.unread_count = stats.unread_count.saturating_sub(1);
                        }
                    });
                }
                Ok(())
            }
            Err(e) => {
                warn!("Failed to mark email {} as read: {}", id, e);
                if flipped {
                    self.update(|state| {
                        if let Some(m) = state.received.iter_mut().find(|m| m.id == id) {
                            m.is_read = false;
                        }
                    });
                }
                Err(e)
            }
        }
    }

    /// Mark every received message as read. Returns the count reported by the backend.
    pub async fn mark_all_read(&self) -> ApiResult<u64> {
        let unread = self.lock().unread_count();
        if unread == 0 {
            debug!("No unread emails");
            return Ok(0);
        }

        let response = self.backend.mark_all_read().await?;
        self.update(|state| {
            for m in state.received.iter_mut() {
                m.is_read = true;
            }
            if let Some(stats) = state.stats.as_mut() {
                stats.unread_count = 0;
            }
        });
        Ok(response.count.unwrap_or(unread as u64))
    }

    /// Delete a received message once the backend confirms.
    pub async fn delete_received(&self, id: &str) -> ApiResult<()> {
        self.backend.delete_received(id).await?;
        self.update(|state| {
            state.received.retain(|m| m.id != id);
            if let Some(stats) = state.stats.as_mut() {
                stats.received_count = stats.received_count.saturating_sub(1);
            }
        });
        Ok(())
    }

    /// Delete a sent message once the backend confirms.
    pub async fn delete_sent(&self, id: &str) -> ApiResult<()> {
        self.backend.delete_sent(id).await?;
        self.update(|state| {
            state.sent.retain(|m| m.id != id);
            if let Some(stats) = state.stats.as_mut() {
                stats.sent_count = stats.sent_count.saturating_sub(1);
            }
        });
        Ok(())
    }

    /// Refresh the received list and statistics every `every` until the
    /// returned handle is stopped or dropped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_auto_refresh(&self, every: Duration) -> AutoRefresh {
        let inbox = self.clone();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + every, every);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticks.tick() => {
                        let result = tokio::try_join!(
                            inbox.refresh_received(),
                            inbox.refresh_stats(),
                        );
                        if let Err(e) = result {
                            warn!("Auto-refresh failed: {}", e);
                        }
                    }
                }
            }
            debug!("Auto-refresh stopped");
        });

        AutoRefresh { cancel, task }
    }

    async fn fetch_received(&self) -> ApiResult<(u64, Vec<EmailMessage>)> {
        let (ticket, filter) = {
            let state = self.lock();
            let ticket = self.received_generation.fetch_add(1, Ordering::SeqCst) + 1;
            (ticket, state.priority_filter)
        };
        let received = match filter {
            Some(priority) => self.backend.by_priority(priority).await?,
            None => self.backend.received().await?,
        };
        Ok((ticket, received))
    }

    fn apply_received(&self, ticket: u64, received: Vec<EmailMessage>) {
        let mut state = self.lock();
        if !self.is_current(ticket) {
            debug!("Dropping stale received list");
            return;
        }
        state.received = received;
        self.view.send_replace(state.clone());
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.received_generation.load(Ordering::SeqCst) == ticket
    }

    fn update<T>(&self, f: impl FnOnce(&mut InboxView) -> T) -> T {
        let mut state = self.lock();
        let result = f(&mut state);
        self.view.send_replace(state.clone());
        result
    }

    fn lock(&self) -> MutexGuard<'_, InboxView> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle of a running auto-refresh task.
#[must_use = "the auto-refresh stops when the handle is dropped"]
#[derive(Debug)]
pub struct AutoRefresh {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl AutoRefresh {
    /// Stop refreshing. Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop and wait for an in-progress refresh to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Err(e) = (&mut self.task).await {
            warn!("Auto-refresh task ended abnormally: {}", e);
        }
    }
}

impl Drop for AutoRefresh {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
