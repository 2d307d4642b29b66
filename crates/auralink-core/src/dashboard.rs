//! Dashboard controller.
//!
//! [`Dashboard`] wires a [`SensorSource`] and the live connection to a
//! [`DashboardState`] and publishes a [`DashboardView`] after every change.
//! Clones share the same state, so one clone can be attached to the
//! connection while another drives device selection.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use auralink_types::SensorReading;

use crate::connection::LiveConnection;
use crate::error::Result;
use crate::reconcile::{DashboardState, HistoryTicket, ReadingOutcome};
use crate::registry::Subscription;
use crate::traits::SensorSource;

/// Number of points plotted by the history charts.
pub const CHART_POINTS: usize = 20;

/// Read-only snapshot of the dashboard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardView {
    /// Known devices in first-seen order.
    pub devices: Vec<String>,
    pub selected: Option<String>,
    /// Most recent reading of the selected device.
    pub latest: Option<SensorReading>,
    /// History of the selected device, newest first.
    pub history: Vec<SensorReading>,
    /// A history fetch for the selected device is in flight.
    pub loading_history: bool,
}

impl DashboardView {
    fn from_state(state: &DashboardState) -> Self {
        Self {
            devices: state.registry().to_vec(),
            selected: state.selected().map(String::from),
            latest: state.latest().cloned(),
            history: state.history().to_vec(),
            loading_history: state.is_loading_history(),
        }
    }

    /// Whether there is anything to show. An empty snapshot is "no data", not an error.
    pub fn has_data(&self) -> bool {
        self.latest.is_some()
    }

    /// The `limit` most recent readings, oldest first, for plotting.
    pub fn chart_series(&self, limit: usize) -> Vec<&SensorReading> {
        let mut series: Vec<_> = self.history.iter().take(limit).collect();
        series.reverse();
        series
    }
}

/// Shared dashboard controller.
pub struct Dashboard<S> {
    source: Arc<S>,
    state: Arc<Mutex<DashboardState>>,
    view: Arc<watch::Sender<DashboardView>>,
}

impl<S> Clone for Dashboard<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            state: Arc::clone(&self.state),
            view: Arc::clone(&self.view),
        }
    }
}

impl<S: SensorSource + 'static> Dashboard<S> {
    pub fn new(source: S) -> Self {
        Self::with_source(Arc::new(source))
    }

    pub fn with_source(source: Arc<S>) -> Self {
        let (view, _) = watch::channel(DashboardView::default());
        Self {
            source,
            state: Arc::new(Mutex::new(DashboardState::new())),
            view: Arc::new(view),
        }
    }

    /// Fetch the bulk snapshot, select the first device and load its history.
    ///
    /// Only a failed snapshot is returned as an error; a failed history fetch
    /// is logged and leaves the history empty.
    pub async fn load(&self) -> Result<DashboardView> {
        let snapshot = self.source.all_sensors().await?;
        info!("Loaded snapshot of {} devices", snapshot.len());
        let ticket = self.update(|state| state.seed(&snapshot));
        if let Some(ticket) = ticket {
            self.fetch_history(ticket).await;
        }
        Ok(self.view())
    }

    /// Select another device and load its history.
    pub async fn select_device(&self, device_id: &str) -> Result<()> {
        let ticket = self.update(|state| state.select_device(device_id))?;
        debug!("Selected device {}", device_id);
        self.fetch_history(ticket).await;
        Ok(())
    }

    /// Apply one push event.
    pub fn apply_reading(&self, reading: SensorReading) -> ReadingOutcome {
        let outcome = self.lock().apply_reading(reading);
        if outcome.new_device || outcome.applied {
            self.publish();
        }
        outcome
    }

    /// Feed every sensor reading delivered by `connection` into this dashboard.
    pub fn attach(&self, connection: &LiveConnection) -> Subscription {
        let dashboard = self.clone();
        connection.on_sensor_data(move |reading| {
            let outcome = dashboard.apply_reading(reading.clone());
            if outcome.new_device {
                info!("New device: {}", reading.device_id);
            }
        })
    }

    /// Current view.
    pub fn view(&self) -> DashboardView {
        self.view.borrow().clone()
    }

    /// Observe view changes.
    pub fn subscribe(&self) -> watch::Receiver<DashboardView> {
        self.view.subscribe()
    }

    async fn fetch_history(&self, ticket: HistoryTicket) {
        match self.source.history(&ticket.device_id).await {
            Ok(readings) => {
                let count = readings.len();
                if self.update(|state| state.apply_history(&ticket, readings)) {
                    debug!("Loaded {} history entries for {}", count, ticket.device_id);
                }
            }
            Err(e) => {
                warn!("Failed to load history for {}: {}", ticket.device_id, e);
                self.update(|state| state.history_failed(&ticket));
            }
        }
    }

    fn update<T>(&self, f: impl FnOnce(&mut DashboardState) -> T) -> T {
        let result = f(&mut self.lock());
        self.publish();
        result
    }

    fn publish(&self) {
        let view = DashboardView::from_state(&self.lock());
        self.view.send_replace(view);
    }

    fn lock(&self) -> MutexGuard<'_, DashboardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
