//! Reconciliation of REST snapshots with live push events.
//!
//! [`DashboardState`] is a plain, synchronous state machine. It knows nothing
//! about networking: callers feed it the bulk snapshot, push events and
//! history responses, and it decides what each one changes.
//!
//! # Rules
//!
//! - The device registry grows with every unseen device id and never shrinks.
//! - Only readings of the selected device reach the history buffer, which is
//!   newest first and holds at most [`HISTORY_CAPACITY`] entries.
//! - Pushes for other devices update the registry and are otherwise dropped.
//! - Every history request carries a [`HistoryTicket`]; a response is applied
//!   only if its ticket still matches the current selection.

use std::collections::VecDeque;

use indexmap::IndexSet;
use tracing::{debug, warn};

use auralink_types::SensorReading;

use crate::error::{Error, Result};

/// Maximum number of readings kept for the selected device.
pub const HISTORY_CAPACITY: usize = 100;

/// Insertion-ordered set of observed device ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceRegistry {
    ids: IndexSet<String>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a device id. Returns `true` if it was not known before.
    pub fn observe(&mut self, device_id: &str) -> bool {
        if self.ids.contains(device_id) {
            return false;
        }
        self.ids.insert(device_id.to_string())
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.ids.contains(device_id)
    }

    pub fn first(&self) -> Option<&str> {
        self.ids.first().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }
}

/// Bounded, newest-first reading history.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryBuffer {
    entries: VecDeque<SensorReading>,
    capacity: usize,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Build a buffer from readings already ordered newest first.
    ///
    /// Duplicates are skipped and everything past the capacity is dropped.
    pub fn from_newest_first(readings: impl IntoIterator<Item = SensorReading>) -> Self {
        let mut buffer = Self::default();
        for reading in readings {
            if buffer.entries.len() >= buffer.capacity {
                break;
            }
            if !buffer.contains(&reading) {
                buffer.entries.push_back(reading);
            }
        }
        buffer
    }

    /// Insert a reading at the front, dropping the oldest entry past capacity.
    ///
    /// Returns `false` if a reading with the same identity is already present.
    pub fn push_newest(&mut self, reading: SensorReading) -> bool {
        if self.contains(&reading) {
            return false;
        }
        self.entries.push_front(reading);
        self.entries.truncate(self.capacity);
        true
    }

    pub fn contains(&self, reading: &SensorReading) -> bool {
        self.entries.iter().any(|r| r.same_measurement(reading))
    }

    pub fn newest(&self) -> Option<&SensorReading> {
        self.entries.front()
    }

    pub fn oldest(&self) -> Option<&SensorReading> {
        self.entries.back()
    }

    /// Readings, newest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &SensorReading> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_vec(&self) -> Vec<SensorReading> {
        self.entries.iter().cloned().collect()
    }

    fn take(&mut self) -> VecDeque<SensorReading> {
        std::mem::take(&mut self.entries)
    }
}

/// Identifies one history request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTicket {
    pub device_id: String,
    pub generation: u64,
}

/// What a push event changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadingOutcome {
    /// The device id was seen for the first time.
    pub new_device: bool,
    /// The reading belongs to the selected device and updated "latest".
    pub applied: bool,
}

/// Device registry, selection and history of the dashboard.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    registry: DeviceRegistry,
    selected: Option<String>,
    latest: Option<SensorReading>,
    history: HistoryBuffer,
    generation: u64,
    pending: Option<HistoryTicket>,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the initial bulk snapshot.
    ///
    /// Registers every device in snapshot order. If nothing was selected yet,
    /// the first device becomes selected and its snapshot reading becomes
    /// "latest"; the returned ticket is for that device's history fetch.
    pub fn seed(&mut self, snapshot: &[SensorReading]) -> Option<HistoryTicket> {
        for reading in snapshot {
            self.registry.observe(&reading.device_id);
        }
        if self.selected.is_some() {
            return None;
        }
        let first = self.registry.first()?.to_string();
        let ticket = self.begin_selection(first);
        self.latest = snapshot
            .iter()
            .find(|r| Some(r.device_id.as_str()) == self.selected.as_deref())
            .cloned();
        Some(ticket)
    }

    /// Apply one push event.
    pub fn apply_reading(&mut self, reading: SensorReading) -> ReadingOutcome {
        let new_device = self.registry.observe(&reading.device_id);
        if self.selected.as_deref() != Some(reading.device_id.as_str()) {
            return ReadingOutcome {
                new_device,
                applied: false,
            };
        }

        self.latest = Some(reading.clone());
        if !self.history.push_newest(reading) {
            debug!("Duplicate reading not added to history");
        }
        ReadingOutcome {
            new_device,
            applied: true,
        }
    }

    /// Switch the selected device.
    ///
    /// Discards history and "latest" and returns the ticket for the new
    /// history fetch. Unknown devices are rejected without any change.
    pub fn select_device(&mut self, device_id: &str) -> Result<HistoryTicket> {
        if !self.registry.contains(device_id) {
            return Err(Error::UnknownDevice(device_id.to_string()));
        }
        Ok(self.begin_selection(device_id.to_string()))
    }

    /// Apply a history response. Returns `false` if the ticket is stale.
    ///
    /// Pushes received while the request was in flight stay ahead of the
    /// fetched history.
    pub fn apply_history(&mut self, ticket: &HistoryTicket, readings: Vec<SensorReading>) -> bool {
        if !self.is_current(ticket) {
            debug!(
                "Discarding stale history for {} (generation {})",
                ticket.device_id, ticket.generation
            );
            return false;
        }

        let pushed = self.history.take();
        let mut buffer = HistoryBuffer::from_newest_first(readings);
        for reading in pushed.into_iter().rev() {
            buffer.push_newest(reading);
        }
        self.history = buffer;
        if self.latest.is_none() {
            self.latest = self.history.newest().cloned();
        }
        self.pending = None;
        true
    }

    /// Record a failed history fetch. Returns `false` if the ticket is stale.
    pub fn history_failed(&mut self, ticket: &HistoryTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        warn!("History for {} unavailable", ticket.device_id);
        self.pending = None;
        true
    }

    /// Whether `ticket` still matches the current selection.
    pub fn is_current(&self, ticket: &HistoryTicket) -> bool {
        ticket.generation == self.generation
            && self.selected.as_deref() == Some(ticket.device_id.as_str())
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn latest(&self) -> Option<&SensorReading> {
        self.latest.as_ref()
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    /// Whether a history fetch for the selected device is outstanding.
    pub fn is_loading_history(&self) -> bool {
        self.pending.is_some()
    }

    fn begin_selection(&mut self, device_id: String) -> HistoryTicket {
        self.generation += 1;
        self.history.clear();
        self.latest = None;
        self.selected = Some(device_id.clone());
        let ticket = HistoryTicket {
            device_id,
            generation: self.generation,
        };
        self.pending = Some(ticket.clone());
        ticket
    }
}
