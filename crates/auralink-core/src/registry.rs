//! Callback fan-out for decoded push events.
//!
//! Any number of listeners may register for sensor readings or status
//! notices. Each registration returns a [`Subscription`] that removes exactly
//! that listener, so registering the same closure twice yields two
//! independent listeners.
//!
//! Listeners run on the connection's session task, in registration order. A
//! panicking listener is logged and skipped; later listeners still receive
//! the event.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use auralink_types::{DeviceStatusEvent, SensorReading};
use tracing::error;

use crate::router::RoutedEvent;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entry<T> {
    callback: Callback<T>,
    active: Arc<AtomicBool>,
}

struct Listeners<T> {
    entries: BTreeMap<u64, Entry<T>>,
}

impl<T> Listeners<T> {
    fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

/// Removal side of a listener table, independent of the event type.
trait Detach: Send + Sync {
    fn remove(&self, token: u64);
}

impl<T: 'static> Detach for Mutex<Listeners<T>> {
    fn remove(&self, token: u64) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .remove(&token);
    }
}

struct Inner {
    next_token: AtomicU64,
    readings: Arc<Mutex<Listeners<SensorReading>>>,
    statuses: Arc<Mutex<Listeners<DeviceStatusEvent>>>,
}

/// Registry of event listeners shared by every clone.
#[derive(Clone)]
pub struct CallbackRegistry {
    inner: Arc<Inner>,
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("sensor_listeners", &self.sensor_listener_count())
            .field("status_listeners", &self.status_listener_count())
            .finish()
    }
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                next_token: AtomicU64::new(0),
                readings: Arc::new(Mutex::new(Listeners::new())),
                statuses: Arc::new(Mutex::new(Listeners::new())),
            }),
        }
    }

    /// Register a listener for sensor readings.
    pub fn on_sensor_data<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SensorReading) + Send + Sync + 'static,
    {
        self.register(&self.inner.readings, Arc::new(callback))
    }

    /// Register a listener for device status notices.
    pub fn on_status<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&DeviceStatusEvent) + Send + Sync + 'static,
    {
        self.register(&self.inner.statuses, Arc::new(callback))
    }

    /// Deliver a reading to every active sensor listener.
    pub fn dispatch_reading(&self, reading: &SensorReading) {
        dispatch(&self.inner.readings, reading, "sensor");
    }

    /// Deliver a status notice to every active status listener.
    pub fn dispatch_status(&self, status: &DeviceStatusEvent) {
        dispatch(&self.inner.statuses, status, "status");
    }

    /// Deliver a routed event to the matching listeners.
    pub fn dispatch(&self, event: &RoutedEvent) {
        match event {
            RoutedEvent::Reading(reading) => self.dispatch_reading(reading),
            RoutedEvent::Status(status) => self.dispatch_status(status),
        }
    }

    pub fn sensor_listener_count(&self) -> usize {
        len(&self.inner.readings)
    }

    pub fn status_listener_count(&self) -> usize {
        len(&self.inner.statuses)
    }

    fn register<T: 'static>(
        &self,
        table: &Arc<Mutex<Listeners<T>>>,
        callback: Callback<T>,
    ) -> Subscription {
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .insert(
                token,
                Entry {
                    callback,
                    active: Arc::clone(&active),
                },
            );
        let owner = Arc::downgrade(table);
        let owner: Weak<dyn Detach> = owner;
        Subscription {
            token,
            owner,
            active,
            detached: false,
        }
    }
}

fn len<T>(table: &Mutex<Listeners<T>>) -> usize {
    table
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entries
        .len()
}

fn dispatch<T>(table: &Mutex<Listeners<T>>, event: &T, kind: &str) {
    // Snapshot so listeners may (un)register from inside a callback.
    let snapshot: Vec<(Callback<T>, Arc<AtomicBool>)> = table
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entries
        .values()
        .map(|e| (Arc::clone(&e.callback), Arc::clone(&e.active)))
        .collect();

    for (callback, active) in snapshot {
        if !active.load(Ordering::Acquire) {
            continue;
        }
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(event))) {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("{} listener panicked: {}", kind, reason);
        }
    }
}

/// Handle to one registered listener.
///
/// Dropping the handle unregisters the listener; call [`detach`](Self::detach)
/// to keep it registered for the lifetime of the registry.
#[must_use = "dropping a Subscription unregisters the listener"]
pub struct Subscription {
    token: u64,
    owner: Weak<dyn Detach>,
    active: Arc<AtomicBool>,
    detached: bool,
}

impl Subscription {
    /// Remove the listener. Calling this more than once has no effect.
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::AcqRel)
            && let Some(owner) = self.owner.upgrade()
        {
            owner.remove(self.token);
        }
    }

    /// Whether the listener is still registered.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Keep the listener registered after this handle is dropped.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.detached {
            self.unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("token", &self.token)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(device: &str, timestamp: i64) -> SensorReading {
        SensorReading {
            device_id: device.to_string(),
            timestamp,
            temperature: 20.0,
            humidity: 40.0,
            air_quality_raw: None,
            co2: 400,
            nh3: 0,
            ch4: 0,
            co: 0,
            air_quality_status: Default::default(),
            motion_detected: false,
            received_at: None,
        }
    }

    #[test]
    fn test_fan_out_in_registration_order() {
        let registry = CallbackRegistry::new();
        let log = Arc::new(Mutex::new(Vec::<String>::new()));

        let l1 = Arc::clone(&log);
        let _a = registry.on_sensor_data(move |r| l1.lock().unwrap().push(format!("a:{}", r.timestamp)));
        let l2 = Arc::clone(&log);
        let _b = registry.on_sensor_data(move |r| l2.lock().unwrap().push(format!("b:{}", r.timestamp)));

        registry.dispatch_reading(&reading("x", 1));
        registry.dispatch_reading(&reading("x", 2));

        assert_eq!(*log.lock().unwrap(), ["a:1", "b:1", "a:2", "b:2"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery_only_for_that_listener() {
        let registry = CallbackRegistry::new();
        let log = Arc::new(Mutex::new(Vec::<String>::new()));

        let l1 = Arc::clone(&log);
        let a = registry.on_sensor_data(move |_| l1.lock().unwrap().push("a".into()));
        let l2 = Arc::clone(&log);
        let _b = registry.on_sensor_data(move |_| l2.lock().unwrap().push("b".into()));

        a.unsubscribe();
        a.unsubscribe();
        assert!(!a.is_active());
        registry.dispatch_reading(&reading("x", 1));

        assert_eq!(*log.lock().unwrap(), ["b"]);
        assert_eq!(registry.sensor_listener_count(), 1);
    }

    #[test]
    fn test_same_closure_registered_twice_is_two_listeners() {
        let registry = CallbackRegistry::new();
        let count = Arc::new(AtomicU64::new(0));
        let make = || {
            let count = Arc::clone(&count);
            move |_: &SensorReading| {
                count.fetch_add(1, Ordering::SeqCst);
            }
        };
        let first = registry.on_sensor_data(make());
        let _second = registry.on_sensor_data(make());

        registry.dispatch_reading(&reading("x", 1));
        drop(first);
        registry.dispatch_reading(&reading("x", 2));

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let registry = CallbackRegistry::new();
        let delivered = Arc::new(AtomicBool::new(false));

        let _bad = registry.on_status(|_| panic!("boom"));
        let flag = Arc::clone(&delivered);
        let _good = registry.on_status(move |_| flag.store(true, Ordering::SeqCst));

        registry.dispatch_status(&DeviceStatusEvent::default());
        assert!(delivered.load(Ordering::SeqCst));
    }

    #[test]
    fn test_topics_are_independent() {
        let registry = CallbackRegistry::new();
        let readings = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&readings);
        let _sub = registry.on_sensor_data(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        registry.dispatch(&RoutedEvent::Status(DeviceStatusEvent::default()));
        assert_eq!(readings.load(Ordering::SeqCst), 0);
        registry.dispatch(&RoutedEvent::Reading(reading("x", 1)));
        assert_eq!(readings.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_detach_keeps_listener() {
        let registry = CallbackRegistry::new();
        registry.on_status(|_| {}).detach();
        assert_eq!(registry.status_listener_count(), 1);
    }

    #[test]
    fn test_unsubscribe_from_inside_callback() {
        let registry = CallbackRegistry::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let count = Arc::new(AtomicU64::new(0));

        let inner_slot = Arc::clone(&slot);
        let counter = Arc::clone(&count);
        let sub = registry.on_sensor_data(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(sub) = inner_slot.lock().unwrap().as_ref() {
                sub.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(sub);

        registry.dispatch_reading(&reading("x", 1));
        registry.dispatch_reading(&reading("x", 2));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_outlives_registry() {
        let registry = CallbackRegistry::new();
        let sub = registry.on_sensor_data(|_| {});
        drop(registry);
        sub.unsubscribe();
        assert!(!sub.is_active());
    }
}
