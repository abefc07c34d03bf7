use super::observer::{Observer, ObserverId};
use super::LiveEvent;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

type DeviceObservers = HashMap<ObserverId, Arc<dyn Observer>>;

/// Result of one [`FanoutRegistry::publish`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub removed: usize,
}

/// Per-device set of live observers.
///
/// The lock only guards registration and snapshotting, sends happen outside of it.
#[derive(Debug, Default)]
pub struct FanoutRegistry {
    devices: Mutex<HashMap<String, DeviceObservers>>,
}

impl FanoutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the observer was already registered.
    pub fn register(&self, device_id: &str, observer: Arc<dyn Observer>) -> bool {
        let mut devices = self.devices.lock();
        let observers = devices.entry(device_id.to_string()).or_default();
        let id = observer.id();
        if observers.contains_key(&id) {
            return false;
        }
        observers.insert(id, observer);
        debug!("Observer {} registered for device {}", id, device_id);
        true
    }

    /// Returns false when the observer was not registered.
    pub fn unregister(&self, device_id: &str, observer_id: ObserverId) -> bool {
        let mut devices = self.devices.lock();
        let Some(observers) = devices.get_mut(device_id) else {
            return false;
        };
        let removed = observers.remove(&observer_id).is_some();
        if observers.is_empty() {
            devices.remove(device_id);
        }
        if removed {
            debug!("Observer {} unregistered from device {}", observer_id, device_id);
        }
        removed
    }

    pub fn observer_count(&self, device_id: &str) -> usize {
        self.devices
            .lock()
            .get(device_id)
            .map_or(0, |observers| observers.len())
    }

    pub fn contains(&self, device_id: &str, observer_id: ObserverId) -> bool {
        self.devices
            .lock()
            .get(device_id)
            .is_some_and(|observers| observers.contains_key(&observer_id))
    }

    pub fn publish(&self, device_id: &str, event: &LiveEvent) -> PublishReport {
        let snapshot: Vec<Arc<dyn Observer>> = match self.devices.lock().get(device_id) {
            Some(observers) => observers.values().cloned().collect(),
            None => return PublishReport::default(),
        };

        let mut report = PublishReport::default();
        for observer in snapshot {
            match observer.send(event) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    warn!(
                        "Dropping observer {} of device {}: {}",
                        observer.id(),
                        device_id,
                        err
                    );
                    if self.unregister(device_id, observer.id()) {
                        report.removed += 1;
                    }
                }
            }
        }
        report
    }
}
