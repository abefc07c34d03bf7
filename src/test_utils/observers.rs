use crate::bus::{LiveEvent, Observer, ObserverError, ObserverId};
use parking_lot::Mutex;
use uuid::Uuid;

/// Observer that keeps every event it receives.
#[derive(Debug)]
pub struct RecordingObserver {
    id: ObserverId,
    events: Mutex<Vec<LiveEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<LiveEvent> {
        self.events.lock().clone()
    }
}

impl Default for RecordingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl Observer for RecordingObserver {
    fn id(&self) -> ObserverId {
        self.id
    }

    fn send(&self, event: &LiveEvent) -> Result<(), ObserverError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Observer whose connection is already gone.
#[derive(Debug)]
pub struct FailingObserver {
    id: ObserverId,
}

impl FailingObserver {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }
}

impl Default for FailingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl Observer for FailingObserver {
    fn id(&self) -> ObserverId {
        self.id
    }

    fn send(&self, _event: &LiveEvent) -> Result<(), ObserverError> {
        Err(ObserverError::Closed)
    }
}
