use crate::datamodel::{AlarmUpdateSummary, MetricBatch};
use crate::delivery::{DeliveryError, MetricSink};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// How a [`RecordingSink`] answers deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkBehavior {
    #[default]
    Accept,
    Reject,
    Unavailable,
}

/// Sink that keeps every delivery in memory.
///
/// Batches are recorded even when the configured behavior fails them, so a test
/// can check what was attempted.
#[derive(Debug, Default)]
pub struct RecordingSink {
    behavior: Mutex<SinkBehavior>,
    batches: Mutex<Vec<MetricBatch>>,
    alarm_reports: Mutex<Vec<(String, BTreeMap<String, bool>)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(behavior: SinkBehavior) -> Self {
        let sink = Self::default();
        sink.set_behavior(behavior);
        sink
    }

    pub fn set_behavior(&self, behavior: SinkBehavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn batches(&self) -> Vec<MetricBatch> {
        self.batches.lock().clone()
    }

    pub fn alarm_reports(&self) -> Vec<(String, BTreeMap<String, bool>)> {
        self.alarm_reports.lock().clone()
    }

    fn outcome(&self) -> Result<(), DeliveryError> {
        match *self.behavior.lock() {
            SinkBehavior::Accept => Ok(()),
            SinkBehavior::Reject => Err(DeliveryError::Rejected {
                status: 422,
                body: "invalid measurement".to_string(),
            }),
            SinkBehavior::Unavailable => Err(DeliveryError::Server { status: 503 }),
        }
    }
}

#[async_trait]
impl MetricSink for RecordingSink {
    async fn deliver(&self, batch: &MetricBatch) -> Result<(), DeliveryError> {
        self.batches.lock().push(batch.clone());
        self.outcome()
    }

    async fn deliver_alarms(
        &self,
        device_id: &str,
        states: &BTreeMap<String, bool>,
    ) -> Result<AlarmUpdateSummary, DeliveryError> {
        self.alarm_reports
            .lock()
            .push((device_id.to_string(), states.clone()));
        self.outcome()?;
        Ok(AlarmUpdateSummary {
            alarms_updated: states.len(),
            events_created: 0,
        })
    }
}
