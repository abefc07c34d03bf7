use crate::datamodel::{AlarmEvent, AlarmUpdateSummary, MetricBatch, MetricSample};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Debug;

#[async_trait]
pub trait StorageInstance: Send + Sync + Debug {
    async fn create_or_migrate(&self) -> Result<()>;

    /// Stores every sample of the batch in one transaction, creating the device
    /// record when it does not exist yet.
    async fn publish_metrics(&self, batch: &MetricBatch) -> Result<()>;

    /// Merges alarm states and appends one event per transition.
    async fn store_alarm_states(
        &self,
        device_id: &str,
        states: &BTreeMap<String, bool>,
    ) -> Result<AlarmUpdateSummary>;

    async fn health_check(&self) -> Result<()>;

    /// Most recent stored value of every metric of a device.
    async fn latest_metrics(&self, device_id: &str) -> Result<Vec<MetricSample>>;

    /// Alarm history of a device, oldest first.
    async fn alarm_events(&self, device_id: &str) -> Result<Vec<AlarmEvent>>;
}
