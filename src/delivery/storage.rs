use super::{DeliveryError, MetricSink};
use crate::datamodel::{AlarmUpdateSummary, MetricBatch};
use crate::storage::StorageInstance;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Writes directly to the storage backend of the running process.
#[derive(Debug, Clone)]
pub struct StorageSink {
    storage: Arc<dyn StorageInstance>,
}

impl StorageSink {
    pub fn new(storage: Arc<dyn StorageInstance>) -> Self {
        Self { storage }
    }
}

fn storage_error(err: anyhow::Error) -> DeliveryError {
    DeliveryError::Storage(format!("{:#}", err))
}

#[async_trait]
impl MetricSink for StorageSink {
    async fn deliver(&self, batch: &MetricBatch) -> Result<(), DeliveryError> {
        self.storage.publish_metrics(batch).await.map_err(storage_error)
    }

    async fn deliver_alarms(
        &self,
        device_id: &str,
        states: &BTreeMap<String, bool>,
    ) -> Result<AlarmUpdateSummary, DeliveryError> {
        self.storage
            .store_alarm_states(device_id, states)
            .await
            .map_err(storage_error)
    }
}
