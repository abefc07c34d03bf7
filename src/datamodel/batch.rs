use super::{CollectorDateTime, MetricSample};

/// Snapshot handed to the delivery path on every flush.
///
/// All samples share the flush timestamp and are ordered by metric name.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricBatch {
    pub device_id: String,
    pub timestamp: CollectorDateTime,
    pub samples: Vec<MetricSample>,
}

impl MetricBatch {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, metric_name: &str) -> Option<&MetricSample> {
        self.samples.iter().find(|s| s.metric_name == metric_name)
    }
}
