use crate::datamodel::{AlarmUpdateSummary, MetricBatch};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Debug;
use thiserror::Error;

pub mod http;
pub mod storage;

pub use http::HttpSink;
pub use storage::StorageSink;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeliveryError {
    /// The collaborator refused the payload as invalid. Resending it would fail again.
    #[error("Rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Server error with status {status}")]
    Server { status: u16 },

    /// Request timeout or rate limiting, the same payload may succeed later.
    #[error("Not accepted yet, status {status}")]
    Throttled { status: u16 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl DeliveryError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, DeliveryError::Rejected { .. })
    }
}

/// Destination of flushed batches and alarm reports.
#[async_trait]
pub trait MetricSink: Send + Sync + Debug {
    async fn deliver(&self, batch: &MetricBatch) -> Result<(), DeliveryError>;

    async fn deliver_alarms(
        &self,
        device_id: &str,
        states: &BTreeMap<String, bool>,
    ) -> Result<AlarmUpdateSummary, DeliveryError>;
}
