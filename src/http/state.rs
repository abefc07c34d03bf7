use crate::bus::FanoutRegistry;
use crate::pipeline::CollectorStatus;
use crate::storage::StorageInstance;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Clone, Debug)]
pub struct HttpServerState {
    pub name: Arc<String>,
    pub fanout: Arc<FanoutRegistry>,
    /// Only present when the collector writes to storage in this process.
    pub storage: Option<Arc<dyn StorageInstance>>,
    pub collector_status: Option<watch::Receiver<CollectorStatus>>,
    pub ws_heartbeat: Duration,
    pub observer_buffer: usize,
}

impl HttpServerState {
    pub fn new(name: &str, fanout: Arc<FanoutRegistry>) -> Self {
        Self {
            name: Arc::new(name.to_string()),
            fanout,
            storage: None,
            collector_status: None,
            ws_heartbeat: Duration::from_secs(30),
            observer_buffer: 64,
        }
    }
}
