use crate::datamodel::CollectorDateTime;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerState {
    #[default]
    Disconnected,
    Connecting,
    Subscribed,
    Faulted,
}

impl BrokerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerState::Disconnected => "disconnected",
            BrokerState::Connecting => "connecting",
            BrokerState::Subscribed => "subscribed",
            BrokerState::Faulted => "faulted",
        }
    }
}

impl fmt::Display for BrokerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CollectorCounters {
    pub messages_received: u64,
    pub messages_dropped: u64,
    pub flushes: u64,
    pub delivery_failures: u64,
}

/// Point-in-time view of a collector, as exposed on the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectorStatus {
    pub running: bool,
    pub broker_state: BrokerState,
    #[serde(flatten)]
    pub counters: CollectorCounters,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_store: Option<CollectorDateTime>,
    pub mqtt_host: String,
    pub device_id: String,
    /// Flush interval in seconds.
    pub interval: u64,
}

impl CollectorStatus {
    pub fn stopped(mqtt_host: &str, device_id: &str, interval: u64) -> Self {
        Self {
            running: false,
            broker_state: BrokerState::Disconnected,
            counters: CollectorCounters::default(),
            last_store: None,
            mqtt_host: mqtt_host.to_string(),
            device_id: device_id.to_string(),
            interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_serialization() {
        let status = CollectorStatus::stopped("broker.local", "PV001001DEV", 5);
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({
                "running": false,
                "broker_state": "disconnected",
                "messages_received": 0,
                "messages_dropped": 0,
                "flushes": 0,
                "delivery_failures": 0,
                "last_store": null,
                "mqtt_host": "broker.local",
                "device_id": "PV001001DEV",
                "interval": 5
            })
        );
    }
}
