use crate::datamodel::{AlarmEvent, CollectorDateTime, MetricSample};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Push event delivered to live observers of one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiveEvent {
    MetricUpdate {
        device_id: String,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: CollectorDateTime,
        data: BTreeMap<String, f64>,
    },
    AlarmUpdate {
        device_id: String,
        alarm_name: String,
        is_active: bool,
    },
    Heartbeat,
}

impl LiveEvent {
    pub fn metric_update(
        device_id: &str,
        timestamp: CollectorDateTime,
        samples: &[MetricSample],
    ) -> Self {
        LiveEvent::MetricUpdate {
            device_id: device_id.to_string(),
            timestamp,
            data: samples
                .iter()
                .map(|sample| (sample.metric_name.clone(), sample.metric_value))
                .collect(),
        }
    }

    pub fn alarm_update(event: &AlarmEvent) -> Self {
        LiveEvent::AlarmUpdate {
            device_id: event.device_id.clone(),
            alarm_name: event.alarm_name.clone(),
            is_active: event.is_active(),
        }
    }

    pub fn device_id(&self) -> Option<&str> {
        match self {
            LiveEvent::MetricUpdate { device_id, .. } | LiveEvent::AlarmUpdate { device_id, .. } => {
                Some(device_id)
            }
            LiveEvent::Heartbeat => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamodel::AlarmEventType;
    use crate::datamodel::collector_datetime::CollectorDateTimeExt;
    use serde_json::json;

    #[test]
    fn test_metric_update_shape() {
        let ts = CollectorDateTime::from_unix_seconds_i64(1704067200);
        let samples = vec![
            MetricSample::new("dev", ts, "soc", 42.5, "%", "pv/PV3/dev/bms/soc"),
            MetricSample::new("dev", ts, "grid_power", -10.0, "W", "pv/PV3/dev/ffr/measurements"),
        ];

        let value = serde_json::to_value(LiveEvent::metric_update("dev", ts, &samples)).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "METRIC_UPDATE",
                "device_id": "dev",
                "timestamp": "2024-01-01T00:00:00Z",
                "data": {"grid_power": -10.0, "soc": 42.5}
            })
        );
    }

    #[test]
    fn test_alarm_update_shape() {
        let event = AlarmEvent {
            device_id: "dev".to_string(),
            timestamp: CollectorDateTime::from_unix_seconds_i64(1704067200),
            alarm_name: "grid_lost".to_string(),
            event_type: AlarmEventType::Cleared,
        };

        let value = serde_json::to_value(LiveEvent::alarm_update(&event)).unwrap();
        assert_eq!(
            value,
            json!({"type": "ALARM_UPDATE", "device_id": "dev", "alarm_name": "grid_lost", "is_active": false})
        );
    }

    #[test]
    fn test_heartbeat_shape() {
        assert_eq!(LiveEvent::Heartbeat.to_json().unwrap(), r#"{"type":"HEARTBEAT"}"#);
        assert_eq!(LiveEvent::Heartbeat.device_id(), None);
    }
}
