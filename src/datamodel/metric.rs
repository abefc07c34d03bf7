use super::CollectorDateTime;
use serde::{Deserialize, Serialize};

/// One normalized reading, expressed in the canonical unit of its metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub device_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: CollectorDateTime,
    /// Canonical vocabulary key, e.g. `battery_voltage` or `grid_power`.
    pub metric_name: String,
    pub metric_value: f64,
    /// Canonical unit, may be empty for dimensionless metrics.
    pub unit: String,
    pub source_topic: String,
}

impl MetricSample {
    pub fn new(
        device_id: impl Into<String>,
        timestamp: CollectorDateTime,
        metric_name: impl Into<String>,
        metric_value: f64,
        unit: impl Into<String>,
        source_topic: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp,
            metric_name: metric_name.into(),
            metric_value,
            unit: unit.into(),
            source_topic: source_topic.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamodel::collector_datetime::CollectorDateTimeExt;

    #[test]
    fn test_metric_sample_serialization() {
        let sample = MetricSample::new(
            "PV001001DEV",
            CollectorDateTime::from_unix_seconds_i64(1704067200),
            "battery_voltage",
            51.2,
            "V",
            "pv/PV3/PV001001DEV/inverter/measurements",
        );
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["timestamp"], "2024-01-01T00:00:00Z");
        assert_eq!(json["metric_name"], "battery_voltage");
        assert_eq!(json["metric_value"], 51.2);
        assert_eq!(json["unit"], "V");
    }
}
