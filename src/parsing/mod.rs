use std::collections::BTreeMap;
use thiserror::Error;

use crate::datamodel::unit::Unit;

pub mod decoders;
pub mod payload;
pub mod tables;
pub mod topic;

pub use payload::Payload;
pub use topic::{TopicPath, TopicSuffix};

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("Malformed topic: {0}")]
    MalformedTopic(String),

    #[error("Unexpected payload for {suffix}: expected {expected}")]
    UnexpectedShape {
        suffix: TopicSuffix,
        expected: &'static str,
    },
}

/// Fixed conversion from a raw fixed-point device value to its canonical unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    divisor: f64,
    absolute: bool,
}

impl Scale {
    pub const IDENTITY: Scale = Scale::divide_by(1.0);
    /// mV → V, mA → A, mW → W, m°C → °C, mHz → Hz.
    pub const MILLI: Scale = Scale::divide_by(1000.0);
    /// Fixed-point percent, 1100 → 11.00 %.
    pub const CENTI: Scale = Scale::divide_by(100.0);

    pub const fn divide_by(divisor: f64) -> Self {
        Self {
            divisor,
            absolute: false,
        }
    }

    /// Same conversion, with the sign of the result dropped.
    pub const fn absolute(self) -> Self {
        Self {
            divisor: self.divisor,
            absolute: true,
        }
    }

    pub fn apply(&self, raw_value: f64) -> f64 {
        let value = raw_value / self.divisor;
        if self.absolute { value.abs() } else { value }
    }
}

/// One decoded value before it becomes a [`crate::datamodel::MetricSample`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub metric_name: String,
    pub raw_value: f64,
    pub unit: Unit,
    pub scale: Scale,
}

impl Reading {
    pub fn new(metric_name: impl Into<String>, raw_value: f64, unit: Unit, scale: Scale) -> Self {
        Self {
            metric_name: metric_name.into(),
            raw_value,
            unit,
            scale,
        }
    }

    /// Value expressed in the canonical unit.
    pub fn value(&self) -> f64 {
        self.scale.apply(self.raw_value)
    }
}

/// Everything a single message decodes into.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Decoded {
    pub readings: Vec<Reading>,
    /// Alarm flags, only present for alarm reports.
    pub alarms: Option<BTreeMap<String, bool>>,
}

impl Decoded {
    pub fn from_readings(readings: Vec<Reading>) -> Self {
        Self {
            readings,
            alarms: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty() && self.alarms.as_ref().is_none_or(|a| a.is_empty())
    }
}

/// A message that matched a known suffix, with its decoded content.
#[derive(Debug)]
pub struct RoutedMessage<'a> {
    pub topic: TopicPath<'a>,
    pub suffix: TopicSuffix,
    pub decoded: Decoded,
}

/// Routes a raw publish to the decoder registered for its exact topic suffix.
///
/// Returns `Ok(None)` when the suffix is not part of the vocabulary.
pub fn route<'a>(topic: &'a str, bytes: &[u8]) -> Result<Option<RoutedMessage<'a>>, DecodeError> {
    let path = TopicPath::parse(topic)?;
    let Some(suffix) = TopicSuffix::from_suffix(path.suffix) else {
        return Ok(None);
    };
    let payload = Payload::from_bytes(bytes);
    let decoded = decoders::decode(suffix, &payload)?;
    Ok(Some(RoutedMessage {
        topic: path,
        suffix,
        decoded,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale() {
        assert_eq!(Scale::MILLI.apply(1500.0), 1.5);
        assert_eq!(Scale::CENTI.apply(1100.0), 11.0);
        assert_eq!(Scale::IDENTITY.apply(42.0), 42.0);
        assert_eq!(Scale::MILLI.absolute().apply(-25000.0), 25.0);
    }

    #[test]
    fn test_route_unknown_suffix() {
        let routed = route("pv/PV3/PV001001DEV/unknown/thing", br#"{"value": 1}"#).unwrap();
        assert!(routed.is_none());
    }

    #[test]
    fn test_route_malformed_topic() {
        assert!(matches!(
            route("pv/PV3", b"{}"),
            Err(DecodeError::MalformedTopic(_))
        ));
    }

    #[test]
    fn test_route_known_suffix() {
        let routed = route(
            "pv/PV3/PV001001DEV/pylontech/info",
            br#"[{"measurement":"StateOfHealth","type":"Avg","value":97}]"#,
        )
        .unwrap()
        .unwrap();

        assert_eq!(routed.suffix, TopicSuffix::BatteryModuleInfo);
        assert_eq!(routed.topic.device_id, "PV001001DEV");
        assert_eq!(routed.decoded.readings.len(), 1);
        assert_eq!(routed.decoded.readings[0].metric_name, "soh");
        assert_eq!(routed.decoded.readings[0].value(), 97.0);
        assert_eq!(routed.decoded.readings[0].unit, Unit::Percent);
    }

    #[test]
    fn test_route_prefix_is_not_a_match() {
        // Exact suffix match only, an extra segment is a different topic.
        let routed = route("pv/PV3/PV001001DEV/bms/soc/extra", br#"{"usable_soc": 5000}"#).unwrap();
        assert!(routed.is_none());
        let routed = route("pv/PV3/PV001001DEV/bms", br#"{"usable_soc": 5000}"#).unwrap();
        assert!(routed.is_none());
    }
}
