use super::DecodeError;
use std::fmt;

/// A publish topic split into `<namespace>/<protocol>/<device-id>/<suffix...>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicPath<'a> {
    pub namespace: &'a str,
    pub protocol: &'a str,
    pub device_id: &'a str,
    /// Every segment after the device id, still joined by `/`.
    pub suffix: &'a str,
}

impl<'a> TopicPath<'a> {
    pub fn parse(topic: &'a str) -> Result<Self, DecodeError> {
        let mut parts = topic.splitn(4, '/');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(namespace), Some(protocol), Some(device_id), Some(suffix))
                if !device_id.is_empty() && !suffix.is_empty() =>
            {
                Ok(Self {
                    namespace,
                    protocol,
                    device_id,
                    suffix,
                })
            }
            _ => Err(DecodeError::MalformedTopic(topic.to_string())),
        }
    }
}

/// Subscription filter covering the whole topic tree of one device.
pub fn device_topic_filter(namespace: &str, protocol: &str, device_id: &str) -> String {
    format!("{}/{}/{}/#", namespace, protocol, device_id)
}

/// The fixed vocabulary of topic suffixes published by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicSuffix {
    StateOfCharge,
    InverterMeasurements,
    InverterAlarms,
    InverterCharge,
    BatteryModuleInfo,
    CurrentTransformers,
    ScheduleEvent,
    MaxPower,
    EpsStatus,
    EpsSchedule,
    SafetyCheck,
}

impl TopicSuffix {
    pub const ALL: [TopicSuffix; 11] = [
        TopicSuffix::StateOfCharge,
        TopicSuffix::InverterMeasurements,
        TopicSuffix::InverterAlarms,
        TopicSuffix::InverterCharge,
        TopicSuffix::BatteryModuleInfo,
        TopicSuffix::CurrentTransformers,
        TopicSuffix::ScheduleEvent,
        TopicSuffix::MaxPower,
        TopicSuffix::EpsStatus,
        TopicSuffix::EpsSchedule,
        TopicSuffix::SafetyCheck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TopicSuffix::StateOfCharge => "bms/soc",
            TopicSuffix::InverterMeasurements => "inverter/measurements",
            TopicSuffix::InverterAlarms => "inverter/alarms",
            TopicSuffix::InverterCharge => "inverter/charge",
            TopicSuffix::BatteryModuleInfo => "pylontech/info",
            TopicSuffix::CurrentTransformers => "ffr/measurements",
            TopicSuffix::ScheduleEvent => "schedule/event",
            TopicSuffix::MaxPower => "m4/maxpower",
            TopicSuffix::EpsStatus => "eps/status",
            TopicSuffix::EpsSchedule => "eps_schedule/event",
            TopicSuffix::SafetyCheck => "safetycheck/state",
        }
    }

    /// Exact match against the vocabulary.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == suffix)
    }
}

impl fmt::Display for TopicSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_topic() {
        let path = TopicPath::parse("pv/PV3/PV001001DEV/inverter/measurements").unwrap();
        assert_eq!(path.namespace, "pv");
        assert_eq!(path.protocol, "PV3");
        assert_eq!(path.device_id, "PV001001DEV");
        assert_eq!(path.suffix, "inverter/measurements");
    }

    #[test]
    fn test_parse_malformed_topics() {
        for topic in ["", "pv", "pv/PV3", "pv/PV3/PV001001DEV", "pv/PV3/PV001001DEV/", "pv/PV3//bms/soc"] {
            assert!(
                TopicPath::parse(topic).is_err(),
                "{:?} should be rejected",
                topic
            );
        }
    }

    #[test]
    fn test_suffix_roundtrip() {
        for suffix in TopicSuffix::ALL {
            assert_eq!(TopicSuffix::from_suffix(suffix.as_str()), Some(suffix));
        }
    }

    #[test]
    fn test_unknown_suffix() {
        assert_eq!(TopicSuffix::from_suffix("unknown/thing"), None);
        assert_eq!(TopicSuffix::from_suffix("bms/soc/"), None);
        assert_eq!(TopicSuffix::from_suffix("BMS/SOC"), None);
    }

    #[test]
    fn test_device_topic_filter() {
        assert_eq!(
            device_topic_filter("pv", "PV3", "PV001001DEV"),
            "pv/PV3/PV001001DEV/#"
        );
    }
}
