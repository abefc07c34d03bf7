use super::CollectorDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmEventType {
    Triggered,
    Cleared,
}

impl AlarmEventType {
    pub fn from_active(is_active: bool) -> Self {
        if is_active {
            AlarmEventType::Triggered
        } else {
            AlarmEventType::Cleared
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmEventType::Triggered => "triggered",
            AlarmEventType::Cleared => "cleared",
        }
    }
}

impl fmt::Display for AlarmEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed alarm transition. Append only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmEvent {
    pub device_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: CollectorDateTime,
    pub alarm_name: String,
    pub event_type: AlarmEventType,
}

impl AlarmEvent {
    pub fn is_active(&self) -> bool {
        self.event_type == AlarmEventType::Triggered
    }
}

/// Outcome of merging one alarm report into an [`AlarmFlagSet`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AlarmUpdate {
    /// Number of alarm entries that were created or flipped.
    pub changed: usize,
    pub events: Vec<AlarmEvent>,
}

/// Counts returned by the alarm-state collaborator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmUpdateSummary {
    pub alarms_updated: usize,
    pub events_created: usize,
}

/// Latest known active flag of every alarm name ever reported by a device.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AlarmFlagSet {
    flags: BTreeMap<String, bool>,
}

impl AlarmFlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, alarm_name: &str) -> Option<bool> {
        self.flags.get(alarm_name).copied()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, bool> {
        &self.flags
    }

    pub fn active(&self) -> impl Iterator<Item = &str> {
        self.flags
            .iter()
            .filter(|(_, active)| **active)
            .map(|(name, _)| name.as_str())
    }

    /// Merges a report in place and returns the transitions it caused.
    ///
    /// A flipped flag yields one event. A first-seen flag yields a `triggered`
    /// event only when it is already active.
    pub fn apply(
        &mut self,
        device_id: &str,
        timestamp: CollectorDateTime,
        report: &BTreeMap<String, bool>,
    ) -> AlarmUpdate {
        let mut update = AlarmUpdate::default();
        for (alarm_name, &is_active) in report {
            let previous = self.flags.insert(alarm_name.clone(), is_active);
            let emits = match previous {
                Some(was_active) if was_active == is_active => continue,
                Some(_) => true,
                None => is_active,
            };
            update.changed += 1;
            if emits {
                update.events.push(AlarmEvent {
                    device_id: device_id.to_string(),
                    timestamp,
                    alarm_name: alarm_name.clone(),
                    event_type: AlarmEventType::from_active(is_active),
                });
            }
        }
        update
    }
}
