use crate::datamodel::collector_datetime::elapsed_between;
use crate::datamodel::{CollectorDateTime, MetricBatch, MetricSample};
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);
pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_secs(1);
pub const MAX_FLUSH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
struct Latest {
    value: f64,
    unit: String,
    source_topic: String,
}

/// Rolling snapshot of the latest value of every metric seen since start.
///
/// Each flush re-sends every metric, including the ones that did not change
/// since the previous flush. Only [`BatchAccumulator::remove`] drops an entry.
#[derive(Debug, Default, Clone)]
pub struct BatchAccumulator {
    latest: BTreeMap<String, Latest>,
}

impl BatchAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, metric_name: &str, value: f64, unit: &str, source_topic: &str) {
        if !value.is_finite() {
            return;
        }
        let latest = Latest {
            value,
            unit: unit.to_string(),
            source_topic: source_topic.to_string(),
        };
        match self.latest.get_mut(metric_name) {
            Some(entry) => *entry = latest,
            None => {
                self.latest.insert(metric_name.to_string(), latest);
            }
        }
    }

    pub fn remove(&mut self, metric_name: &str) -> Option<f64> {
        self.latest.remove(metric_name).map(|latest| latest.value)
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }

    pub fn value(&self, metric_name: &str) -> Option<f64> {
        self.latest.get(metric_name).map(|latest| latest.value)
    }

    /// Every entry stamped with the single flush timestamp, ordered by metric name.
    pub fn snapshot(&self, device_id: &str, timestamp: CollectorDateTime) -> MetricBatch {
        let samples = self
            .latest
            .iter()
            .map(|(metric_name, latest)| {
                MetricSample::new(
                    device_id,
                    timestamp,
                    metric_name.as_str(),
                    latest.value,
                    latest.unit.as_str(),
                    latest.source_topic.as_str(),
                )
            })
            .collect();
        MetricBatch {
            device_id: device_id.to_string(),
            timestamp,
            samples,
        }
    }
}

/// Cooperative flush timer, checked on message arrival instead of ticking.
///
/// Elapsed time only ever grows: it sums the forward steps between observed
/// timestamps, so a wall clock stepped backwards delays nothing.
#[derive(Debug, Clone)]
pub struct FlushScheduler {
    interval: Duration,
    last_flush: Option<CollectorDateTime>,
    last_seen: Option<CollectorDateTime>,
    since_flush: Duration,
}

impl FlushScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.clamp(MIN_FLUSH_INTERVAL, MAX_FLUSH_INTERVAL),
            last_flush: None,
            last_seen: None,
            since_flush: Duration::ZERO,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_flush(&self) -> Option<CollectorDateTime> {
        self.last_flush
    }

    /// Due when nothing was flushed yet or the interval has fully elapsed.
    pub fn due(&mut self, now: CollectorDateTime) -> bool {
        self.observe(now);
        self.last_flush.is_none() || self.since_flush >= self.interval
    }

    pub fn mark_flushed(&mut self, now: CollectorDateTime) {
        self.last_flush = Some(now);
        self.last_seen = Some(now);
        self.since_flush = Duration::ZERO;
    }

    fn observe(&mut self, now: CollectorDateTime) {
        if let Some(last_seen) = self.last_seen {
            self.since_flush += elapsed_between(last_seen, now);
        }
        self.last_seen = Some(now);
    }
}

impl Default for FlushScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_FLUSH_INTERVAL)
    }
}
