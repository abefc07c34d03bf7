use super::accumulator::{BatchAccumulator, DEFAULT_FLUSH_INTERVAL, FlushScheduler};
use super::outlier::{DEFAULT_SOC_OUTLIER_THRESHOLD, SocOutlierFilter};
use super::status::{BrokerState, CollectorCounters, CollectorStatus};
use crate::bus::{FanoutRegistry, LiveEvent};
use crate::datamodel::{AlarmFlagSet, CollectorDateTime, MetricBatch, MetricSample};
use crate::delivery::{DeliveryError, MetricSink};
use crate::parsing::topic::device_topic_filter;
use crate::parsing::{Reading, TopicSuffix, route};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const SOC_RAW: &str = "soc_raw";

#[derive(Debug, Clone, PartialEq)]
pub struct CollectorConfig {
    pub device_id: String,
    pub topic_namespace: String,
    pub topic_protocol: String,
    pub flush_interval: Duration,
    pub soc_outlier_threshold: f64,
    pub soc_rebaseline_after: Option<u32>,
    /// Only reported on the status endpoint.
    pub mqtt_host: String,
}

impl CollectorConfig {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            topic_namespace: "pv".to_string(),
            topic_protocol: "PV3".to_string(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            soc_outlier_threshold: DEFAULT_SOC_OUTLIER_THRESHOLD,
            soc_rebaseline_after: None,
            mqtt_host: "localhost".to_string(),
        }
    }

    pub fn topic_filter(&self) -> String {
        device_topic_filter(&self.topic_namespace, &self.topic_protocol, &self.device_id)
    }
}

/// What the owner of the collector has to deliver after one message.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MessageOutcome {
    pub flush: Option<MetricBatch>,
    /// Full current alarm flag set, present while a change is not yet delivered.
    pub alarms: Option<BTreeMap<String, bool>>,
}

impl MessageOutcome {
    pub fn is_empty(&self) -> bool {
        self.flush.is_none() && self.alarms.is_none()
    }
}

/// Per-device collector state machine.
///
/// Driven by a single task: every transition takes `&mut self` and nothing here
/// blocks, except the delivery helpers which await the sink.
#[derive(Debug)]
pub struct Collector {
    config: CollectorConfig,
    broker_state: BrokerState,
    outlier: SocOutlierFilter,
    accumulator: BatchAccumulator,
    scheduler: FlushScheduler,
    alarms: AlarmFlagSet,
    /// Set when the flag set changed and no delivery has succeeded since.
    alarms_pending: bool,
    counters: CollectorCounters,
    last_store: Option<CollectorDateTime>,
    fanout: Arc<FanoutRegistry>,
}

impl Collector {
    pub fn new(config: CollectorConfig, fanout: Arc<FanoutRegistry>) -> Self {
        let outlier = SocOutlierFilter::new(config.soc_outlier_threshold, config.soc_rebaseline_after);
        let scheduler = FlushScheduler::new(config.flush_interval);
        Self {
            config,
            broker_state: BrokerState::Disconnected,
            outlier,
            accumulator: BatchAccumulator::new(),
            scheduler,
            alarms: AlarmFlagSet::new(),
            alarms_pending: false,
            counters: CollectorCounters::default(),
            last_store: None,
            fanout,
        }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn broker_state(&self) -> BrokerState {
        self.broker_state
    }

    pub fn counters(&self) -> CollectorCounters {
        self.counters
    }

    pub fn accumulator(&self) -> &BatchAccumulator {
        &self.accumulator
    }

    pub fn outlier_filter_mut(&mut self) -> &mut SocOutlierFilter {
        &mut self.outlier
    }

    pub fn alarms(&self) -> &AlarmFlagSet {
        &self.alarms
    }

    /// Flag set still waiting for a successful delivery.
    pub fn pending_alarms(&self) -> Option<BTreeMap<String, bool>> {
        self.alarms_pending.then(|| self.alarms.as_map().clone())
    }

    pub fn status(&self, running: bool) -> CollectorStatus {
        CollectorStatus {
            running,
            broker_state: self.broker_state,
            counters: self.counters,
            last_store: self.last_store,
            mqtt_host: self.config.mqtt_host.clone(),
            device_id: self.config.device_id.clone(),
            interval: self.scheduler.interval().as_secs(),
        }
    }

    pub fn handle_connecting(&mut self) {
        self.broker_state = BrokerState::Connecting;
    }

    /// Session established. Returns the filter to subscribe to.
    pub fn handle_connect(&mut self) -> String {
        let filter = self.config.topic_filter();
        info!("Connected to MQTT broker, subscribing to {}", filter);
        filter
    }

    pub fn handle_subscribed(&mut self) {
        if self.broker_state != BrokerState::Subscribed {
            info!("Subscribed to {}", self.config.topic_filter());
        }
        self.broker_state = BrokerState::Subscribed;
    }

    pub fn handle_disconnect(&mut self) {
        self.broker_state = BrokerState::Faulted;
    }

    pub fn handle_stopped(&mut self) {
        self.broker_state = BrokerState::Disconnected;
    }

    /// Routes, decodes and accumulates one publish.
    ///
    /// Decoded samples are pushed to live observers right away. Unknown suffixes,
    /// malformed topics and topics of other devices leave the state untouched
    /// apart from the counters.
    pub fn handle_message(&mut self, topic: &str, payload: &[u8], now: CollectorDateTime) -> MessageOutcome {
        self.counters.messages_received += 1;

        let routed = match route(topic, payload) {
            Ok(Some(routed)) => routed,
            Ok(None) => {
                debug!("Ignoring message on unknown topic {}", topic);
                self.counters.messages_dropped += 1;
                return MessageOutcome::default();
            }
            Err(err) => {
                warn!("Dropping message on {}: {}", topic, err);
                self.counters.messages_dropped += 1;
                return MessageOutcome::default();
            }
        };

        if routed.topic.device_id != self.config.device_id {
            debug!("Ignoring message for device {}", routed.topic.device_id);
            self.counters.messages_dropped += 1;
            return MessageOutcome::default();
        }

        let mut readings = routed.decoded.readings;
        if routed.suffix == TopicSuffix::StateOfCharge {
            readings = self.filter_state_of_charge(readings);
            if !readings.iter().any(|reading| reading.metric_name == SOC_RAW) {
                self.accumulator.remove(SOC_RAW);
            }
        }

        let samples: Vec<MetricSample> = readings
            .iter()
            .map(|reading| {
                MetricSample::new(
                    self.config.device_id.as_str(),
                    now,
                    reading.metric_name.as_str(),
                    reading.value(),
                    reading.unit.as_str(),
                    topic,
                )
            })
            .filter(|sample| sample.metric_value.is_finite())
            .collect();

        for sample in &samples {
            self.accumulator.record(
                &sample.metric_name,
                sample.metric_value,
                &sample.unit,
                &sample.source_topic,
            );
        }

        if !samples.is_empty() {
            let event = LiveEvent::metric_update(&self.config.device_id, now, &samples);
            self.fanout.publish(&self.config.device_id, &event);
        }

        let mut outcome = MessageOutcome::default();

        let report = routed.decoded.alarms.filter(|report| !report.is_empty());
        let reported = report.is_some();
        if let Some(report) = report {
            let update = self.alarms.apply(&self.config.device_id, now, &report);
            for event in &update.events {
                info!("Alarm {} {}", event.alarm_name, event.event_type);
                self.fanout
                    .publish(&self.config.device_id, &LiveEvent::alarm_update(event));
            }
            if update.changed > 0 {
                self.alarms_pending = true;
            }
        }

        if self.scheduler.due(now) {
            outcome.flush = self.flush(now);
        }

        // An undelivered change rides along with the next report or flush.
        if reported || outcome.flush.is_some() {
            outcome.alarms = self.pending_alarms();
        }

        outcome
    }

    /// Flushes regardless of the interval. `None` when nothing was collected yet.
    pub fn request_flush(&mut self, now: CollectorDateTime) -> Option<MetricBatch> {
        self.flush(now)
    }

    fn flush(&mut self, now: CollectorDateTime) -> Option<MetricBatch> {
        if self.accumulator.is_empty() {
            return None;
        }
        let batch = self.accumulator.snapshot(&self.config.device_id, now);
        self.scheduler.mark_flushed(now);
        self.counters.flushes += 1;
        Some(batch)
    }

    fn filter_state_of_charge(&mut self, readings: Vec<Reading>) -> Vec<Reading> {
        readings
            .into_iter()
            .flat_map(|reading| {
                if reading.metric_name == "soc" {
                    self.outlier.apply(&reading)
                } else {
                    vec![reading]
                }
            })
            .collect()
    }

    pub fn record_delivery(&mut self, now: CollectorDateTime, result: &Result<(), DeliveryError>) {
        match result {
            Ok(()) => self.last_store = Some(now),
            Err(_) => self.counters.delivery_failures += 1,
        }
    }

    /// Hands a flushed batch to the sink. Failures are logged and counted, never returned.
    pub async fn deliver_batch(&mut self, sink: &dyn MetricSink, batch: &MetricBatch, now: CollectorDateTime) {
        let result = sink.deliver(batch).await;
        match &result {
            Ok(()) => info!("Stored {} metrics for {}", batch.len(), batch.device_id),
            Err(err @ DeliveryError::Rejected { .. }) => {
                let payload = serde_json::to_string(&batch.samples).unwrap_or_default();
                error!("Batch rejected, dropping it: {}. Payload: {}", err, payload);
            }
            Err(err) => warn!("Failed to store metrics, next flush will resend: {}", err),
        }
        self.record_delivery(now, &result);
    }

    pub async fn deliver_alarms(&mut self, sink: &dyn MetricSink, states: &BTreeMap<String, bool>) {
        match sink.deliver_alarms(&self.config.device_id, states).await {
            Ok(summary) => {
                self.alarms_pending = false;
                debug!(
                    "Updated {} alarm states, {} events created",
                    summary.alarms_updated, summary.events_created
                );
            }
            Err(err) if err.is_retryable() => {
                self.counters.delivery_failures += 1;
                warn!("Failed to update alarm states, will resend: {}", err);
            }
            Err(err) => {
                self.counters.delivery_failures += 1;
                self.alarms_pending = false;
                error!("Alarm states rejected, dropping them: {}", err);
            }
        }
    }

    /// Delivers everything a message produced, alarms first.
    pub async fn deliver_outcome(&mut self, sink: &dyn MetricSink, outcome: MessageOutcome, now: CollectorDateTime) {
        if let Some(states) = outcome.alarms {
            self.deliver_alarms(sink, &states).await;
        }
        if let Some(batch) = outcome.flush {
            self.deliver_batch(sink, &batch, now).await;
        }
    }
}
