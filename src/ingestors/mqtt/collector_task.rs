use super::backoff::Backoff;
use super::mqtt_client::make_client_options;
use crate::config::mqtt::MqttConfig;
use crate::datamodel::CollectorDateTime;
use crate::delivery::MetricSink;
use crate::pipeline::{BrokerState, Collector, CollectorStatus};
use anyhow::{Context, Result};
use rumqttc::{AsyncClient, Event, EventLoop, Outgoing, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const REQUEST_CHANNEL_CAPACITY: usize = 64;
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Owner side of a running collector task.
#[derive(Debug)]
pub struct CollectorHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
    status: watch::Receiver<CollectorStatus>,
}

impl CollectorHandle {
    pub fn status(&self) -> watch::Receiver<CollectorStatus> {
        self.status.clone()
    }

    pub fn current_status(&self) -> CollectorStatus {
        self.status.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stops intake, lets an in-flight delivery finish, flushes once more
    /// (undelivered alarm states included) and closes the broker session.
    pub async fn stop(self) -> Result<CollectorStatus> {
        self.cancel.cancel();
        self.join.await.context("Collector task failed")?;
        Ok(self.status.borrow().clone())
    }
}

pub fn spawn_collector(
    mqtt: &MqttConfig,
    collector: Collector,
    sink: Arc<dyn MetricSink>,
    backoff: Backoff,
) -> CollectorHandle {
    let (client, event_loop) = AsyncClient::new(make_client_options(mqtt), REQUEST_CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();
    let (status_sender, status) = watch::channel(collector.status(true));

    let join = tokio::spawn(run_collector(
        client,
        event_loop,
        collector,
        sink,
        backoff,
        cancel.clone(),
        status_sender,
    ));

    CollectorHandle {
        cancel,
        join,
        status,
    }
}

async fn run_collector(
    client: AsyncClient,
    mut event_loop: EventLoop,
    mut collector: Collector,
    sink: Arc<dyn MetricSink>,
    mut backoff: Backoff,
    cancel: CancellationToken,
    status: watch::Sender<CollectorStatus>,
) {
    info!(
        "Starting collector for device {} on {}",
        collector.config().device_id,
        collector.config().mqtt_host
    );
    collector.handle_connecting();
    status.send_replace(collector.status(true));

    loop {
        // Deliveries happen outside of the select so a stop never interrupts them.
        let notification = tokio::select! {
            _ = cancel.cancelled() => break,
            notification = event_loop.poll() => notification,
        };

        match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                backoff.reset();
                let filter = collector.handle_connect();
                if let Err(err) = client.try_subscribe(filter, QoS::AtLeastOnce) {
                    error!("Failed to request subscription: {}", err);
                }
            }
            Ok(Event::Incoming(Packet::SubAck(_))) => collector.handle_subscribed(),
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let now = CollectorDateTime::now_utc();
                let outcome = collector.handle_message(&publish.topic, &publish.payload, now);
                if !outcome.is_empty() {
                    collector.deliver_outcome(sink.as_ref(), outcome, now).await;
                }
            }
            Ok(_) => {}
            Err(err) => {
                collector.handle_disconnect();
                status.send_replace(collector.status(true));
                let delay = backoff.next_delay();
                warn!(
                    "MQTT connection error: {}. Reconnecting in {:?} (attempt {})",
                    err,
                    delay,
                    backoff.attempt()
                );
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
                collector.handle_connecting();
            }
        }
        status.send_replace(collector.status(true));
    }

    info!("Stopping collector for device {}", collector.config().device_id);
    let now = CollectorDateTime::now_utc();
    if let Some(states) = collector.pending_alarms() {
        collector.deliver_alarms(sink.as_ref(), &states).await;
    }
    if let Some(batch) = collector.request_flush(now) {
        collector.deliver_batch(sink.as_ref(), &batch, now).await;
    }

    if collector.broker_state() == BrokerState::Subscribed {
        disconnect(&client, &mut event_loop).await;
    }
    collector.handle_stopped();
    status.send_replace(collector.status(false));
}

async fn disconnect(client: &AsyncClient, event_loop: &mut EventLoop) {
    if client.try_disconnect().is_err() {
        return;
    }
    let drained = tokio::time::timeout(DISCONNECT_TIMEOUT, async {
        loop {
            match event_loop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;
    if drained.is_err() {
        debug!("MQTT disconnect did not complete in time");
    }
}
