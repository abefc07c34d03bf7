mod common;

use anyhow::Result;
use common::{collector, fixtures};
use pv3_collector::config::mqtt::MqttConfig;
use pv3_collector::ingestors::mqtt::{Backoff, spawn_collector};
use pv3_collector::ingestors::mqtt::CollectorHandle;
use pv3_collector::pipeline::BrokerState;
use pv3_collector::test_utils::sinks::SinkBehavior;
use pv3_collector::test_utils::{FakeBroker, RecordingSink};
use std::sync::Arc;
use std::time::Duration;

fn broker_on(port: u16) -> MqttConfig {
    MqttConfig {
        host: "127.0.0.1".to_string(),
        port,
        client_id: Some("pv3-collector-test".to_string()),
        username: None,
        password: None,
        keep_alive_seconds: 60,
    }
}

fn unreachable_broker() -> MqttConfig {
    // Nothing listens on port 1, connection attempts fail right away.
    broker_on(1)
}

async fn wait_until(condition: impl Fn() -> bool) -> Result<()> {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;
    Ok(())
}

async fn wait_for_subscription(handle: &CollectorHandle) -> Result<()> {
    let mut status = handle.status();
    tokio::time::timeout(
        Duration::from_secs(10),
        status.wait_for(|s| s.broker_state == BrokerState::Subscribed),
    )
    .await??;
    Ok(())
}

async fn wait_for_messages(handle: &CollectorHandle, expected: u64) -> Result<()> {
    let mut status = handle.status();
    tokio::time::timeout(
        Duration::from_secs(10),
        status.wait_for(|s| s.counters.messages_received >= expected),
    )
    .await??;
    Ok(())
}

#[tokio::test]
async fn test_unreachable_broker_is_reported_as_faulted() -> Result<()> {
    // Given: A collector pointed at a broker that refuses connections
    let sink = Arc::new(RecordingSink::new());
    let handle = spawn_collector(
        &unreachable_broker(),
        collector(),
        sink.clone(),
        Backoff::constant(Duration::from_millis(50)),
    );
    let mut status = handle.status();

    // When: The first connection attempt fails
    tokio::time::timeout(
        Duration::from_secs(10),
        status.wait_for(|s| s.broker_state == BrokerState::Faulted),
    )
    .await??;

    // Then: The collector keeps running and nothing was delivered
    let current = handle.current_status();
    assert!(current.running);
    assert_eq!(current.device_id, fixtures::DEVICE_ID);
    assert!(!handle.is_finished());

    let stopped = handle.stop().await?;
    assert!(!stopped.running);
    assert_eq!(stopped.broker_state, BrokerState::Disconnected);
    assert!(sink.batches().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_stop_during_backoff_returns_promptly() -> Result<()> {
    // Given: A collector waiting a long time before reconnecting
    let handle = spawn_collector(
        &unreachable_broker(),
        collector(),
        Arc::new(RecordingSink::new()),
        Backoff::constant(Duration::from_secs(300)),
    );
    let mut status = handle.status();
    tokio::time::timeout(
        Duration::from_secs(10),
        status.wait_for(|s| s.broker_state == BrokerState::Faulted),
    )
    .await??;

    // When: It is stopped
    let stopped = tokio::time::timeout(Duration::from_secs(5), handle.stop()).await??;

    // Then: The backoff sleep was interrupted
    assert!(!stopped.running);
    Ok(())
}

#[tokio::test]
async fn test_published_message_reaches_the_sink() -> Result<()> {
    // Given: A collector subscribed to a live broker
    let broker = FakeBroker::start().await?;
    let sink = Arc::new(RecordingSink::new());
    let handle = spawn_collector(
        &broker_on(broker.port()),
        collector(),
        sink.clone(),
        Backoff::constant(Duration::from_millis(50)),
    );
    wait_for_subscription(&handle).await?;

    // When: The device publishes its state of health
    let topic = fixtures::topic("pylontech/info");
    broker.publish(&topic, fixtures::state_of_health(97).as_bytes());
    wait_until(|| !sink.batches().is_empty()).await?;

    // Then: The first batch holds the decoded sample, and stopping flushes once more
    let batches = sink.batches();
    let sample = batches[0].get("soh").unwrap();
    assert_eq!(sample.metric_value, 97.0);
    assert_eq!(sample.source_topic, topic);

    let stopped = handle.stop().await?;
    assert_eq!(stopped.counters.messages_received, 1);
    assert_eq!(stopped.counters.flushes, 2);
    assert_eq!(stopped.counters.delivery_failures, 0);
    assert!(stopped.last_store.is_some());
    assert_eq!(stopped.broker_state, BrokerState::Disconnected);
    assert_eq!(sink.batches().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_alarm_states_are_resent_after_delivery_failure() -> Result<()> {
    // Given: A subscribed collector whose sink is down
    let broker = FakeBroker::start().await?;
    let sink = Arc::new(RecordingSink::with_behavior(SinkBehavior::Unavailable));
    let handle = spawn_collector(
        &broker_on(broker.port()),
        collector(),
        sink.clone(),
        Backoff::constant(Duration::from_millis(50)),
    );
    wait_for_subscription(&handle).await?;
    let topic = fixtures::topic("inverter/alarms");
    let report = fixtures::alarms(&[("grid_lost", true), ("over_temp", false)]);

    // When: An alarm is raised while the sink fails, then the sink recovers
    broker.publish(&topic, report.as_bytes());
    wait_for_messages(&handle, 1).await?;
    assert_eq!(sink.alarm_reports().len(), 1);
    sink.set_behavior(SinkBehavior::Accept);
    for _ in 0..3 {
        broker.publish(&topic, report.as_bytes());
    }
    wait_for_messages(&handle, 4).await?;

    // Then: The unchanged report is resent exactly once, after which it is settled
    let delivered = sink.alarm_reports();
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[1].0, fixtures::DEVICE_ID);
    assert_eq!(delivered[1].1.get("grid_lost"), Some(&true));
    assert_eq!(delivered[1].1.get("over_temp"), Some(&false));

    let stopped = handle.stop().await?;
    assert_eq!(stopped.counters.delivery_failures, 1);
    assert_eq!(sink.alarm_reports().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_pending_alarms_are_delivered_on_stop() -> Result<()> {
    let broker = FakeBroker::start().await?;
    let sink = Arc::new(RecordingSink::with_behavior(SinkBehavior::Unavailable));
    let handle = spawn_collector(
        &broker_on(broker.port()),
        collector(),
        sink.clone(),
        Backoff::constant(Duration::from_millis(50)),
    );
    wait_for_subscription(&handle).await?;
    broker.publish(
        &fixtures::topic("inverter/alarms"),
        fixtures::alarms(&[("grid_lost", true)]).as_bytes(),
    );
    wait_for_messages(&handle, 1).await?;

    sink.set_behavior(SinkBehavior::Accept);
    handle.stop().await?;

    let delivered = sink.alarm_reports();
    assert_eq!(delivered.len(), 2);
    assert_eq!(delivered[1].1.get("grid_lost"), Some(&true));
    Ok(())
}
