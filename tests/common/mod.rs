#![allow(dead_code)]

use pv3_collector::bus::FanoutRegistry;
use pv3_collector::datamodel::CollectorDateTime;
use pv3_collector::datamodel::collector_datetime::CollectorDateTimeExt;
use pv3_collector::pipeline::{Collector, CollectorConfig};
use std::sync::Arc;

pub use pv3_collector::test_utils::fixtures;

/// 2024-01-01T00:00:00Z plus `millis`.
pub fn at_millis(millis: i64) -> CollectorDateTime {
    CollectorDateTime::from_unix_milliseconds_i64(1_704_067_200_000 + millis)
}

pub fn collector_with(fanout: Arc<FanoutRegistry>) -> Collector {
    Collector::new(CollectorConfig::new(fixtures::DEVICE_ID), fanout)
}

pub fn collector() -> Collector {
    collector_with(Arc::new(FanoutRegistry::new()))
}
