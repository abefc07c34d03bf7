pub mod alarm;
pub mod batch;
pub mod collector_datetime;
pub mod metric;
pub mod unit;

pub use alarm::{AlarmEvent, AlarmEventType, AlarmFlagSet, AlarmUpdate, AlarmUpdateSummary};
pub use batch::MetricBatch;
pub use collector_datetime::CollectorDateTime;
pub use metric::MetricSample;
