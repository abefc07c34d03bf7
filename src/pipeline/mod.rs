pub mod accumulator;
pub mod collector;
pub mod outlier;
pub mod status;

pub use accumulator::{BatchAccumulator, FlushScheduler};
pub use collector::{Collector, CollectorConfig, MessageOutcome};
pub use outlier::{SocOutlierFilter, SocVerdict};
pub use status::{BrokerState, CollectorCounters, CollectorStatus};
