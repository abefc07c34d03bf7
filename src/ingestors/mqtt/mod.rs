mod backoff;
mod collector_task;
mod mqtt_client;

pub use backoff::{Backoff, BackoffStrategy};
pub use collector_task::{CollectorHandle, spawn_collector};
pub use mqtt_client::make_client_options;
