use crate::config::load_configuration;
use anyhow::Result;
use std::sync::Mutex;

pub mod broker;
pub mod fixtures;
pub mod http;
pub mod observers;
pub mod sinks;

pub use broker::FakeBroker;
pub use observers::{FailingObserver, RecordingObserver};
pub use sinks::RecordingSink;

static TEST_CONFIG_INIT: Mutex<()> = Mutex::new(());

/// Loads the configuration once per test run, from the defaults and whatever
/// `PV3_*` variables the environment carries.
pub fn load_configuration_for_tests() -> Result<()> {
    let _guard = TEST_CONFIG_INIT
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    load_configuration()
}

/// Fresh, migrated in-memory SQLite storage.
#[cfg(feature = "sqlite")]
pub async fn memory_storage() -> Result<std::sync::Arc<dyn crate::storage::StorageInstance>> {
    use crate::storage::storage_factory::create_storage_from_connection_string;

    let storage = create_storage_from_connection_string("sqlite::memory:").await?;
    storage.create_or_migrate().await?;
    Ok(storage)
}
