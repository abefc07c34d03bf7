use std::sync::Arc;

use anyhow::Result;
#[cfg(not(feature = "sqlite"))]
use anyhow::bail;

use super::{StorageError, StorageInstance};

#[cfg(feature = "sqlite")]
use super::sqlite::SqliteStorage;

pub async fn create_storage_from_connection_string(
    connection_string: &str,
) -> Result<Arc<dyn StorageInstance>> {
    Ok(match connection_string {
        #[cfg(feature = "sqlite")]
        s if s.starts_with("sqlite:") => Arc::new(SqliteStorage::connect(s).await?),

        // Provide helpful error messages for disabled backends
        #[cfg(not(feature = "sqlite"))]
        s if s.starts_with("sqlite:") => {
            bail!("SQLite storage backend is not enabled. Enable with --features sqlite")
        }

        _ => {
            return Err(StorageError::Configuration(format!(
                "Unsupported storage type: {}",
                connection_string
            ))
            .into());
        }
    })
}
