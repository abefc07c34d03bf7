use thiserror::Error;

/// Storage-specific errors that can occur during database operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database connection or query execution error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Invalid data format in database
    #[error("Invalid data format: {message} for device {device_id}")]
    InvalidDataFormat { message: String, device_id: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StorageError {
    pub fn invalid_data_format(message: &str, device_id: &str) -> Self {
        StorageError::InvalidDataFormat {
            message: message.to_string(),
            device_id: device_id.to_string(),
        }
    }
}
