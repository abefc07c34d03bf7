use crate::datamodel::CollectorDateTime;
use crate::datamodel::collector_datetime::CollectorDateTimeExt;
use crate::storage::StorageError;

/// Convert a timestamp to Unix microseconds for database storage
pub fn datetime_to_micros(datetime: &CollectorDateTime) -> i64 {
    datetime.to_unix_microseconds()
}

pub fn micros_to_datetime(micros: i64, device_id: &str) -> Result<CollectorDateTime, StorageError> {
    CollectorDateTime::from_unix_timestamp_nanos(i128::from(micros) * 1_000).map_err(|err| {
        StorageError::invalid_data_format(
            &format!("Timestamp {} is out of range: {}", micros, err),
            device_id,
        )
    })
}
