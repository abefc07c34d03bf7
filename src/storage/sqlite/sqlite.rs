use super::sqlite_publishers::{ensure_device, publish_alarm_states, publish_samples};
use crate::datamodel::{
    AlarmEvent, AlarmEventType, AlarmUpdateSummary, CollectorDateTime, MetricBatch, MetricSample,
};
use crate::storage::common::{datetime_to_micros, micros_to_datetime};
use crate::storage::{StorageError, StorageInstance};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

// SQLite implementation
#[derive(Debug)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str(connection_string)
            .context("Failed to create sqlite connection options")?
            // Create the database file if it doesn't exist
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(false)
            .busy_timeout(Duration::from_secs(5));

        // Every connection to an in-memory database sees its own database.
        let in_memory = connection_string.contains(":memory:") || connection_string.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .context("Failed to create sqlite pool")?;

        Ok(Self { pool })
    }
}

#[derive(sqlx::FromRow)]
struct MeasurementRow {
    timestamp_us: i64,
    metric_name: String,
    metric_value: f64,
    unit: Option<String>,
    source_topic: Option<String>,
}

#[derive(sqlx::FromRow)]
struct AlarmEventRow {
    timestamp_us: i64,
    alarm_name: String,
    event_type: String,
}

#[async_trait]
impl StorageInstance for SqliteStorage {
    async fn create_or_migrate(&self) -> Result<()> {
        sqlx::migrate!("src/storage/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to migrate database")?;

        Ok(())
    }

    async fn publish_metrics(&self, batch: &MetricBatch) -> Result<()> {
        let mut transaction = self.pool.begin().await?;
        ensure_device(&mut transaction, &batch.device_id, datetime_to_micros(&batch.timestamp)).await?;
        publish_samples(&mut transaction, &batch.samples).await?;
        transaction.commit().await?;
        Ok(())
    }

    async fn store_alarm_states(
        &self,
        device_id: &str,
        states: &BTreeMap<String, bool>,
    ) -> Result<AlarmUpdateSummary> {
        let timestamp_us = datetime_to_micros(&CollectorDateTime::now_utc());
        let mut transaction = self.pool.begin().await?;
        ensure_device(&mut transaction, device_id, timestamp_us).await?;
        let summary = publish_alarm_states(&mut transaction, device_id, states, timestamp_us).await?;
        transaction.commit().await?;
        Ok(summary)
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("SQLite health check failed")?;
        Ok(())
    }

    async fn latest_metrics(&self, device_id: &str) -> Result<Vec<MetricSample>> {
        let rows: Vec<MeasurementRow> = sqlx::query_as(
            r#"
            SELECT m.timestamp_us, m.metric_name, m.metric_value, m.unit, m.source_topic
            FROM measurements m
            WHERE m.device_id = ?1
              AND m.id = (
                SELECT latest.id FROM measurements latest
                WHERE latest.device_id = ?1 AND latest.metric_name = m.metric_name
                ORDER BY latest.timestamp_us DESC, latest.id DESC
                LIMIT 1
              )
            ORDER BY m.metric_name ASC
            "#,
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<MetricSample> {
                Ok(MetricSample::new(
                    device_id,
                    micros_to_datetime(row.timestamp_us, device_id)?,
                    row.metric_name,
                    row.metric_value,
                    row.unit.unwrap_or_default(),
                    row.source_topic.unwrap_or_default(),
                ))
            })
            .collect()
    }

    async fn alarm_events(&self, device_id: &str) -> Result<Vec<AlarmEvent>> {
        let rows: Vec<AlarmEventRow> = sqlx::query_as(
            r#"
            SELECT timestamp_us, alarm_name, event_type
            FROM alarm_events
            WHERE device_id = ?
            ORDER BY timestamp_us ASC, id ASC
            "#,
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<AlarmEvent> {
                let event_type = match row.event_type.as_str() {
                    "triggered" => AlarmEventType::Triggered,
                    "cleared" => AlarmEventType::Cleared,
                    other => {
                        return Err(StorageError::invalid_data_format(
                            &format!("Unknown alarm event type '{}'", other),
                            device_id,
                        )
                        .into());
                    }
                };
                Ok(AlarmEvent {
                    device_id: device_id.to_string(),
                    timestamp: micros_to_datetime(row.timestamp_us, device_id)?,
                    alarm_name: row.alarm_name,
                    event_type,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datamodel::collector_datetime::CollectorDateTimeExt;

    async fn storage() -> SqliteStorage {
        let storage = SqliteStorage::connect("sqlite::memory:").await.unwrap();
        storage.create_or_migrate().await.unwrap();
        storage
    }

    fn batch(seconds: i64, values: &[(&str, f64)]) -> MetricBatch {
        let timestamp = CollectorDateTime::from_unix_seconds_i64(seconds);
        MetricBatch {
            device_id: "dev".to_string(),
            timestamp,
            samples: values
                .iter()
                .map(|(name, value)| MetricSample::new("dev", timestamp, *name, *value, "V", "pv/PV3/dev/x"))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_publish_and_read_latest() {
        let storage = storage().await;
        storage
            .publish_metrics(&batch(1704067200, &[("battery_voltage", 51.0), ("grid_voltage", 230.0)]))
            .await
            .unwrap();
        storage
            .publish_metrics(&batch(1704067205, &[("battery_voltage", 51.5)]))
            .await
            .unwrap();

        let latest = storage.latest_metrics("dev").await.unwrap();
        let values: Vec<_> = latest
            .iter()
            .map(|s| (s.metric_name.as_str(), s.metric_value))
            .collect();
        assert_eq!(values, vec![("battery_voltage", 51.5), ("grid_voltage", 230.0)]);
        assert_eq!(latest[0].timestamp, CollectorDateTime::from_unix_seconds_i64(1704067205));
    }

    #[tokio::test]
    async fn test_alarm_states_and_events() {
        let storage = storage().await;
        let mut states = BTreeMap::new();
        states.insert("grid_lost".to_string(), true);
        states.insert("over_temp".to_string(), false);

        let summary = storage.store_alarm_states("dev", &states).await.unwrap();
        assert_eq!(summary, AlarmUpdateSummary { alarms_updated: 2, events_created: 1 });

        let summary = storage.store_alarm_states("dev", &states).await.unwrap();
        assert_eq!(summary, AlarmUpdateSummary::default());

        states.insert("grid_lost".to_string(), false);
        let summary = storage.store_alarm_states("dev", &states).await.unwrap();
        assert_eq!(summary, AlarmUpdateSummary { alarms_updated: 1, events_created: 1 });

        let events: Vec<_> = storage
            .alarm_events("dev")
            .await
            .unwrap()
            .into_iter()
            .map(|e| (e.alarm_name, e.event_type))
            .collect();
        assert_eq!(
            events,
            vec![
                ("grid_lost".to_string(), AlarmEventType::Triggered),
                ("grid_lost".to_string(), AlarmEventType::Cleared)
            ]
        );
    }
}
