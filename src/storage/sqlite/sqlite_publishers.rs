use crate::datamodel::{AlarmEventType, AlarmUpdateSummary, MetricSample};
use crate::storage::common::datetime_to_micros;
use anyhow::Result;
use sqlx::{Sqlite, Transaction, prelude::*};
use std::collections::BTreeMap;

pub async fn ensure_device(
    transaction: &mut Transaction<'_, Sqlite>,
    device_id: &str,
    seen_at_us: i64,
) -> Result<()> {
    let query = sqlx::query(
        r#"
        INSERT INTO devices (device_id, created_at_us, last_seen_at_us)
        VALUES (?, ?, ?)
        ON CONFLICT (device_id) DO UPDATE SET last_seen_at_us = excluded.last_seen_at_us
        "#,
    )
    .bind(device_id)
    .bind(seen_at_us)
    .bind(seen_at_us);
    transaction.execute(query).await?;
    Ok(())
}

pub async fn publish_samples(
    transaction: &mut Transaction<'_, Sqlite>,
    samples: &[MetricSample],
) -> Result<()> {
    for sample in samples {
        // SQLite's REAL type doesn't support NaN or Inf, they would become NULL.
        if !sample.metric_value.is_finite() {
            continue;
        }
        let timestamp_us = datetime_to_micros(&sample.timestamp);
        let query = sqlx::query(
            r#"
            INSERT INTO measurements (device_id, timestamp_us, metric_name, metric_value, unit, source_topic)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&sample.device_id)
        .bind(timestamp_us)
        .bind(&sample.metric_name)
        .bind(sample.metric_value)
        .bind(&sample.unit)
        .bind(&sample.source_topic);
        transaction.execute(query).await?;
    }
    Ok(())
}

async fn insert_alarm_event(
    transaction: &mut Transaction<'_, Sqlite>,
    device_id: &str,
    alarm_name: &str,
    event_type: AlarmEventType,
    timestamp_us: i64,
) -> Result<()> {
    let query = sqlx::query(
        r#"
        INSERT INTO alarm_events (device_id, timestamp_us, alarm_name, event_type)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(device_id)
    .bind(timestamp_us)
    .bind(alarm_name)
    .bind(event_type.as_str());
    transaction.execute(query).await?;
    Ok(())
}

/// A first-seen alarm counts as updated and only yields an event when active.
pub async fn publish_alarm_states(
    transaction: &mut Transaction<'_, Sqlite>,
    device_id: &str,
    states: &BTreeMap<String, bool>,
    timestamp_us: i64,
) -> Result<AlarmUpdateSummary> {
    let mut summary = AlarmUpdateSummary::default();

    for (alarm_name, &is_active) in states {
        let existing_query = sqlx::query(
            r#"
            SELECT is_active FROM alarms WHERE device_id = ? AND alarm_name = ?
            "#,
        )
        .bind(device_id)
        .bind(alarm_name);
        let existing: Option<i64> = transaction
            .fetch_optional(existing_query)
            .await?
            .map(|row| row.get("is_active"));

        let emits = match existing {
            Some(was_active) if (was_active != 0) == is_active => continue,
            Some(_) => {
                let query = sqlx::query(
                    r#"
                    UPDATE alarms SET is_active = ?, updated_at_us = ?
                    WHERE device_id = ? AND alarm_name = ?
                    "#,
                )
                .bind(is_active)
                .bind(timestamp_us)
                .bind(device_id)
                .bind(alarm_name);
                transaction.execute(query).await?;
                true
            }
            None => {
                let query = sqlx::query(
                    r#"
                    INSERT INTO alarms (device_id, alarm_name, is_active, updated_at_us)
                    VALUES (?, ?, ?, ?)
                    "#,
                )
                .bind(device_id)
                .bind(alarm_name)
                .bind(is_active)
                .bind(timestamp_us);
                transaction.execute(query).await?;
                is_active
            }
        };

        summary.alarms_updated += 1;
        if emits {
            insert_alarm_event(
                transaction,
                device_id,
                alarm_name,
                AlarmEventType::from_active(is_active),
                timestamp_us,
            )
            .await?;
            summary.events_created += 1;
        }
    }

    Ok(summary)
}
