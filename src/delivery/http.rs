use super::{DeliveryError, MetricSink};
use crate::datamodel::{AlarmUpdateSummary, MetricBatch};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers to the storage-owning API over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: Client,
    api_url: String,
}

impl HttpSink {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP delivery client")?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn measurements_url(&self, device_id: &str) -> String {
        format!("{}/api/devices/{}/measurements/batch", self.api_url, device_id)
    }

    pub fn alarms_url(&self, device_id: &str) -> String {
        format!("{}/api/devices/{}/alarms", self.api_url, device_id)
    }

    async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<Response, DeliveryError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|err| DeliveryError::Transport(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = if is_rejection(status) {
            response.text().await.unwrap_or_default()
        } else {
            String::new()
        };
        Err(status_error(status, body))
    }
}

fn is_rejection(status: StatusCode) -> bool {
    status.is_client_error()
        && status != StatusCode::REQUEST_TIMEOUT
        && status != StatusCode::TOO_MANY_REQUESTS
}

fn status_error(status: StatusCode, body: String) -> DeliveryError {
    let code = status.as_u16();
    if is_rejection(status) {
        DeliveryError::Rejected { status: code, body }
    } else if status.is_client_error() {
        DeliveryError::Throttled { status: code }
    } else {
        DeliveryError::Server { status: code }
    }
}

#[async_trait]
impl MetricSink for HttpSink {
    async fn deliver(&self, batch: &MetricBatch) -> Result<(), DeliveryError> {
        let url = self.measurements_url(&batch.device_id);
        self.post(&url, &batch.samples).await?;
        debug!("Delivered {} samples to {}", batch.len(), url);
        Ok(())
    }

    async fn deliver_alarms(
        &self,
        device_id: &str,
        states: &BTreeMap<String, bool>,
    ) -> Result<AlarmUpdateSummary, DeliveryError> {
        let url = self.alarms_url(device_id);
        let response = self.post(&url, states).await?;
        // Older APIs answer with an empty body.
        let bytes = response
            .bytes()
            .await
            .map_err(|err| DeliveryError::Transport(err.to_string()))?;
        Ok(serde_json::from_slice(&bytes).unwrap_or_default())
    }
}
