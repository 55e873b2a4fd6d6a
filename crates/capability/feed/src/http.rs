//! HTTP 拉取上游实时数据（reqwest，单次 GET，无重试）。

use crate::payload::{FeedPayload, map_payload};
use crate::{FeedError, TelemetryFeed, ensure_enough_devices};
use async_trait::async_trait;
use domain::{DeviceReading, now_epoch_ms};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// HTTP 上游配置。
#[derive(Debug, Clone)]
pub struct HttpFeedConfig {
    pub url: String,
    pub timeout: Duration,
    pub min_devices: usize,
}

pub struct HttpTelemetryFeed {
    client: Client,
    config: HttpFeedConfig,
}

impl HttpTelemetryFeed {
    pub fn new(config: HttpFeedConfig) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| FeedError::Http(err.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpFeedConfig {
        &self.config
    }
}

#[async_trait]
impl TelemetryFeed for HttpTelemetryFeed {
    async fn fetch(&self) -> Result<Vec<DeviceReading>, FeedError> {
        let response = self
            .client
            .get(&self.config.url)
            .send()
            .await
            .map_err(|err| FeedError::Http(err.to_string()))?
            .error_for_status()
            .map_err(|err| FeedError::Http(err.to_string()))?;
        let payload: FeedPayload = response
            .json()
            .await
            .map_err(|err| FeedError::Decode(err.to_string()))?;
        let readings = map_payload(payload, now_epoch_ms());
        debug!(target: "bms.feed", count = readings.len(), "feed_fetched");
        ensure_enough_devices(readings, self.config.min_devices)
    }
}
