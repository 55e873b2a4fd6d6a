//! 上游遥测数据源。
//!
//! 每次轮询调用一次 [`TelemetryFeed::fetch`]，得到全部设备的当前读数。

pub mod http;
pub mod payload;

pub use http::{HttpFeedConfig, HttpTelemetryFeed};
pub use payload::{FeedPayload, RawDevice, map_device, map_payload, parse_payload};

use async_trait::async_trait;
use domain::DeviceReading;
use std::sync::RwLock;

/// 上游返回的设备数少于该值时视为限流后的退化响应。
pub const DEGENERATE_MESSAGE: &str = "API time limit exceeded";

/// 数据源错误。
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("http error: {0}")]
    Http(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("degenerate response: {0}")]
    Degenerate(String),
}

/// 遥测数据源抽象。
#[async_trait]
pub trait TelemetryFeed: Send + Sync {
    async fn fetch(&self) -> Result<Vec<DeviceReading>, FeedError>;
}

/// 设备数不足时拒绝整批读数。
pub fn ensure_enough_devices(
    readings: Vec<DeviceReading>,
    min_devices: usize,
) -> Result<Vec<DeviceReading>, FeedError> {
    if readings.len() < min_devices {
        return Err(FeedError::Degenerate(DEGENERATE_MESSAGE.to_string()));
    }
    Ok(readings)
}

/// 固定读数数据源（测试与本地接线）。
pub struct StaticFeed {
    readings: RwLock<Vec<DeviceReading>>,
    min_devices: usize,
}

impl StaticFeed {
    pub fn new(readings: Vec<DeviceReading>) -> Self {
        Self {
            readings: RwLock::new(readings),
            min_devices: 0,
        }
    }

    pub fn with_min_devices(mut self, min_devices: usize) -> Self {
        self.min_devices = min_devices;
        self
    }

    /// 替换下一次返回的读数。
    pub fn replace(&self, readings: Vec<DeviceReading>) {
        if let Ok(mut guard) = self.readings.write() {
            *guard = readings;
        }
    }
}

#[async_trait]
impl TelemetryFeed for StaticFeed {
    async fn fetch(&self) -> Result<Vec<DeviceReading>, FeedError> {
        let readings = self
            .readings
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| FeedError::Http("lock failed".to_string()))?;
        ensure_enough_devices(readings, self.min_devices)
    }
}
