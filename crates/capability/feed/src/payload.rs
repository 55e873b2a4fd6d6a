//! 上游 JSON 载荷与读数映射。
//!
//! 支持两种外层结构：`{"data":[...]}` 与 `{"root":{"vehicle_data":[...]}}`。

use crate::FeedError;
use domain::DeviceReading;
use serde::Deserialize;
use std::collections::BTreeMap;

/// 上游响应外层。
#[derive(Debug, Default, Deserialize)]
pub struct FeedPayload {
    #[serde(default)]
    pub data: Option<Vec<RawDevice>>,
    #[serde(default)]
    pub root: Option<RootPayload>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RootPayload {
    #[serde(default)]
    pub vehicle_data: Vec<RawDevice>,
}

/// 单设备原始字段；数值字段缺失或为 null 时取 0，未识别的字段收集到 `extra` 作为元数据。
#[derive(Debug, Default, Deserialize)]
pub struct RawDevice {
    #[serde(default)]
    pub bms_id: Option<String>,
    #[serde(default)]
    pub asset: Option<String>,
    #[serde(default)]
    pub imei: Option<String>,
    #[serde(default)]
    pub battery_current: Option<i64>,
    #[serde(default)]
    pub battery_soc: Option<i64>,
    #[serde(default)]
    pub battery_cycle_count: Option<i64>,
    #[serde(default)]
    pub odo_meter: Option<f64>,
    #[serde(default)]
    pub location_latitude: Option<i64>,
    #[serde(default)]
    pub location_longitude: Option<i64>,
    #[serde(default)]
    pub location_speed: Option<i64>,
    #[serde(default)]
    pub location_angle: Option<i64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl FeedPayload {
    pub fn into_devices(self) -> Vec<RawDevice> {
        match (self.data, self.root) {
            (Some(data), _) => data,
            (None, Some(root)) => root.vehicle_data,
            (None, None) => Vec::new(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// 原始设备到读数的映射；既无 `bms_id` 也无 `imei` 的条目返回 None。
pub fn map_device(raw: RawDevice, received_at_ms: i64) -> Option<DeviceReading> {
    let imei = non_empty(raw.imei);
    let device_id = non_empty(raw.bms_id).or_else(|| imei.clone())?;
    let asset = non_empty(raw.asset)
        .or_else(|| imei.clone())
        .unwrap_or_else(|| device_id.clone());

    let mut metadata: BTreeMap<String, String> = raw
        .extra
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let text = match value {
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            };
            (key, text)
        })
        .collect();
    if let Some(imei) = imei {
        metadata.insert("imei".to_string(), imei);
    }

    Some(DeviceReading {
        device_id,
        asset,
        battery_current: raw.battery_current.unwrap_or_default(),
        soc: raw.battery_soc.unwrap_or_default(),
        cycle_count: raw.battery_cycle_count.unwrap_or_default(),
        odometer: raw.odo_meter.unwrap_or_default(),
        latitude: raw.location_latitude.unwrap_or_default(),
        longitude: raw.location_longitude.unwrap_or_default(),
        speed: raw.location_speed.unwrap_or_default(),
        angle: raw.location_angle.unwrap_or_default(),
        received_at_ms,
        metadata,
    })
}

/// 解析响应体为读数列表（丢弃无标识的条目）。
pub fn parse_payload(body: &str, received_at_ms: i64) -> Result<Vec<DeviceReading>, FeedError> {
    let payload: FeedPayload =
        serde_json::from_str(body).map_err(|err| FeedError::Decode(err.to_string()))?;
    Ok(map_payload(payload, received_at_ms))
}

pub fn map_payload(payload: FeedPayload, received_at_ms: i64) -> Vec<DeviceReading> {
    payload
        .into_devices()
        .into_iter()
        .filter_map(|raw| map_device(raw, received_at_ms))
        .collect()
}
