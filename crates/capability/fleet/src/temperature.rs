//! 电池温度告警
//!
//! 温度达到上限的读数累积到 `battery_temperature` 类型的临时告警；
//! 定时把全部临时告警整体转入告警历史后删除，不按次数升级。

use crate::FleetError;
use bms_storage::{AlertHistory, AlertKind, AlertState, AlertStore, new_record_id};
use domain::DeviceReading;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// 读数元数据中的温度字段名。
pub const TEMPERATURE_KEY: &str = "battery_temperature";

fn whole_degrees(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|degrees| degrees.is_finite())
            .map(|degrees| degrees as i64)
    })
}

/// 读数中的电池温度；多个传感器时取最高值，缺失或无法解析时为 None。
pub fn battery_temperature(reading: &DeviceReading) -> Option<i64> {
    let raw = reading.metadata.get(TEMPERATURE_KEY)?;
    match serde_json::from_str::<Value>(raw.trim()).ok()? {
        Value::Array(items) => items.iter().filter_map(whole_degrees).max(),
        value => whole_degrees(&value),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TemperatureReport {
    pub observed: usize,
    pub failed_devices: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TemperatureFlushReport {
    pub flushed: usize,
    pub failed_devices: Vec<String>,
}

pub struct TemperatureWatch {
    alert_store: Arc<dyn AlertStore>,
    limit: i64,
}

impl TemperatureWatch {
    pub fn new(alert_store: Arc<dyn AlertStore>, limit: i64) -> Self {
        Self { alert_store, limit }
    }

    /// 累积超限读数；`alert_count` 为累计观测次数。单设备失败不影响其他设备。
    pub async fn observe(&self, readings: &[DeviceReading], now_ms: i64) -> TemperatureReport {
        let mut report = TemperatureReport::default();
        for reading in readings {
            let Some(degrees) = battery_temperature(reading) else {
                continue;
            };
            if degrees < self.limit {
                continue;
            }
            match self.record(&reading.device_id, degrees, now_ms).await {
                Ok(()) => report.observed += 1,
                Err(err) => {
                    warn!(
                        target: "bms.fleet",
                        device_id = %reading.device_id,
                        error = %err,
                        "temperature_alert_failed"
                    );
                    report.failed_devices.push(reading.device_id.clone());
                }
            }
        }
        report
    }

    async fn record(&self, device_id: &str, degrees: i64, now_ms: i64) -> Result<(), FleetError> {
        let state = match self
            .alert_store
            .find_alert_state(device_id, AlertKind::Temperature)
            .await?
        {
            None => AlertState {
                device_id: device_id.to_string(),
                kind: AlertKind::Temperature,
                values: vec![degrees],
                alert_count: 1,
                created_at_ms: now_ms,
                updated_at_ms: now_ms,
            },
            Some(mut state) => {
                state.values.push(degrees);
                state.alert_count += 1;
                state.updated_at_ms = now_ms;
                state
            }
        };
        self.alert_store.upsert_alert_state(state).await?;
        Ok(())
    }

    /// 把全部温度临时告警写入历史并删除；删除失败的设备下次会再写一次历史。
    pub async fn flush(&self, now_ms: i64) -> Result<TemperatureFlushReport, FleetError> {
        let states = self
            .alert_store
            .list_alert_states(AlertKind::Temperature)
            .await?;
        let mut report = TemperatureFlushReport::default();
        for state in states {
            let device_id = state.device_id.clone();
            let history = AlertHistory {
                id: new_record_id(),
                device_id: state.device_id,
                kind: AlertKind::Temperature,
                alert_count: state.alert_count,
                values: state.values,
                created_at_ms: now_ms,
            };
            let result = match self.alert_store.append_alert_history(history).await {
                Ok(()) => {
                    self.alert_store
                        .delete_alert_state(&device_id, AlertKind::Temperature)
                        .await
                }
                Err(err) => Err(err),
            };
            match result {
                Ok(_) => report.flushed += 1,
                Err(err) => {
                    warn!(
                        target: "bms.fleet",
                        device_id = %device_id,
                        error = %err,
                        "temperature_flush_failed"
                    );
                    report.failed_devices.push(device_id);
                }
            }
        }
        info!(
            target: "bms.fleet",
            flushed = report.flushed,
            failed = report.failed_devices.len(),
            "temperature_flush_completed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn with_temperature(raw: &str) -> DeviceReading {
        DeviceReading {
            device_id: "B1".to_string(),
            asset: "B1".to_string(),
            battery_current: 0,
            soc: 50,
            cycle_count: 1,
            odometer: 0.0,
            latitude: 0,
            longitude: 0,
            speed: 0,
            angle: 90,
            received_at_ms: 0,
            metadata: BTreeMap::from([(TEMPERATURE_KEY.to_string(), raw.to_string())]),
        }
    }

    #[test]
    fn temperature_accepts_numbers_and_sensor_arrays() {
        assert_eq!(battery_temperature(&with_temperature("41")), Some(41));
        assert_eq!(battery_temperature(&with_temperature("41.8")), Some(41));
        assert_eq!(battery_temperature(&with_temperature("[30, 57, 44]")), Some(57));
        assert_eq!(battery_temperature(&with_temperature("[]")), None);
        assert_eq!(battery_temperature(&with_temperature("hot")), None);

        let mut missing = with_temperature("0");
        missing.metadata.clear();
        assert_eq!(battery_temperature(&missing), None);
    }
}
