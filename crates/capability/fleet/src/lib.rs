//! 车队主记录维护：读数入库与里程累加、运行状态分类、每日行驶里程汇总。
//!
//! - [`reporting`]：每小时未上报设备统计
//! - [`temperature`]：电池温度告警累积与转历史

pub mod reporting;
pub mod temperature;

pub use reporting::{HOUR_MS, ReportingTracker, UnreportedRollupReport, hour_start};
pub use temperature::{
    TemperatureFlushReport, TemperatureReport, TemperatureWatch, battery_temperature,
};

use bms_storage::{
    BatteryStatus, DistanceStore, DistanceTravelledRecord, MainRecord, MainRecordStore,
    MainRecordUpdate, MainRecordUpsert, StorageError, new_record_id,
};
use domain::{DeviceReading, cumulative_distance_km};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// 维护错误。
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("store error: {0}")]
    Store(String),
}

impl From<StorageError> for FleetError {
    fn from(err: StorageError) -> Self {
        FleetError::Store(err.to_string())
    }
}

/// 维护参数。
#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub coordinate_scale: f64,
    /// 超过该时长未更新视为离线。
    pub offline_after_ms: i64,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            coordinate_scale: 1_000_000.0,
            offline_after_ms: 30 * 60 * 1000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub readings: usize,
    pub new_devices: usize,
    pub trail_failures: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RollupReport {
    pub devices: usize,
    pub total_km: f64,
    pub failed_devices: Vec<String>,
}

/// 按最后更新时间与速度分类。
pub fn classify(record: &MainRecord, now_ms: i64, offline_after_ms: i64) -> BatteryStatus {
    if now_ms.saturating_sub(record.updated_at_ms) > offline_after_ms {
        BatteryStatus::Offline
    } else if record.speed <= 0 {
        BatteryStatus::Idle
    } else {
        BatteryStatus::Moving
    }
}

pub struct FleetMaintainer {
    main_store: Arc<dyn MainRecordStore>,
    distance_store: Arc<dyn DistanceStore>,
    config: FleetConfig,
}

impl FleetMaintainer {
    pub fn new(
        main_store: Arc<dyn MainRecordStore>,
        distance_store: Arc<dyn DistanceStore>,
        config: FleetConfig,
    ) -> Self {
        Self {
            main_store,
            distance_store,
            config,
        }
    }

    /// 写入读数：累计里程 = 上次累计 + 上次位置到当前位置的大圆距离。
    ///
    /// 主记录写入失败时整体返回错误；轨迹追加失败只计数。
    pub async fn ingest(&self, readings: &[DeviceReading]) -> Result<IngestReport, FleetError> {
        let previous: HashMap<String, MainRecord> = self
            .main_store
            .list_main_records()
            .await?
            .into_iter()
            .map(|record| (record.device_id.clone(), record))
            .collect();

        let scale = self.config.coordinate_scale;
        let mut report = IngestReport {
            readings: readings.len(),
            ..IngestReport::default()
        };
        let mut upserts = Vec::with_capacity(readings.len());
        for reading in readings {
            let distance_travelled_km = match previous.get(&reading.device_id) {
                Some(record) => {
                    record.distance_travelled_km
                        + record.position(scale).distance_km(&reading.position(scale))
                }
                None => {
                    report.new_devices += 1;
                    0.0
                }
            };
            upserts.push(MainRecordUpsert {
                reading: reading.clone(),
                distance_travelled_km,
            });
        }
        self.main_store.upsert_readings(upserts).await?;

        for reading in readings {
            if let Err(err) = self
                .distance_store
                .append_distance_point(
                    &reading.device_id,
                    reading.position(scale),
                    reading.received_at_ms,
                )
                .await
            {
                warn!(
                    target: "bms.fleet",
                    device_id = %reading.device_id,
                    error = %err,
                    "distance_trail_append_failed"
                );
                report.trail_failures += 1;
            }
        }
        Ok(report)
    }

    /// 重新分类所有主记录，只写回状态变化的设备；返回变化数。
    pub async fn classify_statuses(&self, now_ms: i64) -> Result<usize, FleetError> {
        let records = self.main_store.list_main_records().await?;
        let updates: Vec<MainRecordUpdate> = records
            .iter()
            .filter_map(|record| {
                let status = classify(record, now_ms, self.config.offline_after_ms);
                (status != record.status).then(|| MainRecordUpdate {
                    status: Some(status),
                    ..MainRecordUpdate::new(record.device_id.clone())
                })
            })
            .collect();
        if updates.is_empty() {
            return Ok(0);
        }
        Ok(self.main_store.apply_updates(updates).await?)
    }

    /// 把每台设备的当日轨迹汇总为一条里程记录并清空轨迹。
    pub async fn roll_up_distance(&self, now_ms: i64) -> Result<RollupReport, FleetError> {
        let trails = self.distance_store.list_distance_trails().await?;
        let mut report = RollupReport::default();
        for trail in trails {
            let km = cumulative_distance_km(&trail.points);
            let record = DistanceTravelledRecord {
                id: new_record_id(),
                device_id: trail.device_id.clone(),
                km,
                period_start_ms: trail.started_at_ms,
                period_end_ms: now_ms,
            };
            let result = match self.distance_store.append_distance_record(record).await {
                Ok(()) => self.distance_store.clear_distance_trail(&trail.device_id).await,
                Err(err) => Err(err),
            };
            match result {
                Ok(_) => {
                    report.devices += 1;
                    report.total_km += km;
                }
                Err(err) => {
                    warn!(
                        target: "bms.fleet",
                        device_id = %trail.device_id,
                        error = %err,
                        "distance_rollup_failed"
                    );
                    report.failed_devices.push(trail.device_id);
                }
            }
        }
        info!(
            target: "bms.fleet",
            devices = report.devices,
            total_km = report.total_km,
            "distance_rollup_completed"
        );
        Ok(report)
    }
}
