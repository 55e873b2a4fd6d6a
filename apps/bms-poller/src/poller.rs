//! 单次轮询
//!
//! 拉取上游读数 → 写入主记录、上报标记与温度告警 → 充电/行程/告警三个检测器
//! 并发处理同一批快照 → 运行状态分类。上游不可用时整次轮询放弃，不写入任何记录。
//!
//! 每小时任务：补齐未上报统计，温度告警转入历史。

use crate::stores::Stores;
use bms_alert::{AlertEvaluator, AlertReport};
use bms_config::{AlertThresholds, AppConfig};
use bms_cycle::{
    ChargeCycleDetector, ChargeCycleReport, TripCycleConfig, TripCycleDetector, TripCycleReport,
};
use bms_feed::{FeedError, TelemetryFeed};
use bms_fleet::{
    FleetConfig, FleetError, FleetMaintainer, IngestReport, ReportingTracker, RollupReport,
    TemperatureFlushReport, TemperatureReport, TemperatureWatch, UnreportedRollupReport,
};
use bms_storage::{MainRecord, MainRecordStore, UnreportedCount};
use bms_telemetry::{
    new_tick_id, record_alerts_escalated, record_alerts_recorded, record_charge_cycles_closed,
    record_charge_cycles_flushed, record_charge_cycles_opened, record_readings_ingested,
    record_status_changes, record_store_failures, record_temperature_alerts_flushed,
    record_temperature_alerts_recorded, record_tick, record_tick_abandoned,
    record_trip_cycles_closed, record_trip_cycles_opened, record_trip_guard_skipped,
};
use domain::{DeviceSnapshot, now_epoch_ms};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{Instrument, info, warn};

/// 放弃本次轮询的原因。
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Fleet(#[from] FleetError),
    #[error("store error: {0}")]
    Store(String),
}

/// 检测器参数。
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub coordinate_scale: f64,
    pub alert_thresholds: AlertThresholds,
    pub offline_after_ms: i64,
    pub battery_temperature_limit: i64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            coordinate_scale: 1_000_000.0,
            alert_thresholds: AlertThresholds::default(),
            offline_after_ms: 30 * 60 * 1000,
            battery_temperature_limit: 55,
        }
    }
}

impl From<&AppConfig> for PollerConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            coordinate_scale: config.coordinate_scale,
            alert_thresholds: config.alert_thresholds.clone(),
            offline_after_ms: config.offline_after_seconds.saturating_mul(1000) as i64,
            battery_temperature_limit: config.battery_temperature_limit,
        }
    }
}

/// 单次轮询结果，`/status` 返回最近一次。
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub tick_id: String,
    pub started_at_ms: i64,
    pub latency_ms: u64,
    pub ingest: IngestReport,
    /// 检测器整体失败时为 None，原因记录在 errors。
    pub charge: Option<ChargeCycleReport>,
    pub trip: Option<TripCycleReport>,
    pub alert: AlertReport,
    pub temperature: TemperatureReport,
    pub status_changes: usize,
    pub errors: Vec<String>,
}

/// 每小时任务结果；某一步失败时对应字段为 None，原因记录在 errors。
#[derive(Debug, Clone, Serialize)]
pub struct HourlyReport {
    pub ran_at_ms: i64,
    pub unreported: Option<UnreportedRollupReport>,
    pub temperature: Option<TemperatureFlushReport>,
    pub errors: Vec<String>,
}

impl TickReport {
    /// 本次轮询中写入失败、等待下次重试的条目数。
    pub fn store_failures(&self) -> usize {
        let charge = self
            .charge
            .as_ref()
            .map(|report| report.failed_devices.len() + report.flush_failures.len())
            .unwrap_or(0);
        let trip = self
            .trip
            .as_ref()
            .map(|report| report.failed_devices.len())
            .unwrap_or(0);
        charge
            + trip
            + self.alert.failed_devices.len()
            + self.temperature.failed_devices.len()
            + self.ingest.trail_failures
            + self.errors.len()
    }
}

pub struct Poller {
    feed: Arc<dyn TelemetryFeed>,
    main_store: Arc<dyn MainRecordStore>,
    fleet: FleetMaintainer,
    charge: ChargeCycleDetector,
    trip: TripCycleDetector,
    alert: AlertEvaluator,
    reporting: ReportingTracker,
    temperature: TemperatureWatch,
    last_report: RwLock<Option<TickReport>>,
    last_rollup: RwLock<Option<RollupReport>>,
    last_hourly: RwLock<Option<HourlyReport>>,
}

impl Poller {
    pub fn new(feed: Arc<dyn TelemetryFeed>, stores: &Stores, config: PollerConfig) -> Self {
        let fleet = FleetMaintainer::new(
            stores.main.clone(),
            stores.distance.clone(),
            FleetConfig {
                coordinate_scale: config.coordinate_scale,
                offline_after_ms: config.offline_after_ms,
            },
        );
        let trip = TripCycleDetector::with_config(
            stores.trip.clone(),
            stores.main.clone(),
            TripCycleConfig {
                coordinate_scale: config.coordinate_scale,
            },
        );
        Self {
            feed,
            main_store: stores.main.clone(),
            fleet,
            charge: ChargeCycleDetector::new(stores.charge.clone(), stores.main.clone()),
            trip,
            alert: AlertEvaluator::new(stores.alert.clone(), config.alert_thresholds),
            reporting: ReportingTracker::new(stores.main.clone(), stores.reporting.clone()),
            temperature: TemperatureWatch::new(
                stores.alert.clone(),
                config.battery_temperature_limit,
            ),
            last_report: RwLock::new(None),
            last_rollup: RwLock::new(None),
            last_hourly: RwLock::new(None),
        }
    }

    pub fn last_report(&self) -> Option<TickReport> {
        self.last_report.read().ok().and_then(|guard| guard.clone())
    }

    pub fn last_rollup(&self) -> Option<RollupReport> {
        self.last_rollup.read().ok().and_then(|guard| guard.clone())
    }

    pub fn last_hourly(&self) -> Option<HourlyReport> {
        self.last_hourly.read().ok().and_then(|guard| guard.clone())
    }

    /// 定时器调用入口：生成 tick_id 并在 span 内执行。
    pub async fn run_tick(&self) -> Result<TickReport, TickError> {
        let tick_id = new_tick_id();
        let span = tracing::info_span!("tick", tick_id = %tick_id);
        self.tick_at(tick_id, now_epoch_ms()).instrument(span).await
    }

    pub async fn tick_at(&self, tick_id: String, now_ms: i64) -> Result<TickReport, TickError> {
        let started = Instant::now();

        let readings = match self.feed.fetch().await {
            Ok(readings) => readings,
            Err(err) => {
                record_tick_abandoned();
                warn!(target: "bms.poller", error = %err, "tick_abandoned");
                return Err(err.into());
            }
        };
        let ingest = match self.fleet.ingest(&readings).await {
            Ok(report) => report,
            Err(err) => {
                record_tick_abandoned();
                record_store_failures(1);
                warn!(target: "bms.poller", error = %err, "main_record_ingest_failed");
                return Err(err.into());
            }
        };
        record_readings_ingested(ingest.readings as u64);

        let mut errors = Vec::new();
        if let Err(err) = self.reporting.mark_reported(&readings).await {
            warn!(target: "bms.poller", error = %err, "reporting_mark_failed");
            errors.push(format!("reporting: {err}"));
        }
        let temperature = self.temperature.observe(&readings, now_ms).await;
        record_temperature_alerts_recorded(temperature.observed as u64);

        let snapshots = self.load_snapshots(&readings).await?;
        let (charge, trip, alert) = tokio::join!(
            self.charge.run(&snapshots, now_ms),
            self.trip.run(&snapshots, now_ms),
            self.alert.run(&snapshots, now_ms),
        );

        let charge = match charge {
            Ok(report) => {
                record_charge_cycles_opened(report.opened as u64);
                record_charge_cycles_closed(report.closed as u64);
                record_charge_cycles_flushed(report.flushed as u64);
                Some(report)
            }
            Err(err) => {
                warn!(target: "bms.poller", error = %err, "charge_cycle_run_failed");
                errors.push(format!("charge: {err}"));
                None
            }
        };
        let trip = match trip {
            Ok(report) => {
                record_trip_cycles_opened(report.opened as u64);
                record_trip_cycles_closed(report.closed as u64);
                record_trip_guard_skipped(report.guard_skipped as u64);
                Some(report)
            }
            Err(err) => {
                warn!(target: "bms.poller", error = %err, "trip_cycle_run_failed");
                errors.push(format!("trip: {err}"));
                None
            }
        };
        record_alerts_recorded(alert.recorded as u64);
        record_alerts_escalated(alert.escalated as u64);

        let status_changes = match self.fleet.classify_statuses(now_ms).await {
            Ok(changes) => changes,
            Err(err) => {
                warn!(target: "bms.poller", error = %err, "status_classification_failed");
                errors.push(format!("status: {err}"));
                0
            }
        };
        record_status_changes(status_changes as u64);

        let latency_ms = started.elapsed().as_millis() as u64;
        let report = TickReport {
            tick_id,
            started_at_ms: now_ms,
            latency_ms,
            ingest,
            charge,
            trip,
            alert,
            temperature,
            status_changes,
            errors,
        };
        record_store_failures(report.store_failures() as u64);
        record_tick(latency_ms);
        info!(
            target: "bms.poller",
            readings = report.ingest.readings,
            new_devices = report.ingest.new_devices,
            status_changes = report.status_changes,
            store_failures = report.store_failures(),
            latency_ms,
            "tick_completed"
        );
        if let Ok(mut guard) = self.last_report.write() {
            *guard = Some(report.clone());
        }
        Ok(report)
    }

    /// 只处理本次上游报告的设备。
    async fn load_snapshots(
        &self,
        readings: &[domain::DeviceReading],
    ) -> Result<Vec<DeviceSnapshot>, TickError> {
        let reported: HashSet<&str> = readings
            .iter()
            .map(|reading| reading.device_id.as_str())
            .collect();
        let records = self.main_store.list_main_records().await.map_err(|err| {
            record_tick_abandoned();
            record_store_failures(1);
            warn!(target: "bms.poller", error = %err, "snapshot_load_failed");
            TickError::Store(err.to_string())
        })?;
        Ok(records
            .iter()
            .filter(|record| reported.contains(record.device_id.as_str()))
            .map(MainRecord::snapshot)
            .collect())
    }

    /// 汇总当日行驶里程。
    pub async fn roll_up_distance(&self) -> Result<RollupReport, TickError> {
        let report = self.fleet.roll_up_distance(now_epoch_ms()).await?;
        record_store_failures(report.failed_devices.len() as u64);
        if let Ok(mut guard) = self.last_rollup.write() {
            *guard = Some(report.clone());
        }
        Ok(report)
    }

    /// 每小时任务：两步互不依赖，一步失败不影响另一步。
    pub async fn run_hourly(&self) -> HourlyReport {
        self.hourly_at(now_epoch_ms()).await
    }

    pub async fn hourly_at(&self, now_ms: i64) -> HourlyReport {
        let mut errors = Vec::new();
        let unreported = match self.reporting.roll_up_unreported(now_ms).await {
            Ok(report) => Some(report),
            Err(err) => {
                warn!(target: "bms.poller", error = %err, "unreported_rollup_failed");
                errors.push(format!("unreported: {err}"));
                None
            }
        };
        let temperature = match self.temperature.flush(now_ms).await {
            Ok(report) => {
                record_temperature_alerts_flushed(report.flushed as u64);
                record_store_failures(report.failed_devices.len() as u64);
                Some(report)
            }
            Err(err) => {
                warn!(target: "bms.poller", error = %err, "temperature_flush_failed");
                errors.push(format!("temperature: {err}"));
                None
            }
        };
        record_store_failures(errors.len() as u64);

        let report = HourlyReport {
            ran_at_ms: now_ms,
            unreported,
            temperature,
            errors,
        };
        if let Ok(mut guard) = self.last_hourly.write() {
            *guard = Some(report.clone());
        }
        report
    }

    /// 最近 7 个已结束小时的未上报统计。
    pub async fn unreported_counts(&self, now_ms: i64) -> Result<Vec<UnreportedCount>, TickError> {
        Ok(self.reporting.last_seven_hours(now_ms).await?)
    }
}
