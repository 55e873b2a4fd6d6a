//! 行程循环检测
//!
//! 以硬件循环计数的变化为边界：首次看到的计数开启行程，下一次不同的计数
//! 在采样变化充分时关闭行程并写入历史。SOC 与速度采样累积在主记录上，
//! 位置点累积在行程轨迹上。
//!
//! 关闭条件：SOC 与速度两个序列各自至少出现两个不同的取值（min < max）；
//! 否则保持开启，等待下一次计数变化再判断。单调放电的 SOC 同样满足条件。
//!
//! 关闭顺序：写历史、删状态、删轨迹。状态删除后不会再次关闭同一行程；
//! 轨迹删除失败只记日志，残留轨迹在下次开启时清理。

use crate::CycleError;
use bms_storage::{
    MainRecordStore, MainRecordUpdate, SampleUpdate, StorageError, TripCycleHistory,
    TripCycleState, TripCycleStore, new_record_id,
};
use domain::{DeviceSnapshot, cumulative_distance_km};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 行程检测参数。
#[derive(Debug, Clone)]
pub struct TripCycleConfig {
    /// 定点坐标的除数。
    pub coordinate_scale: f64,
}

impl Default for TripCycleConfig {
    fn default() -> Self {
        Self {
            coordinate_scale: 1_000_000.0,
        }
    }
}

impl TripCycleConfig {
    fn sanitized(mut self) -> Self {
        if self.coordinate_scale.is_nan() || self.coordinate_scale <= 0.0 {
            self.coordinate_scale = 1.0;
        }
        self
    }
}

/// 序列极值。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extremes {
    pub min: i64,
    pub max: i64,
}

impl Extremes {
    fn track(samples: &[i64]) -> Option<Self> {
        let (first, rest) = samples.split_first()?;
        Some(rest.iter().fold(
            Extremes {
                min: *first,
                max: *first,
            },
            |extremes, &value| Extremes {
                min: extremes.min.min(value),
                max: extremes.max.max(value),
            },
        ))
    }

    /// 序列中至少有两个不同取值。
    pub fn varied(&self) -> bool {
        self.min < self.max
    }
}

/// 一个行程内的采样汇总。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripSummary {
    pub soc: Extremes,
    pub speed: Extremes,
    /// 整数平均速度（sum / count）。
    pub avg_speed: i64,
}

impl TripSummary {
    pub fn passes_guard(&self) -> bool {
        self.soc.varied() && self.speed.varied()
    }
}

/// 汇总 SOC 与速度采样；任一序列为空返回 None。
pub fn summarize_samples(soc_samples: &[i64], speed_samples: &[i64]) -> Option<TripSummary> {
    let soc = Extremes::track(soc_samples)?;
    let speed = Extremes::track(speed_samples)?;
    let total: i64 = speed_samples.iter().sum();
    let avg_speed = total / speed_samples.len() as i64;
    Some(TripSummary {
        soc,
        speed,
        avg_speed,
    })
}

/// 单设备在一次计数变化时的处理结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripOutcome {
    Opened,
    Closed,
    /// 采样变化不足，行程保持开启。
    GuardSkipped,
}

/// 单次轮询的行程循环处理结果。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TripCycleReport {
    pub devices: usize,
    pub opened: usize,
    pub closed: usize,
    pub guard_skipped: usize,
    /// 开启/关闭失败、计数基线未推进的设备。
    pub failed_devices: Vec<String>,
}

pub struct TripCycleDetector {
    trip_store: Arc<dyn TripCycleStore>,
    main_store: Arc<dyn MainRecordStore>,
    config: TripCycleConfig,
}

impl TripCycleDetector {
    pub fn new(trip_store: Arc<dyn TripCycleStore>, main_store: Arc<dyn MainRecordStore>) -> Self {
        Self::with_config(trip_store, main_store, TripCycleConfig::default())
    }

    pub fn with_config(
        trip_store: Arc<dyn TripCycleStore>,
        main_store: Arc<dyn MainRecordStore>,
        config: TripCycleConfig,
    ) -> Self {
        Self {
            trip_store,
            main_store,
            config: config.sanitized(),
        }
    }

    /// 处理一批快照；采样与计数基线在所有开启/关闭完成后统一写回主记录。
    pub async fn run(
        &self,
        snapshots: &[DeviceSnapshot],
        now_ms: i64,
    ) -> Result<TripCycleReport, CycleError> {
        let mut report = TripCycleReport {
            devices: snapshots.len(),
            ..TripCycleReport::default()
        };
        let mut updates = Vec::with_capacity(snapshots.len());

        for snapshot in snapshots {
            let mut samples = SampleUpdate::Push {
                soc: snapshot.soc,
                speed: snapshot.speed,
            };
            let mut advance_baseline = true;

            let outcome = if snapshot.cycle_counter_changed() {
                self.on_counter_change(snapshot, now_ms).await.map(Some)
            } else {
                self.track_open_cycle(snapshot, now_ms).await.map(|_| None)
            };
            match outcome {
                Ok(Some(TripOutcome::Opened)) => report.opened += 1,
                Ok(Some(TripOutcome::Closed)) => {
                    report.closed += 1;
                    samples = SampleUpdate::Reset;
                }
                Ok(Some(TripOutcome::GuardSkipped)) => report.guard_skipped += 1,
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        target: "bms.cycle",
                        device_id = %snapshot.device_id,
                        error = %err,
                        "trip_cycle_transition_failed"
                    );
                    report.failed_devices.push(snapshot.device_id.clone());
                    advance_baseline = false;
                }
            }

            updates.push(MainRecordUpdate {
                old_cycle_count: advance_baseline.then_some(snapshot.cycle_count),
                samples: Some(samples),
                ..MainRecordUpdate::new(snapshot.device_id.clone())
            });
        }

        if !updates.is_empty() {
            self.main_store.apply_updates(updates).await?;
        }
        Ok(report)
    }

    /// 计数未变化：行程开启中则追加位置点。
    async fn track_open_cycle(
        &self,
        snapshot: &DeviceSnapshot,
        now_ms: i64,
    ) -> Result<(), StorageError> {
        if self
            .trip_store
            .find_trip_state(&snapshot.device_id)
            .await?
            .is_some()
        {
            self.trip_store
                .append_trip_location(
                    &snapshot.device_id,
                    snapshot.position(self.config.coordinate_scale),
                    now_ms,
                )
                .await?;
        }
        Ok(())
    }

    async fn on_counter_change(
        &self,
        snapshot: &DeviceSnapshot,
        now_ms: i64,
    ) -> Result<TripOutcome, StorageError> {
        let position = snapshot.position(self.config.coordinate_scale);
        let Some(state) = self.trip_store.find_trip_state(&snapshot.device_id).await? else {
            // 上一行程关闭时可能残留轨迹
            self.trip_store.delete_trip_trail(&snapshot.device_id).await?;
            self.trip_store
                .upsert_trip_state(TripCycleState {
                    device_id: snapshot.device_id.clone(),
                    asset: snapshot.asset.clone(),
                    cycle_no: snapshot.cycle_count,
                    start_time_ms: now_ms,
                    start_odometer: snapshot.odometer,
                })
                .await?;
            self.trip_store
                .append_trip_location(&snapshot.device_id, position, now_ms)
                .await?;
            info!(
                target: "bms.cycle",
                device_id = %snapshot.device_id,
                cycle_no = snapshot.cycle_count,
                "trip_cycle_opened"
            );
            return Ok(TripOutcome::Opened);
        };

        self.trip_store
            .append_trip_location(&snapshot.device_id, position, now_ms)
            .await?;

        let mut soc_samples = snapshot.soc_samples.clone();
        soc_samples.push(snapshot.soc);
        let mut speed_samples = snapshot.speed_samples.clone();
        speed_samples.push(snapshot.speed);
        let summary = match summarize_samples(&soc_samples, &speed_samples) {
            Some(summary) if summary.passes_guard() => summary,
            _ => {
                debug!(
                    target: "bms.cycle",
                    device_id = %snapshot.device_id,
                    cycle_no = state.cycle_no,
                    samples = soc_samples.len(),
                    "trip_cycle_guard_skipped"
                );
                return Ok(TripOutcome::GuardSkipped);
            }
        };

        let km_travelled = self
            .trip_store
            .find_trip_trail(&snapshot.device_id)
            .await?
            .map(|trail| cumulative_distance_km(&trail.points))
            .unwrap_or(0.0);
        let history = TripCycleHistory {
            id: new_record_id(),
            device_id: snapshot.device_id.clone(),
            asset: snapshot.asset.clone(),
            cycle_no: state.cycle_no,
            start_time_ms: state.start_time_ms,
            end_time_ms: now_ms,
            km_travelled,
            min_soc: summary.soc.min,
            max_soc: summary.soc.max,
            avg_speed: summary.avg_speed,
            top_speed: summary.speed.max,
            lowest_speed: summary.speed.min,
            depth_of_discharge: format!("{}%", snapshot.soc),
            start_odometer: state.start_odometer,
            end_odometer: snapshot.odometer / 1000.0 - km_travelled,
            created_at_ms: now_ms,
        };
        self.trip_store.append_trip_history(history).await?;
        self.trip_store.delete_trip_state(&snapshot.device_id).await?;
        if let Err(err) = self.trip_store.delete_trip_trail(&snapshot.device_id).await {
            warn!(
                target: "bms.cycle",
                device_id = %snapshot.device_id,
                error = %err,
                "trip_trail_cleanup_failed"
            );
        }
        info!(
            target: "bms.cycle",
            device_id = %snapshot.device_id,
            cycle_no = state.cycle_no,
            km = km_travelled,
            "trip_cycle_closed"
        );
        Ok(TripOutcome::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extremes_start_at_first_sample() {
        let extremes = Extremes::track(&[50, 50, 50]).expect("extremes");
        assert_eq!((extremes.min, extremes.max), (50, 50));
        assert!(!extremes.varied());

        let extremes = Extremes::track(&[50, 40, 60, 45]).expect("extremes");
        assert_eq!((extremes.min, extremes.max), (40, 60));
        assert!(extremes.varied());
        assert!(Extremes::track(&[]).is_none());
    }

    #[test]
    fn guard_requires_both_series_to_vary() {
        let summary = summarize_samples(&[50, 40, 60], &[20, 10, 30]).expect("summary");
        assert!(summary.passes_guard());
        assert_eq!(summary.avg_speed, 20);

        // 放电中 SOC 单调下降、速度只升不降
        let summary = summarize_samples(&[80, 75, 70], &[20, 25, 30]).expect("summary");
        assert!(summary.passes_guard());

        // 匀速
        let summary = summarize_samples(&[80, 75, 70], &[20, 20, 20]).expect("summary");
        assert!(!summary.passes_guard());

        let single = summarize_samples(&[50], &[20]).expect("summary");
        assert!(!single.passes_guard());
    }

    #[test]
    fn average_speed_truncates() {
        let summary = summarize_samples(&[1, 2], &[10, 15]).expect("summary");
        assert_eq!(summary.avg_speed, 12);
    }

    #[test]
    fn config_rejects_non_positive_scale() {
        let config = TripCycleConfig {
            coordinate_scale: 0.0,
        }
        .sanitized();
        assert_eq!(config.coordinate_scale, 1.0);
    }
}
