//! 超速与倾倒告警。
//!
//! 每次违规累积到临时告警记录，观测次数达到阈值后写入告警历史并删除临时记录。

use bms_config::AlertThresholds;
use bms_storage::{AlertHistory, AlertKind, AlertState, AlertStore, StorageError, new_record_id};
use domain::DeviceSnapshot;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// 告警错误。
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("store error: {0}")]
    Store(String),
}

impl From<StorageError> for AlertError {
    fn from(err: StorageError) -> Self {
        AlertError::Store(err.to_string())
    }
}

/// 单次违规的处理结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    /// 写入临时记录，未达到升级次数。
    Recorded(AlertKind),
    /// 达到升级次数，已写入历史。
    Escalated(AlertKind),
}

/// 单次轮询的告警处理结果。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertReport {
    pub recorded: usize,
    pub escalated: usize,
    pub failed_devices: Vec<String>,
}

/// 快照触发的违规类型及观测值。
pub fn violations(snapshot: &DeviceSnapshot, thresholds: &AlertThresholds) -> Vec<(AlertKind, i64)> {
    let mut found = Vec::new();
    if snapshot.speed >= thresholds.overspeed_limit {
        found.push((AlertKind::Overspeed, snapshot.speed));
    }
    if snapshot.angle < thresholds.fall_min_angle || snapshot.angle > thresholds.fall_max_angle {
        found.push((AlertKind::Fall, snapshot.angle));
    }
    found
}

pub struct AlertEvaluator {
    store: Arc<dyn AlertStore>,
    thresholds: AlertThresholds,
}

impl AlertEvaluator {
    pub fn new(store: Arc<dyn AlertStore>, thresholds: AlertThresholds) -> Self {
        let mut thresholds = thresholds;
        if thresholds.escalate_after == 0 {
            thresholds.escalate_after = 1;
        }
        Self { store, thresholds }
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// 评估整批快照；单个设备的存储错误不影响其他设备。
    pub async fn run(&self, snapshots: &[DeviceSnapshot], now_ms: i64) -> AlertReport {
        let mut report = AlertReport::default();
        for snapshot in snapshots {
            match self.evaluate(snapshot, now_ms).await {
                Ok(outcomes) => {
                    for outcome in outcomes {
                        match outcome {
                            AlertOutcome::Recorded(_) => report.recorded += 1,
                            AlertOutcome::Escalated(_) => report.escalated += 1,
                        }
                    }
                }
                Err(err) => {
                    warn!(
                        target: "bms.alert",
                        device_id = %snapshot.device_id,
                        error = %err,
                        "alert_evaluation_failed"
                    );
                    report.failed_devices.push(snapshot.device_id.clone());
                }
            }
        }
        report
    }

    pub async fn evaluate(
        &self,
        snapshot: &DeviceSnapshot,
        now_ms: i64,
    ) -> Result<Vec<AlertOutcome>, AlertError> {
        let mut outcomes = Vec::new();
        for (kind, value) in violations(snapshot, &self.thresholds) {
            outcomes.push(self.record(&snapshot.device_id, kind, value, now_ms).await?);
        }
        Ok(outcomes)
    }

    async fn record(
        &self,
        device_id: &str,
        kind: AlertKind,
        value: i64,
        now_ms: i64,
    ) -> Result<AlertOutcome, AlertError> {
        let state = match self.store.find_alert_state(device_id, kind).await? {
            None => AlertState {
                device_id: device_id.to_string(),
                kind,
                values: vec![value],
                alert_count: 0,
                created_at_ms: now_ms,
                updated_at_ms: now_ms,
            },
            Some(mut state) => {
                state.values.push(value);
                state.alert_count += 1;
                state.updated_at_ms = now_ms;
                state
            }
        };

        if state.values.len() < self.thresholds.escalate_after as usize {
            self.store.upsert_alert_state(state).await?;
            return Ok(AlertOutcome::Recorded(kind));
        }

        self.store
            .append_alert_history(AlertHistory {
                id: new_record_id(),
                device_id: device_id.to_string(),
                kind,
                alert_count: state.alert_count,
                values: state.values,
                created_at_ms: now_ms,
            })
            .await?;
        self.store.delete_alert_state(device_id, kind).await?;
        info!(
            target: "bms.alert",
            device_id = %device_id,
            kind = kind.as_str(),
            value,
            "alert_escalated"
        );
        Ok(AlertOutcome::Escalated(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(speed: i64, angle: i64) -> DeviceSnapshot {
        DeviceSnapshot {
            device_id: "B1".to_string(),
            asset: "B1".to_string(),
            battery_current: 0,
            previous_battery_current: None,
            soc: 50,
            cycle_count: 1,
            old_cycle_count: None,
            odometer: 0.0,
            latitude: 0,
            longitude: 0,
            speed,
            angle,
            soc_samples: Vec::new(),
            speed_samples: Vec::new(),
        }
    }

    #[test]
    fn thresholds_are_inclusive_where_expected() {
        let thresholds = AlertThresholds::default();
        assert!(violations(&snapshot(59, 90), &thresholds).is_empty());
        assert_eq!(
            violations(&snapshot(60, 90), &thresholds),
            vec![(AlertKind::Overspeed, 60)]
        );
        assert!(violations(&snapshot(0, 0), &thresholds).is_empty());
        assert!(violations(&snapshot(0, 135), &thresholds).is_empty());
        assert_eq!(
            violations(&snapshot(0, -1), &thresholds),
            vec![(AlertKind::Fall, -1)]
        );
        assert_eq!(
            violations(&snapshot(80, 136), &thresholds),
            vec![(AlertKind::Overspeed, 80), (AlertKind::Fall, 136)]
        );
    }

    #[test]
    fn shallow_tilt_is_not_a_fall_by_default() {
        let thresholds = AlertThresholds::default();
        assert!(violations(&snapshot(0, 30), &thresholds).is_empty());
        assert!(violations(&snapshot(0, 1), &thresholds).is_empty());
        assert_eq!(
            violations(&snapshot(0, -30), &thresholds),
            vec![(AlertKind::Fall, -30)]
        );
    }
}
