//! 充电循环检测
//!
//! 电流跨越充放电边界的设备为候选：无临时记录则开启循环，有则结束循环。
//! 同一轮询内并发写入候选设备的上次电流；整批处理完后把已完成的循环写入历史。

use crate::CycleError;
use bms_storage::{
    ChargeCycleHistory, ChargeCycleState, ChargeCycleStore, MainRecordStore, MainRecordUpdate,
    StorageError, new_record_id,
};
use domain::DeviceSnapshot;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// 单次轮询的充电循环处理结果。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChargeCycleReport {
    pub candidates: usize,
    pub opened: usize,
    pub closed: usize,
    pub flushed: usize,
    /// 开启/结束失败的设备（下次轮询重试）。
    pub failed_devices: Vec<String>,
    /// 写入历史失败、临时记录保留的设备。
    pub flush_failures: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Opened,
    Closed,
}

pub struct ChargeCycleDetector {
    charge_store: Arc<dyn ChargeCycleStore>,
    main_store: Arc<dyn MainRecordStore>,
}

impl ChargeCycleDetector {
    pub fn new(charge_store: Arc<dyn ChargeCycleStore>, main_store: Arc<dyn MainRecordStore>) -> Self {
        Self {
            charge_store,
            main_store,
        }
    }

    /// 处理一批快照。
    ///
    /// 上次电流的批量写入失败时，仍会先完成历史写入再返回错误。
    pub async fn run(
        &self,
        snapshots: &[DeviceSnapshot],
        now_ms: i64,
    ) -> Result<ChargeCycleReport, CycleError> {
        let candidates: Vec<&DeviceSnapshot> = snapshots
            .iter()
            .filter(|snapshot| snapshot.is_charge_candidate())
            .collect();

        let (mut report, baseline) = tokio::join!(
            self.apply_transitions(&candidates, now_ms),
            self.store_previous_currents(&candidates),
        );
        report.candidates = candidates.len();

        let flushed = self.flush_completed(&mut report, now_ms).await;
        if let Err(err) = baseline {
            warn!(target: "bms.cycle", error = %err, "charge_previous_current_update_failed");
            return Err(err.into());
        }
        report.flushed = flushed?;
        Ok(report)
    }

    async fn apply_transitions(
        &self,
        candidates: &[&DeviceSnapshot],
        now_ms: i64,
    ) -> ChargeCycleReport {
        let mut report = ChargeCycleReport::default();
        for snapshot in candidates {
            match self.transition(snapshot, now_ms).await {
                Ok(Transition::Opened) => report.opened += 1,
                Ok(Transition::Closed) => report.closed += 1,
                Err(err) => {
                    warn!(
                        target: "bms.cycle",
                        device_id = %snapshot.device_id,
                        error = %err,
                        "charge_cycle_transition_failed"
                    );
                    report.failed_devices.push(snapshot.device_id.clone());
                }
            }
        }
        report
    }

    async fn transition(
        &self,
        snapshot: &DeviceSnapshot,
        now_ms: i64,
    ) -> Result<Transition, StorageError> {
        match self.charge_store.find_charge_state(&snapshot.device_id).await? {
            None => {
                let state = ChargeCycleState {
                    device_id: snapshot.device_id.clone(),
                    asset: snapshot.asset.clone(),
                    start_time_ms: now_ms,
                    start_soc: snapshot.soc,
                    started: true,
                    end_time_ms: None,
                    end_soc: None,
                    ended: false,
                };
                self.charge_store.upsert_charge_state(state).await?;
                info!(
                    target: "bms.cycle",
                    device_id = %snapshot.device_id,
                    soc = snapshot.soc,
                    current = snapshot.battery_current,
                    "charge_cycle_opened"
                );
                Ok(Transition::Opened)
            }
            Some(mut state) => {
                state.end_time_ms = Some(now_ms);
                state.end_soc = Some(snapshot.soc);
                state.ended = true;
                self.charge_store.upsert_charge_state(state).await?;
                info!(
                    target: "bms.cycle",
                    device_id = %snapshot.device_id,
                    soc = snapshot.soc,
                    current = snapshot.battery_current,
                    "charge_cycle_closed"
                );
                Ok(Transition::Closed)
            }
        }
    }

    async fn store_previous_currents(
        &self,
        candidates: &[&DeviceSnapshot],
    ) -> Result<usize, StorageError> {
        if candidates.is_empty() {
            return Ok(0);
        }
        let updates = candidates
            .iter()
            .map(|snapshot| MainRecordUpdate {
                previous_battery_current: Some(snapshot.battery_current),
                ..MainRecordUpdate::new(snapshot.device_id.clone())
            })
            .collect();
        self.main_store.apply_updates(updates).await
    }

    /// 已完成的循环写入历史；历史写入失败的保留临时记录。
    async fn flush_completed(
        &self,
        report: &mut ChargeCycleReport,
        now_ms: i64,
    ) -> Result<usize, CycleError> {
        let completed = self.charge_store.list_completed_charge_states().await?;
        let mut flushed = 0;
        for state in completed {
            let history = ChargeCycleHistory {
                id: new_record_id(),
                device_id: state.device_id.clone(),
                asset: state.asset.clone(),
                start_time_ms: state.start_time_ms,
                start_soc: state.start_soc,
                end_time_ms: state.end_time_ms.unwrap_or(now_ms),
                end_soc: state.end_soc.unwrap_or(state.start_soc),
                created_at_ms: now_ms,
            };
            if let Err(err) = self.charge_store.append_charge_history(history).await {
                warn!(
                    target: "bms.cycle",
                    device_id = %state.device_id,
                    error = %err,
                    "charge_history_append_failed"
                );
                report.flush_failures.push(state.device_id);
                continue;
            }
            if let Err(err) = self.charge_store.delete_charge_state(&state.device_id).await {
                warn!(
                    target: "bms.cycle",
                    device_id = %state.device_id,
                    error = %err,
                    "charge_state_delete_failed"
                );
                report.flush_failures.push(state.device_id);
                continue;
            }
            flushed += 1;
        }
        Ok(flushed)
    }
}
