//! 每小时上报统计
//!
//! 每次轮询按读数接收时间所在的整点小时标记上报设备；小时结束后，
//! 未上报数 = 主记录总数 - 该小时上报过的设备数。只保留最近 7 个已结束的小时。

use crate::FleetError;
use bms_storage::{MainRecordStore, ReportingStore, UnreportedCount};
use domain::DeviceReading;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::info;

pub const HOUR_MS: i64 = 60 * 60 * 1000;
/// 保留的已结束小时数。
pub const TRACKED_HOURS: i64 = 7;

/// 所在整点小时的起点。
pub fn hour_start(ms: i64) -> i64 {
    ms.div_euclid(HOUR_MS) * HOUR_MS
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnreportedRollupReport {
    /// 本次新写入的小时数。
    pub written: usize,
    pub pruned: u64,
}

pub struct ReportingTracker {
    main_store: Arc<dyn MainRecordStore>,
    reporting_store: Arc<dyn ReportingStore>,
}

impl ReportingTracker {
    pub fn new(
        main_store: Arc<dyn MainRecordStore>,
        reporting_store: Arc<dyn ReportingStore>,
    ) -> Self {
        Self {
            main_store,
            reporting_store,
        }
    }

    /// 标记本批读数的设备；返回标记的读数条数。
    pub async fn mark_reported(&self, readings: &[DeviceReading]) -> Result<usize, FleetError> {
        let mut by_hour: BTreeMap<i64, Vec<String>> = BTreeMap::new();
        for reading in readings {
            by_hour
                .entry(hour_start(reading.received_at_ms))
                .or_default()
                .push(reading.device_id.clone());
        }
        for (hour_start_ms, device_ids) in by_hour {
            self.reporting_store
                .mark_reported(hour_start_ms, device_ids)
                .await?;
        }
        Ok(readings.len())
    }

    /// 补齐最近 7 个已结束小时中缺失的统计，然后删除更早的标记与统计。
    ///
    /// 已写入的小时不再重算。
    pub async fn roll_up_unreported(
        &self,
        now_ms: i64,
    ) -> Result<UnreportedRollupReport, FleetError> {
        let oldest = hour_start(now_ms) - TRACKED_HOURS * HOUR_MS;
        let existing: HashSet<i64> = self
            .reporting_store
            .list_unreported_counts(oldest)
            .await?
            .into_iter()
            .map(|count| count.hour_start_ms)
            .collect();

        let mut report = UnreportedRollupReport::default();
        let missing: Vec<i64> = (0..TRACKED_HOURS)
            .map(|offset| oldest + offset * HOUR_MS)
            .filter(|hour| !existing.contains(hour))
            .collect();
        if !missing.is_empty() {
            let total_devices = self.main_store.list_main_records().await?.len() as i64;
            for hour_start_ms in missing {
                let reported_devices = self.reporting_store.count_reported(hour_start_ms).await?;
                self.reporting_store
                    .upsert_unreported_count(UnreportedCount {
                        hour_start_ms,
                        total_devices,
                        reported_devices,
                        unreported: (total_devices - reported_devices).max(0),
                        created_at_ms: now_ms,
                    })
                    .await?;
                report.written += 1;
            }
        }

        report.pruned = self.reporting_store.prune_reported_before(oldest).await?
            + self
                .reporting_store
                .prune_unreported_counts_before(oldest)
                .await?;
        info!(
            target: "bms.fleet",
            written = report.written,
            pruned = report.pruned,
            "unreported_rollup_completed"
        );
        Ok(report)
    }

    /// 最近 7 个已结束小时的统计，按小时升序。
    pub async fn last_seven_hours(&self, now_ms: i64) -> Result<Vec<UnreportedCount>, FleetError> {
        let current = hour_start(now_ms);
        let counts = self
            .reporting_store
            .list_unreported_counts(current - TRACKED_HOURS * HOUR_MS)
            .await?;
        Ok(counts
            .into_iter()
            .filter(|count| count.hour_start_ms < current)
            .collect())
    }
}
