//! 存储接口 Trait 定义
//!
//! 每个集合一个接口：
//! - MainRecordStore：设备主记录
//! - ChargeCycleStore：充电循环临时记录与历史
//! - TripCycleStore：行程循环临时记录、位置轨迹与历史
//! - AlertStore：告警累积与历史
//! - DistanceStore：每日轨迹与里程记录
//! - ReportingStore：每小时上报标记与未上报统计
//!
//! 批量写入按顺序执行、无事务：遇到第一个错误即返回，已写入的不回滚。

use crate::error::StorageError;
use crate::models::{
    AlertHistory, AlertKind, AlertState, ChargeCycleHistory, ChargeCycleState, DistanceTrail,
    DistanceTravelledRecord, MainRecord, MainRecordUpdate, MainRecordUpsert, TripCycleHistory,
    TripCycleState, TripLocationTrail, UnreportedCount,
};
use async_trait::async_trait;
use domain::Coordinates;

/// 设备主记录存储接口
#[async_trait]
pub trait MainRecordStore: Send + Sync {
    async fn list_main_records(&self) -> Result<Vec<MainRecord>, StorageError>;

    async fn find_main_record(&self, device_id: &str)
    -> Result<Option<MainRecord>, StorageError>;

    /// 按顺序写入读数；返回成功写入的条数。
    async fn upsert_readings(&self, items: Vec<MainRecordUpsert>) -> Result<usize, StorageError>;

    /// 按顺序应用检测器字段更新；主记录不存在视为错误。
    async fn apply_updates(&self, updates: Vec<MainRecordUpdate>) -> Result<usize, StorageError>;
}

/// 充电循环存储接口
#[async_trait]
pub trait ChargeCycleStore: Send + Sync {
    async fn find_charge_state(
        &self,
        device_id: &str,
    ) -> Result<Option<ChargeCycleState>, StorageError>;

    async fn upsert_charge_state(&self, state: ChargeCycleState) -> Result<(), StorageError>;

    /// 列出已开始且已结束的临时记录。
    async fn list_completed_charge_states(&self) -> Result<Vec<ChargeCycleState>, StorageError>;

    async fn delete_charge_state(&self, device_id: &str) -> Result<bool, StorageError>;

    async fn append_charge_history(&self, record: ChargeCycleHistory) -> Result<(), StorageError>;

    async fn list_charge_history(
        &self,
        device_id: &str,
    ) -> Result<Vec<ChargeCycleHistory>, StorageError>;
}

/// 行程循环存储接口
#[async_trait]
pub trait TripCycleStore: Send + Sync {
    async fn find_trip_state(&self, device_id: &str)
    -> Result<Option<TripCycleState>, StorageError>;

    async fn upsert_trip_state(&self, state: TripCycleState) -> Result<(), StorageError>;

    async fn delete_trip_state(&self, device_id: &str) -> Result<bool, StorageError>;

    async fn find_trip_trail(
        &self,
        device_id: &str,
    ) -> Result<Option<TripLocationTrail>, StorageError>;

    /// 追加一个位置点；轨迹不存在时创建。
    async fn append_trip_location(
        &self,
        device_id: &str,
        point: Coordinates,
        now_ms: i64,
    ) -> Result<(), StorageError>;

    async fn delete_trip_trail(&self, device_id: &str) -> Result<bool, StorageError>;

    async fn append_trip_history(&self, record: TripCycleHistory) -> Result<(), StorageError>;

    async fn list_trip_history(
        &self,
        device_id: &str,
    ) -> Result<Vec<TripCycleHistory>, StorageError>;
}

/// 告警存储接口
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn find_alert_state(
        &self,
        device_id: &str,
        kind: AlertKind,
    ) -> Result<Option<AlertState>, StorageError>;

    async fn upsert_alert_state(&self, state: AlertState) -> Result<(), StorageError>;

    async fn delete_alert_state(
        &self,
        device_id: &str,
        kind: AlertKind,
    ) -> Result<bool, StorageError>;

    /// 列出某类型的全部累积中告警，按设备 ID 排序。
    async fn list_alert_states(&self, kind: AlertKind) -> Result<Vec<AlertState>, StorageError>;

    async fn append_alert_history(&self, record: AlertHistory) -> Result<(), StorageError>;

    async fn list_alert_history(&self, device_id: &str)
    -> Result<Vec<AlertHistory>, StorageError>;
}

/// 行驶里程存储接口
#[async_trait]
pub trait DistanceStore: Send + Sync {
    /// 追加一个位置点；当日轨迹不存在时创建。
    async fn append_distance_point(
        &self,
        device_id: &str,
        point: Coordinates,
        now_ms: i64,
    ) -> Result<(), StorageError>;

    async fn list_distance_trails(&self) -> Result<Vec<DistanceTrail>, StorageError>;

    async fn clear_distance_trail(&self, device_id: &str) -> Result<bool, StorageError>;

    async fn append_distance_record(
        &self,
        record: DistanceTravelledRecord,
    ) -> Result<(), StorageError>;

    async fn list_distance_records(
        &self,
        device_id: &str,
    ) -> Result<Vec<DistanceTravelledRecord>, StorageError>;
}

/// 上报统计存储接口
#[async_trait]
pub trait ReportingStore: Send + Sync {
    /// 标记设备在该小时内上报过；重复标记不重复计数。
    async fn mark_reported(
        &self,
        hour_start_ms: i64,
        device_ids: Vec<String>,
    ) -> Result<(), StorageError>;

    async fn count_reported(&self, hour_start_ms: i64) -> Result<i64, StorageError>;

    /// 删除小时起点早于 `cutoff_ms` 的标记；返回删除的条数。
    async fn prune_reported_before(&self, cutoff_ms: i64) -> Result<u64, StorageError>;

    /// 按小时起点覆盖写入。
    async fn upsert_unreported_count(&self, count: UnreportedCount) -> Result<(), StorageError>;

    /// 小时起点不早于 `since_ms` 的统计，按小时升序。
    async fn list_unreported_counts(
        &self,
        since_ms: i64,
    ) -> Result<Vec<UnreportedCount>, StorageError>;

    async fn prune_unreported_counts_before(&self, cutoff_ms: i64) -> Result<u64, StorageError>;
}
