//! 充电循环与行程循环检测。
//!
//! 两个检测器都以一次轮询的设备快照为输入，临时记录作为跨轮询的状态，
//! 循环完成时先写历史再删除临时记录。

pub mod charge;
pub mod trip;

pub use charge::{ChargeCycleDetector, ChargeCycleReport};
pub use trip::{
    Extremes, TripCycleConfig, TripCycleDetector, TripCycleReport, TripOutcome, TripSummary,
    summarize_samples,
};

use bms_storage::StorageError;

/// 检测器错误。
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("store error: {0}")]
    Store(String),
}

impl From<StorageError> for CycleError {
    fn from(err: StorageError) -> Self {
        CycleError::Store(err.to_string())
    }
}
