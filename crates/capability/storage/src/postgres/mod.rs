//! # PostgreSQL 存储实现模块
//!
//! 每个集合一张（或两张）表，表结构见 [`schema`]，启动时由
//! [`crate::connection::ensure_schema`] 建表。
//!
//! - 所有 SQL 使用参数绑定
//! - 批量写入逐条执行，不包裹事务：第一条失败即返回，已写入的保留
//! - 硬件元数据以 JSON 文本存放在 `metadata` 列

pub mod alert;
pub mod charge_cycle;
pub mod distance;
pub mod main_record;
pub mod reporting;
pub mod schema;
pub mod trip_cycle;

pub use alert::*;
pub use charge_cycle::*;
pub use distance::*;
pub use main_record::*;
pub use reporting::*;
pub use trip_cycle::*;

use domain::Coordinates;

/// 纬度、经度两列数组合并为坐标序列（长度取较短者）。
pub(crate) fn zip_points(latitudes: Vec<f64>, longitudes: Vec<f64>) -> Vec<Coordinates> {
    latitudes
        .into_iter()
        .zip(longitudes)
        .map(|(latitude, longitude)| Coordinates::new(latitude, longitude))
        .collect()
}
