//! 内存存储实现模块
//!
//! 用于测试与未配置数据库时的本地运行；进程退出即丢失。

pub mod alert;
pub mod charge_cycle;
pub mod distance;
pub mod main_record;
pub mod reporting;
pub mod trip_cycle;

pub use alert::*;
pub use charge_cycle::*;
pub use distance::*;
pub use main_record::*;
pub use reporting::*;
pub use trip_cycle::*;
