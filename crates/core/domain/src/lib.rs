pub mod data;
pub mod geo;

pub use data::{DeviceReading, DeviceSnapshot};
pub use geo::{Coordinates, EARTH_RADIUS_KM, cumulative_distance_km};

/// 当前 epoch 毫秒时间戳。
pub fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
