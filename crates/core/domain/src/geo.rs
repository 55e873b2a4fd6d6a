//! 大圆距离计算（haversine）。

/// 地球平均半径（km）。
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// 经纬度坐标（度）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// 设备上报的定点整数坐标转换为度。
    pub fn from_fixed(latitude: i64, longitude: i64, scale: f64) -> Self {
        let scale = if scale > 0.0 { scale } else { 1.0 };
        Self {
            latitude: latitude as f64 / scale,
            longitude: longitude as f64 / scale,
        }
    }

    /// 到另一点的大圆距离（km）。
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lng = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}

/// 按顺序逐段累加距离（km）；少于两个点返回 0。
pub fn cumulative_distance_km(samples: &[Coordinates]) -> f64 {
    samples
        .windows(2)
        .map(|pair| pair[0].distance_km(&pair[1]))
        .sum()
}
