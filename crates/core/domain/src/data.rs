use crate::geo::Coordinates;
use std::collections::BTreeMap;

/// 上游接口返回的单设备读数（每次轮询一条）。
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceReading {
    pub device_id: String,
    pub asset: String,
    /// 电池电流，符号表示充电/放电方向。
    pub battery_current: i64,
    pub soc: i64,
    /// 硬件循环计数（设备自维护，单调不减）。
    pub cycle_count: i64,
    pub odometer: f64,
    /// 定点纬度（除以坐标比例得到度）。
    pub latitude: i64,
    /// 定点经度（除以坐标比例得到度）。
    pub longitude: i64,
    pub speed: i64,
    pub angle: i64,
    pub received_at_ms: i64,
    /// 与循环检测无关的硬件元数据，原样落库。
    pub metadata: BTreeMap<String, String>,
}

impl DeviceReading {
    pub fn position(&self, coordinate_scale: f64) -> Coordinates {
        Coordinates::from_fixed(self.latitude, self.longitude, coordinate_scale)
    }
}

/// 检测器视角的设备快照：最新读数 + 主记录上缓存的上次状态。
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSnapshot {
    pub device_id: String,
    pub asset: String,
    pub battery_current: i64,
    /// 上次轮询的电池电流；首次出现的设备为 None。
    pub previous_battery_current: Option<i64>,
    pub soc: i64,
    pub cycle_count: i64,
    /// 上次轮询记录的循环计数；首次出现的设备为 None。
    pub old_cycle_count: Option<i64>,
    pub odometer: f64,
    pub latitude: i64,
    pub longitude: i64,
    pub speed: i64,
    pub angle: i64,
    /// 当前行程内累计的 SOC 采样。
    pub soc_samples: Vec<i64>,
    /// 当前行程内累计的速度采样。
    pub speed_samples: Vec<i64>,
}

impl DeviceSnapshot {
    pub fn position(&self, coordinate_scale: f64) -> Coordinates {
        Coordinates::from_fixed(self.latitude, self.longitude, coordinate_scale)
    }

    /// 电流是否跨越了充放电边界。
    ///
    /// 同号之间的变化视为噪声；尚无上次电流的设备总是候选。
    pub fn is_charge_candidate(&self) -> bool {
        let Some(previous) = self.previous_battery_current else {
            return true;
        };
        let current = self.battery_current;
        if current == previous {
            return false;
        }
        if previous < 0 && current < 0 {
            return false;
        }
        if previous > 0 && current > 0 {
            return false;
        }
        true
    }

    /// 硬件循环计数是否与上次记录不同（无基线视为不同）。
    pub fn cycle_counter_changed(&self) -> bool {
        self.old_cycle_count != Some(self.cycle_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(current: i64, previous: Option<i64>) -> DeviceSnapshot {
        DeviceSnapshot {
            device_id: "bms-1".to_string(),
            asset: "bms-1".to_string(),
            battery_current: current,
            previous_battery_current: previous,
            soc: 50,
            cycle_count: 1,
            old_cycle_count: None,
            odometer: 0.0,
            latitude: 0,
            longitude: 0,
            speed: 0,
            angle: 90,
            soc_samples: Vec::new(),
            speed_samples: Vec::new(),
        }
    }

    #[test]
    fn charge_candidate_filters_same_sign_noise() {
        assert!(snapshot(5, None).is_charge_candidate());
        assert!(!snapshot(5, Some(5)).is_charge_candidate());
        assert!(!snapshot(-3, Some(-8)).is_charge_candidate());
        assert!(!snapshot(3, Some(8)).is_charge_candidate());
        assert!(snapshot(-3, Some(8)).is_charge_candidate());
        assert!(snapshot(0, Some(8)).is_charge_candidate());
        assert!(snapshot(4, Some(0)).is_charge_candidate());
    }

    #[test]
    fn cycle_counter_change_without_baseline() {
        let mut s = snapshot(0, None);
        assert!(s.cycle_counter_changed());
        s.old_cycle_count = Some(1);
        assert!(!s.cycle_counter_changed());
        s.cycle_count = 2;
        assert!(s.cycle_counter_changed());
    }
}
