//! 存储层数据模型
//!
//! 三类记录：
//! - 主记录：每设备一条，原地覆盖（最新读数为准）
//! - 临时记录：进行中的循环/告警状态，写入历史后删除
//! - 历史记录：只追加，不再修改

use domain::{Coordinates, DeviceReading, DeviceSnapshot};
use std::collections::BTreeMap;

/// 生成历史记录 ID。
pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 电池运行状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatteryStatus {
    #[default]
    Unknown,
    Moving,
    Idle,
    Offline,
}

impl BatteryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatteryStatus::Unknown => "unknown",
            BatteryStatus::Moving => "moving",
            BatteryStatus::Idle => "idle",
            BatteryStatus::Offline => "offline",
        }
    }

    /// 解析存储中的状态字符串；无法识别时为 Unknown。
    pub fn parse(value: &str) -> Self {
        match value {
            "moving" => BatteryStatus::Moving,
            "idle" => BatteryStatus::Idle,
            "offline" => BatteryStatus::Offline,
            _ => BatteryStatus::Unknown,
        }
    }
}

/// 设备主记录
///
/// 遥测字段由每次轮询覆盖；检测器字段（上次电流、上次循环计数、采样累积）
/// 只由检测器通过 [`MainRecordUpdate`] 修改。
#[derive(Debug, Clone, PartialEq)]
pub struct MainRecord {
    pub device_id: String,
    pub asset: String,
    pub battery_current: i64,
    pub soc: i64,
    pub cycle_count: i64,
    pub odometer: f64,
    pub latitude: i64,
    pub longitude: i64,
    pub speed: i64,
    pub angle: i64,
    pub metadata: BTreeMap<String, String>,
    pub previous_battery_current: Option<i64>,
    pub old_cycle_count: Option<i64>,
    pub soc_samples: Vec<i64>,
    pub speed_samples: Vec<i64>,
    pub status: BatteryStatus,
    /// 按相邻两次位置的大圆距离累加的里程（km）。
    pub distance_travelled_km: f64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl MainRecord {
    /// 由首次读数创建主记录（检测器字段为空）。
    pub fn from_reading(reading: &DeviceReading, distance_travelled_km: f64) -> Self {
        Self {
            device_id: reading.device_id.clone(),
            asset: reading.asset.clone(),
            battery_current: reading.battery_current,
            soc: reading.soc,
            cycle_count: reading.cycle_count,
            odometer: reading.odometer,
            latitude: reading.latitude,
            longitude: reading.longitude,
            speed: reading.speed,
            angle: reading.angle,
            metadata: reading.metadata.clone(),
            previous_battery_current: None,
            old_cycle_count: None,
            soc_samples: Vec::new(),
            speed_samples: Vec::new(),
            status: BatteryStatus::Unknown,
            distance_travelled_km,
            created_at_ms: reading.received_at_ms,
            updated_at_ms: reading.received_at_ms,
        }
    }

    /// 用新读数覆盖遥测字段，保留检测器字段与创建时间。
    pub fn apply_reading(&mut self, reading: &DeviceReading, distance_travelled_km: f64) {
        self.asset = reading.asset.clone();
        self.battery_current = reading.battery_current;
        self.soc = reading.soc;
        self.cycle_count = reading.cycle_count;
        self.odometer = reading.odometer;
        self.latitude = reading.latitude;
        self.longitude = reading.longitude;
        self.speed = reading.speed;
        self.angle = reading.angle;
        self.metadata = reading.metadata.clone();
        self.distance_travelled_km = distance_travelled_km;
        self.updated_at_ms = reading.received_at_ms;
    }

    /// 主记录到检测器快照的映射。
    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            device_id: self.device_id.clone(),
            asset: self.asset.clone(),
            battery_current: self.battery_current,
            previous_battery_current: self.previous_battery_current,
            soc: self.soc,
            cycle_count: self.cycle_count,
            old_cycle_count: self.old_cycle_count,
            odometer: self.odometer,
            latitude: self.latitude,
            longitude: self.longitude,
            speed: self.speed,
            angle: self.angle,
            soc_samples: self.soc_samples.clone(),
            speed_samples: self.speed_samples.clone(),
        }
    }

    pub fn position(&self, coordinate_scale: f64) -> Coordinates {
        Coordinates::from_fixed(self.latitude, self.longitude, coordinate_scale)
    }
}

/// 主记录写入（读数 + 累计里程）。
#[derive(Debug, Clone)]
pub struct MainRecordUpsert {
    pub reading: DeviceReading,
    pub distance_travelled_km: f64,
}

/// 采样累积的变更。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleUpdate {
    /// 追加一次 SOC 与速度采样。
    Push { soc: i64, speed: i64 },
    /// 清空两个累积序列（行程关闭时）。
    Reset,
}

/// 主记录检测器字段的局部更新；None 表示不修改。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MainRecordUpdate {
    pub device_id: String,
    pub previous_battery_current: Option<i64>,
    pub old_cycle_count: Option<i64>,
    pub samples: Option<SampleUpdate>,
    pub status: Option<BatteryStatus>,
}

impl MainRecordUpdate {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ..Self::default()
        }
    }

    /// 将更新应用到主记录。
    pub fn apply_to(&self, record: &mut MainRecord) {
        if let Some(current) = self.previous_battery_current {
            record.previous_battery_current = Some(current);
        }
        if let Some(cycle_count) = self.old_cycle_count {
            record.old_cycle_count = Some(cycle_count);
        }
        match self.samples {
            Some(SampleUpdate::Push { soc, speed }) => {
                record.soc_samples.push(soc);
                record.speed_samples.push(speed);
            }
            Some(SampleUpdate::Reset) => {
                record.soc_samples.clear();
                record.speed_samples.clear();
            }
            None => {}
        }
        if let Some(status) = self.status {
            record.status = status;
        }
    }
}

/// 进行中的充电循环（每设备至多一条）。
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeCycleState {
    pub device_id: String,
    pub asset: String,
    pub start_time_ms: i64,
    pub start_soc: i64,
    pub started: bool,
    pub end_time_ms: Option<i64>,
    pub end_soc: Option<i64>,
    pub ended: bool,
}

impl ChargeCycleState {
    pub fn is_complete(&self) -> bool {
        self.started && self.ended
    }
}

/// 充电循环历史。
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeCycleHistory {
    pub id: String,
    pub device_id: String,
    pub asset: String,
    pub start_time_ms: i64,
    pub start_soc: i64,
    pub end_time_ms: i64,
    pub end_soc: i64,
    pub created_at_ms: i64,
}

/// 进行中的行程循环（每设备至多一条）。
#[derive(Debug, Clone, PartialEq)]
pub struct TripCycleState {
    pub device_id: String,
    pub asset: String,
    /// 开启时的硬件循环计数。
    pub cycle_no: i64,
    pub start_time_ms: i64,
    pub start_odometer: f64,
}

/// 行程循环的位置轨迹（度）。
#[derive(Debug, Clone, PartialEq)]
pub struct TripLocationTrail {
    pub device_id: String,
    pub points: Vec<Coordinates>,
    pub created_at_ms: i64,
}

/// 行程循环历史。
#[derive(Debug, Clone, PartialEq)]
pub struct TripCycleHistory {
    pub id: String,
    pub device_id: String,
    pub asset: String,
    pub cycle_no: i64,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    pub km_travelled: f64,
    pub min_soc: i64,
    pub max_soc: i64,
    pub avg_speed: i64,
    pub top_speed: i64,
    pub lowest_speed: i64,
    /// 放电深度，格式 `"<soc>%"`。
    pub depth_of_discharge: String,
    pub start_odometer: f64,
    pub end_odometer: f64,
    pub created_at_ms: i64,
}

/// 告警类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    Overspeed,
    Fall,
    /// 电池温度超限；按小时批量转入历史，不按次数升级。
    Temperature,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Overspeed => "overspeed",
            AlertKind::Fall => "fall",
            AlertKind::Temperature => "battery_temperature",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "overspeed" => Some(AlertKind::Overspeed),
            "fall" => Some(AlertKind::Fall),
            "battery_temperature" => Some(AlertKind::Temperature),
            _ => None,
        }
    }
}

/// 累积中的告警（每设备每类型至多一条）。
#[derive(Debug, Clone, PartialEq)]
pub struct AlertState {
    pub device_id: String,
    pub kind: AlertKind,
    /// 每次违规时的观测值（速度、角度或温度）。
    pub values: Vec<i64>,
    pub alert_count: i64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

/// 告警历史。
#[derive(Debug, Clone, PartialEq)]
pub struct AlertHistory {
    pub id: String,
    pub device_id: String,
    pub kind: AlertKind,
    pub alert_count: i64,
    pub values: Vec<i64>,
    pub created_at_ms: i64,
}

/// 当日位置轨迹。
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceTrail {
    pub device_id: String,
    pub points: Vec<Coordinates>,
    pub started_at_ms: i64,
}

/// 周期行驶里程。
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceTravelledRecord {
    pub id: String,
    pub device_id: String,
    pub km: f64,
    pub period_start_ms: i64,
    pub period_end_ms: i64,
}

/// 整点小时内未上报设备数。
#[derive(Debug, Clone, PartialEq)]
pub struct UnreportedCount {
    /// 小时起点（epoch 毫秒，整点对齐）。
    pub hour_start_ms: i64,
    pub total_devices: i64,
    pub reported_devices: i64,
    /// `total_devices - reported_devices`，不小于 0。
    pub unreported: i64,
    pub created_at_ms: i64,
}
