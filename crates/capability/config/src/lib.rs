//! 轮询服务运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 告警阈值。
#[derive(Debug, Clone, PartialEq)]
pub struct AlertThresholds {
    pub overspeed_limit: i64,
    /// 倾角低于下限或高于上限视为倾倒；下限默认 0，只拦截负角度。
    pub fall_min_angle: i64,
    pub fall_max_angle: i64,
    /// 累计观测次数达到该值后写入告警历史。
    pub escalate_after: u32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            overspeed_limit: 60,
            fall_min_angle: 0,
            fall_max_angle: 135,
            escalate_after: 3,
        }
    }
}

/// 轮询服务运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    /// 未设置时使用内存存储。
    pub database_url: Option<String>,
    pub feed_url: String,
    pub feed_timeout_seconds: u64,
    pub feed_min_devices: usize,
    pub poll_interval_seconds: u64,
    pub coordinate_scale: f64,
    pub alert_thresholds: AlertThresholds,
    pub offline_after_seconds: u64,
    pub distance_rollup_seconds: u64,
    /// 电池温度达到该值记一次温度告警。
    pub battery_temperature_limit: i64,
    /// 未上报统计与温度告警转历史的执行间隔。
    pub hourly_rollup_seconds: u64,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let feed_url =
            env::var("BMS_FEED_URL").map_err(|_| ConfigError::Missing("BMS_FEED_URL".to_string()))?;
        let database_url = read_optional("BMS_DATABASE_URL");
        let http_addr = env::var("BMS_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8090".to_string());
        let feed_timeout_seconds = read_u64_with_default("BMS_FEED_TIMEOUT_SECONDS", 20)?;
        let feed_min_devices = read_u64_with_default("BMS_FEED_MIN_DEVICES", 2)? as usize;
        let poll_interval_seconds = read_u64_with_default("BMS_POLL_INTERVAL_SECONDS", 60)?.max(1);
        let coordinate_scale = read_f64_with_default("BMS_COORDINATE_SCALE", 1_000_000.0)?;
        if coordinate_scale <= 0.0 {
            return Err(ConfigError::Invalid(
                "BMS_COORDINATE_SCALE".to_string(),
                coordinate_scale.to_string(),
            ));
        }
        let defaults = AlertThresholds::default();
        let alert_thresholds = AlertThresholds {
            overspeed_limit: read_i64_with_default("BMS_OVERSPEED_LIMIT", defaults.overspeed_limit)?,
            fall_min_angle: read_i64_with_default("BMS_FALL_MIN_ANGLE", defaults.fall_min_angle)?,
            fall_max_angle: read_i64_with_default("BMS_FALL_MAX_ANGLE", defaults.fall_max_angle)?,
            escalate_after: read_u64_with_default(
                "BMS_ALERT_ESCALATE_AFTER",
                u64::from(defaults.escalate_after),
            )?
            .clamp(1, u64::from(u32::MAX)) as u32,
        };
        let offline_after_seconds = read_u64_with_default("BMS_OFFLINE_AFTER_SECONDS", 1800)?;
        let distance_rollup_seconds =
            read_u64_with_default("BMS_DISTANCE_ROLLUP_SECONDS", 86_400)?.max(1);
        let battery_temperature_limit = read_i64_with_default("BMS_BATTERY_TEMPERATURE_LIMIT", 55)?;
        let hourly_rollup_seconds =
            read_u64_with_default("BMS_HOURLY_ROLLUP_SECONDS", 3_600)?.max(1);

        Ok(Self {
            http_addr,
            database_url,
            feed_url,
            feed_timeout_seconds,
            feed_min_devices,
            poll_interval_seconds,
            coordinate_scale,
            alert_thresholds,
            offline_after_seconds,
            distance_rollup_seconds,
            battery_temperature_limit,
            hourly_rollup_seconds,
        })
    }
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_i64_with_default(key: &str, default: i64) -> Result<i64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<i64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_f64_with_default(key: &str, default: f64) -> Result<f64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<f64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}
