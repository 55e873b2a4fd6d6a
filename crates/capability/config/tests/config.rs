use bms_config::{AlertThresholds, AppConfig, ConfigError};

// 环境变量为进程级共享状态，所有断言放在同一个测试里顺序执行。
#[test]
fn load_config_from_env() {
    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::remove_var("BMS_FEED_URL");
    }
    let err = AppConfig::from_env().expect_err("feed url required");
    assert!(matches!(err, ConfigError::Missing(ref key) if key == "BMS_FEED_URL"));

    unsafe {
        std::env::set_var("BMS_FEED_URL", "http://feed.local/live");
        std::env::set_var("BMS_HTTP_ADDR", "127.0.0.1:9100");
        std::env::set_var("BMS_POLL_INTERVAL_SECONDS", "30");
        std::env::set_var("BMS_OVERSPEED_LIMIT", "70");
        std::env::remove_var("BMS_DATABASE_URL");
    }

    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.feed_url, "http://feed.local/live");
    assert_eq!(config.http_addr, "127.0.0.1:9100");
    assert_eq!(config.poll_interval_seconds, 30);
    assert!(config.database_url.is_none());
    assert_eq!(config.feed_min_devices, 2);
    assert_eq!(config.coordinate_scale, 1_000_000.0);
    assert_eq!(config.alert_thresholds.overspeed_limit, 70);
    assert_eq!(
        config.alert_thresholds.fall_max_angle,
        AlertThresholds::default().fall_max_angle
    );
    assert_eq!(config.alert_thresholds.fall_min_angle, 0);
    assert_eq!(config.battery_temperature_limit, 55);
    assert_eq!(config.hourly_rollup_seconds, 3_600);

    unsafe {
        std::env::set_var("BMS_BATTERY_TEMPERATURE_LIMIT", "60");
        std::env::set_var("BMS_HOURLY_ROLLUP_SECONDS", "0");
    }
    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.battery_temperature_limit, 60);
    assert_eq!(config.hourly_rollup_seconds, 1);
    unsafe {
        std::env::remove_var("BMS_BATTERY_TEMPERATURE_LIMIT");
        std::env::remove_var("BMS_HOURLY_ROLLUP_SECONDS");
    }

    unsafe {
        std::env::set_var("BMS_FEED_TIMEOUT_SECONDS", "soon");
    }
    let err = AppConfig::from_env().expect_err("invalid timeout");
    assert_eq!(
        err.to_string(),
        "invalid value for BMS_FEED_TIMEOUT_SECONDS: soon"
    );
    unsafe {
        std::env::remove_var("BMS_FEED_TIMEOUT_SECONDS");
    }
}
