//! 建表语句（幂等，启动时按顺序执行）。
//!
//! 时间戳统一为 epoch 毫秒（bigint）；采样与坐标序列使用 Postgres 数组。

pub const SCHEMA_STATEMENTS: &[&str] = &[
    "create table if not exists bms_main_records (
        device_id text primary key,
        asset text not null,
        battery_current bigint not null,
        soc bigint not null,
        cycle_count bigint not null,
        odometer double precision not null,
        latitude bigint not null,
        longitude bigint not null,
        speed bigint not null,
        angle bigint not null,
        metadata text not null default '{}',
        previous_battery_current bigint,
        old_cycle_count bigint,
        soc_samples bigint[] not null default '{}',
        speed_samples bigint[] not null default '{}',
        status text not null default 'unknown',
        distance_travelled_km double precision not null default 0,
        created_at_ms bigint not null,
        updated_at_ms bigint not null
    )",
    "create table if not exists bms_charge_cycle_states (
        device_id text primary key,
        asset text not null,
        start_time_ms bigint not null,
        start_soc bigint not null,
        started boolean not null,
        end_time_ms bigint,
        end_soc bigint,
        ended boolean not null
    )",
    "create table if not exists bms_charge_cycle_history (
        id text primary key,
        device_id text not null,
        asset text not null,
        start_time_ms bigint not null,
        start_soc bigint not null,
        end_time_ms bigint not null,
        end_soc bigint not null,
        created_at_ms bigint not null
    )",
    "create index if not exists idx_charge_history_device on bms_charge_cycle_history (device_id)",
    "create table if not exists bms_trip_cycle_states (
        device_id text primary key,
        asset text not null,
        cycle_no bigint not null,
        start_time_ms bigint not null,
        start_odometer double precision not null
    )",
    "create table if not exists bms_trip_location_trails (
        device_id text primary key,
        latitudes double precision[] not null default '{}',
        longitudes double precision[] not null default '{}',
        created_at_ms bigint not null
    )",
    "create table if not exists bms_trip_cycle_history (
        id text primary key,
        device_id text not null,
        asset text not null,
        cycle_no bigint not null,
        start_time_ms bigint not null,
        end_time_ms bigint not null,
        km_travelled double precision not null,
        min_soc bigint not null,
        max_soc bigint not null,
        avg_speed bigint not null,
        top_speed bigint not null,
        lowest_speed bigint not null,
        depth_of_discharge text not null,
        start_odometer double precision not null,
        end_odometer double precision not null,
        created_at_ms bigint not null
    )",
    "create index if not exists idx_trip_history_device on bms_trip_cycle_history (device_id)",
    "create table if not exists bms_alert_states (
        device_id text not null,
        kind text not null,
        observed_values bigint[] not null default '{}',
        alert_count bigint not null,
        created_at_ms bigint not null,
        updated_at_ms bigint not null,
        primary key (device_id, kind)
    )",
    "create table if not exists bms_alert_history (
        id text primary key,
        device_id text not null,
        kind text not null,
        alert_count bigint not null,
        observed_values bigint[] not null default '{}',
        created_at_ms bigint not null
    )",
    "create index if not exists idx_alert_history_device on bms_alert_history (device_id)",
    "create table if not exists bms_distance_trails (
        device_id text primary key,
        latitudes double precision[] not null default '{}',
        longitudes double precision[] not null default '{}',
        started_at_ms bigint not null
    )",
    "create table if not exists bms_distance_travelled (
        id text primary key,
        device_id text not null,
        km double precision not null,
        period_start_ms bigint not null,
        period_end_ms bigint not null
    )",
    "create index if not exists idx_distance_travelled_device on bms_distance_travelled (device_id)",
    "create table if not exists bms_reporting_marks (
        hour_start_ms bigint not null,
        device_id text not null,
        primary key (hour_start_ms, device_id)
    )",
    "create table if not exists bms_unreported_counts (
        hour_start_ms bigint primary key,
        total_devices bigint not null,
        reported_devices bigint not null,
        unreported bigint not null,
        created_at_ms bigint not null
    )",
];
