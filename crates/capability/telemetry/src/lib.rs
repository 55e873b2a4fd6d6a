//! 追踪初始化、轮询批次 ID 与进程级计数器。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 进程计数器快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub ticks_abandoned: u64,
    pub readings_ingested: u64,
    pub charge_cycles_opened: u64,
    pub charge_cycles_closed: u64,
    pub charge_cycles_flushed: u64,
    pub trip_cycles_opened: u64,
    pub trip_cycles_closed: u64,
    pub trip_guard_skipped: u64,
    pub alerts_recorded: u64,
    pub alerts_escalated: u64,
    pub temperature_alerts_recorded: u64,
    pub temperature_alerts_flushed: u64,
    pub status_changes: u64,
    pub store_failures: u64,
    pub tick_latency_ms_total: u64,
    pub tick_latency_ms_count: u64,
}

/// 进程计数器。
pub struct TelemetryMetrics {
    ticks: AtomicU64,
    ticks_abandoned: AtomicU64,
    readings_ingested: AtomicU64,
    charge_cycles_opened: AtomicU64,
    charge_cycles_closed: AtomicU64,
    charge_cycles_flushed: AtomicU64,
    trip_cycles_opened: AtomicU64,
    trip_cycles_closed: AtomicU64,
    trip_guard_skipped: AtomicU64,
    alerts_recorded: AtomicU64,
    alerts_escalated: AtomicU64,
    temperature_alerts_recorded: AtomicU64,
    temperature_alerts_flushed: AtomicU64,
    status_changes: AtomicU64,
    store_failures: AtomicU64,
    tick_latency_ms_total: AtomicU64,
    tick_latency_ms_count: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            ticks_abandoned: AtomicU64::new(0),
            readings_ingested: AtomicU64::new(0),
            charge_cycles_opened: AtomicU64::new(0),
            charge_cycles_closed: AtomicU64::new(0),
            charge_cycles_flushed: AtomicU64::new(0),
            trip_cycles_opened: AtomicU64::new(0),
            trip_cycles_closed: AtomicU64::new(0),
            trip_guard_skipped: AtomicU64::new(0),
            alerts_recorded: AtomicU64::new(0),
            alerts_escalated: AtomicU64::new(0),
            temperature_alerts_recorded: AtomicU64::new(0),
            temperature_alerts_flushed: AtomicU64::new(0),
            status_changes: AtomicU64::new(0),
            store_failures: AtomicU64::new(0),
            tick_latency_ms_total: AtomicU64::new(0),
            tick_latency_ms_count: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            ticks_abandoned: self.ticks_abandoned.load(Ordering::Relaxed),
            readings_ingested: self.readings_ingested.load(Ordering::Relaxed),
            charge_cycles_opened: self.charge_cycles_opened.load(Ordering::Relaxed),
            charge_cycles_closed: self.charge_cycles_closed.load(Ordering::Relaxed),
            charge_cycles_flushed: self.charge_cycles_flushed.load(Ordering::Relaxed),
            trip_cycles_opened: self.trip_cycles_opened.load(Ordering::Relaxed),
            trip_cycles_closed: self.trip_cycles_closed.load(Ordering::Relaxed),
            trip_guard_skipped: self.trip_guard_skipped.load(Ordering::Relaxed),
            alerts_recorded: self.alerts_recorded.load(Ordering::Relaxed),
            alerts_escalated: self.alerts_escalated.load(Ordering::Relaxed),
            temperature_alerts_recorded: self.temperature_alerts_recorded.load(Ordering::Relaxed),
            temperature_alerts_flushed: self.temperature_alerts_flushed.load(Ordering::Relaxed),
            status_changes: self.status_changes.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            tick_latency_ms_total: self.tick_latency_ms_total.load(Ordering::Relaxed),
            tick_latency_ms_count: self.tick_latency_ms_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局计数器实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的轮询批次 ID。
pub fn new_tick_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 记录一次轮询。
pub fn record_tick(latency_ms: u64) {
    let metrics = metrics();
    metrics.ticks.fetch_add(1, Ordering::Relaxed);
    metrics
        .tick_latency_ms_total
        .fetch_add(latency_ms, Ordering::Relaxed);
    metrics
        .tick_latency_ms_count
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录被放弃的轮询（上游不可用或响应退化）。
pub fn record_tick_abandoned() {
    metrics().ticks_abandoned.fetch_add(1, Ordering::Relaxed);
}

pub fn record_readings_ingested(count: u64) {
    metrics()
        .readings_ingested
        .fetch_add(count, Ordering::Relaxed);
}

pub fn record_charge_cycles_opened(count: u64) {
    metrics()
        .charge_cycles_opened
        .fetch_add(count, Ordering::Relaxed);
}

pub fn record_charge_cycles_closed(count: u64) {
    metrics()
        .charge_cycles_closed
        .fetch_add(count, Ordering::Relaxed);
}

/// 记录充电循环写入历史并清理临时记录。
pub fn record_charge_cycles_flushed(count: u64) {
    metrics()
        .charge_cycles_flushed
        .fetch_add(count, Ordering::Relaxed);
}

pub fn record_trip_cycles_opened(count: u64) {
    metrics()
        .trip_cycles_opened
        .fetch_add(count, Ordering::Relaxed);
}

pub fn record_trip_cycles_closed(count: u64) {
    metrics()
        .trip_cycles_closed
        .fetch_add(count, Ordering::Relaxed);
}

/// 记录因采样变化不足而保持开启的行程。
pub fn record_trip_guard_skipped(count: u64) {
    metrics()
        .trip_guard_skipped
        .fetch_add(count, Ordering::Relaxed);
}

pub fn record_alerts_recorded(count: u64) {
    metrics().alerts_recorded.fetch_add(count, Ordering::Relaxed);
}

pub fn record_alerts_escalated(count: u64) {
    metrics().alerts_escalated.fetch_add(count, Ordering::Relaxed);
}

pub fn record_temperature_alerts_recorded(count: u64) {
    metrics()
        .temperature_alerts_recorded
        .fetch_add(count, Ordering::Relaxed);
}

/// 记录转入历史的温度告警。
pub fn record_temperature_alerts_flushed(count: u64) {
    metrics()
        .temperature_alerts_flushed
        .fetch_add(count, Ordering::Relaxed);
}

pub fn record_status_changes(count: u64) {
    metrics().status_changes.fetch_add(count, Ordering::Relaxed);
}

/// 记录存储失败（涉及的设备下次轮询重试）。
pub fn record_store_failures(count: u64) {
    metrics().store_failures.fetch_add(count, Ordering::Relaxed);
}
