//! 状态接口
//!
//! - /health：存活检查
//! - /status：最近一次轮询结果、最近一次里程汇总与每小时任务、最近 7 小时未上报数、进程计数

use crate::poller::{HourlyReport, Poller, TickReport};
use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use bms_fleet::RollupReport;
use bms_storage::UnreportedCount;
use bms_telemetry::{MetricsSnapshot, metrics};
use domain::now_epoch_ms;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub poller: Arc<Poller>,
}

/// 进程计数（自启动以来累计）。
#[derive(Debug, Serialize)]
pub struct MetricsDto {
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
    pub tick_latency_ms_avg: u64,
}

impl From<MetricsSnapshot> for MetricsDto {
    fn from(snapshot: MetricsSnapshot) -> Self {
        let tick_latency_ms_avg = snapshot
            .tick_latency_ms_total
            .checked_div(snapshot.tick_latency_ms_count)
            .unwrap_or(0);
        Self {
            ticks: snapshot.ticks,
            ticks_abandoned: snapshot.ticks_abandoned,
            readings_ingested: snapshot.readings_ingested,
            charge_cycles_opened: snapshot.charge_cycles_opened,
            charge_cycles_closed: snapshot.charge_cycles_closed,
            charge_cycles_flushed: snapshot.charge_cycles_flushed,
            trip_cycles_opened: snapshot.trip_cycles_opened,
            trip_cycles_closed: snapshot.trip_cycles_closed,
            trip_guard_skipped: snapshot.trip_guard_skipped,
            alerts_recorded: snapshot.alerts_recorded,
            alerts_escalated: snapshot.alerts_escalated,
            temperature_alerts_recorded: snapshot.temperature_alerts_recorded,
            temperature_alerts_flushed: snapshot.temperature_alerts_flushed,
            status_changes: snapshot.status_changes,
            store_failures: snapshot.store_failures,
            tick_latency_ms_avg,
        }
    }
}

/// 单个小时的未上报统计。
#[derive(Debug, Serialize)]
pub struct UnreportedHourDto {
    pub hour_start_ms: i64,
    pub total_devices: i64,
    pub reported_devices: i64,
    pub unreported: i64,
}

impl From<UnreportedCount> for UnreportedHourDto {
    fn from(count: UnreportedCount) -> Self {
        Self {
            hour_start_ms: count.hour_start_ms,
            total_devices: count.total_devices,
            reported_devices: count.reported_devices,
            unreported: count.unreported,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub last_tick: Option<TickReport>,
    pub last_rollup: Option<RollupReport>,
    pub last_hourly: Option<HourlyReport>,
    pub unreported_last_seven_hours: Vec<UnreportedHourDto>,
    pub metrics: MetricsDto,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let unreported = match state.poller.unreported_counts(now_epoch_ms()).await {
        Ok(counts) => counts.into_iter().map(UnreportedHourDto::from).collect(),
        Err(err) => {
            warn!(target: "bms.poller", error = %err, "unreported_counts_unavailable");
            Vec::new()
        }
    };
    Json(StatusResponse {
        last_tick: state.poller.last_report(),
        last_rollup: state.poller.last_rollup(),
        last_hourly: state.poller.last_hourly(),
        unreported_last_seven_hours: unreported,
        metrics: metrics().snapshot().into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::PollerConfig;
    use crate::stores::Stores;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use bms_feed::StaticFeed;
    use domain::DeviceReading;
    use http_body_util::BodyExt;
    use std::collections::BTreeMap;
    use tower::ServiceExt;

    fn reading(device_id: &str) -> DeviceReading {
        DeviceReading {
            device_id: device_id.to_string(),
            asset: device_id.to_string(),
            battery_current: 2,
            soc: 60,
            cycle_count: 1,
            odometer: 0.0,
            latitude: 0,
            longitude: 0,
            speed: 0,
            angle: 90,
            received_at_ms: 1_000,
            metadata: BTreeMap::new(),
        }
    }

    fn router() -> (Router, Arc<Poller>) {
        let feed = Arc::new(StaticFeed::new(vec![reading("B1"), reading("B2")]));
        let poller = Arc::new(Poller::new(feed, &Stores::in_memory(), PollerConfig::default()));
        let router = create_router(AppState {
            poller: poller.clone(),
        });
        (router, poller)
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        (status, serde_json::from_slice(&bytes).expect("json"))
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (router, _) = router();
        let (status, body) = get_json(router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "ok": true }));
    }

    #[tokio::test]
    async fn status_is_empty_before_first_tick() {
        let (router, _) = router();
        let (status, body) = get_json(router, "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["last_tick"].is_null());
        assert!(body["last_rollup"].is_null());
        assert!(body["last_hourly"].is_null());
        assert_eq!(body["unreported_last_seven_hours"], serde_json::json!([]));
        assert!(body["metrics"]["ticks"].is_u64());
    }

    #[tokio::test]
    async fn status_returns_last_tick_report() {
        let (router, poller) = router();
        poller
            .tick_at("tick-42".to_string(), 2_000)
            .await
            .expect("tick");

        let (_, body) = get_json(router, "/status").await;
        assert_eq!(body["last_tick"]["tick_id"], "tick-42");
        assert_eq!(body["last_tick"]["ingest"]["readings"], 2);
        assert_eq!(body["last_tick"]["charge"]["opened"], 2);
        assert_eq!(body["last_tick"]["temperature"]["observed"], 0);
        assert!(body["metrics"]["ticks"].as_u64().expect("ticks") >= 1);
    }

    #[tokio::test]
    async fn status_lists_unreported_hours_after_hourly_job() {
        let (router, poller) = router();
        let now = now_epoch_ms();
        poller
            .tick_at("tick-1".to_string(), now)
            .await
            .expect("tick");
        poller.hourly_at(now).await;

        let (_, body) = get_json(router, "/status").await;
        let hours = body["unreported_last_seven_hours"]
            .as_array()
            .expect("hours");
        // 跨整点时窗口会前移一小时
        assert!((6..=7).contains(&hours.len()), "got {}", hours.len());
        assert_eq!(hours[0]["total_devices"], 2);
        assert!(body["last_hourly"]["ran_at_ms"].is_i64());
    }
}
