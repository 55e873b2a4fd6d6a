//! BMS 车队轮询服务：定时拉取上游读数并检测充电/行程循环与告警，附带状态接口。

mod poller;
mod routes;
mod stores;

use bms_config::AppConfig;
use bms_feed::{HttpFeedConfig, HttpTelemetryFeed};
use bms_telemetry::init_tracing;
use poller::{Poller, PollerConfig};
use routes::{AppState, create_router};
use std::sync::Arc;
use std::time::Duration;
use stores::Stores;
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    // 未配置数据库时使用内存存储
    let stores = Stores::from_url(config.database_url.as_deref()).await?;
    let feed = HttpTelemetryFeed::new(HttpFeedConfig {
        url: config.feed_url.clone(),
        timeout: Duration::from_secs(config.feed_timeout_seconds),
        min_devices: config.feed_min_devices,
    })?;
    let poller = Arc::new(Poller::new(
        Arc::new(feed),
        &stores,
        PollerConfig::from(&config),
    ));

    tokio::spawn(run_loop(
        poller.clone(),
        Duration::from_secs(config.poll_interval_seconds),
        Duration::from_secs(config.distance_rollup_seconds),
        Duration::from_secs(config.hourly_rollup_seconds),
    ));

    let app = create_router(AppState { poller });
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(
        target: "bms.poller",
        http_addr = %config.http_addr,
        poll_interval_seconds = config.poll_interval_seconds,
        "poller_started"
    );
    axum::serve(listener, app).await?;
    Ok(())
}

/// 轮询与定时任务在同一个循环里按顺序执行，互不重叠；错过的时刻直接跳过。
async fn run_loop(
    poller: Arc<Poller>,
    poll_every: Duration,
    rollup_every: Duration,
    hourly_every: Duration,
) {
    let mut poll = interval(poll_every);
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut rollup = interval_at(Instant::now() + rollup_every, rollup_every);
    rollup.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut hourly = interval_at(Instant::now() + hourly_every, hourly_every);
    hourly.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = poll.tick() => {
                // 失败已在轮询内部记录日志与计数，下次轮询重试
                let _ = poller.run_tick().await;
            }
            _ = rollup.tick() => {
                if let Err(err) = poller.roll_up_distance().await {
                    warn!(target: "bms.poller", error = %err, "distance_rollup_failed");
                }
            }
            _ = hourly.tick() => {
                // 各步骤失败已在内部记录
                poller.run_hourly().await;
            }
        }
    }
}
