//! 存储选择：配置了数据库地址时使用 Postgres（启动时建表），否则使用内存存储。

use bms_storage::{
    AlertStore, ChargeCycleStore, DistanceStore, InMemoryAlertStore, InMemoryChargeCycleStore,
    InMemoryDistanceStore, InMemoryMainRecordStore, InMemoryReportingStore,
    InMemoryTripCycleStore, MainRecordStore, PgAlertStore, PgChargeCycleStore, PgDistanceStore,
    PgMainRecordStore, PgReportingStore, PgTripCycleStore, ReportingStore, StorageError,
    TripCycleStore, connect_pool, ensure_schema,
};
use std::sync::Arc;
use tracing::info;

/// 轮询用到的全部存储。
#[derive(Clone)]
pub struct Stores {
    pub main: Arc<dyn MainRecordStore>,
    pub charge: Arc<dyn ChargeCycleStore>,
    pub trip: Arc<dyn TripCycleStore>,
    pub alert: Arc<dyn AlertStore>,
    pub distance: Arc<dyn DistanceStore>,
    pub reporting: Arc<dyn ReportingStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            main: Arc::new(InMemoryMainRecordStore::new()),
            charge: Arc::new(InMemoryChargeCycleStore::new()),
            trip: Arc::new(InMemoryTripCycleStore::new()),
            alert: Arc::new(InMemoryAlertStore::new()),
            distance: Arc::new(InMemoryDistanceStore::new()),
            reporting: Arc::new(InMemoryReportingStore::new()),
        }
    }

    /// 连接失败或建表失败均为启动期致命错误。
    pub async fn postgres(database_url: &str) -> Result<Self, StorageError> {
        let pool = connect_pool(database_url).await?;
        ensure_schema(&pool).await?;
        info!(target: "bms.poller", "postgres_schema_ready");
        Ok(Self {
            main: Arc::new(PgMainRecordStore::new(pool.clone())),
            charge: Arc::new(PgChargeCycleStore::new(pool.clone())),
            trip: Arc::new(PgTripCycleStore::new(pool.clone())),
            alert: Arc::new(PgAlertStore::new(pool.clone())),
            distance: Arc::new(PgDistanceStore::new(pool.clone())),
            reporting: Arc::new(PgReportingStore::new(pool)),
        })
    }

    pub async fn from_url(database_url: Option<&str>) -> Result<Self, StorageError> {
        match database_url {
            Some(url) => Self::postgres(url).await,
            None => {
                info!(target: "bms.poller", "in_memory_store_selected");
                Ok(Self::in_memory())
            }
        }
    }
}
