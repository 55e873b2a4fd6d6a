//! Postgres 上报统计存储实现

use crate::error::StorageError;
use crate::models::UnreportedCount;
use crate::traits::ReportingStore;
use crate::validation::ensure_device_id;
use sqlx::{PgPool, Row};

pub struct PgReportingStore {
    pub pool: PgPool,
}

impl PgReportingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReportingStore for PgReportingStore {
    async fn mark_reported(
        &self,
        hour_start_ms: i64,
        device_ids: Vec<String>,
    ) -> Result<(), StorageError> {
        for device_id in &device_ids {
            ensure_device_id(device_id)?;
        }
        if device_ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            "insert into bms_reporting_marks (hour_start_ms, device_id) \
             select $1, unnest($2::text[]) \
             on conflict (hour_start_ms, device_id) do nothing",
        )
        .bind(hour_start_ms)
        .bind(&device_ids)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_reported(&self, hour_start_ms: i64) -> Result<i64, StorageError> {
        let row = sqlx::query(
            "select count(*) as reported from bms_reporting_marks where hour_start_ms = $1",
        )
        .bind(hour_start_ms)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("reported")?)
    }

    async fn prune_reported_before(&self, cutoff_ms: i64) -> Result<u64, StorageError> {
        let result = sqlx::query("delete from bms_reporting_marks where hour_start_ms < $1")
            .bind(cutoff_ms)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn upsert_unreported_count(&self, count: UnreportedCount) -> Result<(), StorageError> {
        sqlx::query(
            "insert into bms_unreported_counts \
             (hour_start_ms, total_devices, reported_devices, unreported, created_at_ms) \
             values ($1, $2, $3, $4, $5) \
             on conflict (hour_start_ms) do update set \
             total_devices = excluded.total_devices, \
             reported_devices = excluded.reported_devices, \
             unreported = excluded.unreported, \
             created_at_ms = excluded.created_at_ms",
        )
        .bind(count.hour_start_ms)
        .bind(count.total_devices)
        .bind(count.reported_devices)
        .bind(count.unreported)
        .bind(count.created_at_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_unreported_counts(
        &self,
        since_ms: i64,
    ) -> Result<Vec<UnreportedCount>, StorageError> {
        let rows = sqlx::query(
            "select hour_start_ms, total_devices, reported_devices, unreported, created_at_ms \
             from bms_unreported_counts where hour_start_ms >= $1 order by hour_start_ms",
        )
        .bind(since_ms)
        .fetch_all(&self.pool)
        .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(UnreportedCount {
                hour_start_ms: row.try_get("hour_start_ms")?,
                total_devices: row.try_get("total_devices")?,
                reported_devices: row.try_get("reported_devices")?,
                unreported: row.try_get("unreported")?,
                created_at_ms: row.try_get("created_at_ms")?,
            });
        }
        Ok(items)
    }

    async fn prune_unreported_counts_before(&self, cutoff_ms: i64) -> Result<u64, StorageError> {
        let result = sqlx::query("delete from bms_unreported_counts where hour_start_ms < $1")
            .bind(cutoff_ms)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
