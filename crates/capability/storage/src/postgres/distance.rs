//! Postgres 行驶里程存储实现

use crate::error::StorageError;
use crate::models::{DistanceTrail, DistanceTravelledRecord};
use crate::postgres::zip_points;
use crate::traits::DistanceStore;
use crate::validation::ensure_device_id;
use domain::Coordinates;
use sqlx::{PgPool, Row};

pub struct PgDistanceStore {
    pub pool: PgPool,
}

impl PgDistanceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DistanceStore for PgDistanceStore {
    async fn append_distance_point(
        &self,
        device_id: &str,
        point: Coordinates,
        now_ms: i64,
    ) -> Result<(), StorageError> {
        ensure_device_id(device_id)?;
        sqlx::query(
            "insert into bms_distance_trails (device_id, latitudes, longitudes, started_at_ms) \
             values ($1, array[$2::double precision], array[$3::double precision], $4) \
             on conflict (device_id) do update set \
             latitudes = array_append(bms_distance_trails.latitudes, $2::double precision), \
             longitudes = array_append(bms_distance_trails.longitudes, $3::double precision)",
        )
        .bind(device_id)
        .bind(point.latitude)
        .bind(point.longitude)
        .bind(now_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_distance_trails(&self) -> Result<Vec<DistanceTrail>, StorageError> {
        let rows = sqlx::query(
            "select device_id, latitudes, longitudes, started_at_ms \
             from bms_distance_trails order by device_id",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut trails = Vec::with_capacity(rows.len());
        for row in rows {
            trails.push(DistanceTrail {
                device_id: row.try_get("device_id")?,
                points: zip_points(row.try_get("latitudes")?, row.try_get("longitudes")?),
                started_at_ms: row.try_get("started_at_ms")?,
            });
        }
        Ok(trails)
    }

    async fn clear_distance_trail(&self, device_id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("delete from bms_distance_trails where device_id = $1")
            .bind(device_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn append_distance_record(
        &self,
        record: DistanceTravelledRecord,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "insert into bms_distance_travelled (id, device_id, km, period_start_ms, period_end_ms) \
             values ($1, $2, $3, $4, $5)",
        )
        .bind(&record.id)
        .bind(&record.device_id)
        .bind(record.km)
        .bind(record.period_start_ms)
        .bind(record.period_end_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_distance_records(
        &self,
        device_id: &str,
    ) -> Result<Vec<DistanceTravelledRecord>, StorageError> {
        let rows = sqlx::query(
            "select id, device_id, km, period_start_ms, period_end_ms \
             from bms_distance_travelled where device_id = $1 order by period_start_ms",
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(DistanceTravelledRecord {
                id: row.try_get("id")?,
                device_id: row.try_get("device_id")?,
                km: row.try_get("km")?,
                period_start_ms: row.try_get("period_start_ms")?,
                period_end_ms: row.try_get("period_end_ms")?,
            });
        }
        Ok(items)
    }
}
