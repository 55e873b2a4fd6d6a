//! Postgres 行程循环存储实现
//!
//! 位置轨迹以纬度、经度两个 double precision[] 列存放，下标一一对应。

use crate::error::StorageError;
use crate::models::{TripCycleHistory, TripCycleState, TripLocationTrail};
use crate::postgres::zip_points;
use crate::traits::TripCycleStore;
use crate::validation::ensure_device_id;
use domain::Coordinates;
use sqlx::{PgPool, Row};

pub struct PgTripCycleStore {
    pub pool: PgPool,
}

impl PgTripCycleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TripCycleStore for PgTripCycleStore {
    async fn find_trip_state(
        &self,
        device_id: &str,
    ) -> Result<Option<TripCycleState>, StorageError> {
        let row = sqlx::query(
            "select device_id, asset, cycle_no, start_time_ms, start_odometer \
             from bms_trip_cycle_states where device_id = $1",
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(TripCycleState {
            device_id: row.try_get("device_id")?,
            asset: row.try_get("asset")?,
            cycle_no: row.try_get("cycle_no")?,
            start_time_ms: row.try_get("start_time_ms")?,
            start_odometer: row.try_get("start_odometer")?,
        }))
    }

    async fn upsert_trip_state(&self, state: TripCycleState) -> Result<(), StorageError> {
        ensure_device_id(&state.device_id)?;
        sqlx::query(
            "insert into bms_trip_cycle_states \
             (device_id, asset, cycle_no, start_time_ms, start_odometer) \
             values ($1, $2, $3, $4, $5) \
             on conflict (device_id) do update set \
             asset = excluded.asset, \
             cycle_no = excluded.cycle_no, \
             start_time_ms = excluded.start_time_ms, \
             start_odometer = excluded.start_odometer",
        )
        .bind(&state.device_id)
        .bind(&state.asset)
        .bind(state.cycle_no)
        .bind(state.start_time_ms)
        .bind(state.start_odometer)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_trip_state(&self, device_id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("delete from bms_trip_cycle_states where device_id = $1")
            .bind(device_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_trip_trail(
        &self,
        device_id: &str,
    ) -> Result<Option<TripLocationTrail>, StorageError> {
        let row = sqlx::query(
            "select device_id, latitudes, longitudes, created_at_ms \
             from bms_trip_location_trails where device_id = $1",
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(TripLocationTrail {
            device_id: row.try_get("device_id")?,
            points: zip_points(row.try_get("latitudes")?, row.try_get("longitudes")?),
            created_at_ms: row.try_get("created_at_ms")?,
        }))
    }

    async fn append_trip_location(
        &self,
        device_id: &str,
        point: Coordinates,
        now_ms: i64,
    ) -> Result<(), StorageError> {
        ensure_device_id(device_id)?;
        sqlx::query(
            "insert into bms_trip_location_trails (device_id, latitudes, longitudes, created_at_ms) \
             values ($1, array[$2::double precision], array[$3::double precision], $4) \
             on conflict (device_id) do update set \
             latitudes = array_append(bms_trip_location_trails.latitudes, $2::double precision), \
             longitudes = array_append(bms_trip_location_trails.longitudes, $3::double precision)",
        )
        .bind(device_id)
        .bind(point.latitude)
        .bind(point.longitude)
        .bind(now_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_trip_trail(&self, device_id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("delete from bms_trip_location_trails where device_id = $1")
            .bind(device_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn append_trip_history(&self, record: TripCycleHistory) -> Result<(), StorageError> {
        sqlx::query(
            "insert into bms_trip_cycle_history \
             (id, device_id, asset, cycle_no, start_time_ms, end_time_ms, km_travelled, min_soc, \
              max_soc, avg_speed, top_speed, lowest_speed, depth_of_discharge, start_odometer, \
              end_odometer, created_at_ms) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(&record.id)
        .bind(&record.device_id)
        .bind(&record.asset)
        .bind(record.cycle_no)
        .bind(record.start_time_ms)
        .bind(record.end_time_ms)
        .bind(record.km_travelled)
        .bind(record.min_soc)
        .bind(record.max_soc)
        .bind(record.avg_speed)
        .bind(record.top_speed)
        .bind(record.lowest_speed)
        .bind(&record.depth_of_discharge)
        .bind(record.start_odometer)
        .bind(record.end_odometer)
        .bind(record.created_at_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_trip_history(
        &self,
        device_id: &str,
    ) -> Result<Vec<TripCycleHistory>, StorageError> {
        let rows = sqlx::query(
            "select id, device_id, asset, cycle_no, start_time_ms, end_time_ms, km_travelled, \
             min_soc, max_soc, avg_speed, top_speed, lowest_speed, depth_of_discharge, \
             start_odometer, end_odometer, created_at_ms \
             from bms_trip_cycle_history where device_id = $1 order by created_at_ms",
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(TripCycleHistory {
                id: row.try_get("id")?,
                device_id: row.try_get("device_id")?,
                asset: row.try_get("asset")?,
                cycle_no: row.try_get("cycle_no")?,
                start_time_ms: row.try_get("start_time_ms")?,
                end_time_ms: row.try_get("end_time_ms")?,
                km_travelled: row.try_get("km_travelled")?,
                min_soc: row.try_get("min_soc")?,
                max_soc: row.try_get("max_soc")?,
                avg_speed: row.try_get("avg_speed")?,
                top_speed: row.try_get("top_speed")?,
                lowest_speed: row.try_get("lowest_speed")?,
                depth_of_discharge: row.try_get("depth_of_discharge")?,
                start_odometer: row.try_get("start_odometer")?,
                end_odometer: row.try_get("end_odometer")?,
                created_at_ms: row.try_get("created_at_ms")?,
            });
        }
        Ok(items)
    }
}
