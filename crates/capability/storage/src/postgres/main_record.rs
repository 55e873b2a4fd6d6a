//! Postgres 主记录存储实现
//!
//! 批量写入按顺序逐条执行，不包裹事务。

use crate::error::StorageError;
use crate::models::{BatteryStatus, MainRecord, MainRecordUpdate, MainRecordUpsert, SampleUpdate};
use crate::traits::MainRecordStore;
use crate::validation::ensure_device_id;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;

const MAIN_RECORD_COLUMNS: &str = "device_id, asset, battery_current, soc, cycle_count, odometer, \
     latitude, longitude, speed, angle, metadata, previous_battery_current, old_cycle_count, \
     soc_samples, speed_samples, status, distance_travelled_km, created_at_ms, updated_at_ms";

pub struct PgMainRecordStore {
    pub pool: PgPool,
}

impl PgMainRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }
}

fn main_record_from_row(row: &PgRow) -> Result<MainRecord, StorageError> {
    let metadata: String = row.try_get("metadata")?;
    let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata)?;
    let status: String = row.try_get("status")?;
    Ok(MainRecord {
        device_id: row.try_get("device_id")?,
        asset: row.try_get("asset")?,
        battery_current: row.try_get("battery_current")?,
        soc: row.try_get("soc")?,
        cycle_count: row.try_get("cycle_count")?,
        odometer: row.try_get("odometer")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        speed: row.try_get("speed")?,
        angle: row.try_get("angle")?,
        metadata,
        previous_battery_current: row.try_get("previous_battery_current")?,
        old_cycle_count: row.try_get("old_cycle_count")?,
        soc_samples: row.try_get("soc_samples")?,
        speed_samples: row.try_get("speed_samples")?,
        status: BatteryStatus::parse(&status),
        distance_travelled_km: row.try_get("distance_travelled_km")?,
        created_at_ms: row.try_get("created_at_ms")?,
        updated_at_ms: row.try_get("updated_at_ms")?,
    })
}

#[async_trait::async_trait]
impl MainRecordStore for PgMainRecordStore {
    async fn list_main_records(&self) -> Result<Vec<MainRecord>, StorageError> {
        let sql = format!("select {MAIN_RECORD_COLUMNS} from bms_main_records order by device_id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(main_record_from_row(&row)?);
        }
        Ok(records)
    }

    async fn find_main_record(
        &self,
        device_id: &str,
    ) -> Result<Option<MainRecord>, StorageError> {
        let sql = format!("select {MAIN_RECORD_COLUMNS} from bms_main_records where device_id = $1");
        let row = sqlx::query(&sql)
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(main_record_from_row(&row)?))
    }

    async fn upsert_readings(&self, items: Vec<MainRecordUpsert>) -> Result<usize, StorageError> {
        let mut written = 0;
        for item in items {
            let reading = &item.reading;
            ensure_device_id(&reading.device_id)?;
            let metadata = serde_json::to_string(&reading.metadata)?;
            sqlx::query(
                "insert into bms_main_records (device_id, asset, battery_current, soc, cycle_count, \
                 odometer, latitude, longitude, speed, angle, metadata, distance_travelled_km, \
                 created_at_ms, updated_at_ms) \
                 values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13) \
                 on conflict (device_id) do update set \
                 asset = excluded.asset, \
                 battery_current = excluded.battery_current, \
                 soc = excluded.soc, \
                 cycle_count = excluded.cycle_count, \
                 odometer = excluded.odometer, \
                 latitude = excluded.latitude, \
                 longitude = excluded.longitude, \
                 speed = excluded.speed, \
                 angle = excluded.angle, \
                 metadata = excluded.metadata, \
                 distance_travelled_km = excluded.distance_travelled_km, \
                 updated_at_ms = excluded.updated_at_ms",
            )
            .bind(&reading.device_id)
            .bind(&reading.asset)
            .bind(reading.battery_current)
            .bind(reading.soc)
            .bind(reading.cycle_count)
            .bind(reading.odometer)
            .bind(reading.latitude)
            .bind(reading.longitude)
            .bind(reading.speed)
            .bind(reading.angle)
            .bind(metadata)
            .bind(item.distance_travelled_km)
            .bind(reading.received_at_ms)
            .execute(&self.pool)
            .await?;
            written += 1;
        }
        Ok(written)
    }

    async fn apply_updates(&self, updates: Vec<MainRecordUpdate>) -> Result<usize, StorageError> {
        let mut applied = 0;
        for update in updates {
            let (sample_op, soc, speed) = match update.samples {
                Some(SampleUpdate::Push { soc, speed }) => (Some("push"), Some(soc), Some(speed)),
                Some(SampleUpdate::Reset) => (Some("reset"), None, None),
                None => (None, None, None),
            };
            let result = sqlx::query(
                "update bms_main_records set \
                 previous_battery_current = coalesce($1, previous_battery_current), \
                 old_cycle_count = coalesce($2, old_cycle_count), \
                 soc_samples = case $3::text \
                   when 'push' then array_append(soc_samples, $4::bigint) \
                   when 'reset' then '{}'::bigint[] \
                   else soc_samples end, \
                 speed_samples = case $3::text \
                   when 'push' then array_append(speed_samples, $5::bigint) \
                   when 'reset' then '{}'::bigint[] \
                   else speed_samples end, \
                 status = coalesce($6, status) \
                 where device_id = $7",
            )
            .bind(update.previous_battery_current)
            .bind(update.old_cycle_count)
            .bind(sample_op)
            .bind(soc)
            .bind(speed)
            .bind(update.status.map(|status| status.as_str()))
            .bind(&update.device_id)
            .execute(&self.pool)
            .await?;
            if result.rows_affected() == 0 {
                return Err(StorageError::new(format!(
                    "main record not found: {}",
                    update.device_id
                )));
            }
            applied += 1;
        }
        Ok(applied)
    }
}
