//! Postgres 充电循环存储实现

use crate::error::StorageError;
use crate::models::{ChargeCycleHistory, ChargeCycleState};
use crate::traits::ChargeCycleStore;
use crate::validation::ensure_device_id;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

pub struct PgChargeCycleStore {
    pub pool: PgPool,
}

impl PgChargeCycleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn charge_state_from_row(row: &PgRow) -> Result<ChargeCycleState, StorageError> {
    Ok(ChargeCycleState {
        device_id: row.try_get("device_id")?,
        asset: row.try_get("asset")?,
        start_time_ms: row.try_get("start_time_ms")?,
        start_soc: row.try_get("start_soc")?,
        started: row.try_get("started")?,
        end_time_ms: row.try_get("end_time_ms")?,
        end_soc: row.try_get("end_soc")?,
        ended: row.try_get("ended")?,
    })
}

#[async_trait::async_trait]
impl ChargeCycleStore for PgChargeCycleStore {
    async fn find_charge_state(
        &self,
        device_id: &str,
    ) -> Result<Option<ChargeCycleState>, StorageError> {
        let row = sqlx::query(
            "select device_id, asset, start_time_ms, start_soc, started, end_time_ms, end_soc, ended \
             from bms_charge_cycle_states where device_id = $1",
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(charge_state_from_row(&row)?))
    }

    async fn upsert_charge_state(&self, state: ChargeCycleState) -> Result<(), StorageError> {
        ensure_device_id(&state.device_id)?;
        sqlx::query(
            "insert into bms_charge_cycle_states \
             (device_id, asset, start_time_ms, start_soc, started, end_time_ms, end_soc, ended) \
             values ($1, $2, $3, $4, $5, $6, $7, $8) \
             on conflict (device_id) do update set \
             asset = excluded.asset, \
             start_time_ms = excluded.start_time_ms, \
             start_soc = excluded.start_soc, \
             started = excluded.started, \
             end_time_ms = excluded.end_time_ms, \
             end_soc = excluded.end_soc, \
             ended = excluded.ended",
        )
        .bind(&state.device_id)
        .bind(&state.asset)
        .bind(state.start_time_ms)
        .bind(state.start_soc)
        .bind(state.started)
        .bind(state.end_time_ms)
        .bind(state.end_soc)
        .bind(state.ended)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_completed_charge_states(&self) -> Result<Vec<ChargeCycleState>, StorageError> {
        let rows = sqlx::query(
            "select device_id, asset, start_time_ms, start_soc, started, end_time_ms, end_soc, ended \
             from bms_charge_cycle_states where started and ended order by device_id",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut states = Vec::with_capacity(rows.len());
        for row in rows {
            states.push(charge_state_from_row(&row)?);
        }
        Ok(states)
    }

    async fn delete_charge_state(&self, device_id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("delete from bms_charge_cycle_states where device_id = $1")
            .bind(device_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn append_charge_history(&self, record: ChargeCycleHistory) -> Result<(), StorageError> {
        sqlx::query(
            "insert into bms_charge_cycle_history \
             (id, device_id, asset, start_time_ms, start_soc, end_time_ms, end_soc, created_at_ms) \
             values ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&record.id)
        .bind(&record.device_id)
        .bind(&record.asset)
        .bind(record.start_time_ms)
        .bind(record.start_soc)
        .bind(record.end_time_ms)
        .bind(record.end_soc)
        .bind(record.created_at_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_charge_history(
        &self,
        device_id: &str,
    ) -> Result<Vec<ChargeCycleHistory>, StorageError> {
        let rows = sqlx::query(
            "select id, device_id, asset, start_time_ms, start_soc, end_time_ms, end_soc, created_at_ms \
             from bms_charge_cycle_history where device_id = $1 order by created_at_ms",
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(ChargeCycleHistory {
                id: row.try_get("id")?,
                device_id: row.try_get("device_id")?,
                asset: row.try_get("asset")?,
                start_time_ms: row.try_get("start_time_ms")?,
                start_soc: row.try_get("start_soc")?,
                end_time_ms: row.try_get("end_time_ms")?,
                end_soc: row.try_get("end_soc")?,
                created_at_ms: row.try_get("created_at_ms")?,
            });
        }
        Ok(items)
    }
}
