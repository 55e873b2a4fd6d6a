//! Postgres 告警存储实现

use crate::error::StorageError;
use crate::models::{AlertHistory, AlertKind, AlertState};
use crate::traits::AlertStore;
use crate::validation::ensure_device_id;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

pub struct PgAlertStore {
    pub pool: PgPool,
}

impl PgAlertStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn alert_kind_from_row(row: &PgRow) -> Result<AlertKind, StorageError> {
    let kind: String = row.try_get("kind")?;
    AlertKind::parse(&kind).ok_or_else(|| StorageError::new(format!("unknown alert kind: {kind}")))
}

#[async_trait::async_trait]
impl AlertStore for PgAlertStore {
    async fn find_alert_state(
        &self,
        device_id: &str,
        kind: AlertKind,
    ) -> Result<Option<AlertState>, StorageError> {
        let row = sqlx::query(
            "select device_id, kind, observed_values, alert_count, created_at_ms, updated_at_ms \
             from bms_alert_states where device_id = $1 and kind = $2",
        )
        .bind(device_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(AlertState {
            device_id: row.try_get("device_id")?,
            kind: alert_kind_from_row(&row)?,
            values: row.try_get("observed_values")?,
            alert_count: row.try_get("alert_count")?,
            created_at_ms: row.try_get("created_at_ms")?,
            updated_at_ms: row.try_get("updated_at_ms")?,
        }))
    }

    async fn upsert_alert_state(&self, state: AlertState) -> Result<(), StorageError> {
        ensure_device_id(&state.device_id)?;
        sqlx::query(
            "insert into bms_alert_states \
             (device_id, kind, observed_values, alert_count, created_at_ms, updated_at_ms) \
             values ($1, $2, $3, $4, $5, $6) \
             on conflict (device_id, kind) do update set \
             observed_values = excluded.observed_values, \
             alert_count = excluded.alert_count, \
             updated_at_ms = excluded.updated_at_ms",
        )
        .bind(&state.device_id)
        .bind(state.kind.as_str())
        .bind(&state.values)
        .bind(state.alert_count)
        .bind(state.created_at_ms)
        .bind(state.updated_at_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_alert_state(
        &self,
        device_id: &str,
        kind: AlertKind,
    ) -> Result<bool, StorageError> {
        let result = sqlx::query("delete from bms_alert_states where device_id = $1 and kind = $2")
            .bind(device_id)
            .bind(kind.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_alert_states(&self, kind: AlertKind) -> Result<Vec<AlertState>, StorageError> {
        let rows = sqlx::query(
            "select device_id, kind, observed_values, alert_count, created_at_ms, updated_at_ms \
             from bms_alert_states where kind = $1 order by device_id",
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(AlertState {
                device_id: row.try_get("device_id")?,
                kind: alert_kind_from_row(&row)?,
                values: row.try_get("observed_values")?,
                alert_count: row.try_get("alert_count")?,
                created_at_ms: row.try_get("created_at_ms")?,
                updated_at_ms: row.try_get("updated_at_ms")?,
            });
        }
        Ok(items)
    }

    async fn append_alert_history(&self, record: AlertHistory) -> Result<(), StorageError> {
        sqlx::query(
            "insert into bms_alert_history \
             (id, device_id, kind, alert_count, observed_values, created_at_ms) \
             values ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&record.id)
        .bind(&record.device_id)
        .bind(record.kind.as_str())
        .bind(record.alert_count)
        .bind(&record.values)
        .bind(record.created_at_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_alert_history(
        &self,
        device_id: &str,
    ) -> Result<Vec<AlertHistory>, StorageError> {
        let rows = sqlx::query(
            "select id, device_id, kind, alert_count, observed_values, created_at_ms \
             from bms_alert_history where device_id = $1 order by created_at_ms",
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(AlertHistory {
                id: row.try_get("id")?,
                device_id: row.try_get("device_id")?,
                kind: alert_kind_from_row(&row)?,
                alert_count: row.try_get("alert_count")?,
                values: row.try_get("observed_values")?,
                created_at_ms: row.try_get("created_at_ms")?,
            });
        }
        Ok(items)
    }
}
