//! 行驶里程内存存储实现

use crate::error::StorageError;
use crate::models::{DistanceTrail, DistanceTravelledRecord};
use crate::traits::DistanceStore;
use crate::validation::ensure_device_id;
use domain::Coordinates;
use std::collections::HashMap;
use std::sync::RwLock;

pub struct InMemoryDistanceStore {
    trails: RwLock<HashMap<String, DistanceTrail>>,
    records: RwLock<Vec<DistanceTravelledRecord>>,
}

impl InMemoryDistanceStore {
    pub fn new() -> Self {
        Self {
            trails: RwLock::new(HashMap::new()),
            records: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryDistanceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DistanceStore for InMemoryDistanceStore {
    async fn append_distance_point(
        &self,
        device_id: &str,
        point: Coordinates,
        now_ms: i64,
    ) -> Result<(), StorageError> {
        ensure_device_id(device_id)?;
        let mut map = self
            .trails
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        map.entry(device_id.to_string())
            .or_insert_with(|| DistanceTrail {
                device_id: device_id.to_string(),
                points: Vec::new(),
                started_at_ms: now_ms,
            })
            .points
            .push(point);
        Ok(())
    }

    async fn list_distance_trails(&self) -> Result<Vec<DistanceTrail>, StorageError> {
        let map = self
            .trails
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<DistanceTrail> = map.values().cloned().collect();
        items.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(items)
    }

    async fn clear_distance_trail(&self, device_id: &str) -> Result<bool, StorageError> {
        let mut map = self
            .trails
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(map.remove(device_id).is_some())
    }

    async fn append_distance_record(
        &self,
        record: DistanceTravelledRecord,
    ) -> Result<(), StorageError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        records.push(record);
        Ok(())
    }

    async fn list_distance_records(
        &self,
        device_id: &str,
    ) -> Result<Vec<DistanceTravelledRecord>, StorageError> {
        let items = self
            .records
            .read()
            .map(|records| {
                records
                    .iter()
                    .filter(|item| item.device_id == device_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(items)
    }
}
