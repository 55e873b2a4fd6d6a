//! 行程循环内存存储实现
//!
//! 临时记录、位置轨迹、历史三张表分别加锁。

use crate::error::StorageError;
use crate::models::{TripCycleHistory, TripCycleState, TripLocationTrail};
use crate::traits::TripCycleStore;
use crate::validation::ensure_device_id;
use domain::Coordinates;
use std::collections::HashMap;
use std::sync::RwLock;

pub struct InMemoryTripCycleStore {
    states: RwLock<HashMap<String, TripCycleState>>,
    trails: RwLock<HashMap<String, TripLocationTrail>>,
    history: RwLock<Vec<TripCycleHistory>>,
}

impl InMemoryTripCycleStore {
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            trails: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryTripCycleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TripCycleStore for InMemoryTripCycleStore {
    async fn find_trip_state(
        &self,
        device_id: &str,
    ) -> Result<Option<TripCycleState>, StorageError> {
        let item = self
            .states
            .read()
            .ok()
            .and_then(|map| map.get(device_id).cloned());
        Ok(item)
    }

    async fn upsert_trip_state(&self, state: TripCycleState) -> Result<(), StorageError> {
        ensure_device_id(&state.device_id)?;
        let mut map = self
            .states
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        map.insert(state.device_id.clone(), state);
        Ok(())
    }

    async fn delete_trip_state(&self, device_id: &str) -> Result<bool, StorageError> {
        let mut map = self
            .states
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(map.remove(device_id).is_some())
    }

    async fn find_trip_trail(
        &self,
        device_id: &str,
    ) -> Result<Option<TripLocationTrail>, StorageError> {
        let item = self
            .trails
            .read()
            .ok()
            .and_then(|map| map.get(device_id).cloned());
        Ok(item)
    }

    async fn append_trip_location(
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
            .or_insert_with(|| TripLocationTrail {
                device_id: device_id.to_string(),
                points: Vec::new(),
                created_at_ms: now_ms,
            })
            .points
            .push(point);
        Ok(())
    }

    async fn delete_trip_trail(&self, device_id: &str) -> Result<bool, StorageError> {
        let mut map = self
            .trails
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(map.remove(device_id).is_some())
    }

    async fn append_trip_history(&self, record: TripCycleHistory) -> Result<(), StorageError> {
        let mut history = self
            .history
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        history.push(record);
        Ok(())
    }

    async fn list_trip_history(
        &self,
        device_id: &str,
    ) -> Result<Vec<TripCycleHistory>, StorageError> {
        let items = self
            .history
            .read()
            .map(|history| {
                history
                    .iter()
                    .filter(|item| item.device_id == device_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(items)
    }
}
