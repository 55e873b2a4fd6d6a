//! 充电循环内存存储实现

use crate::error::StorageError;
use crate::models::{ChargeCycleHistory, ChargeCycleState};
use crate::traits::ChargeCycleStore;
use crate::validation::ensure_device_id;
use std::collections::HashMap;
use std::sync::RwLock;

pub struct InMemoryChargeCycleStore {
    states: RwLock<HashMap<String, ChargeCycleState>>,
    history: RwLock<Vec<ChargeCycleHistory>>,
}

impl InMemoryChargeCycleStore {
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryChargeCycleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ChargeCycleStore for InMemoryChargeCycleStore {
    async fn find_charge_state(
        &self,
        device_id: &str,
    ) -> Result<Option<ChargeCycleState>, StorageError> {
        let item = self
            .states
            .read()
            .ok()
            .and_then(|map| map.get(device_id).cloned());
        Ok(item)
    }

    async fn upsert_charge_state(&self, state: ChargeCycleState) -> Result<(), StorageError> {
        ensure_device_id(&state.device_id)?;
        let mut map = self
            .states
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        map.insert(state.device_id.clone(), state);
        Ok(())
    }

    async fn list_completed_charge_states(&self) -> Result<Vec<ChargeCycleState>, StorageError> {
        let map = self
            .states
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<ChargeCycleState> = map
            .values()
            .filter(|state| state.is_complete())
            .cloned()
            .collect();
        items.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(items)
    }

    async fn delete_charge_state(&self, device_id: &str) -> Result<bool, StorageError> {
        let mut map = self
            .states
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(map.remove(device_id).is_some())
    }

    async fn append_charge_history(&self, record: ChargeCycleHistory) -> Result<(), StorageError> {
        let mut history = self
            .history
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        history.push(record);
        Ok(())
    }

    async fn list_charge_history(
        &self,
        device_id: &str,
    ) -> Result<Vec<ChargeCycleHistory>, StorageError> {
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
