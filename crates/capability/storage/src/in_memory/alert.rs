//! 告警内存存储实现

use crate::error::StorageError;
use crate::models::{AlertHistory, AlertKind, AlertState};
use crate::traits::AlertStore;
use crate::validation::ensure_device_id;
use std::collections::HashMap;
use std::sync::RwLock;

pub struct InMemoryAlertStore {
    states: RwLock<HashMap<(String, AlertKind), AlertState>>,
    history: RwLock<Vec<AlertHistory>>,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryAlertStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AlertStore for InMemoryAlertStore {
    async fn find_alert_state(
        &self,
        device_id: &str,
        kind: AlertKind,
    ) -> Result<Option<AlertState>, StorageError> {
        let item = self
            .states
            .read()
            .ok()
            .and_then(|map| map.get(&(device_id.to_string(), kind)).cloned());
        Ok(item)
    }

    async fn upsert_alert_state(&self, state: AlertState) -> Result<(), StorageError> {
        ensure_device_id(&state.device_id)?;
        let mut map = self
            .states
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        map.insert((state.device_id.clone(), state.kind), state);
        Ok(())
    }

    async fn delete_alert_state(
        &self,
        device_id: &str,
        kind: AlertKind,
    ) -> Result<bool, StorageError> {
        let mut map = self
            .states
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(map.remove(&(device_id.to_string(), kind)).is_some())
    }

    async fn list_alert_states(&self, kind: AlertKind) -> Result<Vec<AlertState>, StorageError> {
        let map = self
            .states
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<AlertState> = map
            .values()
            .filter(|state| state.kind == kind)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(items)
    }

    async fn append_alert_history(&self, record: AlertHistory) -> Result<(), StorageError> {
        let mut history = self
            .history
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        history.push(record);
        Ok(())
    }

    async fn list_alert_history(
        &self,
        device_id: &str,
    ) -> Result<Vec<AlertHistory>, StorageError> {
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
