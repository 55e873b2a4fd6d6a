//! 设备主记录内存存储实现

use crate::error::StorageError;
use crate::models::{MainRecord, MainRecordUpdate, MainRecordUpsert};
use crate::traits::MainRecordStore;
use crate::validation::ensure_device_id;
use std::collections::HashMap;
use std::sync::RwLock;

/// 主记录内存存储
///
/// 使用 RwLock + HashMap 提供线程安全的内存存储。
pub struct InMemoryMainRecordStore {
    records: RwLock<HashMap<String, MainRecord>>,
}

impl InMemoryMainRecordStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// 以已有主记录初始化（测试用）。
    pub fn with_records(records: Vec<MainRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|record| (record.device_id.clone(), record))
            .collect();
        Self {
            records: RwLock::new(map),
        }
    }
}

impl Default for InMemoryMainRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MainRecordStore for InMemoryMainRecordStore {
    async fn list_main_records(&self) -> Result<Vec<MainRecord>, StorageError> {
        let map = self
            .records
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<MainRecord> = map.values().cloned().collect();
        items.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(items)
    }

    async fn find_main_record(
        &self,
        device_id: &str,
    ) -> Result<Option<MainRecord>, StorageError> {
        let item = self
            .records
            .read()
            .ok()
            .and_then(|map| map.get(device_id).cloned());
        Ok(item)
    }

    async fn upsert_readings(&self, items: Vec<MainRecordUpsert>) -> Result<usize, StorageError> {
        let mut map = self
            .records
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut written = 0;
        for item in items {
            ensure_device_id(&item.reading.device_id)?;
            match map.get_mut(&item.reading.device_id) {
                Some(record) => record.apply_reading(&item.reading, item.distance_travelled_km),
                None => {
                    let record = MainRecord::from_reading(&item.reading, item.distance_travelled_km);
                    map.insert(record.device_id.clone(), record);
                }
            }
            written += 1;
        }
        Ok(written)
    }

    async fn apply_updates(&self, updates: Vec<MainRecordUpdate>) -> Result<usize, StorageError> {
        let mut map = self
            .records
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut applied = 0;
        for update in updates {
            let Some(record) = map.get_mut(&update.device_id) else {
                return Err(StorageError::new(format!(
                    "main record not found: {}",
                    update.device_id
                )));
            };
            update.apply_to(record);
            applied += 1;
        }
        Ok(applied)
    }
}
