//! 上报统计内存存储实现

use crate::error::StorageError;
use crate::models::UnreportedCount;
use crate::traits::ReportingStore;
use crate::validation::ensure_device_id;
use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

pub struct InMemoryReportingStore {
    marks: RwLock<BTreeMap<i64, HashSet<String>>>,
    counts: RwLock<BTreeMap<i64, UnreportedCount>>,
}

impl InMemoryReportingStore {
    pub fn new() -> Self {
        Self {
            marks: RwLock::new(BTreeMap::new()),
            counts: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryReportingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ReportingStore for InMemoryReportingStore {
    async fn mark_reported(
        &self,
        hour_start_ms: i64,
        device_ids: Vec<String>,
    ) -> Result<(), StorageError> {
        for device_id in &device_ids {
            ensure_device_id(device_id)?;
        }
        let mut marks = self
            .marks
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        marks.entry(hour_start_ms).or_default().extend(device_ids);
        Ok(())
    }

    async fn count_reported(&self, hour_start_ms: i64) -> Result<i64, StorageError> {
        let marks = self
            .marks
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(marks.get(&hour_start_ms).map_or(0, |set| set.len() as i64))
    }

    async fn prune_reported_before(&self, cutoff_ms: i64) -> Result<u64, StorageError> {
        let mut marks = self
            .marks
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let kept = marks.split_off(&cutoff_ms);
        let removed = marks.values().map(|set| set.len() as u64).sum();
        *marks = kept;
        Ok(removed)
    }

    async fn upsert_unreported_count(&self, count: UnreportedCount) -> Result<(), StorageError> {
        let mut counts = self
            .counts
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        counts.insert(count.hour_start_ms, count);
        Ok(())
    }

    async fn list_unreported_counts(
        &self,
        since_ms: i64,
    ) -> Result<Vec<UnreportedCount>, StorageError> {
        let counts = self
            .counts
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(counts.range(since_ms..).map(|(_, count)| count.clone()).collect())
    }

    async fn prune_unreported_counts_before(&self, cutoff_ms: i64) -> Result<u64, StorageError> {
        let mut counts = self
            .counts
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let kept = counts.split_off(&cutoff_ms);
        let removed = counts.len() as u64;
        *counts = kept;
        Ok(removed)
    }
}
