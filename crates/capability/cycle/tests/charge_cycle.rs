use async_trait::async_trait;
use bms_cycle::ChargeCycleDetector;
use bms_storage::{
    ChargeCycleHistory, ChargeCycleState, ChargeCycleStore, InMemoryChargeCycleStore,
    InMemoryMainRecordStore, MainRecordStore, MainRecordUpsert, StorageError,
};
use domain::{DeviceReading, DeviceSnapshot};
use std::collections::BTreeMap;
use std::sync::Arc;

fn reading(device_id: &str, current: i64, soc: i64) -> DeviceReading {
    DeviceReading {
        device_id: device_id.to_string(),
        asset: format!("EV-{device_id}"),
        battery_current: current,
        soc,
        cycle_count: 1,
        odometer: 0.0,
        latitude: 0,
        longitude: 0,
        speed: 0,
        angle: 90,
        received_at_ms: 1_000,
        metadata: BTreeMap::new(),
    }
}

async fn poll(main: &InMemoryMainRecordStore, readings: Vec<DeviceReading>) -> Vec<DeviceSnapshot> {
    let items = readings
        .into_iter()
        .map(|reading| MainRecordUpsert {
            reading,
            distance_travelled_km: 0.0,
        })
        .collect();
    main.upsert_readings(items).await.expect("ingest");
    main.list_main_records()
        .await
        .expect("list")
        .iter()
        .map(|record| record.snapshot())
        .collect()
}

/// 历史写入总是失败的存储。
struct FailingHistoryStore {
    inner: InMemoryChargeCycleStore,
}

#[async_trait]
impl ChargeCycleStore for FailingHistoryStore {
    async fn find_charge_state(
        &self,
        device_id: &str,
    ) -> Result<Option<ChargeCycleState>, StorageError> {
        self.inner.find_charge_state(device_id).await
    }

    async fn upsert_charge_state(&self, state: ChargeCycleState) -> Result<(), StorageError> {
        self.inner.upsert_charge_state(state).await
    }

    async fn list_completed_charge_states(&self) -> Result<Vec<ChargeCycleState>, StorageError> {
        self.inner.list_completed_charge_states().await
    }

    async fn delete_charge_state(&self, device_id: &str) -> Result<bool, StorageError> {
        self.inner.delete_charge_state(device_id).await
    }

    async fn append_charge_history(
        &self,
        _record: ChargeCycleHistory,
    ) -> Result<(), StorageError> {
        Err(StorageError::new("forced failure"))
    }

    async fn list_charge_history(
        &self,
        device_id: &str,
    ) -> Result<Vec<ChargeCycleHistory>, StorageError> {
        self.inner.list_charge_history(device_id).await
    }
}

#[tokio::test]
async fn first_observation_opens_cycle() {
    let main = Arc::new(InMemoryMainRecordStore::new());
    let charge = Arc::new(InMemoryChargeCycleStore::new());
    let detector = ChargeCycleDetector::new(charge.clone(), main.clone());

    let snapshots = poll(&main, vec![reading("B1", 5, 30)]).await;
    let report = detector.run(&snapshots, 10_000).await.expect("run");
    assert_eq!(report.candidates, 1);
    assert_eq!(report.opened, 1);
    assert_eq!(report.closed, 0);

    let state = charge
        .find_charge_state("B1")
        .await
        .expect("find")
        .expect("state");
    assert!(state.started);
    assert!(!state.ended);
    assert_eq!(state.start_soc, 30);
    assert_eq!(state.start_time_ms, 10_000);

    let record = main.find_main_record("B1").await.expect("find").expect("record");
    assert_eq!(record.previous_battery_current, Some(5));
}

#[tokio::test]
async fn identical_feed_is_idempotent() {
    let main = Arc::new(InMemoryMainRecordStore::new());
    let charge = Arc::new(InMemoryChargeCycleStore::new());
    let detector = ChargeCycleDetector::new(charge.clone(), main.clone());

    let snapshots = poll(&main, vec![reading("B1", 5, 30)]).await;
    detector.run(&snapshots, 10_000).await.expect("first");

    let snapshots = poll(&main, vec![reading("B1", 5, 30)]).await;
    let report = detector.run(&snapshots, 20_000).await.expect("second");
    assert_eq!(report.candidates, 0);
    assert_eq!(report.closed, 0);

    // 同号电流变化也视为噪声
    let snapshots = poll(&main, vec![reading("B1", 9, 31)]).await;
    let report = detector.run(&snapshots, 30_000).await.expect("third");
    assert_eq!(report.candidates, 0);

    let state = charge
        .find_charge_state("B1")
        .await
        .expect("find")
        .expect("state");
    assert!(!state.ended);
}

#[tokio::test]
async fn sign_change_closes_and_flushes_history() {
    let main = Arc::new(InMemoryMainRecordStore::new());
    let charge = Arc::new(InMemoryChargeCycleStore::new());
    let detector = ChargeCycleDetector::new(charge.clone(), main.clone());

    let snapshots = poll(&main, vec![reading("B1", 5, 30)]).await;
    detector.run(&snapshots, 10_000).await.expect("open");

    let snapshots = poll(&main, vec![reading("B1", -7, 95)]).await;
    let report = detector.run(&snapshots, 50_000).await.expect("close");
    assert_eq!(report.closed, 1);
    assert_eq!(report.flushed, 1);
    assert!(report.flush_failures.is_empty());

    assert!(charge.find_charge_state("B1").await.expect("find").is_none());
    let history = charge.list_charge_history("B1").await.expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].start_soc, 30);
    assert_eq!(history[0].end_soc, 95);
    assert_eq!(history[0].start_time_ms, 10_000);
    assert_eq!(history[0].end_time_ms, 50_000);
    assert_eq!(history[0].asset, "EV-B1");

    let record = main.find_main_record("B1").await.expect("find").expect("record");
    assert_eq!(record.previous_battery_current, Some(-7));
}

#[tokio::test]
async fn devices_are_independent() {
    let main = Arc::new(InMemoryMainRecordStore::new());
    let charge = Arc::new(InMemoryChargeCycleStore::new());
    let detector = ChargeCycleDetector::new(charge.clone(), main.clone());

    let snapshots = poll(&main, vec![reading("B1", 5, 30), reading("B2", -3, 70)]).await;
    let report = detector.run(&snapshots, 1).await.expect("open");
    assert_eq!(report.opened, 2);

    let snapshots = poll(&main, vec![reading("B1", -5, 40), reading("B2", -3, 69)]).await;
    let report = detector.run(&snapshots, 2).await.expect("close one");
    assert_eq!(report.candidates, 1);
    assert_eq!(report.flushed, 1);
    assert!(charge.find_charge_state("B2").await.expect("find").is_some());
}

#[tokio::test]
async fn history_failure_keeps_temp_state() {
    let main = Arc::new(InMemoryMainRecordStore::new());
    let charge = Arc::new(FailingHistoryStore {
        inner: InMemoryChargeCycleStore::new(),
    });
    let detector = ChargeCycleDetector::new(charge.clone(), main.clone());

    let snapshots = poll(&main, vec![reading("B1", 5, 30)]).await;
    detector.run(&snapshots, 1).await.expect("open");
    let snapshots = poll(&main, vec![reading("B1", -5, 90)]).await;
    let report = detector.run(&snapshots, 2).await.expect("close");

    assert_eq!(report.closed, 1);
    assert_eq!(report.flushed, 0);
    assert_eq!(report.flush_failures, vec!["B1".to_string()]);
    let state = charge
        .find_charge_state("B1")
        .await
        .expect("find")
        .expect("state kept");
    assert!(state.is_complete());
}

#[tokio::test]
async fn missing_main_record_fails_batch_after_flush() {
    let main = Arc::new(InMemoryMainRecordStore::new());
    let charge = Arc::new(InMemoryChargeCycleStore::new());
    let detector = ChargeCycleDetector::new(charge.clone(), main.clone());

    let orphan = DeviceSnapshot {
        device_id: "ghost".to_string(),
        asset: "ghost".to_string(),
        battery_current: 4,
        previous_battery_current: None,
        soc: 10,
        cycle_count: 1,
        old_cycle_count: None,
        odometer: 0.0,
        latitude: 0,
        longitude: 0,
        speed: 0,
        angle: 90,
        soc_samples: Vec::new(),
        speed_samples: Vec::new(),
    };
    let err = detector.run(&[orphan], 1).await.expect_err("missing record");
    assert_eq!(err.to_string(), "store error: main record not found: ghost");
    assert!(charge.find_charge_state("ghost").await.expect("find").is_some());
}
