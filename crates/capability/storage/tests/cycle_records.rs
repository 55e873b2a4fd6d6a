use bms_storage::{
    AlertHistory, AlertKind, AlertState, AlertStore, ChargeCycleHistory, ChargeCycleState,
    ChargeCycleStore, DistanceStore, InMemoryAlertStore, InMemoryChargeCycleStore,
    InMemoryDistanceStore, InMemoryReportingStore, InMemoryTripCycleStore, ReportingStore,
    TripCycleStore, UnreportedCount, new_record_id,
};
use domain::Coordinates;

fn charge_state(device_id: &str, ended: bool) -> ChargeCycleState {
    ChargeCycleState {
        device_id: device_id.to_string(),
        asset: device_id.to_string(),
        start_time_ms: 1_000,
        start_soc: 20,
        started: true,
        end_time_ms: ended.then_some(2_000),
        end_soc: ended.then_some(90),
        ended,
    }
}

#[tokio::test]
async fn completed_charge_states_are_listed_and_deleted() {
    let store = InMemoryChargeCycleStore::new();
    store
        .upsert_charge_state(charge_state("bms-1", true))
        .await
        .expect("upsert");
    store
        .upsert_charge_state(charge_state("bms-2", false))
        .await
        .expect("upsert");

    let completed = store.list_completed_charge_states().await.expect("list");
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].device_id, "bms-1");

    store
        .append_charge_history(ChargeCycleHistory {
            id: new_record_id(),
            device_id: "bms-1".to_string(),
            asset: "bms-1".to_string(),
            start_time_ms: 1_000,
            start_soc: 20,
            end_time_ms: 2_000,
            end_soc: 90,
            created_at_ms: 2_000,
        })
        .await
        .expect("history");
    assert!(store.delete_charge_state("bms-1").await.expect("delete"));
    assert!(!store.delete_charge_state("bms-1").await.expect("delete"));
    assert!(store.find_charge_state("bms-1").await.expect("find").is_none());
    assert!(store.find_charge_state("bms-2").await.expect("find").is_some());
    assert_eq!(store.list_charge_history("bms-1").await.expect("history").len(), 1);
}

#[tokio::test]
async fn trip_trail_is_created_on_first_point() {
    let store = InMemoryTripCycleStore::new();
    assert!(store.find_trip_trail("bms-1").await.expect("find").is_none());

    store
        .append_trip_location("bms-1", Coordinates::new(0.0, 0.0), 1_000)
        .await
        .expect("append");
    store
        .append_trip_location("bms-1", Coordinates::new(0.0, 1.0), 2_000)
        .await
        .expect("append");

    let trail = store
        .find_trip_trail("bms-1")
        .await
        .expect("find")
        .expect("trail");
    assert_eq!(trail.created_at_ms, 1_000);
    assert_eq!(
        trail.points,
        vec![Coordinates::new(0.0, 0.0), Coordinates::new(0.0, 1.0)]
    );
    assert!(store.delete_trip_trail("bms-1").await.expect("delete"));
    assert!(store.find_trip_trail("bms-1").await.expect("find").is_none());
}

#[tokio::test]
async fn alert_states_are_keyed_by_kind() {
    let store = InMemoryAlertStore::new();
    for kind in [AlertKind::Overspeed, AlertKind::Fall, AlertKind::Temperature] {
        store
            .upsert_alert_state(AlertState {
                device_id: "bms-1".to_string(),
                kind,
                values: vec![70],
                alert_count: 0,
                created_at_ms: 1_000,
                updated_at_ms: 1_000,
            })
            .await
            .expect("upsert");
    }
    assert!(
        store
            .delete_alert_state("bms-1", AlertKind::Fall)
            .await
            .expect("delete")
    );
    assert!(
        store
            .find_alert_state("bms-1", AlertKind::Overspeed)
            .await
            .expect("find")
            .is_some()
    );
    let temperature = store
        .list_alert_states(AlertKind::Temperature)
        .await
        .expect("list");
    assert_eq!(temperature.len(), 1);
    assert_eq!(temperature[0].device_id, "bms-1");
    assert!(store.list_alert_states(AlertKind::Fall).await.expect("list").is_empty());
    store
        .append_alert_history(AlertHistory {
            id: new_record_id(),
            device_id: "bms-1".to_string(),
            kind: AlertKind::Fall,
            alert_count: 2,
            values: vec![150, 160, 170],
            created_at_ms: 3_000,
        })
        .await
        .expect("history");
    let history = store.list_alert_history("bms-1").await.expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, AlertKind::Fall);
    assert!(store.list_alert_history("bms-2").await.expect("history").is_empty());
}

#[tokio::test]
async fn distance_trails_accumulate_until_cleared() {
    let store = InMemoryDistanceStore::new();
    store
        .append_distance_point("bms-2", Coordinates::new(1.0, 1.0), 500)
        .await
        .expect("append");
    store
        .append_distance_point("bms-1", Coordinates::new(0.0, 0.0), 1_000)
        .await
        .expect("append");
    store
        .append_distance_point("bms-1", Coordinates::new(0.0, 1.0), 2_000)
        .await
        .expect("append");

    let trails = store.list_distance_trails().await.expect("list");
    assert_eq!(trails.len(), 2);
    assert_eq!(trails[0].device_id, "bms-1");
    assert_eq!(trails[0].points.len(), 2);
    assert_eq!(trails[0].started_at_ms, 1_000);

    assert!(store.clear_distance_trail("bms-1").await.expect("clear"));
    assert_eq!(store.list_distance_trails().await.expect("list").len(), 1);
}

#[tokio::test]
async fn reporting_marks_count_each_device_once_per_hour() {
    let store = InMemoryReportingStore::new();
    let hour = 3_600_000;
    store
        .mark_reported(hour, vec!["bms-1".to_string(), "bms-2".to_string()])
        .await
        .expect("mark");
    store
        .mark_reported(hour, vec!["bms-1".to_string()])
        .await
        .expect("mark again");
    store
        .mark_reported(2 * hour, vec!["bms-3".to_string()])
        .await
        .expect("mark next hour");
    assert_eq!(store.count_reported(hour).await.expect("count"), 2);
    assert_eq!(store.count_reported(2 * hour).await.expect("count"), 1);
    assert!(store.mark_reported(hour, vec![" ".to_string()]).await.is_err());

    assert_eq!(store.prune_reported_before(2 * hour).await.expect("prune"), 2);
    assert_eq!(store.count_reported(hour).await.expect("count"), 0);
    assert_eq!(store.count_reported(2 * hour).await.expect("count"), 1);
}

#[tokio::test]
async fn unreported_counts_are_keyed_by_hour() {
    let store = InMemoryReportingStore::new();
    for (hour, unreported) in [(3, 4), (1, 2), (2, 3), (2, 1)] {
        store
            .upsert_unreported_count(UnreportedCount {
                hour_start_ms: hour * 3_600_000,
                total_devices: 5,
                reported_devices: 5 - unreported,
                unreported,
                created_at_ms: 0,
            })
            .await
            .expect("upsert");
    }

    let counts = store.list_unreported_counts(2 * 3_600_000).await.expect("list");
    let hours: Vec<(i64, i64)> = counts
        .iter()
        .map(|count| (count.hour_start_ms / 3_600_000, count.unreported))
        .collect();
    assert_eq!(hours, vec![(2, 1), (3, 4)]);

    assert_eq!(
        store
            .prune_unreported_counts_before(3 * 3_600_000)
            .await
            .expect("prune"),
        2
    );
    assert_eq!(store.list_unreported_counts(0).await.expect("list").len(), 1);
}
