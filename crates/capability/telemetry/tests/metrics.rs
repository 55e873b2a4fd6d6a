use bms_telemetry::{
    metrics, new_tick_id, record_temperature_alerts_flushed, record_tick, record_trip_guard_skipped,
};

#[test]
fn tick_ids_are_unique() {
    let a = new_tick_id();
    let b = new_tick_id();
    assert!(!a.is_empty());
    assert_ne!(a, b);
}

#[test]
fn counters_accumulate() {
    let before = metrics().snapshot();
    record_tick(12);
    record_trip_guard_skipped(1);
    record_temperature_alerts_flushed(3);
    let after = metrics().snapshot();
    assert!(after.ticks >= before.ticks + 1);
    assert!(after.tick_latency_ms_total >= before.tick_latency_ms_total + 12);
    assert!(after.trip_guard_skipped >= before.trip_guard_skipped + 1);
    assert!(after.temperature_alerts_flushed >= before.temperature_alerts_flushed + 3);
}
