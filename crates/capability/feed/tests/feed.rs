use axum::Router;
use axum::routing::get;
use bms_feed::{
    DEGENERATE_MESSAGE, FeedError, HttpFeedConfig, HttpTelemetryFeed, StaticFeed, TelemetryFeed,
    parse_payload,
};
use domain::DeviceReading;
use std::collections::BTreeMap;
use std::time::Duration;

const TWO_DEVICES: &str = r#"{"data":[
  {"bms_id":"B1","asset":"EV-01","imei":"861","battery_current":-12,"battery_soc":81,
   "battery_cycle_count":5,"odo_meter":15230.5,"location_latitude":18520400,
   "location_longitude":73856700,"location_speed":32,"location_angle":95,"gps_status":1},
  {"bms_id":"B2","battery_current":3,"battery_soc":40,"battery_cycle_count":9,
   "odo_meter":100,"location_latitude":0,"location_longitude":0,"location_speed":0,
   "location_angle":90}
]}"#;

fn reading(device_id: &str) -> DeviceReading {
    DeviceReading {
        device_id: device_id.to_string(),
        asset: device_id.to_string(),
        battery_current: 0,
        soc: 50,
        cycle_count: 1,
        odometer: 0.0,
        latitude: 0,
        longitude: 0,
        speed: 0,
        angle: 90,
        received_at_ms: 0,
        metadata: BTreeMap::new(),
    }
}

#[test]
fn parses_data_envelope() {
    let readings = parse_payload(TWO_DEVICES, 1_700).expect("parse");
    assert_eq!(readings.len(), 2);
    let first = &readings[0];
    assert_eq!(first.device_id, "B1");
    assert_eq!(first.asset, "EV-01");
    assert_eq!(first.battery_current, -12);
    assert_eq!(first.soc, 81);
    assert_eq!(first.cycle_count, 5);
    assert_eq!(first.odometer, 15230.5);
    assert_eq!(first.latitude, 18_520_400);
    assert_eq!(first.speed, 32);
    assert_eq!(first.angle, 95);
    assert_eq!(first.received_at_ms, 1_700);
    assert_eq!(first.metadata.get("gps_status").map(String::as_str), Some("1"));
    assert_eq!(readings[1].asset, "B2");
    assert_eq!(readings[1].odometer, 100.0);
}

#[test]
fn parses_root_vehicle_data_envelope() {
    let body = r#"{"root":{"vehicle_data":[{"bms_id":"B7","battery_soc":12}]}}"#;
    let readings = parse_payload(body, 0).expect("parse");
    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0].device_id, "B7");
    assert_eq!(readings[0].soc, 12);
}

#[test]
fn rejects_malformed_body() {
    let err = parse_payload("not json", 0).expect_err("decode");
    assert!(matches!(err, FeedError::Decode(_)));
}

#[tokio::test]
async fn static_feed_rejects_degenerate_batches() {
    let feed = StaticFeed::new(vec![reading("B1")]).with_min_devices(2);
    let err = feed.fetch().await.expect_err("degenerate");
    assert!(matches!(err, FeedError::Degenerate(ref msg) if msg == DEGENERATE_MESSAGE));

    feed.replace(vec![reading("B1"), reading("B2")]);
    let readings = feed.fetch().await.expect("fetch");
    assert_eq!(readings.len(), 2);
}

#[tokio::test]
async fn http_feed_fetches_and_maps_payload() {
    let app = Router::new().route("/live", get(|| async { TWO_DEVICES }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let feed = HttpTelemetryFeed::new(HttpFeedConfig {
        url: format!("http://{addr}/live"),
        timeout: Duration::from_secs(5),
        min_devices: 2,
    })
    .expect("client");
    let readings = feed.fetch().await.expect("fetch");
    assert_eq!(readings.len(), 2);
    assert_eq!(readings[0].device_id, "B1");
    assert!(readings[0].received_at_ms > 0);

    let strict = HttpTelemetryFeed::new(HttpFeedConfig {
        url: format!("http://{addr}/live"),
        timeout: Duration::from_secs(5),
        min_devices: 3,
    })
    .expect("client");
    let err = strict.fetch().await.expect_err("degenerate");
    assert!(matches!(err, FeedError::Degenerate(_)));
}

#[tokio::test]
async fn http_feed_reports_status_errors() {
    let app = Router::new();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let feed = HttpTelemetryFeed::new(HttpFeedConfig {
        url: format!("http://{addr}/missing"),
        timeout: Duration::from_secs(5),
        min_devices: 0,
    })
    .expect("client");
    let err = feed.fetch().await.expect_err("404");
    assert!(matches!(err, FeedError::Http(_)));
}
