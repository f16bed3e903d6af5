//! End-to-end tests driving the real router.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use coldtrace_core::config::StorageConfig;
use coldtrace_core::{
    AlertPolicy, AlertTracker, BroadcastHub, Config, MemoryStore, Notifier, NotifyError,
    ReadingPipeline, StorageBackend, TemperatureAlert,
};
use coldtrace_server::api::create_router;
use coldtrace_server::state::AppState;
use serde_json::{json, Value};
use tokio::sync::mpsc;

const IN_RANGE: &str = "TRK;865412345678;AC233FA1B2C3;0D1010A50BB86400FF1A2B3C00";
const OTHER_SENSOR: &str = "TRK;865412345678;DD44EE55FF66;0D1010A50BB86400FF1A2B3C00";
const TOO_HOT: &str = "TRK;865412345678;AC233FA1B2C3;0D1010A50FA06400FF1A2B3C00";

struct RecordingNotifier {
    sent: mpsc::UnboundedSender<TemperatureAlert>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, alert: &TemperatureAlert) -> Result<(), NotifyError> {
        let _ = self.sent.send(alert.clone());
        Ok(())
    }
}

fn server_with_policy(policy: AlertPolicy) -> (TestServer, mpsc::UnboundedReceiver<TemperatureAlert>) {
    let (sent, alerts) = mpsc::unbounded_channel();
    let pipeline = ReadingPipeline::new(
        AlertTracker::new(policy),
        BroadcastHub::new(8),
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingNotifier { sent }),
        Duration::from_secs(2),
    );
    let state = AppState::new(Config::default(), pipeline);
    let server = TestServer::builder()
        .http_transport()
        .build(create_router(state))
        .unwrap();
    (server, alerts)
}

fn server() -> TestServer {
    server_with_policy(AlertPolicy::default()).0
}

#[tokio::test]
async fn ingest_returns_decoded_reading() {
    let server = server();

    let response = server
        .post("/api/readings")
        .json(&json!({ "sensor_data": IN_RANGE }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["sensorMac"], "AC233FA1B2C3");
    assert_eq!(body["imei"], "865412345678");
    assert_eq!(body["trackingHead"], "TRK");
    assert_eq!(body["temperature"], 30.0);
    assert_eq!(body["humidity"], 50.0);
    assert!(body["id"].is_string());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn malformed_record_is_rejected() {
    let server = server();

    let response = server
        .post("/api/readings")
        .json(&json!({ "sensor_data": "TRK;865412345678;AC233FA1B2C3;0D10" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "malformed_format");

    let recent: Vec<Value> = server.get("/api/readings").await.json();
    assert!(recent.is_empty());
}

#[tokio::test]
async fn missing_sensor_data_field_is_client_error() {
    let server = server();

    let response = server
        .post("/api/readings")
        .json(&json!({ "data": IN_RANGE }))
        .await;

    assert!(response.status_code().is_client_error());
}

#[tokio::test]
async fn recent_readings_are_limited_and_newest_first() {
    let server = server();
    let mut ids = Vec::new();

    for _ in 0..7 {
        let body: Value = server
            .post("/api/readings")
            .json(&json!({ "sensor_data": IN_RANGE }))
            .await
            .json();
        ids.push(body["id"].as_str().unwrap().to_string());
    }

    let response = server.get("/api/readings").await;
    response.assert_status_ok();
    let recent: Vec<Value> = response.json();

    assert_eq!(recent.len(), 5);
    let got: Vec<&str> = recent.iter().map(|r| r["id"].as_str().unwrap()).collect();
    let expected: Vec<&str> = ids.iter().rev().take(5).map(String::as_str).collect();
    assert_eq!(got, expected);
}

#[tokio::test]
async fn legacy_paths_reach_same_handlers() {
    let server = server();

    server
        .post("/endpoint")
        .json(&json!({ "sensor_data": IN_RANGE }))
        .await
        .assert_status_ok();

    let recent: Vec<Value> = server.get("/sensor-data").await.json();
    assert_eq!(recent.len(), 1);

    for path in ["/ws", "/ws/"] {
        server
            .get_websocket(path)
            .await
            .assert_status_switching_protocols();
    }
}

/// Wait until `/health` reports `expected` live subscribers.
async fn wait_for_subscribers(server: &TestServer, expected: u64) {
    for _ in 0..200 {
        let health: Value = server.get("/health").await.json();
        if health["subscribers"].as_u64() == Some(expected) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("subscriber count never reached {expected}");
}

async fn ingest(server: &TestServer, raw: &str) -> Value {
    let response = server
        .post("/api/readings")
        .json(&json!({ "sensor_data": raw }))
        .await;
    response.assert_status_ok();
    response.json()
}

#[tokio::test]
async fn live_feed_sends_each_reading_as_json() {
    let server = server();
    let mut feed = server.get_websocket("/api/ws").await.into_websocket().await;
    wait_for_subscribers(&server, 1).await;

    let first = ingest(&server, IN_RANGE).await;
    let second = ingest(&server, OTHER_SENSOR).await;

    let received: Value = feed.receive_json().await;
    assert_eq!(received, first);
    let received: Value = feed.receive_json().await;
    assert_eq!(received["id"], second["id"]);
    assert_eq!(received["sensorMac"], "DD44EE55FF66");
}

#[tokio::test]
async fn live_feed_does_not_replay_history() {
    let server = server();
    ingest(&server, IN_RANGE).await;

    let mut feed = server.get_websocket("/api/ws").await.into_websocket().await;
    wait_for_subscribers(&server, 1).await;
    let fresh = ingest(&server, OTHER_SENSOR).await;

    let received: Value = feed.receive_json().await;
    assert_eq!(received["id"], fresh["id"]);
}

#[tokio::test]
async fn closing_live_feed_unsubscribes() {
    let server = server();
    let feed = server.get_websocket("/ws/").await.into_websocket().await;
    wait_for_subscribers(&server, 1).await;

    feed.close().await;

    wait_for_subscribers(&server, 0).await;
    // Publishing with nobody listening still succeeds.
    ingest(&server, IN_RANGE).await;
}

#[tokio::test]
async fn sustained_out_of_range_sends_one_alert() {
    let policy = AlertPolicy {
        debounce: chrono::Duration::zero(),
        ..AlertPolicy::default()
    };
    let (server, mut alerts) = server_with_policy(policy);

    for _ in 0..2 {
        server
            .post("/api/readings")
            .json(&json!({ "sensor_data": TOO_HOT }))
            .await
            .assert_status_ok();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let alert = tokio::time::timeout(Duration::from_secs(2), alerts.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alert.reading.sensor_mac(), "AC233FA1B2C3");
    assert!((alert.reading.temperature_c() - 40.0).abs() < f64::EPSILON);
    assert!(alerts.try_recv().is_err());

    let health: Value = server.get("/health").await.json();
    assert_eq!(health["tracked_devices"], 0);
}

#[tokio::test]
async fn health_reports_tracked_devices() {
    let server = server();

    server
        .post("/api/readings")
        .json(&json!({ "sensor_data": TOO_HOT }))
        .await
        .assert_status_ok();

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["subscribers"], 0);
    assert_eq!(body["tracked_devices"], 1);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let server = server();

    let response = server.get("/api/openapi.json").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["info"]["title"], "coldtrace API");
    assert!(body["paths"]["/api/readings"].is_object());
}

#[tokio::test]
async fn json_lines_backend_persists_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        storage: StorageConfig {
            backend: StorageBackend::JsonLines,
            data_dir: dir.path().to_path_buf(),
            ..StorageConfig::default()
        },
        ..Config::default()
    };

    let first = TestServer::new(create_router(AppState::from_config(config.clone()).unwrap())).unwrap();
    first
        .post("/api/readings")
        .json(&json!({ "sensor_data": IN_RANGE }))
        .await
        .assert_status_ok();
    drop(first);

    let second = TestServer::new(create_router(AppState::from_config(config).unwrap())).unwrap();
    let recent: Vec<Value> = second.get("/api/readings").await.json();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0]["sensorMac"], "AC233FA1B2C3");
}
