//! Integration tests for the orchestrator's HTTP command surface.
//!
//! Each test boots a full server on a free port with a simulated indicator
//! and a layout file in a temporary directory.

use std::net::TcpListener;
use std::time::Duration;

use serde_json::{json, Value};
use sweet_orchestrator::{bootstrap, create_router, Config};
use tempfile::TempDir;

/// Helper to find an available port for testing.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Configuration that never touches real hardware.
fn test_config(temp: &TempDir) -> Config {
    let mut config = Config::default();
    config.core.layout_file = temp.path().join("data").join("layout.json");
    config.indicator.simulate = Some(true);
    config
}

/// Boots the orchestrator and returns its base URL.
async fn spawn_test_server(config: &Config) -> (String, tokio::task::JoinHandle<()>) {
    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");

    let state = bootstrap(config).await.expect("Failed to bootstrap");
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://{addr}"), handle)
}

async fn post(base: &str, path: &str, body: Value) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(format!("{base}{path}"))
        .json(&body)
        .send()
        .await
        .expect("Request failed");
    let status = response.status().as_u16();
    (status, response.json().await.expect("Body was not JSON"))
}

async fn get(base: &str, path: &str) -> Value {
    reqwest::get(format!("{base}{path}"))
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Body was not JSON")
}

// ============================================================================
// Move
// ============================================================================

#[tokio::test]
async fn test_up_up_reset_from_origin() {
    let temp = TempDir::new().unwrap();
    let (base, _handle) = spawn_test_server(&test_config(&temp)).await;

    let expected = [
        ("up", json!({"x": 0, "y": -30})),
        ("up", json!({"x": 0, "y": -60})),
        ("reset", json!({"x": 0, "y": 0})),
    ];
    for (direction, position) in expected {
        let (status, body) = post(&base, "/move", json!({"direction": direction})).await;
        assert_eq!(status, 200);
        assert_eq!(body["ok"], true);
        assert_eq!(body["direction"], direction);
        assert_eq!(body["position"], position);
    }
}

#[tokio::test]
async fn test_position_never_leaves_bounds() {
    let temp = TempDir::new().unwrap();
    let (base, _handle) = spawn_test_server(&test_config(&temp)).await;

    for _ in 0..6 {
        post(&base, "/move", json!({"direction": "right"})).await;
    }
    let state = get(&base, "/state").await;
    assert_eq!(state["position"], json!({"x": 120, "y": 0}));
}

#[tokio::test]
async fn test_bad_move_commands_are_400() {
    let temp = TempDir::new().unwrap();
    let (base, _handle) = spawn_test_server(&test_config(&temp)).await;

    let (status, body) = post(&base, "/move", json!({})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "No direction provided");

    let (status, _) = post(&base, "/move", json!({"direction": "diagonal"})).await;
    assert_eq!(status, 400);

    let state = get(&base, "/state").await;
    assert_eq!(state["position"], json!({"x": 0, "y": 0}));
}

// ============================================================================
// Layout and grab
// ============================================================================

#[tokio::test]
async fn test_candy_grab_scenario() {
    let temp = TempDir::new().unwrap();
    let (base, _handle) = spawn_test_server(&test_config(&temp)).await;

    let layout = json!({"objects": [
        {"id": 1, "name": "Candy", "sugarValue": 15, "x": 10, "y": 10}
    ]});
    let (status, ack) = post(&base, "/layout", layout).await;
    assert_eq!(status, 200);
    assert_eq!(ack, json!({"ok": true, "count": 1, "persisted": true}));

    let (status, hit) = post(&base, "/grab", json!({"position": {"x": 15, "y": 5}})).await;
    assert_eq!(status, 200);
    assert_eq!(hit["matched"], true);
    assert_eq!(hit["object"]["name"], "Candy");
    assert_eq!(hit["object"]["sugarValue"], 15);

    let (_, miss) = post(&base, "/grab", json!({"position": {"x": 200, "y": 200}})).await;
    assert_eq!(miss["matched"], false);
    assert_eq!(miss["object"], json!({"name": "None", "sugarValue": 0}));

    let state = get(&base, "/state").await;
    assert_eq!(state["level"], 135);
    assert_eq!(state["layout"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_layout_survives_restart() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);

    let (base, handle) = spawn_test_server(&config).await;
    let layout = json!({"objects": [
        {"id": 2, "name": "Chocolate", "sugarValue": 25, "x": -30, "y": 60},
        {"id": 4, "name": "Lollipop", "sugarValue": 30, "x": 90, "y": 90}
    ]});
    post(&base, "/objects_layout", layout).await;
    handle.abort();

    let (base, _handle) = spawn_test_server(&config).await;
    let state = get(&base, "/state").await;
    let names: Vec<_> = state["layout"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["Chocolate", "Lollipop"]);
    assert_eq!(state["position"], json!({"x": 0, "y": 0}));
    assert_eq!(state["level"], 120);
}

#[tokio::test]
async fn test_corrupt_layout_file_starts_empty() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);
    std::fs::create_dir_all(config.core.layout_file.parent().unwrap()).unwrap();
    std::fs::write(&config.core.layout_file, "not json at all").unwrap();

    let (base, _handle) = spawn_test_server(&config).await;
    let state = get(&base, "/state").await;
    assert_eq!(state["layout"], json!([]));
}

#[tokio::test]
async fn test_layout_rejects_non_array() {
    let temp = TempDir::new().unwrap();
    let (base, _handle) = spawn_test_server(&test_config(&temp)).await;

    let (status, _) = post(&base, "/layout", json!({"objects": 5})).await;
    assert_eq!(status, 400);
}

// ============================================================================
// Alert and catalog
// ============================================================================

#[tokio::test]
async fn test_alert_level_round_trip() {
    let temp = TempDir::new().unwrap();
    let (base, _handle) = spawn_test_server(&test_config(&temp)).await;

    let (status, body) = post(&base, "/alert", json!({"level": 210})).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"ok": true, "level": 210}));

    let (status, _) = post(&base, "/alert", json!({"level": "very"})).await;
    assert_eq!(status, 400);

    assert_eq!(get(&base, "/state").await["level"], 210);
}

#[tokio::test]
async fn test_objects_catalog() {
    let temp = TempDir::new().unwrap();
    let (base, _handle) = spawn_test_server(&test_config(&temp)).await;

    let objects = get(&base, "/objects").await;
    let names: Vec<_> = objects
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Candy", "Chocolate", "Gummy Bear", "Lollipop"]);
}
