//! Integration tests for the `/bus` websocket and the subscriber client.
//!
//! These drive the orchestrator over HTTP and observe what bus clients
//! receive, including clients that filter by channel.

use std::net::TcpListener;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use sweet_orchestrator::{bootstrap, create_router, AppState, Config};
use sweet_protocol::{
    AlertPayload, BusEvent, BusSubscriber, Direction, Envelope, GrabPayload, MovePayload, Position,
};
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Helper to find an available port for testing.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// A running orchestrator plus the handles a test needs.
struct TestServer {
    http: String,
    ws: String,
    state: AppState,
    _temp: TempDir,
    _handle: tokio::task::JoinHandle<()>,
}

async fn spawn_test_server() -> TestServer {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let mut config = Config::default();
    config.core.layout_file = temp.path().join("layout.json");
    config.indicator.simulate = Some(true);

    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");

    let state = bootstrap(&config).await.expect("Failed to bootstrap");
    let router = create_router(state.clone());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        http: format!("http://{addr}"),
        ws: format!("ws://{addr}/bus"),
        state,
        _temp: temp,
        _handle: handle,
    }
}

/// Connects to the bus and waits until the server has registered the client.
async fn connect_client(url: &str) -> WsStream {
    let (ws, _) = connect_async(url).await.expect("Failed to connect");
    tokio::time::sleep(Duration::from_millis(50)).await;
    ws
}

/// Receives the next bus event, answering pings along the way.
async fn receive_event(ws: &mut WsStream) -> Option<BusEvent> {
    let timeout = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    return Some(Envelope::parse(&text).expect("Undecodable bus frame"));
                }
                Ok(Message::Ping(data)) => {
                    let _ = ws.send(Message::Pong(data)).await;
                }
                Ok(Message::Close(_)) | Err(_) => return None,
                _ => {}
            }
        }
        None
    });

    timeout.await.ok().flatten()
}

async fn post(base: &str, path: &str, body: Value) -> u16 {
    reqwest::Client::new()
        .post(format!("{base}{path}"))
        .json(&body)
        .send()
        .await
        .expect("Request failed")
        .status()
        .as_u16()
}

// ============================================================================
// Connection Tests
// ============================================================================

#[tokio::test]
async fn test_unfiltered_client_gets_snapshot_first() {
    let server = spawn_test_server().await;
    post(&server.http, "/alert", json!({"level": 180})).await;

    let mut ws = connect_client(&server.ws).await;
    match receive_event(&mut ws).await {
        Some(BusEvent::Connected(snapshot)) => {
            assert_eq!(snapshot.position, Position::new(0, 0));
            assert_eq!(snapshot.level, 180);
            assert!(snapshot.layout.is_empty());
        }
        other => panic!("Expected connected snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_channel_is_rejected() {
    let server = spawn_test_server().await;
    let result = connect_async(format!("{}?channel=video", server.ws)).await;
    assert!(result.is_err());
}

// ============================================================================
// Event Ordering Tests
// ============================================================================

#[tokio::test]
async fn test_moves_arrive_in_command_order() {
    let server = spawn_test_server().await;
    let mut ws = connect_client(&server.ws).await;
    assert!(matches!(receive_event(&mut ws).await, Some(BusEvent::Connected(_))));

    for direction in ["up", "up", "left", "reset"] {
        assert_eq!(post(&server.http, "/move", json!({"direction": direction})).await, 200);
    }

    let expected = [
        (Direction::Up, 0, -30),
        (Direction::Up, 0, -60),
        (Direction::Left, -30, -60),
        (Direction::Reset, 0, 0),
    ];
    for (direction, x, y) in expected {
        assert_eq!(
            receive_event(&mut ws).await,
            Some(BusEvent::Move(MovePayload { direction, x, y }))
        );
    }
}

#[tokio::test]
async fn test_grab_publishes_move_grab_then_alert() {
    let server = spawn_test_server().await;
    let layout = json!({"objects": [
        {"id": 1, "name": "Candy", "sugarValue": 15, "x": 10, "y": 10}
    ]});
    assert_eq!(post(&server.http, "/layout", layout).await, 200);

    let mut ws = connect_client(&format!("{}?channel=motion", server.ws)).await;
    assert_eq!(
        post(&server.http, "/grab", json!({"position": {"x": 15, "y": 5}})).await,
        200
    );

    assert_eq!(
        receive_event(&mut ws).await,
        Some(BusEvent::Move(MovePayload {
            direction: Direction::Grab,
            x: 0,
            y: 0,
        }))
    );
    match receive_event(&mut ws).await {
        Some(BusEvent::Grab(payload)) => {
            assert_eq!(payload.name, "Candy");
            assert_eq!(payload.sugar_value, 15);
        }
        other => panic!("Expected grab event, got {other:?}"),
    }
    assert_eq!(
        receive_event(&mut ws).await,
        Some(BusEvent::Alert(AlertPayload { level: 135 }))
    );
}

#[tokio::test]
async fn test_missed_grab_publishes_none() {
    let server = spawn_test_server().await;
    let mut ws = connect_client(&format!("{}?channel=motion", server.ws)).await;

    post(&server.http, "/grab", json!({"x": 200, "y": 200})).await;

    assert!(matches!(
        receive_event(&mut ws).await,
        Some(BusEvent::Move(MovePayload { direction: Direction::Grab, .. }))
    ));
    assert_eq!(receive_event(&mut ws).await, Some(BusEvent::Grab(GrabPayload::none())));
}

// ============================================================================
// Channel Filter Tests
// ============================================================================

#[tokio::test]
async fn test_motion_filter_skips_system_events() {
    let server = spawn_test_server().await;
    let mut ws = connect_client(&format!("{}?channel=motion", server.ws)).await;

    post(&server.http, "/refresh", json!({})).await;
    post(&server.http, "/ambient_start", json!({})).await;
    post(&server.http, "/ambient_stop", json!({})).await;

    assert_eq!(receive_event(&mut ws).await, Some(BusEvent::AmbientStart));
    assert_eq!(receive_event(&mut ws).await, Some(BusEvent::AmbientStop));
}

#[tokio::test]
async fn test_system_filter_skips_motion_events() {
    let server = spawn_test_server().await;
    let mut ws = connect_client(&format!("{}?channel=system", server.ws)).await;
    assert!(matches!(receive_event(&mut ws).await, Some(BusEvent::Connected(_))));

    post(&server.http, "/move", json!({"direction": "down"})).await;
    post(&server.http, "/alert", json!({"level": 90})).await;
    post(&server.http, "/refresh", json!({})).await;

    assert_eq!(receive_event(&mut ws).await, Some(BusEvent::RefreshAll));
}

// ============================================================================
// Subscriber Tests
// ============================================================================

#[tokio::test]
async fn test_subscriber_receives_heartbeat() {
    let server = spawn_test_server().await;
    post(&server.http, "/alert", json!({"level": 240})).await;

    let heartbeat = server
        .state
        .orchestrator
        .spawn_heartbeat(Duration::from_millis(50));
    let (mut events, task) = BusSubscriber::new(format!("{}?channel=motion", server.ws))
        .with_reconnect_delay(Duration::from_millis(50))
        .spawn();

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("Timed out waiting for heartbeat");
    assert_eq!(event, Some(BusEvent::Alert(AlertPayload { level: 240 })));

    heartbeat.abort();
    task.abort();
}

#[tokio::test]
async fn test_subscriber_receives_commands() {
    let server = spawn_test_server().await;
    let (mut events, task) = BusSubscriber::new(format!("{}?channel=motion", server.ws))
        .with_reconnect_delay(Duration::from_millis(50))
        .spawn();

    // The subscriber connects asynchronously; repeat the command until it lands.
    let received = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            post(&server.http, "/move", json!({"direction": "right"})).await;
            if let Ok(Some(event)) =
                tokio::time::timeout(Duration::from_millis(100), events.recv()).await
            {
                return event;
            }
        }
    })
    .await
    .expect("Subscriber never received a move");

    assert!(matches!(
        received,
        BusEvent::Move(MovePayload { direction: Direction::Right, y: 0, .. })
    ));
    task.abort();
}
