//! End-to-end tests for the audio feedback process.
//!
//! A real orchestrator publishes on `/bus`, a `BusSubscriber` receives the
//! motion channel, and `sweet_feedback::run` drives a player whose backend
//! records every sound instead of playing it.

use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use sweet_feedback::{
    AlertCurve, FeedbackError, FeedbackPlayer, PlaybackHandle, Sound, SoundBackend,
};
use sweet_orchestrator::{bootstrap, create_router, Config};
use sweet_protocol::BusSubscriber;
use tempfile::TempDir;
use tokio::sync::oneshot;

/// Helper to find an available port for testing.
fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Records `once:<sound>` and `loop:<sound>` entries.
#[derive(Debug, Default)]
struct Recorder {
    log: Mutex<Vec<String>>,
    live_loops: Arc<AtomicUsize>,
}

impl Recorder {
    fn count(&self, entry: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.as_str() == entry)
            .count()
    }

    fn live_loops(&self) -> usize {
        self.live_loops.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct RecordedLoop {
    live_loops: Arc<AtomicUsize>,
    active: bool,
}

impl PlaybackHandle for RecordedLoop {
    fn terminate(&mut self) -> Result<(), FeedbackError> {
        if self.active {
            self.active = false;
            self.live_loops.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl SoundBackend for Recorder {
    fn name(&self) -> &'static str {
        "recorder"
    }

    fn play_once(&self, sound: Sound) -> Result<(), FeedbackError> {
        self.log.lock().unwrap().push(format!("once:{sound}"));
        Ok(())
    }

    fn play_looping(&self, sound: Sound) -> Result<Box<dyn PlaybackHandle>, FeedbackError> {
        self.log.lock().unwrap().push(format!("loop:{sound}"));
        self.live_loops.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordedLoop {
            live_loops: Arc::clone(&self.live_loops),
            active: true,
        }))
    }
}

/// Polls `check` until it holds or five seconds pass.
async fn wait_until(what: &str, check: impl Fn() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "Timed out waiting for {what}");
}

async fn post(base: &str, path: &str, body: Value) {
    let status = reqwest::Client::new()
        .post(format!("{base}{path}"))
        .json(&body)
        .send()
        .await
        .expect("Request failed")
        .status();
    assert!(status.is_success(), "{path} returned {status}");
}

#[tokio::test]
async fn test_bus_commands_drive_the_player() {
    let temp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.core.layout_file = temp.path().join("layout.json");
    config.indicator.simulate = Some(true);

    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");
    let router = create_router(bootstrap(&config).await.expect("Failed to bootstrap"));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");
    let _server = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });
    let base = format!("http://{addr}");

    let recorder = Arc::new(Recorder::default());
    let player = FeedbackPlayer::new(
        recorder.clone(),
        AlertCurve::default(),
        Duration::from_millis(200),
    );
    let (events, subscriber) = BusSubscriber::new(format!("ws://{addr}/bus?channel=motion"))
        .with_reconnect_delay(Duration::from_millis(50))
        .spawn();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let service = tokio::spawn(sweet_feedback::run(player, events, async {
        let _ = stop_rx.await;
    }));

    // The subscriber connects in the background; ambient_start is idempotent,
    // so repeat it until the loop is playing.
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while recorder.count("loop:ambient") == 0 {
            post(&base, "/ambient_start", json!({})).await;
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "Ambient loop never started");
    assert_eq!(recorder.live_loops(), 1);

    post(&base, "/move", json!({"direction": "up"})).await;
    wait_until("move cue", || recorder.count("once:move") >= 1).await;

    // Grab right after a move is never debounced.
    post(&base, "/grab", json!({"x": 200, "y": 200})).await;
    wait_until("grab cue", || recorder.count("once:grab") == 1).await;

    post(&base, "/alert", json!({"level": 260})).await;
    wait_until("alert tone", || recorder.count("once:alert") >= 1).await;

    post(&base, "/ambient_stop", json!({})).await;
    wait_until("stop cue", || recorder.count("once:stop") == 1).await;
    assert_eq!(recorder.live_loops(), 0);
    assert_eq!(recorder.count("loop:ambient"), 1);

    // The alert loop stopped with the ambient loop.
    let alerts = recorder.count("once:alert");
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(recorder.count("once:alert"), alerts);

    stop_tx.send(()).unwrap();
    service.await.unwrap();
    subscriber.abort();
    assert_eq!(recorder.live_loops(), 0);
}

#[tokio::test]
async fn test_shutdown_releases_running_loop() {
    let temp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.core.layout_file = temp.path().join("layout.json");
    config.indicator.simulate = Some(true);

    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");
    let router = create_router(bootstrap(&config).await.expect("Failed to bootstrap"));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");
    let _server = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });
    let base = format!("http://{addr}");

    let recorder = Arc::new(Recorder::default());
    let player = FeedbackPlayer::new(
        recorder.clone(),
        AlertCurve::default(),
        Duration::from_millis(200),
    );
    let (events, subscriber) = BusSubscriber::new(format!("ws://{addr}/bus?channel=motion"))
        .with_reconnect_delay(Duration::from_millis(50))
        .spawn();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let service = tokio::spawn(sweet_feedback::run(player, events, async {
        let _ = stop_rx.await;
    }));

    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while recorder.count("loop:ambient") == 0 {
            post(&base, "/ambient_start", json!({})).await;
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "Ambient loop never started");

    // Interrupt without an ambient_stop: the loop must still be released.
    stop_tx.send(()).unwrap();
    service.await.unwrap();
    subscriber.abort();

    assert_eq!(recorder.live_loops(), 0);
    assert_eq!(recorder.count("once:stop"), 0);
}
