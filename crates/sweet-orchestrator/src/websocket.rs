//! The event bus: an in-process broadcast channel served over websocket.
//!
//! Every message is a JSON text frame `{"channel","event","data"}`. A client
//! may restrict itself to one channel with `GET /bus?channel=motion`.
//! Clients that listen on `system` receive a `connected` snapshot before any
//! live event.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::{Sink, SinkExt, StreamExt};
use serde::Deserialize;
use sweet_protocol::{BusEvent, Channel};
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::api::{AppState, ErrorResponse};

// ============================================================================
// Event Broadcaster
// ============================================================================

/// Errors raised while publishing to the bus.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// Nobody is listening; the event was dropped.
    #[error("no bus subscribers connected, '{event}' dropped")]
    NoSubscribers {
        /// Name of the dropped event.
        event: &'static str,
    },
}

/// Fans bus events out to every connected websocket client.
///
/// Events are not retained for clients that connect later.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<BusEvent>,
}

impl EventBroadcaster {
    /// Creates a broadcaster buffering `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new subscriber.
    ///
    /// A subscriber that falls more than `capacity` events behind receives
    /// `Lagged` and skips ahead.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event, returning how many subscribers will see it.
    ///
    /// # Errors
    ///
    /// Returns `BusError::NoSubscribers` when nobody is connected.
    pub fn publish(&self, event: BusEvent) -> Result<usize, BusError> {
        let name = event.event_name();
        self.sender
            .send(event)
            .map_err(|_| BusError::NoSubscribers { event: name })
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

// ============================================================================
// WebSocket Handler
// ============================================================================

/// Query string of `GET /bus`.
#[derive(Debug, Default, Deserialize)]
pub struct BusQuery {
    /// Restrict the connection to one channel.
    pub channel: Option<String>,
}

/// Parses the `channel` query parameter.
fn parse_channel(raw: &str) -> Option<Channel> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "motion" => Some(Channel::Motion),
        "system" => Some(Channel::System),
        _ => None,
    }
}

/// Seconds between heartbeat pings.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Maximum number of missed pong responses before disconnecting.
const MAX_MISSED_PONGS: u8 = 3;

/// Handler for `GET /bus`.
///
/// Upgrades the connection and streams bus events to the client.
pub async fn bus_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<BusQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let filter = match query.channel.as_deref() {
        None => None,
        Some(raw) => match parse_channel(raw) {
            Some(channel) => Some(channel),
            None => {
                let body = Json(ErrorResponse {
                    error: format!("Unknown channel '{raw}'"),
                });
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
        },
    };

    info!(channel = ?filter.map(|c| c.as_str()), "New bus connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, state, filter))
}

/// Serializes `event` and sends it if it passes the channel filter.
///
/// Returns `false` when the client is gone.
async fn forward<S>(sender: &mut S, event: &BusEvent, filter: Option<Channel>) -> bool
where
    S: Sink<Message> + Unpin,
{
    if filter.is_some_and(|c| c != event.channel()) {
        return true;
    }
    let json = match event.to_json() {
        Ok(json) => json,
        Err(e) => {
            warn!(event = event.event_name(), error = %e, "Failed to serialize bus event");
            return true;
        }
    };
    sender.send(Message::Text(json)).await.is_ok()
}

/// Handles a single bus connection.
///
/// - Subscribes before reading the snapshot so no event falls in between
/// - Sends `system/connected` if the filter allows it
/// - Forwards live events, skipping ahead on lag
/// - Pings every 30 seconds, closing after 3 missed pongs
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, filter: Option<Channel>) {
    let (mut sender, mut receiver) = socket.split();

    let mut event_receiver = state.orchestrator.subscribe();

    let snapshot = BusEvent::Connected(state.orchestrator.snapshot().await);
    if !forward(&mut sender, &snapshot, filter).await {
        debug!("Client disconnected before receiving snapshot");
        return;
    }

    info!("Bus client connected");

    let mut heartbeat = interval(PING_INTERVAL);
    heartbeat.tick().await;
    let mut missed_pongs = 0u8;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        missed_pongs = 0;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Bus client requested close");
                        break;
                    }
                    Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                        debug!("Ignoring message from bus client");
                    }
                    Some(Err(e)) => {
                        debug!(error = %e, "Bus socket error");
                        break;
                    }
                    None => break,
                }
            }

            event = event_receiver.recv() => {
                match event {
                    Ok(event) => {
                        if !forward(&mut sender, &event, filter).await {
                            debug!("Failed to send event, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "Bus client lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Broadcaster closed");
                        break;
                    }
                }
            }

            _ = heartbeat.tick() => {
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
                missed_pongs += 1;
                if missed_pongs >= MAX_MISSED_PONGS {
                    info!(missed = MAX_MISSED_PONGS, "Bus client stopped answering pings");
                    break;
                }
            }
        }
    }

    info!("Bus client disconnected");
}

// ============================================================================
// Tests
// ============================================================================
