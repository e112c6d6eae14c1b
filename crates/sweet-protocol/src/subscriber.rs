//! Websocket subscriber for the event bus.
//!
//! Subscriber processes (audio feedback, standalone indicator) connect to the
//! orchestrator's `/bus` endpoint and receive decoded [`BusEvent`]s through an
//! `mpsc` channel. The connection is re-established after a fixed delay when
//! it drops. Events published while disconnected are lost.

use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::{BusEvent, Envelope};

/// Delay between reconnection attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Buffer of decoded events waiting for the consumer.
const EVENT_BUFFER: usize = 64;

/// Connects to the bus and forwards decoded events.
///
/// # Example
///
/// ```no_run
/// use sweet_protocol::BusSubscriber;
///
/// # async fn example() {
/// let (mut events, _task) = BusSubscriber::new("ws://127.0.0.1:4000/bus?channel=motion").spawn();
/// while let Some(event) = events.recv().await {
///     println!("{}", event.event_name());
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BusSubscriber {
    url: String,
    reconnect_delay: Duration,
}

/// Why a single connection ended.
enum ConnectionEnd {
    /// The socket closed or errored; try again.
    Disconnected,
    /// Nobody is listening for events anymore; stop for good.
    ConsumerGone,
}

impl BusSubscriber {
    /// Creates a subscriber for the given websocket URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    /// Overrides the reconnection delay.
    #[must_use]
    pub const fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Returns the websocket URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Spawns the connection task.
    ///
    /// The task ends when the returned receiver is dropped.
    #[must_use]
    pub fn spawn(self) -> (mpsc::Receiver<BusEvent>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let handle = tokio::spawn(self.run(tx));
        (rx, handle)
    }

    async fn run(self, tx: mpsc::Sender<BusEvent>) {
        loop {
            match connect_async(self.url.as_str()).await {
                Ok((mut stream, _)) => {
                    info!(url = %self.url, "Connected to event bus");

                    if let ConnectionEnd::ConsumerGone = forward(&mut stream, &tx).await {
                        debug!("Event consumer dropped, closing bus subscription");
                        return;
                    }
                    warn!(url = %self.url, "Event bus connection lost");
                }
                Err(e) => {
                    warn!(url = %self.url, error = %e, "Failed to connect to event bus");
                }
            }

            if tx.is_closed() {
                return;
            }
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }
}

/// Decodes frames from one connection until it ends.
async fn forward<S>(incoming: &mut S, tx: &mpsc::Sender<BusEvent>) -> ConnectionEnd
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(frame) = incoming.next().await {
        match frame {
            Ok(Message::Text(text)) => match Envelope::parse(&text) {
                Ok(event) => {
                    if tx.send(event).await.is_err() {
                        return ConnectionEnd::ConsumerGone;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Dropping undecodable bus message");
                }
            },
            Ok(Message::Close(_)) => {
                debug!("Bus sent close frame");
                break;
            }
            Ok(_) => {
                // Ping/pong are answered by tungstenite; binary frames are not part of the protocol.
            }
            Err(e) => {
                debug!(error = %e, "Bus stream error");
                break;
            }
        }
    }
    ConnectionEnd::Disconnected
}
