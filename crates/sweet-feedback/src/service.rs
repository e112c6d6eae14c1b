//! Event loop feeding the player.

use std::future::Future;

use sweet_protocol::BusEvent;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::FeedbackPlayer;

/// Drives `player` with `events` until `shutdown` resolves or the event
/// stream ends, then releases every running sound.
pub async fn run(
    mut player: FeedbackPlayer,
    mut events: mpsc::Receiver<BusEvent>,
    shutdown: impl Future<Output = ()>,
) {
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!(
                    ambient = player.is_ambient_active(),
                    alert_ms = player.alert_interval().map(|i| i.as_millis()),
                    "Shutdown requested, stopping feedback player"
                );
                break;
            }
            event = events.recv() => {
                let Some(event) = event else {
                    warn!("Event stream closed");
                    break;
                };
                player.handle(&event);
            }
        }
    }

    player.shutdown();
}
