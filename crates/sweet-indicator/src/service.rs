//! Standalone indicator process: lights LEDs from bus `move` events.

use std::future::Future;

use sweet_protocol::BusEvent;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::IndicatorDriver;

/// Feeds `move` events to `driver` until `shutdown` resolves or the event
/// stream ends, then clears every LED.
pub async fn run(
    driver: IndicatorDriver,
    mut events: mpsc::Receiver<BusEvent>,
    shutdown: impl Future<Output = ()>,
) {
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("Shutdown requested, clearing indicators");
                break;
            }
            event = events.recv() => match event {
                Some(BusEvent::Move(payload)) => driver.set_direction(Some(payload.direction)),
                Some(_) => {}
                None => {
                    warn!("Event stream closed");
                    break;
                }
            }
        }
    }

    driver.clear_all().await;
}
