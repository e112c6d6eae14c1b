//! The single writer of claw state.
//!
//! Every command takes the state lock, mutates, drives the indicator and
//! publishes its events before releasing the lock, so concurrent callers
//! observe commands as if they ran one after another. The heartbeat takes
//! the same lock to read the sugar level.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sweet_indicator::IndicatorDriver;
use sweet_protocol::{BusEvent, Direction, GrabPayload, LayoutObject, Position, SnapshotPayload};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::state::ClawState;
use crate::store::LayoutStore;
use crate::websocket::EventBroadcaster;

// ============================================================================
// Outcomes
// ============================================================================

/// Result of a grab evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrabOutcome {
    /// Whether an object was within reach.
    pub matched: bool,
    /// The grabbed object, or the `None` sentinel.
    pub object: GrabPayload,
}

/// Result of a move command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    /// The accepted direction.
    pub direction: Direction,
    /// Position after the move.
    pub position: Position,
    /// Present when the direction was `grab`.
    pub grab: Option<GrabOutcome>,
}

/// Acknowledgement of a layout replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayoutAck {
    /// Number of objects in the new layout.
    pub count: usize,
    /// Whether the layout reached disk.
    pub persisted: bool,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Owns the claw state and fans every accepted command out to the bus.
#[derive(Debug)]
pub struct Orchestrator {
    state: Mutex<ClawState>,
    bus: EventBroadcaster,
    indicator: IndicatorDriver,
    store: LayoutStore,
}

impl Orchestrator {
    /// Creates an orchestrator around an initial state.
    #[must_use]
    pub fn new(
        state: ClawState,
        bus: EventBroadcaster,
        indicator: IndicatorDriver,
        store: LayoutStore,
    ) -> Self {
        Self {
            state: Mutex::new(state),
            bus,
            indicator,
            store,
        }
    }

    /// Creates an orchestrator whose layout is recovered from `store`.
    pub async fn recover(
        bus: EventBroadcaster,
        indicator: IndicatorDriver,
        store: LayoutStore,
    ) -> Self {
        let layout = store.load_or_empty().await;
        Self::new(ClawState::with_layout(layout), bus, indicator, store)
    }

    /// Subscribes to every event this orchestrator publishes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.bus.subscribe()
    }

    fn publish(&self, event: BusEvent) {
        let name = event.event_name();
        match self.bus.publish(event) {
            Ok(receivers) => debug!(event = name, receivers, "Published"),
            Err(e) => debug!(error = %e, "Publish skipped"),
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Applies a move command.
    ///
    /// For `grab`, the grab is evaluated at `grab_at` when given, otherwise
    /// at the current position.
    pub async fn move_claw(&self, direction: Direction, grab_at: Option<Position>) -> MoveOutcome {
        let mut state = self.state.lock().await;
        let position = state.apply_move(direction);

        self.indicator.set_direction(Some(direction));
        info!(%direction, x = position.x, y = position.y, "Claw moved");
        self.publish(BusEvent::moved(direction, position));

        let grab = (direction == Direction::Grab)
            .then(|| self.evaluate_grab(&mut state, grab_at.unwrap_or(position)));

        MoveOutcome {
            direction,
            position,
            grab,
        }
    }

    /// Grabs at `(x, y)`.
    ///
    /// Publishes `move(grab)` at the current position, then the grab result.
    /// A match adds its sugar to the level and publishes the new `alert`.
    pub async fn grab(&self, x: i32, y: i32) -> GrabOutcome {
        let outcome = self
            .move_claw(Direction::Grab, Some(Position::new(x, y)))
            .await;
        outcome.grab.unwrap_or_else(|| GrabOutcome {
            matched: false,
            object: GrabPayload::none(),
        })
    }

    fn evaluate_grab(&self, state: &mut ClawState, at: Position) -> GrabOutcome {
        let Some(object) = state.find_grab(at.x, at.y).cloned() else {
            info!(x = at.x, y = at.y, "Grab missed");
            self.publish(BusEvent::grab(None));
            return GrabOutcome {
                matched: false,
                object: GrabPayload::none(),
            };
        };

        info!(
            x = at.x,
            y = at.y,
            id = object.id,
            name = %object.name,
            sugar_value = object.sugar_value,
            "Grab matched"
        );
        self.publish(BusEvent::grab(Some(&object)));

        let level = state.add_sugar(object.sugar_value);
        self.publish(BusEvent::alert(level));

        GrabOutcome {
            matched: true,
            object: GrabPayload::from_object(&object),
        }
    }

    /// Replaces the layout and persists it.
    ///
    /// A persistence failure is logged and reported in the acknowledgement;
    /// the in-memory layout is replaced regardless.
    pub async fn set_layout(&self, objects: Vec<LayoutObject>) -> LayoutAck {
        let mut state = self.state.lock().await;
        state.replace_layout(objects);
        let count = state.layout.len();

        let persisted = match self.store.save(&state.layout).await {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %self.store.path().display(), error = %e, "Layout not persisted");
                false
            }
        };

        info!(count, persisted, "Layout replaced");
        LayoutAck { count, persisted }
    }

    /// Replaces the sugar level and publishes it. Returns the stored level.
    pub async fn set_alert_level(&self, level: i64) -> i64 {
        let mut state = self.state.lock().await;
        let level = state.set_level(level);
        info!(level, "Sugar level set");
        self.publish(BusEvent::alert(level));
        level
    }

    /// Signals subscribers to start the ambient loop.
    pub async fn ambient_start(&self) {
        let _state = self.state.lock().await;
        info!("Ambient start");
        self.publish(BusEvent::AmbientStart);
    }

    /// Signals subscribers to stop the ambient loop.
    pub async fn ambient_stop(&self) {
        let _state = self.state.lock().await;
        info!("Ambient stop");
        self.publish(BusEvent::AmbientStop);
    }

    /// Asks visualization clients to reload.
    pub async fn refresh_all(&self) {
        let _state = self.state.lock().await;
        info!("Refresh requested");
        self.publish(BusEvent::RefreshAll);
    }

    /// Returns position, layout and sugar level as one consistent copy.
    pub async fn snapshot(&self) -> SnapshotPayload {
        self.state.lock().await.snapshot()
    }

    // ------------------------------------------------------------------------
    // Heartbeat
    // ------------------------------------------------------------------------

    /// Republishes the current sugar level.
    pub async fn tick(&self) {
        let state = self.state.lock().await;
        self.publish(BusEvent::alert(state.level));
    }

    /// Spawns the heartbeat, ticking every `period` starting now.
    #[must_use]
    pub fn spawn_heartbeat(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                orchestrator.tick().await;
            }
        })
    }

    /// Turns every indicator off, waiting for the writes to land.
    pub async fn shutdown(&self) {
        info!("Clearing indicator");
        self.indicator.clear_all().await;
    }
}

// ============================================================================
// Tests
// ============================================================================
