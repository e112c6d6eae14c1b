//! The feedback state machine.

use std::sync::Arc;
use std::time::Duration;

use sweet_protocol::{BusEvent, Direction};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{AlertCurve, AlertLoop, FeedbackConfig, PlaybackHandle, Sound, SoundBackend};

/// Reacts to bus events with sound.
///
/// Owned by a single task and driven through `&mut self`, so the cooldown
/// check and the handle mutations never race. Dropping the player releases
/// the ambient process and the alert loop.
#[derive(Debug)]
pub struct FeedbackPlayer {
    backend: Arc<dyn SoundBackend>,
    curve: AlertCurve,
    move_cooldown: Duration,
    ambient: Option<Box<dyn PlaybackHandle>>,
    alert_loop: Option<AlertLoop>,
    last_move_cue: Option<Instant>,
}

impl FeedbackPlayer {
    /// Creates an idle player.
    #[must_use]
    pub fn new(backend: Arc<dyn SoundBackend>, curve: AlertCurve, move_cooldown: Duration) -> Self {
        Self {
            backend,
            curve,
            move_cooldown,
            ambient: None,
            alert_loop: None,
            last_move_cue: None,
        }
    }

    /// Creates an idle player using the tuning from `config`.
    #[must_use]
    pub fn from_config(config: &FeedbackConfig, backend: Arc<dyn SoundBackend>) -> Self {
        Self::new(
            backend,
            config.alert,
            Duration::from_millis(config.move_cooldown_ms),
        )
    }

    /// Returns `true` while the ambient loop is playing.
    #[must_use]
    pub const fn is_ambient_active(&self) -> bool {
        self.ambient.is_some()
    }

    /// Interval of the active alert loop, if any.
    #[must_use]
    pub fn alert_interval(&self) -> Option<Duration> {
        self.alert_loop.as_ref().map(AlertLoop::interval)
    }

    /// Handles one event at the current time.
    pub fn handle(&mut self, event: &BusEvent) {
        self.handle_at(event, Instant::now());
    }

    /// Handles one event as if it arrived at `now`.
    pub fn handle_at(&mut self, event: &BusEvent, now: Instant) {
        match event {
            BusEvent::AmbientStart => self.start_ambient(),
            BusEvent::AmbientStop => self.stop_ambient(),
            BusEvent::Move(payload) => self.on_move(payload.direction, now),
            BusEvent::Alert(payload) => self.on_alert(payload.level),
            BusEvent::Grab(_) | BusEvent::RefreshAll | BusEvent::Connected(_) => {
                debug!(event = event.event_name(), "Event has no sound");
            }
        }
    }

    /// Terminates the ambient process and the alert loop.
    ///
    /// Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        self.release_ambient();
        self.stop_alert_loop();
    }

    fn start_ambient(&mut self) {
        if self.ambient.is_some() {
            info!("Ambient loop already playing");
            return;
        }
        info!("Starting ambient loop");
        match self.backend.play_looping(Sound::Ambient) {
            Ok(handle) => self.ambient = Some(handle),
            Err(e) => warn!(error = %e, "Could not start ambient loop"),
        }
    }

    fn stop_ambient(&mut self) {
        info!("Stopping ambient loop");
        self.release_ambient();
        self.stop_alert_loop();
        self.cue(Sound::Stop);
    }

    fn release_ambient(&mut self) {
        if let Some(mut handle) = self.ambient.take() {
            if let Err(e) = handle.terminate() {
                warn!(error = %e, "Could not stop ambient loop");
            }
        }
    }

    fn on_move(&mut self, direction: Direction, now: Instant) {
        if direction == Direction::Grab {
            self.cue(Sound::Grab);
            self.last_move_cue = Some(now);
            return;
        }

        let cooled_down = self
            .last_move_cue
            .map_or(true, |last| now.saturating_duration_since(last) >= self.move_cooldown);

        if cooled_down {
            self.cue(Sound::Move);
            self.last_move_cue = Some(now);
        } else {
            debug!(%direction, "Move cue debounced");
        }
    }

    fn on_alert(&mut self, level: i64) {
        let Some(interval) = self.curve.interval_for(level) else {
            if self.alert_loop.is_some() {
                info!(level, "Sugar level back to normal, alert stopped");
            }
            self.stop_alert_loop();
            return;
        };

        if self.alert_interval() == Some(interval) {
            return;
        }

        self.stop_alert_loop();
        info!(level, interval_ms = interval.as_millis(), "Sugar alert active");
        self.alert_loop = Some(AlertLoop::start(Arc::clone(&self.backend), interval));
    }

    fn stop_alert_loop(&mut self) {
        if let Some(alert) = self.alert_loop.take() {
            alert.stop();
        }
    }

    fn cue(&self, sound: Sound) {
        if let Err(e) = self.backend.play_once(sound) {
            warn!(%sound, error = %e, "Cue failed");
        }
    }
}

impl Drop for FeedbackPlayer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
