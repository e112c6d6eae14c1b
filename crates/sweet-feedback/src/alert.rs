//! Sugar-level alert loop.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::{FeedbackError, Sound, SoundBackend};

const fn default_threshold() -> i64 {
    175
}

const fn default_base_interval_ms() -> u64 {
    1500
}

const fn default_min_interval_ms() -> u64 {
    200
}

const fn default_slope_ms() -> u64 {
    10
}

/// Maps a sugar level to an alert interval.
///
/// Above `threshold` the interval is
/// `max(min_interval, base_interval - (level - threshold) * slope)`;
/// at or below it there is no alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertCurve {
    /// Highest level that is still silent.
    #[serde(default = "default_threshold")]
    pub threshold: i64,
    /// Interval just above the threshold.
    #[serde(default = "default_base_interval_ms")]
    pub base_interval_ms: u64,
    /// Shortest allowed interval.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    /// Milliseconds removed per unit of level above the threshold.
    #[serde(default = "default_slope_ms")]
    pub slope_ms: u64,
}

impl Default for AlertCurve {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            base_interval_ms: default_base_interval_ms(),
            min_interval_ms: default_min_interval_ms(),
            slope_ms: default_slope_ms(),
        }
    }
}

impl AlertCurve {
    /// Returns the alert interval for `level`, or `None` when no alert applies.
    #[must_use]
    pub fn interval_for(&self, level: i64) -> Option<Duration> {
        if level <= self.threshold {
            return None;
        }
        let excess = level.abs_diff(self.threshold);
        let millis = self
            .base_interval_ms
            .saturating_sub(excess.saturating_mul(self.slope_ms))
            .max(self.min_interval_ms);
        Some(Duration::from_millis(millis))
    }

    /// Checks the curve.
    ///
    /// # Errors
    ///
    /// Returns `FeedbackError::InvalidConfig` on the first invalid value.
    pub fn validate(&self) -> Result<(), FeedbackError> {
        if self.min_interval_ms == 0 {
            return Err(FeedbackError::invalid_config(
                "feedback.alert.minIntervalMs must be greater than 0",
            ));
        }
        if self.base_interval_ms < self.min_interval_ms {
            return Err(FeedbackError::invalid_config(
                "feedback.alert.baseIntervalMs must not be below minIntervalMs",
            ));
        }
        if self.slope_ms == 0 {
            return Err(FeedbackError::invalid_config(
                "feedback.alert.slopeMs must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// A repeating alert tone. Aborted on [`stop`](Self::stop) or drop.
#[derive(Debug)]
pub struct AlertLoop {
    interval: Duration,
    task: JoinHandle<()>,
}

impl AlertLoop {
    /// Starts playing the alert cue every `interval`, beginning now.
    #[must_use]
    pub fn start(backend: Arc<dyn SoundBackend>, interval: Duration) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = backend.play_once(Sound::Alert) {
                    warn!(error = %e, "Alert cue failed");
                }
            }
        });
        debug!(interval_ms = interval.as_millis(), "Alert loop started");
        Self { interval, task }
    }

    /// The interval this loop was started with.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Stops the loop.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for AlertLoop {
    fn drop(&mut self) {
        self.task.abort();
    }
}
