//! Sweet Claw Feedback Player
//!
//! Subscribes to the motion channel and turns events into sound:
//!
//! - a single looping ambient track between `ambient_start` and `ambient_stop`
//! - debounced one-shot cues for moves, never-debounced cues for grabs
//! - a repeating alert tone whose rate follows the sugar level
//!
//! Sounds are played by child processes behind a [`SoundBackend`]. The
//! player owns at most one ambient handle and at most one alert loop and
//! releases both on shutdown.

pub mod alert;
pub mod backend;
pub mod player;
pub mod service;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use alert::{AlertCurve, AlertLoop};
pub use backend::{
    select_backend, FfplayBackend, PlaybackHandle, SilentBackend, SoundBackend,
};
pub use player::FeedbackPlayer;
pub use service::run;

/// Errors raised while playing sounds.
///
/// These are logged by the player and never stop the subscriber loop.
#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    /// The media player could not be started.
    #[error("failed to start player for '{sound}': {source}")]
    SpawnFailed {
        /// The sound being played.
        sound: Sound,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A running playback could not be stopped.
    #[error("failed to stop '{sound}' playback: {source}")]
    TerminateFailed {
        /// The sound being stopped.
        sound: Sound,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration value is out of range.
    #[error("invalid feedback configuration: {message}")]
    InvalidConfig {
        /// What is wrong.
        message: String,
    },
}

impl FeedbackError {
    /// Creates a new `InvalidConfig` error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// The sounds the player knows how to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sound {
    /// Background loop while the claw is active.
    Ambient,
    /// One step of claw movement.
    Move,
    /// The claw closing.
    Grab,
    /// The claw session ending.
    Stop,
    /// One beat of the sugar alert.
    Alert,
}

impl Sound {
    /// File name of the sound inside the sounds directory.
    #[must_use]
    pub const fn file_name(&self) -> &'static str {
        match self {
            Self::Ambient => "background.mp3",
            Self::Move => "move.mp3",
            Self::Grab => "grab.mp3",
            Self::Stop => "stop.mp3",
            Self::Alert => "alert.mp3",
        }
    }
}

impl fmt::Display for Sound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ambient => "ambient",
            Self::Move => "move",
            Self::Grab => "grab",
            Self::Stop => "stop",
            Self::Alert => "alert",
        };
        f.write_str(name)
    }
}

/// Default bus URL, restricted to the motion channel.
fn default_bus_url() -> String {
    "ws://127.0.0.1:4000/bus?channel=motion".to_string()
}

/// Default sounds directory.
fn default_sounds_dir() -> PathBuf {
    PathBuf::from("./sounds")
}

/// Default media player.
fn default_player() -> String {
    "ffplay".to_string()
}

/// Default move-cue cooldown in milliseconds.
const fn default_move_cooldown_ms() -> u64 {
    200
}

/// Default reconnect delay in milliseconds.
const fn default_reconnect_ms() -> u64 {
    1000
}

/// Feedback configuration (`feedback` section of `sweet.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackConfig {
    /// Websocket URL of the event bus.
    #[serde(default = "default_bus_url")]
    pub bus_url: String,

    /// Directory holding the sound files.
    #[serde(default = "default_sounds_dir")]
    pub sounds_dir: PathBuf,

    /// Media player binary.
    #[serde(default = "default_player")]
    pub player: String,

    /// Extra environment for the media player (e.g. `PULSE_SERVER`).
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Minimum gap between two move cues.
    #[serde(default = "default_move_cooldown_ms")]
    pub move_cooldown_ms: u64,

    /// Delay before reconnecting to the bus.
    #[serde(default = "default_reconnect_ms")]
    pub reconnect_ms: u64,

    /// Alert loop tuning.
    #[serde(default)]
    pub alert: AlertCurve,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            bus_url: default_bus_url(),
            sounds_dir: default_sounds_dir(),
            player: default_player(),
            env: BTreeMap::new(),
            move_cooldown_ms: default_move_cooldown_ms(),
            reconnect_ms: default_reconnect_ms(),
            alert: AlertCurve::default(),
        }
    }
}

impl FeedbackConfig {
    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns `FeedbackError::InvalidConfig` on the first invalid value.
    pub fn validate(&self) -> Result<(), FeedbackError> {
        if !(self.bus_url.starts_with("ws://") || self.bus_url.starts_with("wss://")) {
            return Err(FeedbackError::invalid_config(format!(
                "feedback.busUrl must be a ws:// or wss:// URL, got '{}'",
                self.bus_url
            )));
        }
        if self.player.trim().is_empty() {
            return Err(FeedbackError::invalid_config(
                "feedback.player must not be empty",
            ));
        }
        self.alert.validate()
    }
}
