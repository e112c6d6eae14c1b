//! Configuration for every Sweet Claw process.
//!
//! One `sweet.json` file holds a section per process: `core` for the
//! orchestrator, `indicator` for the LED driver and `feedback` for the audio
//! player. Every field has a default, so a missing file is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sweet_feedback::FeedbackConfig;
use sweet_indicator::IndicatorConfig;

use crate::error::{CoreError, Result};

/// The default config file name.
pub const CONFIG_FILE_NAME: &str = "sweet.json";

/// Default bind address.
fn default_host() -> String {
    "0.0.0.0".to_string()
}

/// Default HTTP port.
const fn default_port() -> u16 {
    4000
}

/// Default path of the persisted layout.
fn default_layout_file() -> PathBuf {
    PathBuf::from("data/layout.json")
}

/// Default heartbeat period in milliseconds.
const fn default_tick_interval_ms() -> u64 {
    1000
}

/// Default per-subscriber bus buffer.
const fn default_bus_capacity() -> usize {
    100
}

/// Main configuration, one section per process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Orchestrator settings.
    #[serde(default)]
    pub core: CoreConfig,

    /// LED indicator settings, shared by `core` and `indicator`.
    #[serde(default)]
    pub indicator: IndicatorConfig,

    /// Audio feedback settings.
    #[serde(default)]
    pub feedback: FeedbackConfig,
}

/// Orchestrator settings (`core` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreConfig {
    /// Address the HTTP server binds to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the HTTP server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Where the last layout is persisted.
    #[serde(default = "default_layout_file")]
    pub layout_file: PathBuf,

    /// Optional JSON file replacing the built-in catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_file: Option<PathBuf>,

    /// Heartbeat period for republishing the sugar level.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Events buffered per bus subscriber before it lags.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            layout_file: default_layout_file(),
            catalog_file: None,
            tick_interval_ms: default_tick_interval_ms(),
            bus_capacity: default_bus_capacity(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `sweet.json` exists but is invalid.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            CoreError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads `sweet.json` from a specific directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::ConfigParseError` if the file cannot be read or
    /// is not valid JSON, and `CoreError::ConfigValidationError` if a value
    /// is out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(CoreError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| CoreError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::ConfigValidationError` on the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.core.port == 0 {
            return Err(CoreError::config_validation(
                "core.port must be greater than 0",
                "Set core.port to a free TCP port in your sweet.json",
            ));
        }

        if self.core.tick_interval_ms == 0 {
            return Err(CoreError::config_validation(
                "core.tickIntervalMs must be greater than 0",
                "Set core.tickIntervalMs to at least 1 in your sweet.json",
            ));
        }

        if self.core.bus_capacity == 0 {
            return Err(CoreError::config_validation(
                "core.busCapacity must be greater than 0",
                "Set core.busCapacity to at least 1 in your sweet.json",
            ));
        }

        if self.core.layout_file.as_os_str().is_empty() {
            return Err(CoreError::config_validation(
                "core.layoutFile must not be empty",
                "Provide a writable path such as data/layout.json",
            ));
        }

        self.indicator.validate().map_err(|e| {
            CoreError::config_validation(
                e.to_string(),
                "Fix the indicator section of your sweet.json",
            )
        })?;

        self.feedback.validate().map_err(|e| {
            CoreError::config_validation(
                e.to_string(),
                "Fix the feedback section of your sweet.json",
            )
        })?;

        Ok(())
    }
}
