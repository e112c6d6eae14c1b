//! Sweet Claw Indicator Driver
//!
//! Pulses one of four direction LEDs for every accepted move and guarantees
//! all of them are dark when the owning process shuts down.
//!
//! The driver talks to the hardware through a [`PinBackend`]. Two backends
//! exist: [`GpiosetBackend`] shells out to `gpioset`, and
//! [`SimulatedBackend`] only logs and records pin levels. The backend is
//! picked once by [`select_backend`]; the driver behaves identically with
//! either.

pub mod backend;
pub mod driver;
pub mod service;

use serde::{Deserialize, Serialize};
use sweet_protocol::Direction;

pub use backend::{select_backend, GpiosetBackend, PinBackend, SimulatedBackend};
pub use driver::IndicatorDriver;
pub use service::run;

/// Errors raised by pin backends.
///
/// These never escape the driver; they are logged and swallowed.
#[derive(Debug, thiserror::Error)]
pub enum IndicatorError {
    /// The GPIO interface could not be addressed.
    #[error("GPIO pin {pin} unavailable: {message}")]
    HardwareUnavailable {
        /// The pin that was being written.
        pin: u32,
        /// What went wrong.
        message: String,
    },

    /// A configuration value is out of range.
    #[error("invalid indicator configuration: {message}")]
    InvalidConfig {
        /// What is wrong.
        message: String,
    },
}

impl IndicatorError {
    /// Creates a new `HardwareUnavailable` error.
    #[must_use]
    pub fn hardware_unavailable(pin: u32, message: impl Into<String>) -> Self {
        Self::HardwareUnavailable {
            pin,
            message: message.into(),
        }
    }

    /// Creates a new `InvalidConfig` error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Default GPIO chip.
fn default_chip() -> String {
    "gpiochip0".to_string()
}

/// Default command used to drive pins.
fn default_command() -> String {
    "gpioset".to_string()
}

/// Default pulse length in milliseconds.
const fn default_pulse_ms() -> u64 {
    200
}

/// BCM pin numbers for the four direction LEDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinMap {
    /// LED for `up`.
    pub up: u32,
    /// LED for `down`.
    pub down: u32,
    /// LED for `left`.
    pub left: u32,
    /// LED for `right`.
    pub right: u32,
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            up: 17,
            down: 27,
            left: 22,
            right: 23,
        }
    }
}

impl PinMap {
    /// Number of indicator signals.
    pub const LEN: usize = 4;

    /// Returns the slot index (0..4) of the LED for a direction, if any.
    #[must_use]
    pub const fn slot(direction: Direction) -> Option<usize> {
        match direction {
            Direction::Up => Some(0),
            Direction::Down => Some(1),
            Direction::Left => Some(2),
            Direction::Right => Some(3),
            Direction::Grab | Direction::Reset => None,
        }
    }

    /// Returns all pins in slot order.
    #[must_use]
    pub const fn pins(&self) -> [u32; Self::LEN] {
        [self.up, self.down, self.left, self.right]
    }

    fn has_duplicates(&self) -> bool {
        let pins = self.pins();
        pins.iter()
            .enumerate()
            .any(|(i, p)| pins[i + 1..].contains(p))
    }
}

/// Indicator configuration (`indicator` section of `sweet.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorConfig {
    /// GPIO chip name passed to `gpioset`.
    #[serde(default = "default_chip")]
    pub chip: String,

    /// Command used to set pin levels.
    #[serde(default = "default_command")]
    pub command: String,

    /// Direction to pin mapping.
    #[serde(default)]
    pub pins: PinMap,

    /// How long a direction LED stays lit.
    #[serde(default = "default_pulse_ms")]
    pub pulse_ms: u64,

    /// Force (`true`) or forbid (`false`) simulation; auto-detect when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulate: Option<bool>,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            chip: default_chip(),
            command: default_command(),
            pins: PinMap::default(),
            pulse_ms: default_pulse_ms(),
            simulate: None,
        }
    }
}

impl IndicatorConfig {
    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns `IndicatorError::InvalidConfig` on the first invalid value.
    pub fn validate(&self) -> Result<(), IndicatorError> {
        if self.pulse_ms == 0 {
            return Err(IndicatorError::invalid_config(
                "indicator.pulseMs must be greater than 0",
            ));
        }
        if self.chip.trim().is_empty() {
            return Err(IndicatorError::invalid_config(
                "indicator.chip must not be empty",
            ));
        }
        if self.pins.has_duplicates() {
            return Err(IndicatorError::invalid_config(
                "indicator.pins must map each direction to a distinct pin",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_map_defaults() {
        let pins = PinMap::default().pins();
        assert_eq!(pins, [17, 27, 22, 23]);
        assert_eq!(PinMap::slot(Direction::Up).map(|s| pins[s]), Some(17));
        assert_eq!(PinMap::slot(Direction::Right).map(|s| pins[s]), Some(23));
        assert_eq!(PinMap::slot(Direction::Grab), None);
        assert_eq!(PinMap::slot(Direction::Reset), None);
    }

    #[test]
    fn test_config_defaults_from_empty_json() {
        let config: IndicatorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.chip, "gpiochip0");
        assert_eq!(config.command, "gpioset");
        assert_eq!(config.pulse_ms, 200);
        assert_eq!(config.simulate, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_duplicate_pins() {
        let config = IndicatorConfig {
            pins: PinMap {
                up: 5,
                down: 5,
                left: 6,
                right: 7,
            },
            ..IndicatorConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, IndicatorError::InvalidConfig { ref message } if message.contains("distinct"))
        );
    }

    #[test]
    fn test_config_rejects_zero_pulse() {
        let config = IndicatorConfig {
            pulse_ms: 0,
            ..IndicatorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(IndicatorError::InvalidConfig { .. })
        ));
    }
}
