//! Pin backends: real GPIO through `gpioset`, or an in-memory simulation.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::process::Command;
use std::sync::{Arc, Mutex};

use sweet_protocol::host::on_path;
use tracing::{debug, info, warn};

use crate::{IndicatorConfig, IndicatorError};

/// Something that can drive an output pin high or low.
pub trait PinBackend: Send + Sync + fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Sets `pin` to on (`true`) or off (`false`).
    fn write(&self, pin: u32, on: bool) -> Result<(), IndicatorError>;
}

/// Drives pins by running `gpioset <chip> <pin>=<0|1>`.
#[derive(Debug, Clone)]
pub struct GpiosetBackend {
    command: String,
    chip: String,
}

impl GpiosetBackend {
    /// Creates a backend for the given command and chip.
    #[must_use]
    pub fn new(command: impl Into<String>, chip: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            chip: chip.into(),
        }
    }
}

impl PinBackend for GpiosetBackend {
    fn name(&self) -> &'static str {
        "gpioset"
    }

    fn write(&self, pin: u32, on: bool) -> Result<(), IndicatorError> {
        let output = Command::new(&self.command)
            .arg(&self.chip)
            .arg(format!("{pin}={}", u8::from(on)))
            .output()
            .map_err(|e| IndicatorError::hardware_unavailable(pin, e.to_string()))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(IndicatorError::hardware_unavailable(
                pin,
                format!("{} exited with {}: {}", self.command, output.status, stderr.trim()),
            ))
        }
    }
}

/// Records pin levels in memory and logs every change.
#[derive(Debug, Default)]
pub struct SimulatedBackend {
    levels: Mutex<BTreeMap<u32, bool>>,
}

impl SimulatedBackend {
    /// Creates a simulated backend with every pin off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the pin is currently on.
    #[must_use]
    pub fn is_on(&self, pin: u32) -> bool {
        self.levels
            .lock()
            .map(|levels| levels.get(&pin).copied().unwrap_or(false))
            .unwrap_or(false)
    }

    /// Returns every pin that is currently on.
    #[must_use]
    pub fn lit_pins(&self) -> Vec<u32> {
        self.levels
            .lock()
            .map(|levels| {
                levels
                    .iter()
                    .filter_map(|(pin, on)| on.then_some(*pin))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl PinBackend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn write(&self, pin: u32, on: bool) -> Result<(), IndicatorError> {
        let mut levels = self
            .levels
            .lock()
            .map_err(|_| IndicatorError::hardware_unavailable(pin, "simulated pin table poisoned"))?;
        let previous = levels.insert(pin, on).unwrap_or(false);
        if previous != on {
            debug!(pin, on, "Simulated GPIO change");
        }
        Ok(())
    }
}

/// Picks the backend once at startup.
///
/// `simulate: Some(true)` forces simulation and `Some(false)` forces real
/// hardware. Otherwise the real backend is used only when `/dev/<chip>`
/// exists and the command is on `PATH`.
#[must_use]
pub fn select_backend(config: &IndicatorConfig) -> Arc<dyn PinBackend> {
    let use_hardware = config.simulate.map_or_else(
        || Path::new("/dev").join(&config.chip).exists() && on_path(&config.command),
        |simulate| !simulate,
    );

    if use_hardware {
        info!(chip = %config.chip, command = %config.command, "Using GPIO indicator backend");
        Arc::new(GpiosetBackend::new(&config.command, &config.chip))
    } else {
        if config.simulate != Some(true) {
            warn!(chip = %config.chip, "GPIO not available, indicators run in simulation mode");
        }
        info!("Using simulated indicator backend");
        Arc::new(SimulatedBackend::new())
    }
}
