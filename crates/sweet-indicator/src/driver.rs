//! The indicator driver.
//!
//! All pin writes go through a single worker task that owns the LED state.
//! Callers only enqueue commands, so a slow or hung backend never blocks
//! them. Each backend write runs on the blocking pool with a deadline.

use std::sync::Arc;
use std::time::Duration;

use sweet_protocol::Direction;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::{select_backend, IndicatorConfig, PinBackend, PinMap};

/// Longest a single backend write may take before the worker moves on.
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug)]
enum Command {
    Show(Option<Direction>),
    PulseEnd { slot: usize, generation: u64 },
    ClearAll(Option<oneshot::Sender<()>>),
    Flush(oneshot::Sender<()>),
}

/// Pulses one direction LED at a time.
///
/// Every call to [`set_direction`](Self::set_direction) clears all four
/// LEDs, lights the one for the new direction, and schedules it off after
/// the pulse length. Each LED slot carries a generation counter; a scheduled
/// off only applies if no later call re-lit that same slot. The check and
/// the write happen on the worker, so no later call can slip in between.
///
/// Backend failures are logged and swallowed.
///
/// Must be created inside a tokio runtime.
#[derive(Debug, Clone)]
pub struct IndicatorDriver {
    commands: mpsc::UnboundedSender<Command>,
    backend_name: &'static str,
}

impl IndicatorDriver {
    /// Creates a driver over an explicit backend and starts its worker.
    #[must_use]
    pub fn new(backend: Arc<dyn PinBackend>, pins: PinMap, pulse: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let backend_name = backend.name();
        let worker = Worker {
            backend,
            pins,
            pulse,
            generations: [0; PinMap::LEN],
            timers: tx.downgrade(),
        };
        tokio::spawn(worker.run(rx));

        Self {
            commands: tx,
            backend_name,
        }
    }

    /// Creates a driver from configuration, selecting the backend once.
    ///
    /// All LEDs are switched off first.
    #[must_use]
    pub fn from_config(config: &IndicatorConfig) -> Self {
        let driver = Self::new(
            select_backend(config),
            config.pins,
            Duration::from_millis(config.pulse_ms),
        );
        driver.send(Command::ClearAll(None));
        driver
    }

    /// Name of the active backend.
    #[must_use]
    pub const fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    /// Shows `direction` on the LEDs. Returns without waiting for hardware.
    ///
    /// `None`, `grab` and `reset` only clear the LEDs.
    pub fn set_direction(&self, direction: Option<Direction>) {
        match direction {
            Some(d) => info!(direction = %d, "Blink direction"),
            None => info!("Blink direction: idle"),
        }
        self.send(Command::Show(direction));
    }

    /// Switches every LED off and cancels pending pulses.
    ///
    /// Runs after everything queued before it and resolves once the LEDs
    /// have been written.
    pub async fn clear_all(&self) {
        let (tx, rx) = oneshot::channel();
        self.send(Command::ClearAll(Some(tx)));
        let _ = rx.await;
        info!("All indicators cleared");
    }

    /// Resolves once every command queued so far has been applied.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Flush(tx));
        let _ = rx.await;
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("Indicator worker is gone, command dropped");
        }
    }
}

/// Owns the backend and the per-slot generations.
struct Worker {
    backend: Arc<dyn PinBackend>,
    pins: PinMap,
    pulse: Duration,
    generations: [u64; PinMap::LEN],
    timers: mpsc::WeakUnboundedSender<Command>,
}

impl Worker {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Show(direction) => self.show(direction).await,
                Command::PulseEnd { slot, generation } => {
                    let pin = self.pins.pins()[slot];
                    if self.generations[slot] == generation {
                        self.write(pin, false).await;
                    } else {
                        debug!(pin, "Pulse superseded, leaving indicator on");
                    }
                }
                Command::ClearAll(ack) => {
                    for generation in &mut self.generations {
                        *generation += 1;
                    }
                    self.reset_all().await;
                    if let Some(ack) = ack {
                        let _ = ack.send(());
                    }
                }
                Command::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }
        debug!("Indicator worker stopped");
    }

    async fn show(&mut self, direction: Option<Direction>) {
        self.reset_all().await;

        let Some(slot) = direction.and_then(PinMap::slot) else {
            return;
        };
        self.generations[slot] += 1;
        let generation = self.generations[slot];

        if self.write(self.pins.pins()[slot], true).await {
            self.schedule_pulse_end(slot, generation);
        }
    }

    async fn reset_all(&self) {
        for pin in self.pins.pins() {
            self.write(pin, false).await;
        }
    }

    fn schedule_pulse_end(&self, slot: usize, generation: u64) {
        let timers = self.timers.clone();
        let pulse = self.pulse;
        tokio::spawn(async move {
            tokio::time::sleep(pulse).await;
            if let Some(tx) = timers.upgrade() {
                let _ = tx.send(Command::PulseEnd { slot, generation });
            }
        });
    }

    /// Writes one pin on the blocking pool. Returns `false` on any failure.
    async fn write(&self, pin: u32, on: bool) -> bool {
        let backend = Arc::clone(&self.backend);
        let task = tokio::task::spawn_blocking(move || backend.write(pin, on));

        match tokio::time::timeout(WRITE_TIMEOUT, task).await {
            Ok(Ok(Ok(()))) => true,
            Ok(Ok(Err(e))) => {
                warn!(pin, on, error = %e, "Indicator write failed");
                false
            }
            Ok(Err(e)) => {
                warn!(pin, on, error = %e, "Indicator write task failed");
                false
            }
            Err(_) => {
                warn!(pin, on, timeout = ?WRITE_TIMEOUT, "Indicator write timed out");
                false
            }
        }
    }
}
