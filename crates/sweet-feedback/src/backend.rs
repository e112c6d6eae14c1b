//! Sound backends.
//!
//! [`FfplayBackend`] spawns `ffplay` child processes. [`SilentBackend`] stands
//! in when no player is installed and only logs what it would play.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use sweet_protocol::host::on_path;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::{FeedbackConfig, FeedbackError, Sound};

/// A running looping playback that must be terminated explicitly.
pub trait PlaybackHandle: Send + fmt::Debug {
    /// Stops the playback. Calling it twice is harmless.
    fn terminate(&mut self) -> Result<(), FeedbackError>;
}

/// Something that can play sounds.
pub trait SoundBackend: Send + Sync + fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Plays a sound once, without waiting for it to finish.
    fn play_once(&self, sound: Sound) -> Result<(), FeedbackError>;

    /// Starts a sound that loops until its handle is terminated.
    fn play_looping(&self, sound: Sound) -> Result<Box<dyn PlaybackHandle>, FeedbackError>;
}

// ============================================================================
// ffplay
// ============================================================================

/// Plays sounds with `ffplay`.
#[derive(Debug, Clone)]
pub struct FfplayBackend {
    program: String,
    sounds_dir: PathBuf,
    env: BTreeMap<String, String>,
}

impl FfplayBackend {
    /// Creates a backend running `program` on files in `sounds_dir`.
    #[must_use]
    pub fn new(program: impl Into<String>, sounds_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            sounds_dir: sounds_dir.into(),
            env: BTreeMap::new(),
        }
    }

    /// Adds environment variables for every spawned player.
    #[must_use]
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env.extend(env);
        self
    }

    /// Builds the argument list for one playback.
    fn args(&self, sound: Sound, looping: bool) -> Vec<String> {
        let path = self.sounds_dir.join(sound.file_name());
        let mut args = Vec::with_capacity(7);
        if looping {
            args.extend(["-loop".to_string(), "0".to_string()]);
        }
        args.extend([
            "-nodisp".to_string(),
            "-loglevel".to_string(),
            "quiet".to_string(),
            path.display().to_string(),
        ]);
        if !looping {
            args.push("-autoexit".to_string());
        }
        args
    }

    fn spawn(&self, sound: Sound, looping: bool) -> Result<Child, FeedbackError> {
        Command::new(&self.program)
            .args(self.args(sound, looping))
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(looping)
            .spawn()
            .map_err(|source| FeedbackError::SpawnFailed { sound, source })
    }
}

impl SoundBackend for FfplayBackend {
    fn name(&self) -> &'static str {
        "ffplay"
    }

    fn play_once(&self, sound: Sound) -> Result<(), FeedbackError> {
        let mut child = self.spawn(sound, false)?;
        debug!(%sound, pid = ?child.id(), "Playing one-shot");

        // Reap in the background so exit failures are logged, never awaited.
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {}
                Ok(status) => warn!(%sound, %status, "Player exited abnormally"),
                Err(e) => warn!(%sound, error = %e, "Failed to wait for player"),
            }
        });
        Ok(())
    }

    fn play_looping(&self, sound: Sound) -> Result<Box<dyn PlaybackHandle>, FeedbackError> {
        let child = self.spawn(sound, true)?;
        info!(%sound, pid = ?child.id(), "Started looping playback");
        Ok(Box::new(ChildHandle {
            sound,
            child: Some(child),
        }))
    }
}

/// A looping child process. Killed on terminate or drop.
#[derive(Debug)]
struct ChildHandle {
    sound: Sound,
    child: Option<Child>,
}

impl PlaybackHandle for ChildHandle {
    fn terminate(&mut self) -> Result<(), FeedbackError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let sound = self.sound;

        // An already exited child needs no signal.
        if let Ok(Some(status)) = child.try_wait() {
            debug!(%sound, %status, "Looping playback had already exited");
            return Ok(());
        }

        child
            .start_kill()
            .map_err(|source| FeedbackError::TerminateFailed { sound, source })?;
        info!(%sound, "Stopped looping playback");
        Ok(())
    }
}

// ============================================================================
// Silent
// ============================================================================

/// Logs sounds instead of playing them.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentBackend;

#[derive(Debug)]
struct SilentHandle {
    sound: Sound,
    active: bool,
}

impl PlaybackHandle for SilentHandle {
    fn terminate(&mut self) -> Result<(), FeedbackError> {
        if std::mem::take(&mut self.active) {
            info!(sound = %self.sound, "Silent loop stopped");
        }
        Ok(())
    }
}

impl SoundBackend for SilentBackend {
    fn name(&self) -> &'static str {
        "silent"
    }

    fn play_once(&self, sound: Sound) -> Result<(), FeedbackError> {
        info!(%sound, "Silent one-shot");
        Ok(())
    }

    fn play_looping(&self, sound: Sound) -> Result<Box<dyn PlaybackHandle>, FeedbackError> {
        info!(%sound, "Silent loop started");
        Ok(Box::new(SilentHandle {
            sound,
            active: true,
        }))
    }
}

// ============================================================================
// Selection
// ============================================================================

/// Picks the backend once at startup.
#[must_use]
pub fn select_backend(config: &FeedbackConfig) -> Arc<dyn SoundBackend> {
    if on_path(&config.player) {
        info!(player = %config.player, sounds = %config.sounds_dir.display(), "Using media player backend");
        Arc::new(
            FfplayBackend::new(&config.player, &config.sounds_dir).with_env(config.env.clone()),
        )
    } else {
        warn!(player = %config.player, "Media player not found, feedback runs silently");
        Arc::new(SilentBackend)
    }
}
