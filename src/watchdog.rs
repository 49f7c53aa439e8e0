//! One watchdog pass: probe the process inventory, restart the target if it
//! is not running, record spawn failures in the error log.
//!
//! Nothing escapes a pass. Every failure ends up as an [`Outcome`].
use crate::config::WatchdogConfig;
use crate::errlog::ErrorLog;
use crate::inventory::{self, CommandInventory, Inventory, MarkerSet, Presence};
use crate::spawn::{self, SpawnError};
use std::path::{Path, PathBuf};

/// Function used to start the target.
pub type SpawnFn = fn(&Path, &Path) -> Result<u32, SpawnError>;

/// What a single pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    AlreadyRunning,
    Restarted { presence: Presence, pid: u32 },
    /// `logged` is false when the error log itself could not be written.
    RestartFailed { error: String, logged: bool },
}

pub struct Watchdog<P, F> {
    primary: P,
    fallback: F,
    markers: MarkerSet,
    image: MarkerSet,
    interpreter: PathBuf,
    script: PathBuf,
    log: ErrorLog,
    spawn: SpawnFn,
}

impl Watchdog<CommandInventory, CommandInventory> {
    /// Watchdog using the platform inventory commands and a detached spawn.
    pub fn from_config(config: &WatchdogConfig) -> Self {
        Self::new(
            config,
            CommandInventory::command_lines(&config.inventory.image_name),
            CommandInventory::images(&config.inventory.image_name),
            spawn::spawn_detached,
        )
    }
}

impl<P: Inventory, F: Inventory> Watchdog<P, F> {
    pub fn new(config: &WatchdogConfig, primary: P, fallback: F, spawn: SpawnFn) -> Self {
        Self {
            primary,
            fallback,
            markers: MarkerSet::new(config.target.markers.as_slice()),
            image: MarkerSet::new(&[config.inventory.image_name.as_str()]),
            interpreter: config.target.interpreter.clone(),
            script: config.target.script.clone(),
            log: ErrorLog::new(config.error_log_path()),
            spawn,
        }
    }

    /// Probe only; used by `--dry-run`.
    pub async fn presence(&self) -> Presence {
        inventory::probe(&self.primary, &self.markers, &self.fallback, &self.image).await
    }

    /// Check, then maybe spawn.
    pub async fn run_once(&self) -> Outcome {
        let presence = self.presence().await;
        if presence.is_running() {
            tracing::info!("target is running, nothing to do");
            return Outcome::AlreadyRunning;
        }

        tracing::warn!(?presence, "target not running, restarting");
        match (self.spawn)(&self.interpreter, &self.script) {
            Ok(pid) => Outcome::Restarted { presence, pid },
            Err(e) => {
                let error = e.to_string();
                tracing::error!(error = %error, "restart failed");
                let logged = match self.log.append(&error) {
                    Ok(()) => true,
                    Err(log_err) => {
                        tracing::warn!(
                            error = %log_err,
                            path = %self.log.path().display(),
                            "failed to write error log"
                        );
                        false
                    }
                };
                Outcome::RestartFailed { error, logged }
            }
        }
    }
}
