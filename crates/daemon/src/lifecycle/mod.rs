// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use fs2::FileExt;
use ra_adapters::{MemoryLiveness, TracedLiveness};
use ra_core::{SystemClock, UuidIdGen};
use ra_engine::{AckGate, AssignmentCoordinator, CoordinatorDeps, Reaper};
use ra_storage::{JobStore, StoreError};
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

use crate::settings::{Settings, SettingsError};

/// Liveness tracker with concrete types (wrapped with tracing)
pub type DaemonLiveness = TracedLiveness<MemoryLiveness<SystemClock>>;
pub type DaemonCoordinator = AssignmentCoordinator<JobStore, DaemonLiveness, SystemClock>;
pub type DaemonReaper = Reaper<JobStore, DaemonLiveness, SystemClock, UuidIdGen>;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/runack)
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    pub version_path: PathBuf,
    pub log_path: PathBuf,
    pub wal_path: PathBuf,
    pub snapshot_path: PathBuf,
    /// Optional `config.toml`
    pub settings_path: PathBuf,
}

impl Config {
    /// Load configuration for the user-level daemon.
    pub fn load() -> Result<Self, LifecycleError> {
        Ok(Self::for_state_dir(crate::env::state_dir()?))
    }

    pub fn for_state_dir(state_dir: PathBuf) -> Self {
        Self {
            socket_path: state_dir.join("daemon.sock"),
            lock_path: state_dir.join("daemon.pid"),
            version_path: state_dir.join("daemon.version"),
            log_path: state_dir.join("daemon.log"),
            wal_path: state_dir.join("wal").join("events.wal"),
            snapshot_path: state_dir.join("snapshot.json"),
            settings_path: state_dir.join("config.toml"),
            state_dir,
        }
    }
}

/// The store and everything wired on top of it.
#[derive(Clone)]
pub struct Services {
    pub store: JobStore,
    pub liveness: DaemonLiveness,
    pub coordinator: Arc<DaemonCoordinator>,
    pub reaper: Arc<DaemonReaper>,
}

impl Services {
    pub fn new(store: JobStore, settings: &Settings) -> Self {
        let liveness = TracedLiveness::new(MemoryLiveness::new(SystemClock));
        let coordinator = AssignmentCoordinator::new(
            CoordinatorDeps {
                store: store.clone(),
                liveness: liveness.clone(),
                gate: AckGate::new(settings.two_phase_ack),
            },
            SystemClock,
            settings.coordinator_config(),
        );
        let reaper = Reaper::new(
            store.clone(),
            liveness.clone(),
            SystemClock,
            UuidIdGen,
            settings.reap_policy(),
        );
        Self {
            store,
            liveness,
            coordinator: Arc::new(coordinator),
            reaper: Arc::new(reaper),
        }
    }
}

/// Daemon state during operation.
///
/// The listener is returned separately from startup to be spawned as a task.
pub struct DaemonState {
    pub config: Config,
    pub settings: Settings,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub services: Services,
    pub start_time: Instant,
}

pub struct StartupResult {
    pub daemon: DaemonState,
    /// The Unix socket listener to spawn as a task
    pub listener: UnixListener,
}

impl DaemonState {
    /// Flush the WAL, save a final snapshot and remove runtime files.
    pub fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        match self.services.store.checkpoint(&self.config.snapshot_path) {
            Ok(seq) => info!(seq, "saved final shutdown snapshot"),
            Err(e) => {
                warn!(error = %e, "failed to save shutdown snapshot");
                if let Err(e) = self.services.store.flush() {
                    warn!(error = %e, "failed to flush WAL on shutdown");
                }
            }
        }

        for path in [
            &self.config.socket_path,
            &self.config.lock_path,
            &self.config.version_path,
        ] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!(path = %path.display(), error = %e, "failed to remove file");
                }
            }
        }

        info!("Daemon shutdown complete");
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // Another daemon owns these files
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    let mut lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    if let Some(parent) = config.wal_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&config.version_path, crate::protocol::PROTOCOL_VERSION)?;

    let settings = Settings::load(&config.settings_path)?.with_env_overrides();
    info!(
        two_phase_ack = settings.two_phase_ack,
        ack_ttl_secs = settings.ack_ttl_secs,
        reap_after_secs = ?settings.reap_after_secs,
        "settings loaded"
    );

    let store = JobStore::open(&config.wal_path, &config.snapshot_path)?;
    let state = store.state();
    info!(
        jobs = state.jobs.len(),
        pending = state.pending_len(),
        agents = state.agents.len(),
        "recovered state"
    );
    let services = Services::new(store, &settings);

    // Remove stale socket from a crashed daemon
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    info!("Daemon started");

    Ok(StartupResult {
        daemon: DaemonState {
            config: config.clone(),
            settings,
            lock_file,
            services,
            start_time: Instant::now(),
        },
        listener,
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    for path in [&config.socket_path, &config.version_path, &config.lock_path] {
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
#[path = "../lifecycle_tests/mod.rs"]
mod tests;
