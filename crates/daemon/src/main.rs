// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run acknowledgment daemon (rad)
//!
//! Background process that owns the job store and hands work to agents.
//!
//! Architecture:
//! - Listener Task: accepts socket connections, one task per request
//! - Flush/Checkpoint Tasks: group commit and periodic snapshots
//! - Reaper Task: releases waiting jobs whose agents went quiet

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod env;
mod lifecycle;
mod listener;
mod settings;

use ra_daemon::protocol;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ra_storage::JobStore;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::lifecycle::{Config, LifecycleError, Services, StartupResult};
use crate::listener::{ListenCtx, Listener};
use crate::settings::Settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle info flags before any config/lock acquisition
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("rad {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("rad {}", env!("CARGO_PKG_VERSION"));
                println!("Run acknowledgment daemon - assigns queued jobs to polling agents");
                println!();
                println!("USAGE:");
                println!("    rad");
                println!();
                println!("The daemon listens on a Unix socket under the state directory");
                println!("(RA_STATE_DIR, or $XDG_STATE_HOME/runack). Agents and the `ra`");
                println!("CLI talk to it over that socket.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: rad [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load()?;

    rotate_log_if_needed(&config.log_path);

    // Write startup marker to log (before tracing setup, so CLI can find it)
    write_startup_marker(&config)?;

    let log_guard = setup_logging(&config)?;

    info!("Starting daemon");

    let StartupResult {
        mut daemon,
        listener: unix_listener,
    } = match lifecycle::startup(&config).await {
        Ok(r) => r,
        Err(LifecycleError::LockFailed(_)) => {
            let pid = std::fs::read_to_string(&config.lock_path)
                .unwrap_or_default()
                .trim()
                .to_string();
            let version = std::fs::read_to_string(&config.version_path)
                .unwrap_or_default()
                .trim()
                .to_string();

            eprintln!("rad is already running");
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            if !version.is_empty() {
                if version == protocol::PROTOCOL_VERSION {
                    eprintln!("  version: {version}");
                } else {
                    eprintln!(
                        "  version: {version} (outdated, current: {})",
                        protocol::PROTOCOL_VERSION
                    );
                }
            }
            std::process::exit(1);
        }
        Err(e) => {
            // Tracing is non-blocking and may not flush before exit
            write_startup_error(&config, &e);
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    let shutdown_notify = Arc::new(Notify::new());

    let mut ctx = ListenCtx::new(daemon.services.clone(), Arc::clone(&shutdown_notify));
    ctx.start_time = daemon.start_time;
    let listener = Listener::new(unix_listener, ctx);
    tokio::spawn(listener.run());

    spawn_flush_task(daemon.services.store.clone());
    spawn_checkpoint(
        daemon.services.store.clone(),
        daemon.config.snapshot_path.clone(),
    );
    spawn_reaper(daemon.services.clone(), reaper_interval(&daemon.settings));

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(
        "Daemon ready, listening on {}",
        config.socket_path.display()
    );

    // Signal ready for parent process (e.g., systemd, CLI waiting for startup)
    println!("READY");

    tokio::select! {
        _ = shutdown_notify.notified() => {
            info!("Shutdown requested via command");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down...");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down...");
        }
    }

    daemon.shutdown()?;
    info!("Daemon stopped");
    Ok(())
}

/// Flush interval for buffered contact timestamps; job changes fsync on commit
const FLUSH_INTERVAL: Duration = Duration::from_millis(10);

fn spawn_flush_task(store: JobStore) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(FLUSH_INTERVAL);
        loop {
            interval.tick().await;
            if store.needs_flush() {
                if let Err(e) = store.flush() {
                    error!("Failed to flush WAL: {}", e);
                }
            }
        }
    });
}

const CHECKPOINT_INTERVAL: Duration = Duration::from_secs(60);

/// Periodically snapshot state and truncate the WAL, bounding recovery time.
fn spawn_checkpoint(store: JobStore, snapshot_path: std::path::PathBuf) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CHECKPOINT_INTERVAL);
        // First tick fires immediately; startup just recovered
        interval.tick().await;
        loop {
            interval.tick().await;
            match store.checkpoint(&snapshot_path) {
                Ok(seq) => debug!(seq, "saved checkpoint snapshot"),
                Err(e) => warn!(error = %e, "failed to save checkpoint snapshot"),
            }
        }
    });
}

/// How often the reaper sweeps waiting jobs. `RA_REAPER_INTERVAL_MS` wins
/// over the config file; a zero interval falls back to one second.
fn reaper_interval(settings: &Settings) -> Duration {
    let interval = env::reaper_interval()
        .unwrap_or_else(|| Duration::from_secs(settings.reaper_interval_secs));
    if interval.is_zero() {
        Duration::from_secs(1)
    } else {
        interval
    }
}

fn spawn_reaper(services: Services, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let report = services.reaper.sweep().await;
            if !report.released.is_empty() {
                info!(
                    released = report.released.len(),
                    kept = report.kept,
                    "reaper released waiting jobs"
                );
            }
            let purged = services.liveness.inner().purge_expired();
            if purged > 0 {
                debug!(purged, "purged expired liveness entries");
            }
        }
    });
}

/// Startup marker prefix written to log before anything else.
/// CLI uses this to find where the current startup attempt begins.
/// Full format: "--- rad: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- rad: starting (pid: ";

fn write_startup_marker(config: &Config) -> Result<(), LifecycleError> {
    use std::io::Write;

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;
    Ok(())
}

/// Write startup error synchronously so the CLI sees it even on fast exit.
fn write_startup_error(config: &Config, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

/// Rotate once the log passes this size.
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;
const MAX_ROTATIONS: u32 = 3;

/// Shift `daemon.log` to `daemon.log.1` (and so on) when it grows too large.
/// The oldest rotation is dropped.
fn rotate_log_if_needed(log_path: &Path) {
    let Ok(meta) = std::fs::metadata(log_path) else {
        return;
    };
    if meta.len() <= MAX_LOG_SIZE {
        return;
    }

    let rotated = |n: u32| {
        let mut name = log_path.as_os_str().to_owned();
        name.push(format!(".{n}"));
        std::path::PathBuf::from(name)
    };
    for n in (1..MAX_ROTATIONS).rev() {
        let from = rotated(n);
        if from.exists() {
            let _ = std::fs::rename(&from, rotated(n + 1));
        }
    }
    let _ = std::fs::rename(log_path, rotated(1));
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_appender = tracing_appender::rolling::never(
        config.log_path.parent().ok_or(LifecycleError::NoStateDir)?,
        config
            .log_path
            .file_name()
            .ok_or(LifecycleError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
