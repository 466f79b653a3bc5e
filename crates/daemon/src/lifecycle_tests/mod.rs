// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

use ra_core::{AgentConfig, JobConfig};
use ra_storage::{AgentRegistry, WorkItemStore};
use std::path::Path;
use tempfile::tempdir;

fn test_config(dir: &Path) -> Config {
    Config {
        state_dir: dir.to_path_buf(),
        socket_path: dir.join("test.sock"),
        lock_path: dir.join("test.lock"),
        version_path: dir.join("test.version"),
        log_path: dir.join("test.log"),
        wal_path: dir.join("wal").join("test.wal"),
        snapshot_path: dir.join("test.snapshot"),
        settings_path: dir.join("config.toml"),
    }
}

#[test]
fn config_paths_live_under_state_dir() {
    let config = Config::for_state_dir(PathBuf::from("/state"));
    assert_eq!(config.socket_path, PathBuf::from("/state/daemon.sock"));
    assert_eq!(config.lock_path, PathBuf::from("/state/daemon.pid"));
    assert_eq!(config.wal_path, PathBuf::from("/state/wal/events.wal"));
    assert_eq!(config.settings_path, PathBuf::from("/state/config.toml"));
}

#[tokio::test]
async fn startup_creates_runtime_files() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    let result = startup(&config).await.unwrap();

    assert!(config.socket_path.exists());
    let pid = std::fs::read_to_string(&config.lock_path).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());
    assert_eq!(
        std::fs::read_to_string(&config.version_path).unwrap(),
        crate::protocol::PROTOCOL_VERSION
    );
    assert_eq!(result.daemon.settings, Settings::default());
}

#[tokio::test]
async fn startup_reads_settings_file() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::write(&config.settings_path, "two_phase_ack = true\n").unwrap();

    let result = startup(&config).await.unwrap();
    assert!(result.daemon.services.coordinator.gate().is_enabled());
}

#[tokio::test]
async fn startup_with_invalid_settings_cleans_up() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::write(&config.settings_path, "bogus = 1\n").unwrap();

    match startup(&config).await {
        Err(LifecycleError::Settings(_)) => {}
        Err(e) => panic!("expected settings error, got: {e}"),
        Ok(_) => panic!("expected settings error, but startup succeeded"),
    }
    assert!(!config.lock_path.exists());
    assert!(!config.version_path.exists());
}

#[tokio::test]
async fn startup_lock_failed_does_not_remove_existing_files() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    std::fs::write(&config.socket_path, b"").unwrap();
    std::fs::write(&config.version_path, b"0.1.0").unwrap();

    // Hold the lock as a running daemon would
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)
        .unwrap();
    lock_file.lock_exclusive().unwrap();
    std::fs::write(&config.lock_path, b"12345").unwrap();

    match startup(&config).await {
        Err(LifecycleError::LockFailed(_)) => {}
        Err(e) => panic!("expected LockFailed, got: {e}"),
        Ok(_) => panic!("expected LockFailed, but startup succeeded"),
    }

    assert!(config.socket_path.exists());
    assert!(config.version_path.exists());
    assert_eq!(std::fs::read_to_string(&config.lock_path).unwrap(), "12345");
}

#[tokio::test]
async fn shutdown_snapshots_and_restart_recovers() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    {
        let mut daemon = startup(&config).await.unwrap().daemon;
        let store = &daemon.services.store;
        store
            .register_agent(
                AgentConfig {
                    id: "agent-1".to_string(),
                    credential: "cred-1".to_string(),
                    run_untagged: true,
                    ..Default::default()
                },
                1_000,
            )
            .unwrap();
        store
            .enqueue(JobConfig::builder("job-1", "tok-1").build(), 1_000)
            .unwrap();
        daemon.shutdown().unwrap();
    }

    assert!(config.snapshot_path.exists());
    assert!(!config.socket_path.exists());
    assert!(!config.lock_path.exists());
    assert!(!config.version_path.exists());

    let daemon = startup(&config).await.unwrap().daemon;
    let store = &daemon.services.store;
    assert!(store.get(&ra_core::JobId::new("job-1")).is_some());
    assert!(store.authenticate("cred-1").is_some());
    assert_eq!(store.pending_len(), 1);
}

#[tokio::test]
async fn services_wire_settings_into_coordinator_and_reaper() {
    let settings = Settings {
        two_phase_ack: true,
        ack_ttl_secs: 12,
        reap_after_secs: Some(30),
        ..Default::default()
    };
    let services = Services::new(JobStore::in_memory(), &settings);

    assert!(services.coordinator.gate().is_enabled());
    assert_eq!(
        services.coordinator.config().ack_ttl,
        std::time::Duration::from_secs(12)
    );
    assert_eq!(services.reaper.policy(), settings.reap_policy());
}
