// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Diagnostic logging for the CLI client.
//!
//! Agents usually run the CLI from scripts whose stderr nobody reads, so
//! connection failures are also appended to `<state_dir>/cli.log`.

use std::path::PathBuf;

use crate::client::ClientError;

fn write_cli_log(message: String) {
    use std::io::Write;
    use std::time::SystemTime;

    let log_path = crate::env::state_dir()
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
        .join("cli.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    if let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let timestamp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let state_dir = crate::env::state_dir_raw().unwrap_or_else(|| "(not set)".to_string());
        let _ = writeln!(
            file,
            "[ts={}] pid={} RA_STATE_DIR={} {}",
            timestamp,
            std::process::id(),
            state_dir,
            message
        );
    }
}

/// Record a failed daemon round trip.
pub fn log_connection_error(error: &ClientError) {
    let socket_path = crate::env::state_dir()
        .map(|p| p.join("daemon.sock").display().to_string())
        .unwrap_or_else(|_| "(unknown)".to_string());
    write_cli_log(format!("socket={} error={}", socket_path, error));
}
