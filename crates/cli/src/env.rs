// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the CLI crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::client::ClientError;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Resolve state directory: RA_STATE_DIR > XDG_STATE_HOME/runack > ~/.local/state/runack
///
/// Must agree with the daemon's resolution or the CLI looks for the wrong socket.
pub fn state_dir() -> Result<PathBuf, ClientError> {
    if let Ok(dir) = std::env::var("RA_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("runack"));
    }
    let home = std::env::var("HOME").map_err(|_| ClientError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/runack"))
}

/// Read RA_STATE_DIR raw (for diagnostic logging)
pub fn state_dir_raw() -> Option<String> {
    std::env::var("RA_STATE_DIR").ok()
}

/// Credential agents use when `--credential` is not given.
pub fn agent_credential() -> Option<String> {
    std::env::var("RA_AGENT_CREDENTIAL")
        .ok()
        .filter(|s| !s.is_empty())
}

pub fn no_color() -> bool {
    std::env::var("NO_COLOR").is_ok_and(|v| v == "1")
}

pub fn force_color() -> bool {
    std::env::var("COLOR").is_ok_and(|v| v == "1")
}

pub fn timeout_ipc() -> Duration {
    parse_duration_ms("RA_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}
