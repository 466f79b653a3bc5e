// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Resolve state directory: RA_STATE_DIR > XDG_STATE_HOME/runack > ~/.local/state/runack
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("RA_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("runack"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/runack"))
}

fn parse_u64(var: &str) -> Option<u64> {
    std::env::var(var).ok().and_then(|s| s.trim().parse().ok())
}

pub fn two_phase_ack() -> Option<bool> {
    std::env::var("RA_TWO_PHASE_ACK")
        .ok()
        .and_then(|s| match s.trim() {
            "1" | "true" | "on" => Some(true),
            "0" | "false" | "off" => Some(false),
            _ => None,
        })
}

pub fn ack_ttl_secs() -> Option<u64> {
    parse_u64("RA_ACK_TTL_SECS")
}

/// `0` turns automatic release off.
pub fn reap_after_secs() -> Option<u64> {
    parse_u64("RA_REAP_AFTER_SECS")
}

pub fn reaper_interval() -> Option<Duration> {
    parse_u64("RA_REAPER_INTERVAL_MS").map(Duration::from_millis)
}
