// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon settings from `<state_dir>/config.toml`, with environment
//! overrides.

use std::path::Path;
use std::time::Duration;

use ra_engine::{CoordinatorConfig, ReapPolicy};
use serde::Deserialize;
use thiserror::Error;

use crate::env;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Initial state of the two-phase acknowledgment gate
    pub two_phase_ack: bool,
    /// Lifetime of a liveness entry between heartbeats
    pub ack_ttl_secs: u64,
    /// Release stalled handshakes after this long; absent means manual
    pub reap_after_secs: Option<u64>,
    pub reaper_interval_secs: u64,
    pub max_queue_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            two_phase_ack: false,
            ack_ttl_secs: 300,
            reap_after_secs: None,
            reaper_interval_secs: 10,
            max_queue_depth: 1000,
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(SettingsError::Read {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    pub fn parse(text: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `RA_TWO_PHASE_ACK`, `RA_ACK_TTL_SECS` and `RA_REAP_AFTER_SECS`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(enabled) = env::two_phase_ack() {
            self.two_phase_ack = enabled;
        }
        if let Some(secs) = env::ack_ttl_secs() {
            self.ack_ttl_secs = secs;
        }
        if let Some(secs) = env::reap_after_secs() {
            self.reap_after_secs = (secs > 0).then_some(secs);
        }
        self
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            ack_ttl: Duration::from_secs(self.ack_ttl_secs),
            max_queue_depth: self.max_queue_depth,
        }
    }

    pub fn reap_policy(&self) -> ReapPolicy {
        match self.reap_after_secs {
            Some(secs) if secs > 0 => ReapPolicy::ReleaseAfter(Duration::from_secs(secs)),
            _ => ReapPolicy::Manual,
        }
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
