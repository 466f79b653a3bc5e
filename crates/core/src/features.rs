// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capability set declared by an agent on each poll.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Capability name for the two-phase acknowledgment handshake.
pub const TWO_PHASE_JOB_COMMIT: &str = "two_phase_job_commit";

/// Declared features, `name -> supported`. Absent means unsupported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentFeatures(BTreeMap<String, bool>);

impl AgentFeatures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, supported: bool) -> Self {
        self.0.insert(name.into(), supported);
        self
    }

    pub fn supports(&self, name: &str) -> bool {
        self.0.get(name).copied().unwrap_or(false)
    }

    pub fn supports_two_phase(&self) -> bool {
        self.supports(TWO_PHASE_JOB_COMMIT)
    }

    /// Features in `required` this agent does not support.
    pub fn missing<'a>(&self, required: &'a BTreeSet<String>) -> Vec<&'a str> {
        required
            .iter()
            .filter(|name| !self.supports(name))
            .map(String::as_str)
            .collect()
    }
}

impl<S: Into<String>> FromIterator<(S, bool)> for AgentFeatures {
    fn from_iter<I: IntoIterator<Item = (S, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
