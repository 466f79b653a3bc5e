// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent identity and worker instance types.
//!
//! An agent is a long-lived worker registration authenticated by a bearer
//! credential. One agent polls from many worker instances (hosts, containers),
//! each identified by a system-supplied instance id. Only the worker instance
//! that acknowledged a job is recorded as its final owner.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a registered agent.
    pub struct AgentId;
}

crate::define_id! {
    /// System-supplied identifier of one worker instance of an agent.
    pub struct WorkerInstanceId;
}

/// Which jobs an agent may pick up with respect to protection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    #[default]
    NotProtected,
    /// Only runs jobs flagged as protected.
    RefProtected,
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessLevel::NotProtected => write!(f, "not_protected"),
            AccessLevel::RefProtected => write!(f, "ref_protected"),
        }
    }
}

/// SHA-256 hex digest of an agent credential. Only digests are persisted.
pub fn credential_digest(credential: &str) -> String {
    format!("{:x}", Sha256::digest(credential.as_bytes()))
}

/// Last contact from one worker instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerInstance {
    pub id: WorkerInstanceId,
    pub contacted_at_ms: u64,
}

/// Configuration for registering an agent
#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    pub id: String,
    pub name: String,
    pub credential: String,
    pub tags: BTreeSet<String>,
    pub run_untagged: bool,
    pub access_level: AccessLevel,
}

/// A registered agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    #[serde(default)]
    pub name: String,
    pub credential_digest: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub run_untagged: bool,
    #[serde(default)]
    pub access_level: AccessLevel,
    /// Paused agents authenticate but receive no work.
    pub active: bool,
    pub registered_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacted_at_ms: Option<u64>,
    #[serde(default)]
    pub instances: BTreeMap<WorkerInstanceId, WorkerInstance>,
}

impl AgentRecord {
    pub fn new(config: AgentConfig, registered_at_ms: u64) -> Self {
        Self {
            id: AgentId::new(config.id),
            name: config.name,
            credential_digest: credential_digest(&config.credential),
            tags: config.tags,
            run_untagged: config.run_untagged,
            access_level: config.access_level,
            active: true,
            registered_at_ms,
            contacted_at_ms: None,
            instances: BTreeMap::new(),
        }
    }

    pub fn credential_matches(&self, credential: &str) -> bool {
        !credential.is_empty() && self.credential_digest == credential_digest(credential)
    }

    pub fn has_instance(&self, instance: &WorkerInstanceId) -> bool {
        self.instances.contains_key(instance)
    }

    /// Record contact from the agent, optionally through a worker instance.
    pub fn touch(&mut self, instance: Option<&WorkerInstanceId>, at_ms: u64) {
        self.contacted_at_ms = Some(self.contacted_at_ms.map_or(at_ms, |t| t.max(at_ms)));
        if let Some(instance) = instance {
            let entry = self
                .instances
                .entry(instance.clone())
                .or_insert_with(|| WorkerInstance {
                    id: instance.clone(),
                    contacted_at_ms: at_ms,
                });
            entry.contacted_at_ms = entry.contacted_at_ms.max(at_ms);
        }
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
