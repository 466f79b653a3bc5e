// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Summary and detail types carried in responses.
//!
//! Job tokens never leave the daemon through these; only the agent that
//! claims a job receives its token, inside the assignment.

use std::collections::BTreeSet;

use ra_core::{
    AccessLevel, AckWaitStatus, AgentRecord, ClaimMode, FailureReason, Job, JobStatus, RunRecord,
};
use serde::{Deserialize, Serialize};

/// Job row for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: String,
    pub name: String,
    pub status: JobStatus,
    pub ack_wait: AckWaitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_mode: Option<ClaimMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub queued_at_ms: u64,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.to_string(),
            name: job.name.clone(),
            status: job.status,
            ack_wait: job.ack_wait,
            claim_mode: job.claim_mode,
            agent_id: job.assigned_agent_id.as_ref().map(ToString::to_string),
            queued_at_ms: job.queued_at_ms,
        }
    }
}

/// Everything known about one job, minus its token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDetail {
    pub id: String,
    pub name: String,
    pub status: JobStatus,
    pub ack_wait: AckWaitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_mode: Option<ClaimMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_instance: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub required_features: BTreeSet<String>,
    pub queued_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<RunRecord>,
}

impl JobDetail {
    pub fn new(job: &Job, run: Option<RunRecord>) -> Self {
        Self {
            id: job.id.to_string(),
            name: job.name.clone(),
            status: job.status,
            ack_wait: job.ack_wait,
            claim_mode: job.claim_mode,
            agent_id: job.assigned_agent_id.as_ref().map(ToString::to_string),
            worker_instance: job
                .assigned_worker_instance_id
                .as_ref()
                .map(ToString::to_string),
            tags: job.tags.clone(),
            protected: job.protected,
            required_features: job.required_features.clone(),
            queued_at_ms: job.queued_at_ms,
            claimed_at_ms: job.claimed_at_ms,
            started_at_ms: job.started_at_ms,
            finished_at_ms: job.finished_at_ms,
            duration_ms: job.duration_ms(),
            failure_reason: job.failure_reason,
            run,
        }
    }
}

/// Agent row for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub id: String,
    pub name: String,
    pub active: bool,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub run_untagged: bool,
    #[serde(default)]
    pub access_level: AccessLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacted_at_ms: Option<u64>,
    /// Worker instances seen polling for this agent
    #[serde(default)]
    pub instances: Vec<String>,
}

impl From<&AgentRecord> for AgentSummary {
    fn from(agent: &AgentRecord) -> Self {
        Self {
            id: agent.id.to_string(),
            name: agent.name.clone(),
            active: agent.active,
            tags: agent.tags.clone(),
            run_untagged: agent.run_untagged,
            access_level: agent.access_level,
            contacted_at_ms: agent.contacted_at_ms,
            instances: agent.instances.keys().map(ToString::to_string).collect(),
        }
    }
}

/// Daemon overview
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusOverview {
    pub uptime_secs: u64,
    /// Queued, unassigned
    pub jobs_queued: usize,
    /// Claimed two-phase, waiting for acknowledgment
    pub jobs_waiting: usize,
    pub jobs_running: usize,
    pub jobs_finished: usize,
    pub agents: usize,
    pub agents_active: usize,
    pub ack_gate: bool,
    /// `manual` or the release grace in seconds
    pub reap_policy: String,
}
