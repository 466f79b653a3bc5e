// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identity, lifecycle status and assignment state.

use crate::agent::{AgentId, WorkerInstanceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

crate::define_id! {
    /// Unique identifier for a job.
    ///
    /// Agents address every protocol call by job id plus the bearer token
    /// handed out when the job was claimed.
    #[derive(Default)]
    pub struct JobId;
}

/// Lifecycle status of a job. Terminal statuses are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Failed | JobStatus::Canceled
        )
    }

    /// Parse the wire name of a status (`"running"`, `"success"`, ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(JobStatus::Created),
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "success" => Some(JobStatus::Success),
            "failed" => Some(JobStatus::Failed),
            "canceled" => Some(JobStatus::Canceled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Created => "created",
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a claimed job is waiting for the agent to acknowledge it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckWaitStatus {
    #[default]
    NotWaiting,
    Waiting,
}

impl fmt::Display for AckWaitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckWaitStatus::NotWaiting => write!(f, "not_waiting"),
            AckWaitStatus::Waiting => write!(f, "waiting"),
        }
    }
}

/// How a job was handed out. Decided once at claim time and never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimMode {
    /// Job went straight to `running` on claim.
    Direct,
    /// Job stays `pending`/`waiting` until the agent acknowledges it.
    TwoPhase,
}

impl fmt::Display for ClaimMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimMode::Direct => write!(f, "direct"),
            ClaimMode::TwoPhase => write!(f, "two_phase"),
        }
    }
}

/// Why a job ended up `failed` (or `canceled`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    ScriptFailure,
    RunnerUnsupported,
    StuckOrTimeout,
    RunnerSystemFailure,
    UnknownFailure,
    Canceled,
}

impl FailureReason {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "script_failure" => Some(FailureReason::ScriptFailure),
            "runner_unsupported" => Some(FailureReason::RunnerUnsupported),
            "stuck_or_timeout" => Some(FailureReason::StuckOrTimeout),
            "runner_system_failure" => Some(FailureReason::RunnerSystemFailure),
            "unknown_failure" => Some(FailureReason::UnknownFailure),
            "canceled" => Some(FailureReason::Canceled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::ScriptFailure => "script_failure",
            FailureReason::RunnerUnsupported => "runner_unsupported",
            FailureReason::StuckOrTimeout => "stuck_or_timeout",
            FailureReason::RunnerSystemFailure => "runner_system_failure",
            FailureReason::UnknownFailure => "unknown_failure",
            FailureReason::Canceled => "canceled",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for enqueuing a new job
#[derive(Debug, Clone, Default)]
pub struct JobConfig {
    pub id: String,
    pub token: String,
    pub name: String,
    pub tags: BTreeSet<String>,
    pub protected: bool,
    /// Agent features the job cannot run without.
    pub required_features: BTreeSet<String>,
}

impl JobConfig {
    pub fn builder(id: impl Into<String>, token: impl Into<String>) -> JobConfigBuilder {
        JobConfigBuilder {
            config: JobConfig {
                id: id.into(),
                token: token.into(),
                ..Default::default()
            },
        }
    }
}

/// Builder for [`JobConfig`]
pub struct JobConfigBuilder {
    config: JobConfig,
}

impl JobConfigBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.config.tags.insert(tag.into());
        self
    }

    pub fn protected(mut self, protected: bool) -> Self {
        self.config.protected = protected;
        self
    }

    pub fn requires(mut self, feature: impl Into<String>) -> Self {
        self.config.required_features.insert(feature.into());
        self
    }

    pub fn build(self) -> JobConfig {
        self.config
    }
}

/// A state invariant a job record failed to satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("job is waiting for acknowledgment but not pending")]
    WaitingNotPending,
    #[error("job is waiting for acknowledgment but has no assigned agent")]
    WaitingUnassigned,
    #[error("running job is still waiting for acknowledgment")]
    RunningWhileWaiting,
    #[error("running job has no start time")]
    RunningWithoutStart,
    #[error("running job has no worker instance")]
    RunningWithoutInstance,
    #[error("terminal job has no finish time")]
    TerminalWithoutFinish,
}

/// A unit of work and its assignment state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Bearer token; only the agent currently entitled to the job holds it.
    pub token: String,
    #[serde(default)]
    pub name: String,
    pub status: JobStatus,
    #[serde(default)]
    pub ack_wait: AckWaitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_mode: Option<ClaimMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent_id: Option<AgentId>,
    /// Resolved only when the job starts running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_worker_instance_id: Option<WorkerInstanceId>,
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
    pub failure_reason: Option<FailureReason>,
    /// Position in the pending index; preserved across releases.
    #[serde(default)]
    pub enqueue_seq: u64,
}

impl Job {
    /// Create a pending, unassigned job.
    pub fn new(config: JobConfig, enqueue_seq: u64, queued_at_ms: u64) -> Self {
        Self {
            id: JobId::new(config.id),
            token: config.token,
            name: config.name,
            status: JobStatus::Pending,
            ack_wait: AckWaitStatus::NotWaiting,
            claim_mode: None,
            assigned_agent_id: None,
            assigned_worker_instance_id: None,
            tags: config.tags,
            protected: config.protected,
            required_features: config.required_features,
            queued_at_ms,
            claimed_at_ms: None,
            started_at_ms: None,
            finished_at_ms: None,
            failure_reason: None,
            enqueue_seq,
        }
    }

    /// Pending with nobody assigned.
    pub fn is_claimable(&self) -> bool {
        self.status == JobStatus::Pending && self.assigned_agent_id.is_none()
    }

    pub fn is_waiting_for_ack(&self) -> bool {
        self.ack_wait == AckWaitStatus::Waiting
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn token_matches(&self, token: &str) -> bool {
        !token.is_empty() && self.token == token
    }

    pub fn is_assigned_to(&self, agent_id: &AgentId) -> bool {
        self.assigned_agent_id.as_ref() == Some(agent_id)
    }

    /// Run time, once both start and finish are known.
    pub fn duration_ms(&self) -> Option<u64> {
        match (self.started_at_ms, self.finished_at_ms) {
            (Some(start), Some(end)) => Some(end.saturating_sub(start)),
            _ => None,
        }
    }

    /// How long the job sat in the queue before it was claimed.
    pub fn queued_duration_ms(&self) -> Option<u64> {
        self.claimed_at_ms
            .map(|claimed| claimed.saturating_sub(self.queued_at_ms))
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if self.is_waiting_for_ack() {
            if self.status != JobStatus::Pending {
                return Err(InvariantViolation::WaitingNotPending);
            }
            if self.assigned_agent_id.is_none() {
                return Err(InvariantViolation::WaitingUnassigned);
            }
        }
        if self.status == JobStatus::Running {
            if self.is_waiting_for_ack() {
                return Err(InvariantViolation::RunningWhileWaiting);
            }
            if self.started_at_ms.is_none() {
                return Err(InvariantViolation::RunningWithoutStart);
            }
            if self.assigned_worker_instance_id.is_none() {
                return Err(InvariantViolation::RunningWithoutInstance);
            }
        }
        if self.is_terminal() && self.finished_at_ms.is_none() {
            return Err(InvariantViolation::TerminalWithoutFinish);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
