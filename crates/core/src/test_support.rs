// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{
    credential_digest, AccessLevel, AgentConfig, AgentId, ClaimMode, Event, FailureReason,
    JobConfig, JobId, JobStatus, WorkerInstanceId,
};

pub const TEST_EPOCH_MS: u64 = 1_000_000;

// ── Config builders ─────────────────────────────────────────────────────────

/// Untagged job with token `tok-{id}`.
pub fn job_config(id: &str) -> JobConfig {
    JobConfig::builder(id, format!("tok-{id}")).name("job").build()
}

/// Agent that runs untagged jobs.
pub fn agent_config(id: &str, credential: &str) -> AgentConfig {
    AgentConfig {
        id: id.to_string(),
        name: id.to_string(),
        credential: credential.to_string(),
        run_untagged: true,
        ..Default::default()
    }
}

// ── Event factory functions ─────────────────────────────────────────────────

pub fn job_enqueued_event(id: &str, enqueue_seq: u64) -> Event {
    Event::JobEnqueued {
        id: JobId::new(id),
        token: format!("tok-{id}"),
        name: "job".to_string(),
        tags: Default::default(),
        protected: false,
        required_features: Default::default(),
        enqueue_seq,
        at_ms: TEST_EPOCH_MS,
    }
}

pub fn job_claimed_event(id: &str, agent_id: &str, instance: &str, mode: ClaimMode) -> Event {
    Event::JobClaimed {
        id: JobId::new(id),
        agent_id: AgentId::new(agent_id),
        worker_instance_id: WorkerInstanceId::new(instance),
        mode,
        at_ms: TEST_EPOCH_MS + 1_000,
    }
}

pub fn job_acknowledged_event(id: &str, instance: &str) -> Event {
    Event::JobAcknowledged {
        id: JobId::new(id),
        worker_instance_id: WorkerInstanceId::new(instance),
        at_ms: TEST_EPOCH_MS + 2_000,
    }
}

pub fn job_released_event(id: &str, token: &str) -> Event {
    Event::JobReleased {
        id: JobId::new(id),
        token: token.to_string(),
        at_ms: TEST_EPOCH_MS + 3_000,
        reason: "liveness lost".to_string(),
    }
}

pub fn job_finished_event(
    id: &str,
    status: JobStatus,
    failure_reason: Option<FailureReason>,
) -> Event {
    Event::JobFinished {
        id: JobId::new(id),
        status,
        failure_reason,
        at_ms: TEST_EPOCH_MS + 4_000,
    }
}

pub fn agent_registered_event(id: &str, credential: &str) -> Event {
    Event::AgentRegistered {
        id: AgentId::new(id),
        name: id.to_string(),
        credential_digest: credential_digest(credential),
        tags: Default::default(),
        run_untagged: true,
        access_level: AccessLevel::NotProtected,
        at_ms: TEST_EPOCH_MS,
    }
}
