// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable state changes recorded in the write-ahead log

use crate::agent::{AccessLevel, AgentId, WorkerInstanceId};
use crate::job::{ClaimMode, FailureReason, JobId, JobStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Every mutation of durable state.
///
/// Serializes with `{"type": "job:claimed", ...fields}` format.
/// Unknown type tags deserialize to `Custom` and are ignored on replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- job --
    #[serde(rename = "job:enqueued")]
    JobEnqueued {
        id: JobId,
        token: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        tags: BTreeSet<String>,
        #[serde(default)]
        protected: bool,
        #[serde(default)]
        required_features: BTreeSet<String>,
        enqueue_seq: u64,
        at_ms: u64,
    },

    /// Job removed from the pending index and bound to an agent.
    ///
    /// `Direct` claims start the job immediately on `worker_instance_id`;
    /// `TwoPhase` claims leave it waiting for acknowledgment.
    #[serde(rename = "job:claimed")]
    JobClaimed {
        id: JobId,
        agent_id: AgentId,
        worker_instance_id: WorkerInstanceId,
        mode: ClaimMode,
        at_ms: u64,
    },

    #[serde(rename = "job:acknowledged")]
    JobAcknowledged {
        id: JobId,
        worker_instance_id: WorkerInstanceId,
        at_ms: u64,
    },

    /// Waiting job returned to the queue under a fresh token.
    #[serde(rename = "job:released")]
    JobReleased {
        id: JobId,
        token: String,
        at_ms: u64,
        #[serde(default)]
        reason: String,
    },

    #[serde(rename = "job:finished")]
    JobFinished {
        id: JobId,
        status: JobStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failure_reason: Option<FailureReason>,
        at_ms: u64,
    },

    /// Job failed during matching without ever being assigned.
    #[serde(rename = "job:dropped")]
    JobDropped {
        id: JobId,
        reason: FailureReason,
        at_ms: u64,
    },

    // -- agent --
    #[serde(rename = "agent:registered")]
    AgentRegistered {
        id: AgentId,
        #[serde(default)]
        name: String,
        credential_digest: String,
        #[serde(default)]
        tags: BTreeSet<String>,
        #[serde(default)]
        run_untagged: bool,
        #[serde(default)]
        access_level: AccessLevel,
        at_ms: u64,
    },

    #[serde(rename = "agent:contacted")]
    AgentContacted {
        id: AgentId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        worker_instance_id: Option<WorkerInstanceId>,
        at_ms: u64,
    },

    #[serde(rename = "agent:activity")]
    AgentActivity { id: AgentId, active: bool },

    #[serde(other)]
    Custom,
}

impl Event {
    pub fn name(&self) -> &str {
        match self {
            Event::JobEnqueued { .. } => "job:enqueued",
            Event::JobClaimed { .. } => "job:claimed",
            Event::JobAcknowledged { .. } => "job:acknowledged",
            Event::JobReleased { .. } => "job:released",
            Event::JobFinished { .. } => "job:finished",
            Event::JobDropped { .. } => "job:dropped",
            Event::AgentRegistered { .. } => "agent:registered",
            Event::AgentContacted { .. } => "agent:contacted",
            Event::AgentActivity { .. } => "agent:activity",
            Event::Custom => "custom",
        }
    }

    /// The job this event mutates, if any.
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Event::JobEnqueued { id, .. }
            | Event::JobClaimed { id, .. }
            | Event::JobAcknowledged { id, .. }
            | Event::JobReleased { id, .. }
            | Event::JobFinished { id, .. }
            | Event::JobDropped { id, .. } => Some(id),
            Event::AgentRegistered { .. }
            | Event::AgentContacted { .. }
            | Event::AgentActivity { .. }
            | Event::Custom => None,
        }
    }

    /// One-line description for logs. Never includes tokens or digests.
    pub fn log_summary(&self) -> String {
        let t = self.name();
        match self {
            Event::JobEnqueued { id, name, tags, .. } => {
                if tags.is_empty() {
                    format!("{t} id={id} name={name}")
                } else {
                    let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
                    format!("{t} id={id} name={name} tags={}", tags.join(","))
                }
            }
            Event::JobClaimed {
                id,
                agent_id,
                worker_instance_id,
                mode,
                ..
            } => format!("{t} id={id} agent={agent_id} instance={worker_instance_id} mode={mode}"),
            Event::JobAcknowledged {
                id,
                worker_instance_id,
                ..
            } => format!("{t} id={id} instance={worker_instance_id}"),
            Event::JobReleased { id, reason, .. } => format!("{t} id={id} reason={reason}"),
            Event::JobFinished {
                id,
                status,
                failure_reason,
                ..
            } => match failure_reason {
                Some(reason) => format!("{t} id={id} status={status} reason={reason}"),
                None => format!("{t} id={id} status={status}"),
            },
            Event::JobDropped { id, reason, .. } => format!("{t} id={id} reason={reason}"),
            Event::AgentRegistered { id, name, .. } => format!("{t} id={id} name={name}"),
            Event::AgentContacted {
                id,
                worker_instance_id,
                ..
            } => match worker_instance_id {
                Some(instance) => format!("{t} id={id} instance={instance}"),
                None => format!("{t} id={id}"),
            },
            Event::AgentActivity { id, active } => format!("{t} id={id} active={active}"),
            Event::Custom => t.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
