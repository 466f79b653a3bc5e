// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol between `ra` (operators and agents) and the daemon.
//!
//! Every connection carries exactly one request and one response.
//! Responses map onto the status classes agents see: created, ok,
//! no-content, forbidden, bad-request and conflict.

use ra_core::{AccessLevel, AgentFeatures, RunRecord};
use ra_engine::{AckOutcome, Assignment, StatusClass};
use serde::{Deserialize, Serialize};

#[path = "protocol_types.rs"]
mod types;
#[path = "protocol_wire.rs"]
mod wire;

pub use types::{AgentSummary, JobDetail, JobSummary, StatusOverview};
pub use wire::{
    decode, encode, read_message, read_request, write_message, write_response, ProtocolError,
    DEFAULT_TIMEOUT, MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};

/// Request from a client to the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check
    Ping,

    /// Version handshake
    Hello { version: String },

    /// Daemon overview
    Status,

    /// Request daemon shutdown
    Shutdown,

    /// Agent poll for the next job
    RequestWork {
        credential: String,
        worker_instance: String,
        #[serde(default)]
        features: AgentFeatures,
        /// Only jobs queued at least this long
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job_age_secs: Option<u64>,
    },

    /// Raw state update: `pending` heartbeats, `running` acknowledges,
    /// terminal states report a result
    Signal {
        job_id: String,
        token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        worker_instance: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failure_reason: Option<String>,
    },

    /// Terminal result for a running job
    ReportResult {
        job_id: String,
        token: String,
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failure_reason: Option<String>,
    },

    /// Queue a new job (operator)
    EnqueueJob {
        /// Generated when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default)]
        name: String,
        #[serde(default)]
        tags: Vec<String>,
        #[serde(default)]
        protected: bool,
        #[serde(default)]
        required_features: Vec<String>,
    },

    /// Register an agent (operator)
    RegisterAgent {
        id: String,
        #[serde(default)]
        name: String,
        /// Generated when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        credential: Option<String>,
        #[serde(default)]
        tags: Vec<String>,
        #[serde(default)]
        run_untagged: bool,
        #[serde(default)]
        access_level: AccessLevel,
    },

    /// Pause or resume an agent (operator)
    SetAgentActive { agent_id: String, active: bool },

    /// Put a waiting job back in the queue (operator)
    ReleaseJob { job_id: String },

    /// Cancel a job that has not finished (operator)
    CancelJob { job_id: String },

    /// Flip the two-phase acknowledgment gate (operator)
    SetAckGate { enabled: bool },

    /// Read-only state query
    Query { query: Query },
}

/// Read-only queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Query {
    ListJobs {
        /// Restrict to one lifecycle status
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
    },
    GetJob {
        id: String,
    },
    ListAgents,
    ListRuns,
    GateStatus,
}

/// Response from the daemon to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Pong,

    Hello { version: String },

    ShuttingDown,

    Ok,

    /// No job available for this poll
    NoContent,

    /// A job was claimed for the polling agent
    Assigned { assignment: Assignment },

    Acknowledged { outcome: AckOutcome },

    Finished { job: Box<JobDetail> },

    JobEnqueued { job: JobSummary },

    /// Carries the credential the agent must present on every poll
    AgentRegistered {
        agent: AgentSummary,
        credential: String,
    },

    Agent { agent: AgentSummary },

    /// Result of an operator release or cancel
    JobUpdated { job: Box<JobDetail> },

    Job { job: Option<Box<JobDetail>> },

    Jobs { jobs: Vec<JobSummary> },

    Agents { agents: Vec<AgentSummary> },

    Runs { runs: Vec<RunRecord> },

    Gate {
        enabled: bool,
        /// Set when the request changed the gate
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous: Option<bool>,
    },

    Status { status: StatusOverview },

    Error { status: StatusClass, message: String },
}

impl Response {
    pub fn error(status: StatusClass, message: impl Into<String>) -> Self {
        Response::Error {
            status,
            message: message.into(),
        }
    }

    /// Status class this response maps onto.
    pub fn status(&self) -> StatusClass {
        match self {
            Response::Assigned { .. }
            | Response::JobEnqueued { .. }
            | Response::AgentRegistered { .. } => StatusClass::Created,
            Response::NoContent => StatusClass::NoContent,
            Response::Error { status, .. } => *status,
            _ => StatusClass::Ok,
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
