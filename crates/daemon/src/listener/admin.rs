// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator mutations: enqueue, agent registry, release, cancel, gate.

use ra_core::{AccessLevel, AgentConfig, AgentId, Clock, IdGen, JobConfig, JobId};
use ra_engine::StatusClass;
use ra_storage::{AgentRegistry, StoreError, WorkItemStore};
use tracing::{error, info};

use super::{error_response, ListenCtx};
use crate::protocol::{AgentSummary, JobDetail, JobSummary, Response};

pub(super) fn handle_enqueue(
    ctx: &ListenCtx,
    id: Option<String>,
    name: String,
    tags: Vec<String>,
    protected: bool,
    required_features: Vec<String>,
) -> Response {
    let id = id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| ctx.id_gen.next());
    let mut builder = JobConfig::builder(id, ctx.id_gen.secret())
        .name(name)
        .protected(protected);
    for tag in tags {
        builder = builder.tag(tag);
    }
    for feature in required_features {
        builder = builder.requires(feature);
    }

    let services = &ctx.services;
    match services
        .store
        .enqueue(builder.build(), services.coordinator.clock().epoch_ms())
    {
        Ok(job) => {
            info!(job_id = %job.id, enqueue_seq = job.enqueue_seq, "job enqueued");
            Response::JobEnqueued {
                job: JobSummary::from(&job),
            }
        }
        Err(e) => store_error(e),
    }
}

/// Fields of a `RegisterAgent` request
pub(super) struct AgentRegistration {
    pub id: String,
    pub name: String,
    pub credential: Option<String>,
    pub tags: Vec<String>,
    pub run_untagged: bool,
    pub access_level: AccessLevel,
}

pub(super) fn handle_register_agent(ctx: &ListenCtx, registration: AgentRegistration) -> Response {
    let id = registration.id.trim().to_string();
    if id.is_empty() {
        return Response::error(StatusClass::BadRequest, "agent id required");
    }
    let credential = registration
        .credential
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| ctx.id_gen.secret());
    let config = AgentConfig {
        id,
        name: registration.name,
        credential: credential.clone(),
        tags: registration.tags.into_iter().collect(),
        run_untagged: registration.run_untagged,
        access_level: registration.access_level,
    };

    let services = &ctx.services;
    match services
        .store
        .register_agent(config, services.coordinator.clock().epoch_ms())
    {
        Ok(agent) => {
            info!(agent_id = %agent.id, "agent registered");
            Response::AgentRegistered {
                agent: AgentSummary::from(&agent),
                credential,
            }
        }
        Err(e) => store_error(e),
    }
}

pub(super) fn handle_set_agent_active(ctx: &ListenCtx, agent_id: &str, active: bool) -> Response {
    match ctx
        .services
        .store
        .set_agent_active(&AgentId::new(agent_id), active)
    {
        Ok(agent) => {
            info!(agent_id = %agent.id, active, "agent updated");
            Response::Agent {
                agent: AgentSummary::from(&agent),
            }
        }
        Err(e) => store_error(e),
    }
}

pub(super) async fn handle_release(ctx: &ListenCtx, job_id: &str) -> Response {
    match ctx.services.reaper.release_job(&JobId::new(job_id)).await {
        Ok(job) => job_updated(ctx, &job),
        Err(e) => error_response(e),
    }
}

pub(super) async fn handle_cancel(ctx: &ListenCtx, job_id: &str) -> Response {
    match ctx.services.coordinator.cancel_job(&JobId::new(job_id)).await {
        Ok(job) => job_updated(ctx, &job),
        Err(e) => error_response(e),
    }
}

pub(super) fn handle_set_gate(ctx: &ListenCtx, enabled: bool) -> Response {
    let previous = ctx.services.coordinator.gate().set(enabled);
    if previous != enabled {
        info!(enabled, "ack gate changed");
    }
    Response::Gate {
        enabled,
        previous: Some(previous),
    }
}

fn job_updated(ctx: &ListenCtx, job: &ra_core::Job) -> Response {
    let run = ctx.services.store.run_record(&job.id);
    Response::JobUpdated {
        job: Box::new(JobDetail::new(job, run)),
    }
}

fn store_error(e: StoreError) -> Response {
    match e {
        StoreError::DuplicateJob(_) | StoreError::DuplicateAgent(_) => {
            Response::error(StatusClass::Conflict, e.to_string())
        }
        StoreError::AgentNotFound(_) => Response::error(StatusClass::BadRequest, e.to_string()),
        StoreError::Wal(_) | StoreError::Snapshot(_) => {
            error!(error = %e, "store write failed");
            Response::error(StatusClass::Internal, e.to_string())
        }
    }
}

#[cfg(test)]
#[path = "admin_tests.rs"]
mod tests;
