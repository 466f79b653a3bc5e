// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for listener tests: an in-memory daemon driven through
//! protocol requests.

use std::sync::Arc;

use ra_core::test_support::agent_config;
use ra_core::{AgentFeatures, Clock, TWO_PHASE_JOB_COMMIT};
use ra_engine::Assignment;
use ra_storage::{AgentRegistry, JobStore};
use tokio::sync::Notify;

use super::{handle_request, ListenCtx};
use crate::lifecycle::Services;
use crate::protocol::{JobSummary, Request, Response};
use crate::settings::Settings;

pub(crate) const CREDENTIAL: &str = "cred-1";
pub(crate) const HOST: &str = "host-a";

/// Gate on, one registered agent.
pub(crate) fn test_ctx() -> ListenCtx {
    test_ctx_with(Settings {
        two_phase_ack: true,
        ..Default::default()
    })
}

pub(crate) fn test_ctx_with(settings: Settings) -> ListenCtx {
    let services = Services::new(JobStore::in_memory(), &settings);
    services
        .store
        .register_agent(
            agent_config("agent-1", CREDENTIAL),
            services.coordinator.clock().epoch_ms(),
        )
        .unwrap();
    ListenCtx::new(services, Arc::new(Notify::new()))
}

pub(crate) fn two_phase() -> AgentFeatures {
    AgentFeatures::new().with(TWO_PHASE_JOB_COMMIT, true)
}

pub(crate) async fn send(ctx: &ListenCtx, request: Request) -> Response {
    handle_request(request, ctx).await
}

pub(crate) async fn enqueue(ctx: &ListenCtx, id: &str) -> JobSummary {
    let response = send(
        ctx,
        Request::EnqueueJob {
            id: Some(id.to_string()),
            name: format!("{id}-name"),
            tags: vec![],
            protected: false,
            required_features: vec![],
        },
    )
    .await;
    match response {
        Response::JobEnqueued { job } => job,
        other => panic!("expected JobEnqueued, got {other:?}"),
    }
}

pub(crate) fn poll(features: AgentFeatures) -> Request {
    Request::RequestWork {
        credential: CREDENTIAL.to_string(),
        worker_instance: HOST.to_string(),
        features,
        job_age_secs: None,
    }
}

/// Poll as agent-1; panics if nothing was assigned.
pub(crate) async fn claim(ctx: &ListenCtx, features: AgentFeatures) -> Assignment {
    match send(ctx, poll(features)).await {
        Response::Assigned { assignment } => assignment,
        other => panic!("expected Assigned, got {other:?}"),
    }
}

pub(crate) fn signal(assignment: &Assignment, state: &str) -> Request {
    Request::Signal {
        job_id: assignment.id.to_string(),
        token: assignment.token.clone(),
        state: Some(state.to_string()),
        worker_instance: Some(HOST.to_string()),
        failure_reason: None,
    }
}
