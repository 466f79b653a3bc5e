// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent-facing calls: polling, signals and result reports.

use std::time::Duration;

use ra_core::{AgentFeatures, FailureReason, JobId, JobStatus, WorkerInstanceId};
use ra_engine::{JobResult, StateUpdate, StatusClass, WorkRequest};
use ra_storage::WorkItemStore;

use super::{error_response, ListenCtx};
use crate::protocol::{JobDetail, Response};

pub(super) async fn handle_request_work(
    ctx: &ListenCtx,
    credential: String,
    worker_instance: String,
    features: AgentFeatures,
    job_age_secs: Option<u64>,
) -> Response {
    let Some(worker_instance) = instance_id(Some(worker_instance)) else {
        return Response::error(StatusClass::BadRequest, "worker instance required");
    };
    let request = WorkRequest {
        credential,
        worker_instance,
        features,
        job_age: job_age_secs.map(Duration::from_secs),
    };
    match ctx.services.coordinator.request_work(request).await {
        Ok(Some(assignment)) => Response::Assigned { assignment },
        Ok(None) => Response::NoContent,
        Err(e) => error_response(e),
    }
}

pub(super) async fn handle_signal(
    ctx: &ListenCtx,
    job_id: &str,
    token: &str,
    state: Option<&str>,
    worker_instance: Option<String>,
    failure_reason: Option<&str>,
) -> Response {
    let job_id = JobId::new(job_id);
    let worker_instance = instance_id(worker_instance);
    let update = ctx
        .services
        .coordinator
        .update_state(
            &job_id,
            token,
            state,
            worker_instance.as_ref(),
            failure_reason,
        )
        .await;
    match update {
        Ok(StateUpdate::Heartbeat) => Response::Ok,
        Ok(StateUpdate::Acknowledged(outcome)) => Response::Acknowledged { outcome },
        Ok(StateUpdate::Finished(job)) => finished(ctx, &job),
        Err(e) => error_response(e),
    }
}

pub(super) async fn handle_report_result(
    ctx: &ListenCtx,
    job_id: &str,
    token: &str,
    status: &str,
    failure_reason: Option<&str>,
) -> Response {
    let Some(status) = JobStatus::parse(status.trim()) else {
        return Response::error(
            StatusClass::BadRequest,
            format!("unknown status: {}", status.trim()),
        );
    };
    let failure_reason = match failure_reason.map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => match FailureReason::parse(raw) {
            Some(reason) => Some(reason),
            None => {
                return Response::error(
                    StatusClass::BadRequest,
                    format!("unknown failure reason: {raw}"),
                )
            }
        },
    };

    let result = ctx
        .services
        .coordinator
        .report_result(
            &JobId::new(job_id),
            token,
            JobResult {
                status,
                failure_reason,
            },
        )
        .await;
    match result {
        Ok(job) => finished(ctx, &job),
        Err(e) => error_response(e),
    }
}

fn finished(ctx: &ListenCtx, job: &ra_core::Job) -> Response {
    let run = ctx.services.store.run_record(&job.id);
    Response::Finished {
        job: Box::new(JobDetail::new(job, run)),
    }
}

/// Blank instance ids count as absent.
fn instance_id(raw: Option<String>) -> Option<WorkerInstanceId> {
    raw.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(WorkerInstanceId::new)
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
