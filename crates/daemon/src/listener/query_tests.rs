// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use ra_core::{AckWaitStatus, JobStatus};
use ra_engine::StatusClass;

use super::super::test_helpers::*;
use crate::protocol::{Query, Request, Response};

fn query(query: Query) -> Request {
    Request::Query { query }
}

#[tokio::test]
async fn list_jobs_in_queue_order() {
    let ctx = test_ctx();
    enqueue(&ctx, "b-job").await;
    enqueue(&ctx, "a-job").await;

    let Response::Jobs { jobs } = send(&ctx, query(Query::ListJobs { status: None })).await else {
        panic!("expected Jobs");
    };
    let ids: Vec<_> = jobs.iter().map(|j| j.id.as_str()).collect();
    assert_eq!(ids, vec!["b-job", "a-job"]);
}

#[tokio::test]
async fn list_jobs_filters_by_status() {
    let ctx = test_ctx();
    enqueue(&ctx, "job-1").await;
    enqueue(&ctx, "job-2").await;
    claim(&ctx, Default::default()).await;

    let response = send(
        &ctx,
        query(Query::ListJobs {
            status: Some("running".to_string()),
        }),
    )
    .await;
    let Response::Jobs { jobs } = response else {
        panic!("expected Jobs, got {response:?}");
    };
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, "job-1");
}

#[tokio::test]
async fn list_jobs_with_unknown_status_is_bad_request() {
    let ctx = test_ctx();
    let response = send(
        &ctx,
        query(Query::ListJobs {
            status: Some("zombie".to_string()),
        }),
    )
    .await;
    assert_eq!(response.status(), StatusClass::BadRequest);
}

#[tokio::test]
async fn get_job_hides_token_and_shows_wait_state() {
    let ctx = test_ctx();
    enqueue(&ctx, "job-1").await;
    let assignment = claim(&ctx, two_phase()).await;

    let response = send(
        &ctx,
        query(Query::GetJob {
            id: "job-1".to_string(),
        }),
    )
    .await;
    let Response::Job { job: Some(job) } = &response else {
        panic!("expected Job, got {response:?}");
    };
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.ack_wait, AckWaitStatus::Waiting);
    assert_eq!(job.agent_id.as_deref(), Some("agent-1"));
    assert!(job.run.is_none());

    let json = serde_json::to_string(&response).unwrap();
    assert!(!json.contains(&assignment.token));
}

#[tokio::test]
async fn get_unknown_job_is_none() {
    let ctx = test_ctx();
    let response = send(
        &ctx,
        query(Query::GetJob {
            id: "ghost".to_string(),
        }),
    )
    .await;
    assert_eq!(response, Response::Job { job: None });
}

#[tokio::test]
async fn list_agents_shows_polling_instances() {
    let ctx = test_ctx();
    send(&ctx, poll(two_phase())).await;

    let Response::Agents { agents } = send(&ctx, query(Query::ListAgents)).await else {
        panic!("expected Agents");
    };
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].instances, vec![HOST.to_string()]);
    assert!(agents[0].contacted_at_ms.is_some());
}

#[tokio::test]
async fn list_runs_after_ack() {
    let ctx = test_ctx();
    enqueue(&ctx, "job-1").await;
    let assignment = claim(&ctx, two_phase()).await;

    let Response::Runs { runs } = send(&ctx, query(Query::ListRuns)).await else {
        panic!("expected Runs");
    };
    assert!(runs.is_empty());

    send(&ctx, signal(&assignment, "running")).await;
    let Response::Runs { runs } = send(&ctx, query(Query::ListRuns)).await else {
        panic!("expected Runs");
    };
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].job_id, assignment.id);
}

#[tokio::test]
async fn gate_status_does_not_change_gate() {
    let ctx = test_ctx();
    let response = send(&ctx, query(Query::GateStatus)).await;
    assert_eq!(
        response,
        Response::Gate {
            enabled: true,
            previous: None
        }
    );
}

#[tokio::test]
async fn status_counts_jobs_by_phase() {
    let ctx = test_ctx();
    for id in ["job-1", "job-2", "job-3"] {
        enqueue(&ctx, id).await;
    }
    claim(&ctx, two_phase()).await;
    claim(&ctx, Default::default()).await;

    let Response::Status { status } = send(&ctx, Request::Status).await else {
        panic!("expected Status");
    };
    assert_eq!(status.jobs_waiting, 1);
    assert_eq!(status.jobs_running, 1);
    assert_eq!(status.jobs_queued, 1);
    assert_eq!(status.jobs_finished, 0);
    assert_eq!(status.agents, 1);
    assert!(status.ack_gate);
    assert_eq!(status.reap_policy, "manual");
}
