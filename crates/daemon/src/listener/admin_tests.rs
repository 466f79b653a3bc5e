// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use ra_core::{AccessLevel, JobStatus};
use ra_engine::StatusClass;

use super::super::test_helpers::*;
use crate::protocol::{Request, Response};

fn register(id: &str, credential: Option<&str>) -> Request {
    Request::RegisterAgent {
        id: id.to_string(),
        name: String::new(),
        credential: credential.map(String::from),
        tags: vec!["linux".to_string()],
        run_untagged: true,
        access_level: AccessLevel::NotProtected,
    }
}

#[tokio::test]
async fn enqueue_generates_id_when_absent() {
    let ctx = test_ctx();
    let response = send(
        &ctx,
        Request::EnqueueJob {
            id: None,
            name: "build".to_string(),
            tags: vec![],
            protected: false,
            required_features: vec![],
        },
    )
    .await;

    assert_eq!(response.status(), StatusClass::Created);
    let Response::JobEnqueued { job } = response else {
        panic!("expected JobEnqueued, got {response:?}");
    };
    assert!(!job.id.is_empty());
    assert_eq!(job.status, JobStatus::Pending);
}

#[tokio::test]
async fn enqueue_duplicate_id_is_conflict() {
    let ctx = test_ctx();
    enqueue(&ctx, "job-1").await;

    let response = send(
        &ctx,
        Request::EnqueueJob {
            id: Some("job-1".to_string()),
            name: String::new(),
            tags: vec![],
            protected: false,
            required_features: vec![],
        },
    )
    .await;
    assert_eq!(response.status(), StatusClass::Conflict);
}

#[tokio::test]
async fn register_returns_generated_credential_that_authenticates() {
    let ctx = test_ctx();
    let response = send(&ctx, register("agent-2", None)).await;

    let Response::AgentRegistered { agent, credential } = response else {
        panic!("expected AgentRegistered, got {response:?}");
    };
    assert_eq!(agent.id, "agent-2");
    assert!(agent.active);

    enqueue(&ctx, "job-1").await;
    let poll = send(
        &ctx,
        Request::RequestWork {
            credential,
            worker_instance: "host-b".to_string(),
            features: Default::default(),
            job_age_secs: None,
        },
    )
    .await;
    assert_eq!(poll.status(), StatusClass::Created);
}

#[yare::parameterized(
    duplicate = { "agent-1", StatusClass::Conflict },
    blank_id  = { "  ", StatusClass::BadRequest },
)]
fn invalid_registrations(id: &str, expected: StatusClass) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let response = runtime.block_on(async {
        let ctx = test_ctx();
        send(&ctx, register(id, Some("cred-x"))).await
    });
    assert_eq!(response.status(), expected);
}

#[tokio::test]
async fn paused_agent_gets_no_work() {
    let ctx = test_ctx();
    enqueue(&ctx, "job-1").await;

    let response = send(
        &ctx,
        Request::SetAgentActive {
            agent_id: "agent-1".to_string(),
            active: false,
        },
    )
    .await;
    let Response::Agent { agent } = response else {
        panic!("expected Agent, got {response:?}");
    };
    assert!(!agent.active);

    assert_eq!(send(&ctx, poll(two_phase())).await, Response::NoContent);
}

#[tokio::test]
async fn set_active_on_unknown_agent_is_bad_request() {
    let ctx = test_ctx();
    let response = send(
        &ctx,
        Request::SetAgentActive {
            agent_id: "ghost".to_string(),
            active: true,
        },
    )
    .await;
    assert_eq!(response.status(), StatusClass::BadRequest);
}

#[tokio::test]
async fn release_returns_waiting_job_to_queue() {
    let ctx = test_ctx();
    enqueue(&ctx, "job-1").await;
    let assignment = claim(&ctx, two_phase()).await;

    let response = send(
        &ctx,
        Request::ReleaseJob {
            job_id: assignment.id.to_string(),
        },
    )
    .await;
    let Response::JobUpdated { job } = response else {
        panic!("expected JobUpdated, got {response:?}");
    };
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.agent_id, None);

    // The old token no longer works
    let stale = send(&ctx, signal(&assignment, "running")).await;
    assert_eq!(stale.status(), StatusClass::Forbidden);

    let again = claim(&ctx, two_phase()).await;
    assert_eq!(again.id, assignment.id);
    assert_ne!(again.token, assignment.token);
}

#[tokio::test]
async fn release_of_running_job_is_conflict() {
    let ctx = test_ctx();
    enqueue(&ctx, "job-1").await;
    let assignment = claim(&ctx, Default::default()).await;

    let response = send(
        &ctx,
        Request::ReleaseJob {
            job_id: assignment.id.to_string(),
        },
    )
    .await;
    assert_eq!(response.status(), StatusClass::Conflict);
}

#[tokio::test]
async fn cancel_running_job() {
    let ctx = test_ctx();
    enqueue(&ctx, "job-1").await;
    let assignment = claim(&ctx, Default::default()).await;

    let response = send(
        &ctx,
        Request::CancelJob {
            job_id: assignment.id.to_string(),
        },
    )
    .await;
    let Response::JobUpdated { job } = response else {
        panic!("expected JobUpdated, got {response:?}");
    };
    assert_eq!(job.status, JobStatus::Canceled);
    assert!(job.run.is_some_and(|run| run.status == Some(JobStatus::Canceled)));
}

#[tokio::test]
async fn cancel_unknown_job_is_bad_request() {
    let ctx = test_ctx();
    let response = send(
        &ctx,
        Request::CancelJob {
            job_id: "ghost".to_string(),
        },
    )
    .await;
    assert_eq!(response.status(), StatusClass::BadRequest);
}

#[tokio::test]
async fn gate_toggle_reports_previous_value() {
    let ctx = test_ctx();

    let response = send(&ctx, Request::SetAckGate { enabled: false }).await;
    assert_eq!(
        response,
        Response::Gate {
            enabled: false,
            previous: Some(true)
        }
    );
    assert!(!ctx.services.coordinator.gate().is_enabled());
}
