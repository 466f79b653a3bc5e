// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use ra_core::{AckWaitStatus, ClaimMode, JobStatus};
use ra_engine::{AckOutcome, StatusClass};

use super::super::test_helpers::*;
use crate::protocol::{Request, Response};

#[tokio::test]
async fn poll_with_empty_queue_is_no_content() {
    let ctx = test_ctx();
    let response = send(&ctx, poll(two_phase())).await;
    assert_eq!(response, Response::NoContent);
    assert_eq!(response.status(), StatusClass::NoContent);
}

#[tokio::test]
async fn poll_with_bad_credential_is_forbidden() {
    let ctx = test_ctx();
    enqueue(&ctx, "job-1").await;

    let response = send(
        &ctx,
        Request::RequestWork {
            credential: "wrong".to_string(),
            worker_instance: HOST.to_string(),
            features: two_phase(),
            job_age_secs: None,
        },
    )
    .await;
    assert_eq!(response.status(), StatusClass::Forbidden);
}

#[tokio::test]
async fn poll_without_worker_instance_is_bad_request() {
    let ctx = test_ctx();
    enqueue(&ctx, "job-1").await;

    let response = send(
        &ctx,
        Request::RequestWork {
            credential: CREDENTIAL.to_string(),
            worker_instance: "  ".to_string(),
            features: two_phase(),
            job_age_secs: None,
        },
    )
    .await;
    assert_eq!(response.status(), StatusClass::BadRequest);
}

#[tokio::test]
async fn two_phase_poll_then_heartbeat_then_ack() {
    let ctx = test_ctx();
    enqueue(&ctx, "job-1").await;

    let assignment = claim(&ctx, two_phase()).await;
    assert_eq!(assignment.mode, ClaimMode::TwoPhase);
    assert!(assignment.token.starts_with("ra_"));

    let heartbeat = send(&ctx, signal(&assignment, "pending")).await;
    assert_eq!(heartbeat, Response::Ok);

    let ack = send(&ctx, signal(&assignment, "running")).await;
    assert_eq!(
        ack,
        Response::Acknowledged {
            outcome: AckOutcome::Started
        }
    );

    let again = send(&ctx, signal(&assignment, "running")).await;
    assert_eq!(
        again,
        Response::Acknowledged {
            outcome: AckOutcome::AlreadyRunning
        }
    );
}

#[tokio::test]
async fn gate_off_gives_direct_claims() {
    let ctx = test_ctx_with(Default::default());
    enqueue(&ctx, "job-1").await;

    let assignment = claim(&ctx, two_phase()).await;
    assert_eq!(assignment.mode, ClaimMode::Direct);
}

#[tokio::test]
async fn report_result_on_waiting_job_is_bad_request() {
    let ctx = test_ctx();
    enqueue(&ctx, "job-1").await;
    let assignment = claim(&ctx, two_phase()).await;

    let response = send(
        &ctx,
        Request::ReportResult {
            job_id: assignment.id.to_string(),
            token: assignment.token.clone(),
            status: "success".to_string(),
            failure_reason: None,
        },
    )
    .await;
    assert_eq!(response.status(), StatusClass::BadRequest);
}

#[tokio::test]
async fn report_result_finishes_running_job() {
    let ctx = test_ctx();
    enqueue(&ctx, "job-1").await;
    let assignment = claim(&ctx, two_phase()).await;
    send(&ctx, signal(&assignment, "running")).await;

    let response = send(
        &ctx,
        Request::ReportResult {
            job_id: assignment.id.to_string(),
            token: assignment.token.clone(),
            status: "failed".to_string(),
            failure_reason: Some("script_failure".to_string()),
        },
    )
    .await;

    let Response::Finished { job } = response else {
        panic!("expected Finished, got {response:?}");
    };
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.ack_wait, AckWaitStatus::NotWaiting);
    assert!(job.finished_at_ms.is_some());
    let run = job.run.expect("run record");
    assert_eq!(run.status, Some(JobStatus::Failed));
    assert_eq!(run.worker_instance_id.as_str(), HOST);
}

#[yare::parameterized(
    unknown_status = { "exploded", None },
    unknown_reason = { "failed", Some("gremlins") },
    not_terminal   = { "running", None },
)]
fn malformed_reports_are_bad_requests(status: &str, failure_reason: Option<&str>) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async {
        let ctx = test_ctx();
        enqueue(&ctx, "job-1").await;
        let assignment = claim(&ctx, Default::default()).await;

        let response = send(
            &ctx,
            Request::ReportResult {
                job_id: assignment.id.to_string(),
                token: assignment.token.clone(),
                status: status.to_string(),
                failure_reason: failure_reason.map(String::from),
            },
        )
        .await;
        assert_eq!(response.status(), StatusClass::BadRequest, "{response:?}");
    });
}

#[tokio::test]
async fn signal_with_wrong_token_is_forbidden() {
    let ctx = test_ctx();
    enqueue(&ctx, "job-1").await;
    let mut assignment = claim(&ctx, two_phase()).await;
    assignment.token = "ra_forged".to_string();

    let response = send(&ctx, signal(&assignment, "running")).await;
    assert_eq!(response.status(), StatusClass::Forbidden);
}

#[tokio::test]
async fn signal_without_state_is_bad_request() {
    let ctx = test_ctx();
    enqueue(&ctx, "job-1").await;
    let assignment = claim(&ctx, two_phase()).await;

    let response = send(
        &ctx,
        Request::Signal {
            job_id: assignment.id.to_string(),
            token: assignment.token.clone(),
            state: None,
            worker_instance: Some(HOST.to_string()),
            failure_reason: None,
        },
    )
    .await;
    assert_eq!(response.status(), StatusClass::BadRequest);
}

#[tokio::test]
async fn blank_instance_on_ack_falls_back_to_liveness_entry() {
    let ctx = test_ctx();
    enqueue(&ctx, "job-1").await;
    let assignment = claim(&ctx, two_phase()).await;

    let response = send(
        &ctx,
        Request::Signal {
            job_id: assignment.id.to_string(),
            token: assignment.token.clone(),
            state: Some("running".to_string()),
            worker_instance: Some(String::new()),
            failure_reason: None,
        },
    )
    .await;
    assert_eq!(
        response,
        Response::Acknowledged {
            outcome: AckOutcome::Started
        }
    );
}
