// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    missing = { None },
    empty   = { Some("") },
    blank   = { Some("   ") },
    unknown = { Some("paused") },
    created = { Some("created") },
)]
fn invalid_states_are_bad_requests(state: Option<&str>) {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = block_on(ctx.claim(two_phase()));

    let err = block_on(ctx.coordinator.update_state(
        &assignment.id,
        &assignment.token,
        state,
        Some(&host()),
        None,
    ))
    .unwrap_err();
    assert!(matches!(err, CoordinatorError::BadRequest(_)), "{err:?}");
    assert!(ctx.job("job-1").is_waiting_for_ack());
}

#[tokio::test]
async fn pending_is_a_heartbeat() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;

    let update = ctx
        .coordinator
        .update_state(&assignment.id, &assignment.token, Some("pending"), None, None)
        .await
        .unwrap();
    assert_eq!(update, StateUpdate::Heartbeat);
    assert!(ctx.job("job-1").is_waiting_for_ack());
}

#[tokio::test]
async fn running_is_an_acknowledgment() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;

    let update = ctx
        .coordinator
        .update_state(
            &assignment.id,
            &assignment.token,
            Some("running"),
            Some(&host()),
            None,
        )
        .await
        .unwrap();
    assert_eq!(update, StateUpdate::Acknowledged(AckOutcome::Started));
    assert_eq!(ctx.job("job-1").status, JobStatus::Running);
}

#[tokio::test]
async fn terminal_state_is_a_result_report() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(legacy()).await;

    let update = ctx
        .coordinator
        .update_state(
            &assignment.id,
            &assignment.token,
            Some("failed"),
            None,
            Some("script_failure"),
        )
        .await
        .unwrap();
    let StateUpdate::Finished(job) = update else {
        panic!("expected a finished job, got {update:?}");
    };
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure_reason, Some(FailureReason::ScriptFailure));
}

#[tokio::test]
async fn unknown_failure_reason_is_bad_request() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(legacy()).await;

    let err = ctx
        .coordinator
        .update_state(
            &assignment.id,
            &assignment.token,
            Some("failed"),
            None,
            Some("gremlins"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::BadRequest(_)));
    assert_eq!(ctx.job("job-1").status, JobStatus::Running);
}
