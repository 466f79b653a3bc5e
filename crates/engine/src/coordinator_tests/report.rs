// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn success_finishes_running_job_and_closes_run() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(legacy()).await;
    ctx.clock.advance(Duration::from_secs(42));

    let job = ctx
        .coordinator
        .report_result(&assignment.id, &assignment.token, JobResult::success())
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.finished_at_ms, Some(ctx.clock.epoch_ms()));
    assert_eq!(job.duration_ms(), Some(42_000));
    assert_eq!(job.failure_reason, None);

    let run = ctx.store.run_record(&job.id).unwrap();
    assert!(!run.is_open());
    assert_eq!(run.status, Some(JobStatus::Success));
    assert_eq!(run.duration_ms(), Some(42_000));
}

#[yare::parameterized(
    failed_with_reason = { JobResult::failed(FailureReason::ScriptFailure), JobStatus::Failed, Some(FailureReason::ScriptFailure) },
    failed_no_reason   = { JobResult { status: JobStatus::Failed, failure_reason: None }, JobStatus::Failed, Some(FailureReason::UnknownFailure) },
    canceled           = { JobResult::canceled(), JobStatus::Canceled, Some(FailureReason::Canceled) },
    success_drops_reason = { JobResult { status: JobStatus::Success, failure_reason: Some(FailureReason::ScriptFailure) }, JobStatus::Success, None },
)]
fn terminal_results(result: JobResult, status: JobStatus, reason: Option<FailureReason>) {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = block_on(ctx.claim(legacy()));

    let job = block_on(
        ctx.coordinator
            .report_result(&assignment.id, &assignment.token, result),
    )
    .unwrap();
    assert_eq!(job.status, status);
    assert_eq!(job.failure_reason, reason);
}

#[tokio::test]
async fn result_on_waiting_job_is_bad_request() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;

    let err = ctx
        .coordinator
        .report_result(&assignment.id, &assignment.token, JobResult::success())
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::BadRequest(_)));
    assert!(ctx.job("job-1").is_waiting_for_ack());
}

#[tokio::test]
async fn result_on_unclaimed_job_is_bad_request() {
    let ctx = setup();
    let job = ctx.enqueue("job-1");

    let err = ctx
        .coordinator
        .report_result(&job.id, &job.token, JobResult::success())
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::BadRequest(_)));
}

#[tokio::test]
async fn non_terminal_result_is_bad_request() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(legacy()).await;

    let err = ctx
        .coordinator
        .report_result(
            &assignment.id,
            &assignment.token,
            JobResult {
                status: JobStatus::Running,
                failure_reason: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::BadRequest(_)));
    assert_eq!(ctx.job("job-1").status, JobStatus::Running);
}

#[tokio::test]
async fn second_result_is_not_processing() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(legacy()).await;
    ctx.coordinator
        .report_result(&assignment.id, &assignment.token, JobResult::success())
        .await
        .unwrap();

    let err = ctx
        .coordinator
        .report_result(
            &assignment.id,
            &assignment.token,
            JobResult::failed(FailureReason::ScriptFailure),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::NotProcessingOnAgent));
    assert_eq!(ctx.job("job-1").status, JobStatus::Success);
}

#[tokio::test]
async fn result_with_wrong_token_is_not_processing() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(legacy()).await;

    let err = ctx
        .coordinator
        .report_result(&assignment.id, "forged", JobResult::success())
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::NotProcessingOnAgent));
    assert_eq!(ctx.job("job-1").status, JobStatus::Running);
}
