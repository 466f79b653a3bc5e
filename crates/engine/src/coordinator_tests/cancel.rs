// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn cancel_waiting_job_clears_liveness() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;

    let job = ctx.coordinator.cancel_job(&assignment.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Canceled);
    assert_eq!(job.ack_wait, AckWaitStatus::NotWaiting);
    assert_eq!(ctx.liveness.entry(&assignment.id), None);
    assert!(job.check_invariants().is_ok());
}

#[tokio::test]
async fn cancel_queued_job_removes_it_from_the_queue() {
    let ctx = setup();
    let job = ctx.enqueue("job-1");

    ctx.coordinator.cancel_job(&job.id).await.unwrap();
    assert_eq!(ctx.store.pending_len(), 0);
    let result = ctx.coordinator.request_work(work_request(legacy())).await;
    assert!(result.unwrap().is_none());
}

#[tokio::test]
async fn cancel_running_job_closes_the_run() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(legacy()).await;

    ctx.coordinator.cancel_job(&assignment.id).await.unwrap();
    let run = ctx.store.run_record(&assignment.id).unwrap();
    assert_eq!(run.status, Some(JobStatus::Canceled));
}

#[tokio::test]
async fn cancel_finished_job_is_conflict() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(legacy()).await;
    ctx.coordinator
        .report_result(&assignment.id, &assignment.token, JobResult::success())
        .await
        .unwrap();

    let err = ctx.coordinator.cancel_job(&assignment.id).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::Conflict(_)));
}

#[tokio::test]
async fn cancel_unknown_job_is_not_found() {
    let ctx = setup();
    let err = ctx
        .coordinator
        .cancel_job(&JobId::new("ghost"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::JobNotFound(_)));
}
