// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::*;
use crate::JobResult;

const GRACE: Duration = Duration::from_secs(60);

#[tokio::test]
async fn manual_policy_never_releases() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;
    ctx.liveness.expire(&assignment.id);
    ctx.clock.advance(Duration::from_secs(3600));

    let report = ctx.reaper(ReapPolicy::Manual).sweep().await;
    assert_eq!(report, ReapReport::default());
    assert!(ctx.job("job-1").is_waiting_for_ack());
}

#[tokio::test]
async fn releases_job_with_missing_entry_after_grace() {
    let ctx = setup();
    let queued = ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;
    ctx.liveness.expire(&assignment.id);
    ctx.clock.advance(GRACE);

    let report = ctx.reaper(ReapPolicy::ReleaseAfter(GRACE)).sweep().await;
    assert_eq!(report.released, vec![assignment.id.clone()]);

    let job = ctx.job("job-1");
    assert!(job.is_claimable());
    assert_eq!(job.assigned_agent_id, None);
    assert_eq!(job.claim_mode, None);
    assert_eq!(job.enqueue_seq, queued.enqueue_seq);
    assert_ne!(job.token, assignment.token);
    assert_eq!(ctx.store.pending_len(), 1);
}

#[tokio::test]
async fn keeps_job_within_grace() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;
    ctx.liveness.expire(&assignment.id);
    ctx.clock.advance(GRACE - Duration::from_secs(1));

    let report = ctx.reaper(ReapPolicy::ReleaseAfter(GRACE)).sweep().await;
    assert!(report.released.is_empty());
    assert_eq!(report.kept, 1);
}

#[tokio::test]
async fn keeps_job_with_live_entry() {
    let ctx = setup();
    ctx.enqueue("job-1");
    ctx.claim(two_phase()).await;
    ctx.clock.advance(GRACE * 10);

    let report = ctx.reaper(ReapPolicy::ReleaseAfter(GRACE)).sweep().await;
    assert!(report.released.is_empty());
    assert!(ctx.job("job-1").is_waiting_for_ack());
}

#[tokio::test]
async fn keeps_job_when_liveness_is_unreachable() {
    let ctx = setup();
    ctx.enqueue("job-1");
    ctx.claim(two_phase()).await;
    ctx.clock.advance(GRACE * 10);
    ctx.liveness.set_failing(true);

    let report = ctx.reaper(ReapPolicy::ReleaseAfter(GRACE)).sweep().await;
    assert!(report.released.is_empty());
    assert_eq!(report.kept, 1);
}

#[tokio::test]
async fn ignores_running_and_finished_jobs() {
    let ctx = setup();
    ctx.enqueue("job-1");
    ctx.enqueue("job-2");
    ctx.claim(legacy()).await;
    let done = ctx.claim(legacy()).await;
    ctx.coordinator
        .report_result(&done.id, &done.token, JobResult::success())
        .await
        .unwrap();
    ctx.clock.advance(GRACE * 10);

    let report = ctx.reaper(ReapPolicy::ReleaseAfter(GRACE)).sweep().await;
    assert_eq!(report, ReapReport::default());
}

#[tokio::test]
async fn released_job_keeps_its_queue_position() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let first = ctx.claim(two_phase()).await;
    ctx.enqueue("job-2");
    ctx.liveness.expire(&first.id);
    ctx.clock.advance(GRACE);

    ctx.reaper(ReapPolicy::ReleaseAfter(GRACE)).sweep().await;

    assert_eq!(ctx.claim(legacy()).await.id, JobId::new("job-1"));
}

#[tokio::test]
async fn operator_release_rotates_token_and_clears_entry() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;

    let job = ctx
        .reaper(ReapPolicy::Manual)
        .release_job(&assignment.id)
        .await
        .unwrap();
    assert!(job.is_claimable());
    assert_ne!(job.token, assignment.token);
    assert_eq!(ctx.liveness.entry(&assignment.id), None);
}

#[tokio::test]
async fn operator_release_of_running_job_is_conflict() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(legacy()).await;

    let err = ctx
        .reaper(ReapPolicy::Manual)
        .release_job(&assignment.id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::Conflict(_)));
}

#[tokio::test]
async fn operator_release_of_unknown_job_is_not_found() {
    let ctx = setup();
    let err = ctx
        .reaper(ReapPolicy::Manual)
        .release_job(&JobId::new("ghost"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::JobNotFound(_)));
}
