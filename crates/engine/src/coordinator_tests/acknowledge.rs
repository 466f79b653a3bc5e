// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ra_core::{AgentId, WorkerInstanceId};

#[tokio::test]
async fn ack_starts_the_job() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;
    ctx.clock.advance(Duration::from_secs(3));

    let outcome = ctx
        .coordinator
        .acknowledge(&assignment.id, &assignment.token, Some(&host()))
        .await
        .unwrap();
    assert_eq!(outcome, AckOutcome::Started);

    let job = ctx.job("job-1");
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.ack_wait, AckWaitStatus::NotWaiting);
    assert_eq!(job.started_at_ms, Some(ctx.clock.epoch_ms()));
    assert_eq!(job.assigned_worker_instance_id, Some(host()));
    assert!(job.check_invariants().is_ok());

    let run = ctx.store.run_record(&job.id).unwrap();
    assert_eq!(run.agent_id, ctx.agent_id());
    assert_eq!(run.started_at_ms, ctx.clock.epoch_ms());
    assert_eq!(ctx.liveness.entry(&job.id), None);
}

#[tokio::test]
async fn repeated_ack_from_same_instance_is_a_no_op() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;
    ctx.coordinator
        .acknowledge(&assignment.id, &assignment.token, Some(&host()))
        .await
        .unwrap();
    let after_first = ctx.job("job-1");
    let run = ctx.store.run_record(&assignment.id);
    ctx.liveness.clear_calls();
    ctx.clock.advance(Duration::from_secs(10));

    let outcome = ctx
        .coordinator
        .acknowledge(&assignment.id, &assignment.token, Some(&host()))
        .await
        .unwrap();

    assert_eq!(outcome, AckOutcome::AlreadyRunning);
    assert_eq!(ctx.job("job-1"), after_first);
    assert_eq!(ctx.store.run_record(&assignment.id), run);
    assert!(ctx.liveness.calls().is_empty());
}

#[tokio::test]
async fn ack_may_come_from_another_instance_of_the_same_agent() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;
    let other = WorkerInstanceId::new("host-b");
    ctx.store
        .record_contact(&ctx.agent_id(), Some(&other), ctx.clock.epoch_ms())
        .unwrap();

    ctx.coordinator
        .acknowledge(&assignment.id, &assignment.token, Some(&other))
        .await
        .unwrap();

    let job = ctx.job("job-1");
    assert_eq!(job.assigned_worker_instance_id, Some(other.clone()));
    assert_eq!(
        ctx.store.run_record(&job.id).unwrap().worker_instance_id,
        other
    );
}

#[tokio::test]
async fn ack_from_a_foreign_instance_is_bad_request() {
    let ctx = setup();
    ctx.register("agent-2", "cred-2");
    let foreign = WorkerInstanceId::new("host-z");
    ctx.store
        .record_contact(&AgentId::new("agent-2"), Some(&foreign), ctx.clock.epoch_ms())
        .unwrap();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;

    let err = ctx
        .coordinator
        .acknowledge(&assignment.id, &assignment.token, Some(&foreign))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::BadRequest(_)));
    assert!(ctx.job("job-1").is_waiting_for_ack());
}

#[tokio::test]
async fn ack_without_instance_uses_liveness_entry() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;

    ctx.coordinator
        .acknowledge(&assignment.id, &assignment.token, None)
        .await
        .unwrap();
    assert_eq!(ctx.job("job-1").assigned_worker_instance_id, Some(host()));
}

#[tokio::test]
async fn ack_without_instance_or_entry_is_bad_request() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;
    ctx.liveness.expire(&assignment.id);

    let err = ctx
        .coordinator
        .acknowledge(&assignment.id, &assignment.token, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::BadRequest(_)));
    assert_eq!(err.status(), crate::StatusClass::BadRequest);
}

#[tokio::test]
async fn late_ack_after_expiry_still_succeeds() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;
    ctx.clock.advance(ACK_TTL * 2);
    ctx.liveness.expire(&assignment.id);

    let outcome = ctx
        .coordinator
        .acknowledge(&assignment.id, &assignment.token, Some(&host()))
        .await
        .unwrap();
    assert_eq!(outcome, AckOutcome::Started);
}

#[tokio::test]
async fn ack_succeeds_when_liveness_is_down() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;
    ctx.liveness.set_failing(true);

    let outcome = ctx
        .coordinator
        .acknowledge(&assignment.id, &assignment.token, Some(&host()))
        .await
        .unwrap();
    assert_eq!(outcome, AckOutcome::Started);
}

#[tokio::test]
async fn ack_on_unclaimed_job_is_not_processing() {
    let ctx = setup();
    let job = ctx.enqueue("job-1");

    let err = ctx
        .coordinator
        .acknowledge(&job.id, &job.token, Some(&host()))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::NotProcessingOnAgent));
    assert!(ctx.job("job-1").is_claimable());
}

#[tokio::test]
async fn ack_on_finished_job_is_conflict() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(legacy()).await;
    ctx.coordinator
        .report_result(&assignment.id, &assignment.token, JobResult::success())
        .await
        .unwrap();

    let err = ctx
        .coordinator
        .acknowledge(&assignment.id, &assignment.token, Some(&host()))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::Conflict(_)));
    assert_eq!(err.status(), crate::StatusClass::Conflict);
}

#[tokio::test]
async fn ack_on_job_running_elsewhere_is_conflict() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(legacy()).await;

    let err = ctx
        .coordinator
        .acknowledge(
            &assignment.id,
            &assignment.token,
            Some(&WorkerInstanceId::new("host-b")),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::Conflict(_)));
}

#[tokio::test]
async fn ack_with_rotated_token_is_not_processing() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;
    ctx.reaper(crate::ReapPolicy::Manual)
        .release_job(&assignment.id)
        .await
        .unwrap();

    let err = ctx
        .coordinator
        .acknowledge(&assignment.id, &assignment.token, Some(&host()))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::NotProcessingOnAgent));
    assert!(ctx.job("job-1").is_claimable());
}
