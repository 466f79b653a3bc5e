// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ra_core::JobConfig;

#[tokio::test]
async fn unknown_credential_fails_authentication() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let mut request = work_request(two_phase());
    request.credential = "wrong".to_string();

    let err = ctx.coordinator.request_work(request).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::AuthenticationFailed));
    assert_eq!(err.status(), crate::StatusClass::Forbidden);
    assert!(ctx.job("job-1").is_claimable());
}

#[tokio::test]
async fn empty_queue_returns_nothing() {
    let ctx = setup();
    let result = ctx.coordinator.request_work(work_request(two_phase())).await;
    assert!(result.unwrap().is_none());
}

#[tokio::test]
async fn two_phase_agent_enters_waiting() {
    let ctx = setup();
    ctx.enqueue("job-1");

    let assignment = ctx.claim(two_phase()).await;
    assert_eq!(assignment.id, JobId::new("job-1"));
    assert_eq!(assignment.token, "tok-job-1");
    assert_eq!(assignment.mode, ClaimMode::TwoPhase);

    let job = ctx.job("job-1");
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.ack_wait, AckWaitStatus::Waiting);
    assert_eq!(job.assigned_agent_id, Some(ctx.agent_id()));
    assert_eq!(job.assigned_worker_instance_id, None);
    assert_eq!(job.started_at_ms, None);
    assert!(ctx.store.run_record(&job.id).is_none());
    assert_eq!(
        ctx.liveness.calls(),
        vec![LivenessCall::Put {
            job: job.id.clone(),
            worker_instance: host(),
            ttl: ACK_TTL,
        }]
    );
}

#[tokio::test]
async fn legacy_agent_starts_running_directly() {
    let ctx = setup();
    ctx.enqueue("job-1");
    ctx.clock.advance(Duration::from_secs(5));

    let assignment = ctx.claim(legacy()).await;
    assert_eq!(assignment.mode, ClaimMode::Direct);

    let job = ctx.job("job-1");
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.ack_wait, AckWaitStatus::NotWaiting);
    assert_eq!(job.started_at_ms, Some(ctx.clock.epoch_ms()));
    assert_eq!(job.assigned_worker_instance_id, Some(host()));
    assert_eq!(job.queued_duration_ms(), Some(5_000));

    let run = ctx.store.run_record(&job.id).unwrap();
    assert_eq!(run.worker_instance_id, host());
    assert!(run.is_open());
    assert!(ctx.liveness.calls().is_empty());
}

#[yare::parameterized(
    capable_gate_on   = { true,  true,  ClaimMode::TwoPhase },
    capable_gate_off  = { true,  false, ClaimMode::Direct },
    legacy_gate_on    = { false, true,  ClaimMode::Direct },
    legacy_gate_off   = { false, false, ClaimMode::Direct },
)]
fn claim_mode_depends_on_capability_and_gate(capable: bool, gate: bool, expected: ClaimMode) {
    let ctx = setup_with(gate, CoordinatorConfig::default());
    ctx.enqueue("job-1");
    let features = if capable { two_phase() } else { legacy() };

    let assignment = block_on(ctx.claim(features));
    assert_eq!(assignment.mode, expected);
    assert_eq!(ctx.job("job-1").claim_mode, Some(expected));
}

#[tokio::test]
async fn explicitly_unsupported_feature_is_legacy() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let features = AgentFeatures::new().with(ra_core::TWO_PHASE_JOB_COMMIT, false);
    assert_eq!(ctx.claim(features).await.mode, ClaimMode::Direct);
}

#[tokio::test]
async fn paused_agent_gets_nothing() {
    let ctx = setup();
    ctx.enqueue("job-1");
    ctx.store.set_agent_active(&ctx.agent_id(), false).unwrap();

    let result = ctx.coordinator.request_work(work_request(two_phase())).await;
    assert!(result.unwrap().is_none());
    assert!(ctx.job("job-1").is_claimable());
}

#[tokio::test]
async fn poll_records_agent_and_instance_contact() {
    let ctx = setup();
    ctx.clock.advance(Duration::from_secs(30));
    let now = ctx.clock.epoch_ms();

    ctx.coordinator
        .request_work(work_request(two_phase()))
        .await
        .unwrap();

    let agent = ctx.store.agent(&ctx.agent_id()).unwrap();
    assert_eq!(agent.contacted_at_ms, Some(now));
    assert!(agent.has_instance(&host()));
}

#[tokio::test]
async fn jobs_are_handed_out_in_enqueue_order() {
    let ctx = setup();
    ctx.enqueue("job-1");
    ctx.enqueue("job-2");

    assert_eq!(ctx.claim(legacy()).await.id, JobId::new("job-1"));
    assert_eq!(ctx.claim(legacy()).await.id, JobId::new("job-2"));
}

#[tokio::test]
async fn job_needing_unsupported_feature_is_dropped() {
    let ctx = setup();
    ctx.enqueue_config(
        JobConfig::builder("job-1", "tok-1")
            .requires("multi_build_steps")
            .build(),
    );
    ctx.enqueue("job-2");

    let assignment = ctx.claim(two_phase()).await;
    assert_eq!(assignment.id, JobId::new("job-2"));

    let dropped = ctx.job("job-1");
    assert_eq!(dropped.status, JobStatus::Failed);
    assert_eq!(dropped.failure_reason, Some(FailureReason::RunnerUnsupported));
}

#[tokio::test]
async fn too_many_ineligible_jobs_is_a_conflict() {
    let ctx = setup_with(
        true,
        CoordinatorConfig {
            max_queue_depth: 1,
            ..Default::default()
        },
    );
    ctx.enqueue_config(JobConfig::builder("gpu-1", "t1").tag("gpu").build());
    ctx.enqueue_config(JobConfig::builder("gpu-2", "t2").tag("gpu").build());
    ctx.enqueue("job-3");

    let err = ctx
        .coordinator
        .request_work(work_request(two_phase()))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::Conflict(_)));
    assert!(ctx.job("job-3").is_claimable());
}

#[tokio::test]
async fn job_age_filter_holds_back_young_jobs() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let mut request = work_request(legacy());
    request.job_age = Some(Duration::from_secs(60));

    let young = ctx.coordinator.request_work(request.clone()).await.unwrap();
    assert!(young.is_none());

    ctx.clock.advance(Duration::from_secs(60));
    let old = ctx.coordinator.request_work(request).await.unwrap();
    assert_eq!(old.unwrap().id, JobId::new("job-1"));
}

#[tokio::test]
async fn liveness_outage_does_not_fail_the_claim() {
    let ctx = setup();
    ctx.enqueue("job-1");
    ctx.liveness.set_failing(true);

    let assignment = ctx.claim(two_phase()).await;
    assert_eq!(assignment.mode, ClaimMode::TwoPhase);
    assert!(ctx.job("job-1").is_waiting_for_ack());
}
