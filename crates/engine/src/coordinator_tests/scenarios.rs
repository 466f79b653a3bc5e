// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end protocol walkthroughs

use super::*;
use std::sync::Arc;

/// Two-phase claim, three heartbeats two seconds apart, then ack.
#[tokio::test]
async fn heartbeats_then_ack_starts_at_ack_time() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;
    let claimed_at = ctx.clock.epoch_ms();

    for _ in 0..3 {
        ctx.clock.advance(Duration::from_secs(2));
        ctx.coordinator
            .heartbeat(&assignment.id, &assignment.token, Some(&host()))
            .await
            .unwrap();
        let job = ctx.job("job-1");
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.is_waiting_for_ack());
        assert!(ctx.liveness.entry(&job.id).is_some());
    }

    ctx.coordinator
        .acknowledge(&assignment.id, &assignment.token, Some(&host()))
        .await
        .unwrap();

    let job = ctx.job("job-1");
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.started_at_ms, Some(claimed_at + 6_000));
    assert_eq!(job.claimed_at_ms, Some(claimed_at));
    assert!(ctx.store.run_record(&job.id).is_some());
    assert!(ctx.liveness.entry(&job.id).is_none());
}

/// An agent without the capability goes straight to running.
#[tokio::test]
async fn legacy_agent_runs_without_handshake() {
    let ctx = setup();
    ctx.enqueue("job-1");

    let assignment = ctx.claim(legacy()).await;
    let job = ctx.job("job-1");
    assert_eq!(assignment.mode, ClaimMode::Direct);
    assert_eq!(job.status, JobStatus::Running);
    assert!(ctx.store.run_record(&job.id).is_some());

    ctx.coordinator
        .report_result(&assignment.id, &assignment.token, JobResult::success())
        .await
        .unwrap();
    assert_eq!(ctx.job("job-1").status, JobStatus::Success);
}

/// Many agents polling one job at once: exactly one wins.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_polls_never_double_claim() {
    let ctx = setup();
    for n in 0..16 {
        ctx.register(&format!("racer-{n}"), &format!("racer-cred-{n}"));
    }
    ctx.enqueue("job-1");
    let coordinator = Arc::new(AssignmentCoordinator::new(
        CoordinatorDeps {
            store: ctx.store.clone(),
            liveness: ctx.liveness.clone(),
            gate: ctx.gate.clone(),
        },
        ctx.clock.clone(),
        CoordinatorConfig::default(),
    ));

    let handles: Vec<_> = (0..16)
        .map(|n| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .request_work(WorkRequest {
                        credential: format!("racer-cred-{n}"),
                        worker_instance: WorkerInstanceId::new(format!("racer-host-{n}")),
                        features: if n % 2 == 0 { two_phase() } else { legacy() },
                        job_age: None,
                    })
                    .await
            })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        if let Some(assignment) = handle.await.unwrap().unwrap() {
            winners.push(assignment);
        }
    }

    assert_eq!(winners.len(), 1, "exactly one agent claims the job");
    let job = ctx.job("job-1");
    assert!(job.assigned_agent_id.is_some());
    assert!(job.check_invariants().is_ok());
    assert_eq!(ctx.store.pending_len(), 0);
}

/// Only the bearer of the job token may acknowledge.
#[tokio::test]
async fn ack_with_mismatched_token_is_forbidden() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;

    let err = ctx
        .coordinator
        .acknowledge(&assignment.id, "tok-someone-else", Some(&host()))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::NotProcessingOnAgent));
    assert_eq!(err.status(), crate::StatusClass::Forbidden);

    let job = ctx.job("job-1");
    assert!(job.is_waiting_for_ack());
    assert!(ctx.store.run_record(&job.id).is_none());
}

/// Turning the gate off leaves in-flight handshakes completable and makes
/// new claims direct.
#[tokio::test]
async fn gate_disabled_mid_flight() {
    let ctx = setup();
    ctx.enqueue("job-1");
    ctx.enqueue("job-2");
    let first = ctx.claim(two_phase()).await;
    assert_eq!(first.mode, ClaimMode::TwoPhase);

    ctx.gate.set(false);

    ctx.clock.advance(Duration::from_secs(2));
    ctx.coordinator
        .heartbeat(&first.id, &first.token, Some(&host()))
        .await
        .unwrap();
    let outcome = ctx
        .coordinator
        .acknowledge(&first.id, &first.token, Some(&host()))
        .await
        .unwrap();
    assert_eq!(outcome, AckOutcome::Started);

    let second = ctx.claim(two_phase()).await;
    assert_eq!(second.mode, ClaimMode::Direct);
    assert_eq!(ctx.job("job-2").status, JobStatus::Running);
}

/// A result for a job still waiting for its ack is refused.
#[tokio::test]
async fn success_on_waiting_job_is_rejected() {
    let ctx = setup();
    ctx.enqueue("job-1");
    let assignment = ctx.claim(two_phase()).await;

    let err = ctx
        .coordinator
        .update_state(
            &assignment.id,
            &assignment.token,
            Some("success"),
            Some(&host()),
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.status(), crate::StatusClass::BadRequest);

    let job = ctx.job("job-1");
    assert_eq!(job.status, JobStatus::Pending);
    assert!(job.is_waiting_for_ack());
    assert_eq!(job.finished_at_ms, None);
}

/// A claimant that vanishes is released by the reaper and the job goes to
/// the next agent.
#[tokio::test]
async fn vanished_claimant_is_reaped_and_job_reassigned() {
    let ctx = setup();
    ctx.register("agent-2", "cred-2");
    ctx.enqueue("job-1");
    let stale = ctx.claim(two_phase()).await;

    ctx.clock.advance(ACK_TTL + Duration::from_secs(1));
    ctx.liveness.expire(&stale.id);
    let reaper = ctx.reaper(crate::ReapPolicy::ReleaseAfter(ACK_TTL));
    let report = reaper.sweep().await;
    assert_eq!(report.released, vec![stale.id.clone()]);

    let fresh = ctx
        .coordinator
        .request_work(WorkRequest {
            credential: "cred-2".to_string(),
            worker_instance: WorkerInstanceId::new("host-2"),
            features: two_phase(),
            job_age: None,
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fresh.id, stale.id);
    assert_ne!(fresh.token, stale.token);

    let err = ctx
        .coordinator
        .acknowledge(&stale.id, &stale.token, Some(&host()))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::NotProcessingOnAgent));
}
