//! Two-phase handshake and direct claims, end to end.

use crate::prelude::*;

use ra_core::{AckWaitStatus, ClaimMode, FailureReason, JobStatus};
use ra_engine::{AckOutcome, JobResult, StateUpdate, StatusClass};
use ra_storage::WorkItemStore;
use similar_asserts::assert_eq;

#[tokio::test]
async fn two_phase_claim_waits_then_runs_then_finishes() {
    let world = World::new();
    world.register("agent-1", "cred-1");
    world.enqueue("job-1");

    let assignment = world.poll("cred-1", "host-a", true).await.unwrap();
    assert_eq!(assignment.mode, ClaimMode::TwoPhase);

    let job = world.job("job-1");
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.ack_wait, AckWaitStatus::Waiting);
    assert!(world.store.run_record(&assignment.id).is_none());

    // A heartbeat changes nothing about the job
    let beat = world
        .coordinator
        .update_state(&assignment.id, &assignment.token, Some("pending"), None, None)
        .await
        .unwrap();
    assert_eq!(beat, StateUpdate::Heartbeat);
    assert_eq!(world.job("job-1").status, JobStatus::Pending);

    let ack = world
        .coordinator
        .update_state(
            &assignment.id,
            &assignment.token,
            Some("running"),
            Some(&instance("host-a")),
            None,
        )
        .await
        .unwrap();
    assert_eq!(ack, StateUpdate::Acknowledged(AckOutcome::Started));

    let job = world.job("job-1");
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.ack_wait, AckWaitStatus::NotWaiting);
    assert_eq!(
        job.assigned_worker_instance_id,
        Some(instance("host-a"))
    );
    assert!(world.store.run_record(&assignment.id).is_some());

    let finished = world
        .coordinator
        .report_result(&assignment.id, &assignment.token, JobResult::success())
        .await
        .unwrap();
    assert_eq!(finished.status, JobStatus::Success);
    let run = world.store.run_record(&assignment.id).unwrap();
    assert_eq!(run.status, Some(JobStatus::Success));
    assert!(run.finished_at_ms.is_some());
}

#[tokio::test]
async fn repeated_ack_from_same_instance_is_idempotent() {
    let world = World::new();
    world.register("agent-1", "cred-1");
    world.enqueue("job-1");
    let a = world.poll("cred-1", "host-a", true).await.unwrap();

    let host = instance("host-a");
    let first = world
        .coordinator
        .acknowledge(&a.id, &a.token, Some(&host))
        .await
        .unwrap();
    let second = world
        .coordinator
        .acknowledge(&a.id, &a.token, Some(&host))
        .await
        .unwrap();

    assert_eq!(first, AckOutcome::Started);
    assert_eq!(second, AckOutcome::AlreadyRunning);
    assert_eq!(world.store.runs().len(), 1);
}

#[tokio::test]
async fn legacy_agent_gets_running_job_immediately() {
    let world = World::new();
    world.register("agent-1", "cred-1");
    world.enqueue("job-1");

    let assignment = world.poll("cred-1", "host-a", false).await.unwrap();
    assert_eq!(assignment.mode, ClaimMode::Direct);

    let job = world.job("job-1");
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.ack_wait, AckWaitStatus::NotWaiting);
    assert!(world.store.run_record(&assignment.id).is_some());
    assert!(world.liveness.is_empty());
}

#[tokio::test]
async fn disabled_gate_falls_back_to_direct_claims() {
    let world = World::new();
    world.coordinator.gate().set(false);
    world.register("agent-1", "cred-1");
    world.enqueue("job-1");

    let assignment = world.poll("cred-1", "host-a", true).await.unwrap();
    assert_eq!(assignment.mode, ClaimMode::Direct);
    assert_eq!(world.job("job-1").status, JobStatus::Running);
}

#[tokio::test]
async fn wrong_token_is_forbidden_and_changes_nothing() {
    let world = World::new();
    world.register("agent-1", "cred-1");
    world.enqueue("job-1");
    let a = world.poll("cred-1", "host-a", true).await.unwrap();

    let err = world
        .coordinator
        .acknowledge(&a.id, "not-the-token", Some(&instance("host-a")))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusClass::Forbidden);
    assert_eq!(world.job("job-1").ack_wait, AckWaitStatus::Waiting);
}

#[tokio::test]
async fn failure_report_records_reason() {
    let world = World::new();
    world.register("agent-1", "cred-1");
    world.enqueue("job-1");
    let a = world.poll("cred-1", "host-a", false).await.unwrap();

    let job = world
        .coordinator
        .update_state(&a.id, &a.token, Some("failed"), None, Some("script_failure"))
        .await
        .unwrap();
    let StateUpdate::Finished(job) = job else {
        panic!("expected a finished job, got {job:?}");
    };
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure_reason, Some(FailureReason::ScriptFailure));
}

#[tokio::test]
async fn unknown_credential_is_rejected() {
    let world = World::new();
    world.enqueue("job-1");

    let err = world
        .coordinator
        .request_work(request("nobody", "host-a", true))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusClass::Forbidden);
    assert_eq!(world.job("job-1").status, JobStatus::Pending);
}

#[tokio::test]
async fn unavailable_liveness_does_not_block_the_handshake() {
    use ra_adapters::NoOpLiveness;
    use ra_core::{Clock, FakeClock};
    use ra_engine::{AckGate, AssignmentCoordinator, CoordinatorConfig, CoordinatorDeps};
    use ra_storage::{AgentRegistry, JobStore};

    let store = JobStore::in_memory();
    let clock = FakeClock::new();
    store
        .register_agent(
            ra_core::test_support::agent_config("agent-1", "cred-1"),
            clock.epoch_ms(),
        )
        .unwrap();
    store
        .enqueue(ra_core::test_support::job_config("job-1"), clock.epoch_ms())
        .unwrap();
    let coordinator = AssignmentCoordinator::new(
        CoordinatorDeps {
            store: store.clone(),
            liveness: NoOpLiveness::new(),
            gate: AckGate::new(true),
        },
        clock,
        CoordinatorConfig::default(),
    );

    let a = coordinator
        .request_work(request("cred-1", "host-a", true))
        .await
        .unwrap()
        .unwrap();
    coordinator
        .heartbeat(&a.id, &a.token, Some(&instance("host-a")))
        .await
        .unwrap();
    let outcome = coordinator
        .acknowledge(&a.id, &a.token, Some(&instance("host-a")))
        .await
        .unwrap();

    assert_eq!(outcome, AckOutcome::Started);
    assert_eq!(store.get(&a.id).unwrap().status, JobStatus::Running);
}
