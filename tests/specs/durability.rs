//! Claims survive a daemon restart.

use crate::prelude::*;

use ra_core::{AckWaitStatus, JobStatus};
use ra_engine::AckOutcome;
use ra_storage::{AgentRegistry, WorkItemStore};
use similar_asserts::assert_eq;

#[tokio::test]
async fn waiting_claim_is_replayed_with_its_token() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ra_core::FakeClock::new();

    let assignment = {
        let world = World::on_disk(dir.path(), clock.clone());
        world.register("agent-1", "cred-1");
        world.enqueue("job-1");
        let assignment = world.poll("cred-1", "host-a", true).await.unwrap();
        world.store.flush().unwrap();
        assignment
    };

    let world = World::on_disk(dir.path(), clock);
    let job = world.job("job-1");
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.ack_wait, AckWaitStatus::Waiting);
    assert!(job.token_matches(&assignment.token));

    // The agent and its instance came back too, so the ack is accepted
    let agent = world.store.authenticate("cred-1").unwrap();
    assert_eq!(agent.id.as_str(), "agent-1");
    let outcome = world
        .coordinator
        .acknowledge(&assignment.id, &assignment.token, Some(&instance("host-a")))
        .await
        .unwrap();
    assert_eq!(outcome, AckOutcome::Started);
}

#[tokio::test]
async fn finished_jobs_and_runs_survive_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ra_core::FakeClock::new();

    {
        let world = World::on_disk(dir.path(), clock.clone());
        world.register("agent-1", "cred-1");
        world.enqueue("job-1");
        world.enqueue("job-2");
        let a = world.poll("cred-1", "host-a", false).await.unwrap();
        world
            .coordinator
            .report_result(&a.id, &a.token, ra_engine::JobResult::success())
            .await
            .unwrap();
        world.store.flush().unwrap();
        world
            .store
            .checkpoint(&dir.path().join("snapshot.json"))
            .unwrap();
        // Committed after the snapshot, replayed from the WAL
        world.poll("cred-1", "host-a", false).await.unwrap();
        world.store.flush().unwrap();
    }

    let world = World::on_disk(dir.path(), clock);
    assert_eq!(world.job("job-1").status, JobStatus::Success);
    assert_eq!(world.job("job-2").status, JobStatus::Running);
    let runs = world.store.runs();
    assert_eq!(runs.len(), 2);
}

#[tokio::test]
async fn restart_loses_liveness_so_stalled_claim_is_reaped() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ra_core::FakeClock::new();

    let assignment = {
        let world = World::on_disk(dir.path(), clock.clone());
        world.register("agent-1", "cred-1");
        world.enqueue("job-1");
        let assignment = world.poll("cred-1", "host-a", true).await.unwrap();
        world.store.flush().unwrap();
        assignment
    };

    let world = World::on_disk(dir.path(), clock.clone());
    clock.advance(GRACE);
    let report = world.reaper.sweep().await;

    assert_eq!(report.released, vec![assignment.id.clone()]);
    let job = world.job("job-1");
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.ack_wait, AckWaitStatus::NotWaiting);
    assert!(!job.token_matches(&assignment.token));
}
