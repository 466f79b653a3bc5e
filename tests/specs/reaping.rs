//! Stalled handshakes are released once the claimant goes quiet.

use crate::prelude::*;

use ra_core::{AckWaitStatus, Clock, JobStatus};
use ra_engine::StatusClass;
use similar_asserts::assert_eq;
use std::time::Duration;

#[tokio::test]
async fn heartbeating_claim_is_kept() {
    let world = World::new();
    world.register("agent-1", "cred-1");
    world.enqueue("job-1");
    let a = world.poll("cred-1", "host-a", true).await.unwrap();

    for _ in 0..4 {
        world.clock.advance(ACK_TTL / 2);
        world
            .coordinator
            .heartbeat(&a.id, &a.token, Some(&instance("host-a")))
            .await
            .unwrap();
    }
    assert!(world.clock.epoch_ms() - world.job("job-1").claimed_at_ms.unwrap() >= 60_000);

    let report = world.reaper.sweep().await;
    assert!(report.released.is_empty());
    assert_eq!(report.kept, 1);
    assert_eq!(world.job("job-1").ack_wait, AckWaitStatus::Waiting);
}

#[tokio::test]
async fn expired_entry_within_grace_is_kept() {
    let world = World::new();
    world.register("agent-1", "cred-1");
    world.enqueue("job-1");
    world.poll("cred-1", "host-a", true).await.unwrap();

    world.clock.advance(ACK_TTL + Duration::from_secs(1));
    let report = world.reaper.sweep().await;

    assert!(report.released.is_empty());
    assert_eq!(report.kept, 1);
}

#[tokio::test]
async fn silent_claim_is_released_and_reassigned() {
    let world = World::new();
    world.register("agent-1", "cred-1");
    world.register("agent-2", "cred-2");
    world.enqueue("job-1");
    let stale = world.poll("cred-1", "host-a", true).await.unwrap();

    world.clock.advance(GRACE);
    let report = world.reaper.sweep().await;
    assert_eq!(report.released, vec![stale.id.clone()]);
    world.liveness.purge_expired();
    assert!(world.liveness.is_empty());

    let job = world.job("job-1");
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.assigned_agent_id, None);

    // The vanished claimant can no longer act on the job
    let err = world
        .coordinator
        .acknowledge(&stale.id, &stale.token, Some(&instance("host-a")))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusClass::Forbidden);

    let fresh = world.poll("cred-2", "host-b", true).await.unwrap();
    assert_eq!(fresh.id, stale.id);
    assert_ne!(fresh.token, stale.token);
}

#[tokio::test]
async fn running_jobs_are_never_reaped() {
    let world = World::new();
    world.register("agent-1", "cred-1");
    world.enqueue("job-1");
    world.poll("cred-1", "host-a", false).await.unwrap();

    world.clock.advance(GRACE * 10);
    let report = world.reaper.sweep().await;

    assert_eq!(report, ra_engine::ReapReport::default());
    assert_eq!(world.job("job-1").status, JobStatus::Running);
}
