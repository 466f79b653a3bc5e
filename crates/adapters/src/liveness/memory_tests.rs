// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ra_core::FakeClock;

const TTL: Duration = Duration::from_secs(10);

fn setup() -> (FakeClock, MemoryLiveness<FakeClock>, JobId, WorkerInstanceId) {
    let clock = FakeClock::new();
    let liveness = MemoryLiveness::new(clock.clone());
    (
        clock,
        liveness,
        JobId::new("job-1"),
        WorkerInstanceId::new("host-a"),
    )
}

#[tokio::test]
async fn put_creates_live_entry() {
    let (_clock, liveness, job, host) = setup();
    liveness.put(&job, &host, TTL).await.unwrap();
    assert!(liveness.exists(&job).await.unwrap());
    assert_eq!(liveness.worker_instance(&job).await.unwrap(), Some(host));
    assert_eq!(liveness.len(), 1);
}

#[tokio::test]
async fn entry_expires_after_ttl() {
    let (clock, liveness, job, host) = setup();
    liveness.put(&job, &host, TTL).await.unwrap();

    clock.advance(Duration::from_secs(9));
    assert!(liveness.exists(&job).await.unwrap());

    clock.advance(Duration::from_secs(1));
    assert!(!liveness.exists(&job).await.unwrap());
    assert_eq!(liveness.worker_instance(&job).await.unwrap(), None);
}

#[tokio::test]
async fn refresh_extends_deadline() {
    let (clock, liveness, job, host) = setup();
    liveness.put(&job, &host, TTL).await.unwrap();

    for _ in 0..3 {
        clock.advance(Duration::from_secs(8));
        assert_eq!(
            liveness.refresh(&job, TTL).await.unwrap(),
            Refresh::Refreshed
        );
    }
    assert!(liveness.exists(&job).await.unwrap());
}

#[tokio::test]
async fn refresh_does_not_resurrect_expired_entry() {
    let (clock, liveness, job, host) = setup();
    liveness.put(&job, &host, TTL).await.unwrap();
    clock.advance(TTL);

    assert_eq!(liveness.refresh(&job, TTL).await.unwrap(), Refresh::Missing);
    assert!(!liveness.exists(&job).await.unwrap());
}

#[tokio::test]
async fn refresh_of_unknown_job_is_missing() {
    let (_clock, liveness, job, _host) = setup();
    assert_eq!(liveness.refresh(&job, TTL).await.unwrap(), Refresh::Missing);
}

#[tokio::test]
async fn put_overwrites_instance() {
    let (_clock, liveness, job, host) = setup();
    liveness.put(&job, &host, TTL).await.unwrap();
    let other = WorkerInstanceId::new("host-b");
    liveness.put(&job, &other, TTL).await.unwrap();
    assert_eq!(liveness.worker_instance(&job).await.unwrap(), Some(other));
}

#[tokio::test]
async fn delete_removes_entry() {
    let (_clock, liveness, job, host) = setup();
    liveness.put(&job, &host, TTL).await.unwrap();
    liveness.delete(&job).await.unwrap();
    assert!(!liveness.exists(&job).await.unwrap());
    // Deleting again is fine
    liveness.delete(&job).await.unwrap();
}

#[tokio::test]
async fn purge_expired_counts_removed_entries() {
    let (clock, liveness, _job, host) = setup();
    liveness
        .put(&JobId::new("short"), &host, Duration::from_secs(1))
        .await
        .unwrap();
    liveness.put(&JobId::new("long"), &host, TTL).await.unwrap();

    clock.advance(Duration::from_secs(2));
    assert_eq!(liveness.purge_expired(), 1);
    assert_eq!(liveness.len(), 1);
    assert!(!liveness.is_empty());
}

#[tokio::test]
async fn clones_share_entries() {
    let (_clock, liveness, job, host) = setup();
    let other = liveness.clone();
    liveness.put(&job, &host, TTL).await.unwrap();
    assert!(other.exists(&job).await.unwrap());
}
