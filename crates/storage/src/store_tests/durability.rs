// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

struct Paths {
    _dir: tempfile::TempDir,
    wal: std::path::PathBuf,
    snapshot: std::path::PathBuf,
}

fn paths() -> Paths {
    let dir = tempdir().unwrap();
    Paths {
        wal: dir.path().join("wal").join("events.jsonl"),
        snapshot: dir.path().join("snapshot.json"),
        _dir: dir,
    }
}

fn open(paths: &Paths) -> JobStore {
    JobStore::open(&paths.wal, &paths.snapshot).unwrap()
}

#[test]
fn flushed_state_survives_reopen() {
    let paths = paths();
    {
        let store = open(&paths);
        registered(&store, "agent-1", "c");
        store.enqueue(job_config("a"), NOW).unwrap();
        store.enqueue(job_config("b"), NOW).unwrap();
        claimed(store.claim_one(&claim_request("agent-1", ClaimMode::TwoPhase)).unwrap());
        store.flush().unwrap();
    }

    let store = open(&paths);
    let a = store.get(&JobId::new("a")).unwrap();
    assert!(a.is_waiting_for_ack());
    assert_eq!(a.claim_mode, Some(ClaimMode::TwoPhase));
    assert_eq!(store.pending_len(), 1);
    assert!(store.authenticate("c").is_some());
}

#[test]
fn returned_claim_survives_crash_without_flush() {
    let paths = paths();
    {
        let store = open(&paths);
        store.enqueue(job_config("a"), NOW).unwrap();
        let job = claimed(store.claim_one(&claim_request("agent-1", ClaimMode::Direct)).unwrap());
        assert_eq!(job.assigned_agent_id, Some(AgentId::new("agent-1")));
    }

    let store = open(&paths);
    let a = store.get(&JobId::new("a")).unwrap();
    assert_eq!(a.status, JobStatus::Running);
    assert_eq!(a.assigned_agent_id, Some(AgentId::new("agent-1")));
    assert!(matches!(
        store.claim_one(&claim_request("agent-2", ClaimMode::Direct)).unwrap(),
        ClaimOutcome::Empty
    ));
}

#[test]
fn acknowledged_transition_survives_crash_without_flush() {
    let paths = paths();
    {
        let store = open(&paths);
        store.enqueue(job_config("a"), NOW).unwrap();
        let job = claimed(store.claim_one(&claim_request("agent-1", ClaimMode::TwoPhase)).unwrap());
        store
            .transition(
                &job.id,
                &Expected::waiting(AgentId::new("agent-1")),
                Transition::Acknowledge {
                    worker_instance: WorkerInstanceId::new("agent-1-host"),
                },
                NOW,
            )
            .unwrap();
    }

    let store = open(&paths);
    assert_eq!(store.get(&JobId::new("a")).unwrap().status, JobStatus::Running);
    assert!(store.run_record(&JobId::new("a")).is_some());
}

#[test]
fn contact_timestamps_wait_for_group_commit() {
    let paths = paths();
    {
        let store = open(&paths);
        registered(&store, "agent-1", "c");
        store
            .record_contact(&AgentId::new("agent-1"), None, NOW + 10)
            .unwrap();
        assert!(store.agent(&AgentId::new("agent-1")).unwrap().contacted_at_ms.is_some());
    }

    let store = open(&paths);
    let agent = store.agent(&AgentId::new("agent-1")).unwrap();
    assert_eq!(agent.contacted_at_ms, None);
}

#[test]
fn failed_fsync_leaves_claim_unapplied() {
    let paths = paths();
    {
        let store = open(&paths);
        store.enqueue(job_config("a"), NOW).unwrap();
        store
            .inner
            .lock()
            .wal
            .as_mut()
            .unwrap()
            .make_unwritable()
            .unwrap();

        let err = store
            .claim_one(&claim_request("agent-1", ClaimMode::Direct))
            .unwrap_err();
        assert!(matches!(err, StoreError::Wal(_)));
        assert!(store.get(&JobId::new("a")).unwrap().is_claimable());
        assert_eq!(store.pending_len(), 1);
    }

    let store = open(&paths);
    assert!(store.get(&JobId::new("a")).unwrap().is_claimable());
}

#[test]
fn checkpoint_then_replay_restores_everything() {
    let paths = paths();
    {
        let store = open(&paths);
        store.enqueue(job_config("a"), NOW).unwrap();
        store.enqueue(job_config("b"), NOW).unwrap();
        let seq = store.checkpoint(&paths.snapshot).unwrap();
        assert_eq!(seq, 2);

        // After the checkpoint, new events go to the truncated WAL
        claimed(store.claim_one(&claim_request("agent-1", ClaimMode::Direct)).unwrap());
        store.flush().unwrap();
    }

    let store = open(&paths);
    assert_eq!(
        store.get(&JobId::new("a")).unwrap().status,
        JobStatus::Running
    );
    assert!(store.get(&JobId::new("b")).unwrap().is_claimable());
    assert!(store.run_record(&JobId::new("a")).is_some());

    // Enqueue order continues past the restored jobs
    let c = store.enqueue(job_config("c"), NOW).unwrap();
    assert_eq!(c.enqueue_seq, 2);
}

#[test]
fn released_job_keeps_queue_position_across_restart() {
    let paths = paths();
    {
        let store = open(&paths);
        store.enqueue(job_config("a"), NOW).unwrap();
        store.enqueue(job_config("b"), NOW).unwrap();
        let job = claimed(store.claim_one(&claim_request("agent-1", ClaimMode::TwoPhase)).unwrap());
        store
            .transition(
                &job.id,
                &Expected::current(&job),
                Transition::Release {
                    token: "tok-2".to_string(),
                    reason: "test".to_string(),
                },
                NOW,
            )
            .unwrap();
        store.checkpoint(&paths.snapshot).unwrap();
    }

    let store = open(&paths);
    let next = claimed(store.claim_one(&claim_request("agent-2", ClaimMode::Direct)).unwrap());
    assert_eq!(next.id, "a");
    assert_eq!(next.token, "tok-2");
}

#[test]
fn in_memory_checkpoint_is_a_no_op() {
    let paths = paths();
    let store = JobStore::in_memory();
    store.enqueue(job_config("a"), NOW).unwrap();
    assert_eq!(store.checkpoint(&paths.snapshot).unwrap(), 0);
    assert!(!paths.snapshot.exists());
    assert!(!store.needs_flush());
}
