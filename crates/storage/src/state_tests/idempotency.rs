// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn enqueue_twice_keeps_first() {
    let mut state = MaterializedState::default();
    state.apply_event(&job_enqueued_event("a", 0));
    state.apply_event(&job_enqueued_event("a", 5));
    assert_eq!(state.jobs["a"].enqueue_seq, 0);
    assert_eq!(state.pending_len(), 1);
}

#[test]
fn claim_twice_keeps_first_claimant() {
    let mut state = state_with_jobs(&["a"]);
    state.apply_event(&job_claimed_event("a", "agent-1", "h1", ClaimMode::TwoPhase));
    state.apply_event(&job_claimed_event("a", "agent-2", "h2", ClaimMode::Direct));

    let job = &state.jobs["a"];
    assert_eq!(job.assigned_agent_id, Some(AgentId::new("agent-1")));
    assert_eq!(job.claim_mode, Some(ClaimMode::TwoPhase));
    assert_eq!(job.status, JobStatus::Pending);
}

#[test]
fn acknowledge_twice_keeps_first_start() {
    let mut state = state_with_jobs(&["a"]);
    state.apply_event(&job_claimed_event("a", "agent-1", "h1", ClaimMode::TwoPhase));
    state.apply_event(&job_acknowledged_event("a", "h1"));
    let started = state.jobs["a"].started_at_ms;

    state.apply_event(&Event::JobAcknowledged {
        id: JobId::new("a"),
        worker_instance_id: WorkerInstanceId::new("h9"),
        at_ms: 99_999_999,
    });
    assert_eq!(state.jobs["a"].started_at_ms, started);
    assert_eq!(state.runs["a"].worker_instance_id, "h1");
}

#[test]
fn finish_twice_keeps_first_outcome() {
    let mut state = state_with_jobs(&["a"]);
    state.apply_event(&job_claimed_event("a", "agent-1", "h1", ClaimMode::Direct));
    state.apply_event(&job_finished_event("a", JobStatus::Success, None));
    state.apply_event(&job_finished_event(
        "a",
        JobStatus::Failed,
        Some(FailureReason::ScriptFailure),
    ));

    assert_eq!(state.jobs["a"].status, JobStatus::Success);
    assert_eq!(state.jobs["a"].failure_reason, None);
    assert_eq!(state.runs["a"].status, Some(JobStatus::Success));
}

#[test]
fn full_history_replayed_twice_converges() {
    let events = vec![
        job_enqueued_event("a", 0),
        job_enqueued_event("b", 1),
        job_claimed_event("a", "agent-1", "h1", ClaimMode::TwoPhase),
        job_released_event("a", "tok-2"),
        job_claimed_event("b", "agent-1", "h1", ClaimMode::Direct),
        job_finished_event("b", JobStatus::Success, None),
    ];

    let mut once = MaterializedState::default();
    for event in &events {
        once.apply_event(event);
    }
    let mut twice = once.clone();
    for event in &events {
        twice.apply_event(event);
    }

    assert_eq!(once.jobs, twice.jobs);
    assert_eq!(once.runs, twice.runs);
    let once_pending: Vec<_> = once.pending_ids().collect();
    let twice_pending: Vec<_> = twice.pending_ids().collect();
    assert_eq!(once_pending, twice_pending);
}
