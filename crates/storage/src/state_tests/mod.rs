// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

mod agents;
mod idempotency;

use super::*;
use ra_core::test_support::*;
use ra_core::{FailureReason, WorkerInstanceId};

fn state_with_jobs(ids: &[&str]) -> MaterializedState {
    let mut state = MaterializedState::default();
    for (seq, id) in ids.iter().enumerate() {
        state.apply_event(&job_enqueued_event(id, seq as u64));
    }
    state
}

fn pending(state: &MaterializedState) -> Vec<&str> {
    state.pending_ids().map(|id| id.as_str()).collect()
}

#[test]
fn enqueue_adds_to_pending_in_order() {
    let state = state_with_jobs(&["a", "b", "c"]);
    assert_eq!(pending(&state), vec!["a", "b", "c"]);
    assert_eq!(state.next_enqueue_seq(), 3);
    assert_eq!(state.jobs["a"].status, JobStatus::Pending);
}

#[test]
fn direct_claim_starts_job_and_opens_run() {
    let mut state = state_with_jobs(&["a", "b"]);
    state.apply_event(&job_claimed_event("a", "agent-1", "host-a", ClaimMode::Direct));

    let job = &state.jobs["a"];
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.ack_wait, AckWaitStatus::NotWaiting);
    assert_eq!(job.started_at_ms, Some(TEST_EPOCH_MS + 1_000));
    assert_eq!(
        job.assigned_worker_instance_id,
        Some(WorkerInstanceId::new("host-a"))
    );
    assert!(job.check_invariants().is_ok());
    assert_eq!(pending(&state), vec!["b"]);

    let run = &state.runs["a"];
    assert!(run.is_open());
    assert_eq!(run.agent_id, "agent-1");
}

#[test]
fn two_phase_claim_waits_without_run() {
    let mut state = state_with_jobs(&["a"]);
    state.apply_event(&job_claimed_event("a", "agent-1", "host-a", ClaimMode::TwoPhase));

    let job = &state.jobs["a"];
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.ack_wait, AckWaitStatus::Waiting);
    assert_eq!(job.assigned_worker_instance_id, None);
    assert!(job.check_invariants().is_ok());
    assert!(state.runs.is_empty());
    assert_eq!(state.pending_len(), 0);
}

#[test]
fn acknowledge_records_acknowledging_instance() {
    let mut state = state_with_jobs(&["a"]);
    state.apply_event(&job_claimed_event("a", "agent-1", "host-a", ClaimMode::TwoPhase));
    state.apply_event(&job_acknowledged_event("a", "host-b"));

    let job = &state.jobs["a"];
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.ack_wait, AckWaitStatus::NotWaiting);
    assert_eq!(
        job.assigned_worker_instance_id,
        Some(WorkerInstanceId::new("host-b"))
    );
    assert_eq!(state.runs["a"].worker_instance_id, "host-b");
    assert_eq!(state.runs["a"].started_at_ms, TEST_EPOCH_MS + 2_000);
}

#[test]
fn release_requeues_at_original_position_with_new_token() {
    let mut state = state_with_jobs(&["a", "b"]);
    state.apply_event(&job_claimed_event("a", "agent-1", "host-a", ClaimMode::TwoPhase));
    assert_eq!(pending(&state), vec!["b"]);

    state.apply_event(&job_released_event("a", "tok-rotated"));

    let job = &state.jobs["a"];
    assert!(job.is_claimable());
    assert_eq!(job.token, "tok-rotated");
    assert_eq!(job.claim_mode, None);
    assert_eq!(pending(&state), vec!["a", "b"]);
}

#[test]
fn release_ignores_running_job() {
    let mut state = state_with_jobs(&["a"]);
    state.apply_event(&job_claimed_event("a", "agent-1", "host-a", ClaimMode::Direct));
    state.apply_event(&job_released_event("a", "tok-rotated"));

    assert_eq!(state.jobs["a"].status, JobStatus::Running);
    assert_eq!(state.jobs["a"].token, "tok-a");
    assert_eq!(state.pending_len(), 0);
}

#[test]
fn finish_closes_run() {
    let mut state = state_with_jobs(&["a"]);
    state.apply_event(&job_claimed_event("a", "agent-1", "host-a", ClaimMode::Direct));
    state.apply_event(&job_finished_event("a", JobStatus::Success, None));

    let job = &state.jobs["a"];
    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.duration_ms(), Some(3_000));
    assert!(job.check_invariants().is_ok());
    assert_eq!(state.runs["a"].status, Some(JobStatus::Success));
}

#[test]
fn cancel_of_pending_job_removes_it_from_queue() {
    let mut state = state_with_jobs(&["a", "b"]);
    state.apply_event(&job_finished_event(
        "a",
        JobStatus::Canceled,
        Some(FailureReason::Canceled),
    ));
    assert_eq!(pending(&state), vec!["b"]);
    assert!(state.runs.is_empty());
}

#[test]
fn cancel_of_waiting_job_clears_ack_wait() {
    let mut state = state_with_jobs(&["a"]);
    state.apply_event(&job_claimed_event("a", "agent-1", "host-a", ClaimMode::TwoPhase));
    state.apply_event(&job_finished_event("a", JobStatus::Canceled, None));

    let job = &state.jobs["a"];
    assert_eq!(job.status, JobStatus::Canceled);
    assert_eq!(job.ack_wait, AckWaitStatus::NotWaiting);
    assert!(job.check_invariants().is_ok());
}

#[test]
fn finished_event_with_non_terminal_status_is_ignored() {
    let mut state = state_with_jobs(&["a"]);
    state.apply_event(&job_finished_event("a", JobStatus::Running, None));
    assert_eq!(state.jobs["a"].status, JobStatus::Pending);
}

#[test]
fn dropped_job_fails_without_assignment() {
    let mut state = state_with_jobs(&["a", "b"]);
    state.apply_event(&Event::JobDropped {
        id: JobId::new("a"),
        reason: FailureReason::RunnerUnsupported,
        at_ms: 7,
    });
    let job = &state.jobs["a"];
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure_reason, Some(FailureReason::RunnerUnsupported));
    assert_eq!(job.assigned_agent_id, None);
    assert_eq!(pending(&state), vec!["b"]);
}

#[test]
fn events_for_unknown_jobs_are_ignored() {
    let mut state = MaterializedState::default();
    state.apply_event(&job_claimed_event("ghost", "agent-1", "h", ClaimMode::Direct));
    state.apply_event(&job_acknowledged_event("ghost", "h"));
    state.apply_event(&job_finished_event("ghost", JobStatus::Success, None));
    state.apply_event(&Event::Custom);
    assert!(state.jobs.is_empty());
    assert!(state.runs.is_empty());
}

#[test]
fn rebuild_indexes_restores_pending_after_serde() {
    let mut state = state_with_jobs(&["a", "b", "c"]);
    state.apply_event(&job_claimed_event("b", "agent-1", "h", ClaimMode::TwoPhase));

    let json = serde_json::to_string(&state).unwrap();
    let mut restored: MaterializedState = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.pending_len(), 0);

    restored.rebuild_indexes();
    assert_eq!(pending(&restored), vec!["a", "c"]);
    assert_eq!(restored.next_enqueue_seq(), 3);
}
