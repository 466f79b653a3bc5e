// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

mod durability;
mod invariants;
mod registry;

use super::*;
use ra_core::test_support::{agent_config, job_config, TEST_EPOCH_MS};
use ra_core::{AgentFeatures, SkipReason};

const NOW: u64 = TEST_EPOCH_MS;

fn open_filter() -> AgentFilter {
    AgentFilter {
        run_untagged: true,
        ..Default::default()
    }
}

fn claim_request(agent: &str, mode: ClaimMode) -> ClaimRequest {
    ClaimRequest {
        agent_id: AgentId::new(agent),
        worker_instance: WorkerInstanceId::new(format!("{agent}-host")),
        filter: open_filter(),
        mode,
        at_ms: NOW + 500,
        max_depth: 1000,
    }
}

fn store_with_jobs(ids: &[&str]) -> JobStore {
    let store = JobStore::in_memory();
    for id in ids {
        store.enqueue(job_config(id), NOW).unwrap();
    }
    store
}

fn claimed(outcome: ClaimOutcome) -> Job {
    match outcome {
        ClaimOutcome::Claimed(job) => *job,
        other => panic!("expected a claimed job, got {other:?}"),
    }
}

#[test]
fn enqueue_rejects_duplicate_ids() {
    let store = store_with_jobs(&["a"]);
    let err = store.enqueue(job_config("a"), NOW).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateJob(id) if id == "a"));
}

#[test]
fn claim_takes_oldest_pending_job() {
    let store = store_with_jobs(&["a", "b"]);
    let job = claimed(store.claim_one(&claim_request("agent-1", ClaimMode::Direct)).unwrap());
    assert_eq!(job.id, "a");
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.claim_mode, Some(ClaimMode::Direct));
    assert_eq!(store.pending_len(), 1);
    assert!(store.run_record(&job.id).is_some());
}

#[test]
fn two_phase_claim_leaves_job_waiting() {
    let store = store_with_jobs(&["a"]);
    let job = claimed(store.claim_one(&claim_request("agent-1", ClaimMode::TwoPhase)).unwrap());
    assert_eq!(job.status, JobStatus::Pending);
    assert!(job.is_waiting_for_ack());
    assert_eq!(job.assigned_worker_instance_id, None);
    assert!(store.run_record(&job.id).is_none());
    assert_eq!(store.waiting_jobs().len(), 1);
}

#[test]
fn second_claim_never_sees_claimed_job() {
    let store = store_with_jobs(&["a"]);
    claimed(store.claim_one(&claim_request("agent-1", ClaimMode::TwoPhase)).unwrap());
    assert_eq!(
        store.claim_one(&claim_request("agent-2", ClaimMode::Direct)).unwrap(),
        ClaimOutcome::Empty
    );
    let job = store.get(&JobId::new("a")).unwrap();
    assert_eq!(job.assigned_agent_id, Some(AgentId::new("agent-1")));
}

#[test]
fn claim_on_empty_queue_is_empty() {
    let store = JobStore::in_memory();
    assert_eq!(
        store.claim_one(&claim_request("agent-1", ClaimMode::Direct)).unwrap(),
        ClaimOutcome::Empty
    );
}

#[test]
fn claim_skips_ineligible_and_leaves_them_queued() {
    let store = JobStore::in_memory();
    store
        .enqueue(JobConfig::builder("gpu", "t1").tag("gpu").build(), NOW)
        .unwrap();
    store.enqueue(job_config("plain"), NOW).unwrap();

    let job = claimed(store.claim_one(&claim_request("agent-1", ClaimMode::Direct)).unwrap());
    assert_eq!(job.id, "plain");
    assert!(store.get(&JobId::new("gpu")).unwrap().is_claimable());
    assert_eq!(
        open_filter().evaluate(&store.get(&JobId::new("gpu")).unwrap(), NOW),
        Eligibility::Skip(SkipReason::TagMismatch)
    );
}

#[test]
fn claim_drops_jobs_requiring_unsupported_features() {
    let store = JobStore::in_memory();
    store
        .enqueue(JobConfig::builder("needs", "t1").requires("services").build(), NOW)
        .unwrap();
    store.enqueue(job_config("plain"), NOW).unwrap();

    let job = claimed(store.claim_one(&claim_request("agent-1", ClaimMode::Direct)).unwrap());
    assert_eq!(job.id, "plain");

    let dropped = store.get(&JobId::new("needs")).unwrap();
    assert_eq!(dropped.status, JobStatus::Failed);
    assert_eq!(dropped.failure_reason, Some(FailureReason::RunnerUnsupported));
    assert_eq!(dropped.assigned_agent_id, None);
}

#[test]
fn claim_with_supported_feature_is_accepted() {
    let store = JobStore::in_memory();
    store
        .enqueue(JobConfig::builder("needs", "t1").requires("services").build(), NOW)
        .unwrap();
    let mut request = claim_request("agent-1", ClaimMode::Direct);
    request.filter.features = AgentFeatures::new().with("services", true);
    claimed(store.claim_one(&request).unwrap());
}

#[test]
fn claim_reports_depth_exceeded_after_too_many_skips() {
    let store = JobStore::in_memory();
    for i in 0..3 {
        store
            .enqueue(JobConfig::builder(format!("gpu-{i}"), "t").tag("gpu").build(), NOW)
            .unwrap();
    }
    store.enqueue(job_config("plain"), NOW).unwrap();

    let mut request = claim_request("agent-1", ClaimMode::Direct);
    request.max_depth = 2;
    assert_eq!(
        store.claim_one(&request).unwrap(),
        ClaimOutcome::QueueDepthExceeded
    );

    request.max_depth = 3;
    assert_eq!(claimed(store.claim_one(&request).unwrap()).id, "plain");
}

#[test]
fn acknowledge_transition_requires_waiting_state() {
    let store = store_with_jobs(&["a"]);
    let job = claimed(store.claim_one(&claim_request("agent-1", ClaimMode::TwoPhase)).unwrap());

    let running = store
        .transition(
            &job.id,
            &Expected::waiting(AgentId::new("agent-1")),
            Transition::Acknowledge {
                worker_instance: WorkerInstanceId::new("other-host"),
            },
            NOW + 6_500,
        )
        .unwrap();
    assert_eq!(running.status, JobStatus::Running);
    assert_eq!(running.started_at_ms, Some(NOW + 6_500));
    assert_eq!(store.run_record(&job.id).unwrap().worker_instance_id, "other-host");

    // Second acknowledge fails the CAS and reports what it found
    let err = store
        .transition(
            &job.id,
            &Expected::waiting(AgentId::new("agent-1")),
            Transition::Acknowledge {
                worker_instance: WorkerInstanceId::new("other-host"),
            },
            NOW + 7_000,
        )
        .unwrap_err();
    match err {
        TransitionError::Conflict { actual } => assert_eq!(actual.status, JobStatus::Running),
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn transition_with_rotated_token_conflicts() {
    let store = store_with_jobs(&["a"]);
    let job = claimed(store.claim_one(&claim_request("agent-1", ClaimMode::TwoPhase)).unwrap());
    let stale = Expected::waiting(AgentId::new("agent-1")).with_token(job.token.clone());

    store
        .transition(
            &job.id,
            &Expected::current(&job),
            Transition::Release {
                token: "tok-new".to_string(),
                reason: "test".to_string(),
            },
            NOW,
        )
        .unwrap();
    claimed(store.claim_one(&claim_request("agent-1", ClaimMode::TwoPhase)).unwrap());

    let err = store
        .transition(
            &job.id,
            &stale,
            Transition::Acknowledge {
                worker_instance: WorkerInstanceId::new("h"),
            },
            NOW,
        )
        .unwrap_err();
    assert!(matches!(err, TransitionError::Conflict { .. }));
}

#[test]
fn release_returns_job_to_front_of_queue() {
    let store = store_with_jobs(&["a", "b"]);
    let job = claimed(store.claim_one(&claim_request("agent-1", ClaimMode::TwoPhase)).unwrap());
    assert_eq!(job.id, "a");

    let released = store
        .transition(
            &job.id,
            &Expected::waiting(AgentId::new("agent-1")),
            Transition::Release {
                token: "tok-rotated".to_string(),
                reason: "liveness lost".to_string(),
            },
            NOW + 1,
        )
        .unwrap();
    assert!(released.is_claimable());
    assert_eq!(released.token, "tok-rotated");

    let next = claimed(store.claim_one(&claim_request("agent-2", ClaimMode::Direct)).unwrap());
    assert_eq!(next.id, "a");
    assert_eq!(next.assigned_agent_id, Some(AgentId::new("agent-2")));
}

#[test]
fn finish_requires_running() {
    let store = store_with_jobs(&["a"]);
    let job = claimed(store.claim_one(&claim_request("agent-1", ClaimMode::TwoPhase)).unwrap());

    let finish = Transition::Finish {
        status: JobStatus::Success,
        failure_reason: None,
    };
    let err = store
        .transition(&job.id, &Expected::current(&job), finish.clone(), NOW)
        .unwrap_err();
    assert!(matches!(err, TransitionError::Conflict { .. }));

    let running = store
        .transition(
            &job.id,
            &Expected::current(&job),
            Transition::Acknowledge {
                worker_instance: WorkerInstanceId::new("h"),
            },
            NOW + 1_000,
        )
        .unwrap();
    let done = store
        .transition(&job.id, &Expected::current(&running), finish, NOW + 4_000)
        .unwrap();
    assert_eq!(done.status, JobStatus::Success);
    assert_eq!(done.duration_ms(), Some(3_000));
    assert!(!store.run_record(&job.id).unwrap().is_open());
}

#[test]
fn cancel_applies_to_queued_and_waiting_jobs() {
    let store = store_with_jobs(&["a", "b"]);
    let queued = store.get(&JobId::new("b")).unwrap();
    let canceled = store
        .transition(&queued.id, &Expected::queued(), Transition::Cancel, NOW)
        .unwrap();
    assert_eq!(canceled.status, JobStatus::Canceled);
    assert_eq!(canceled.failure_reason, Some(FailureReason::Canceled));

    let waiting = claimed(store.claim_one(&claim_request("agent-1", ClaimMode::TwoPhase)).unwrap());
    let canceled = store
        .transition(&waiting.id, &Expected::current(&waiting), Transition::Cancel, NOW)
        .unwrap();
    assert_eq!(canceled.ack_wait, AckWaitStatus::NotWaiting);

    let err = store
        .transition(&canceled.id, &Expected::current(&canceled), Transition::Cancel, NOW)
        .unwrap_err();
    assert!(matches!(err, TransitionError::Conflict { .. }));
    assert_eq!(store.pending_len(), 0);
}

#[test]
fn transition_on_unknown_job_is_not_found() {
    let store = JobStore::in_memory();
    let err = store
        .transition(&JobId::new("ghost"), &Expected::queued(), Transition::Cancel, NOW)
        .unwrap_err();
    assert!(matches!(err, TransitionError::NotFound(id) if id == "ghost"));
}

#[test]
fn concurrent_claims_are_exclusive() {
    let store = store_with_jobs(&["a", "b", "c", "d", "e"]);
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let store = store.clone();
            std::thread::spawn(move || {
                let mut won = Vec::new();
                loop {
                    match store
                        .claim_one(&claim_request(&format!("agent-{i}"), ClaimMode::TwoPhase))
                        .unwrap()
                    {
                        ClaimOutcome::Claimed(job) => won.push(job.id.clone()),
                        _ => break,
                    }
                }
                won
            })
        })
        .collect();

    let mut all: Vec<JobId> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    all.sort();
    let before = all.len();
    all.dedup();
    assert_eq!(before, 5);
    assert_eq!(all.len(), 5);
}

fn registered(store: &JobStore, id: &str, credential: &str) -> AgentRecord {
    store.register_agent(agent_config(id, credential), NOW).unwrap()
}

fn job_in(status: JobStatus, ack_wait: AckWaitStatus, agent: Option<&str>) -> Job {
    let mut job = Job::new(job_config("a"), 0, NOW);
    job.status = status;
    job.ack_wait = ack_wait;
    job.assigned_agent_id = agent.map(AgentId::new);
    job
}

#[yare::parameterized(
    waiting_for_caller = { JobStatus::Pending, AckWaitStatus::Waiting, Some("agent-1"), "tok-a", true },
    other_agent        = { JobStatus::Pending, AckWaitStatus::Waiting, Some("agent-2"), "tok-a", false },
    rotated_token      = { JobStatus::Pending, AckWaitStatus::Waiting, Some("agent-1"), "tok-new", false },
    already_running    = { JobStatus::Running, AckWaitStatus::NotWaiting, Some("agent-1"), "tok-a", false },
    released           = { JobStatus::Pending, AckWaitStatus::NotWaiting, None, "tok-a", false },
)]
fn expected_waiting_with_token(
    status: JobStatus,
    ack_wait: AckWaitStatus,
    agent: Option<&str>,
    token: &str,
    matches: bool,
) {
    let mut job = job_in(status, ack_wait, agent);
    job.token = token.to_string();
    let expected = Expected::waiting(AgentId::new("agent-1")).with_token("tok-a");
    assert_eq!(expected.matches(&job), matches);
}

#[yare::parameterized(
    ack_from_waiting     = { Transition::Acknowledge { worker_instance: WorkerInstanceId::new("h") }, JobStatus::Pending, AckWaitStatus::Waiting, true },
    ack_from_running     = { Transition::Acknowledge { worker_instance: WorkerInstanceId::new("h") }, JobStatus::Running, AckWaitStatus::NotWaiting, false },
    release_from_queued  = { Transition::Release { token: "t".to_string(), reason: "r".to_string() }, JobStatus::Pending, AckWaitStatus::NotWaiting, false },
    finish_from_running  = { Transition::Finish { status: JobStatus::Success, failure_reason: None }, JobStatus::Running, AckWaitStatus::NotWaiting, true },
    finish_from_waiting  = { Transition::Finish { status: JobStatus::Success, failure_reason: None }, JobStatus::Pending, AckWaitStatus::Waiting, false },
    finish_to_running    = { Transition::Finish { status: JobStatus::Running, failure_reason: None }, JobStatus::Running, AckWaitStatus::NotWaiting, false },
    cancel_from_waiting  = { Transition::Cancel, JobStatus::Pending, AckWaitStatus::Waiting, true },
    cancel_after_finish  = { Transition::Cancel, JobStatus::Success, AckWaitStatus::NotWaiting, false },
)]
fn transition_allowed_from(
    transition: Transition,
    status: JobStatus,
    ack_wait: AckWaitStatus,
    allowed: bool,
) {
    let job = job_in(status, ack_wait, Some("agent-1"));
    assert_eq!(transition.allowed_from(&job), allowed);
}

#[test]
fn claim_resumes_scan_after_dropping_unsupported_jobs() {
    let store = JobStore::in_memory();
    for id in ["x", "y"] {
        store
            .enqueue(JobConfig::builder(id, format!("t-{id}")).requires("services").build(), NOW)
            .unwrap();
    }
    store.enqueue(job_config("plain"), NOW).unwrap();

    let job = claimed(store.claim_one(&claim_request("agent-1", ClaimMode::Direct)).unwrap());
    assert_eq!(job.id, "plain");
    for id in ["x", "y"] {
        assert_eq!(store.get(&JobId::new(id)).unwrap().status, JobStatus::Failed);
    }
    assert_eq!(store.pending_len(), 0);
}
