// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Random operation sequences never break the job state invariants.

use super::*;
use proptest::prelude::*;
use std::collections::HashSet;

#[derive(Debug, Clone)]
enum Op {
    Enqueue,
    Claim { agent: u8, two_phase: bool },
    Acknowledge { job: u8, instance: u8 },
    Release { job: u8 },
    Finish { job: u8, success: bool },
    Cancel { job: u8 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Enqueue),
        (0u8..3, any::<bool>()).prop_map(|(agent, two_phase)| Op::Claim { agent, two_phase }),
        (0u8..6, 0u8..2).prop_map(|(job, instance)| Op::Acknowledge { job, instance }),
        (0u8..6).prop_map(|job| Op::Release { job }),
        (0u8..6, any::<bool>()).prop_map(|(job, success)| Op::Finish { job, success }),
        (0u8..6).prop_map(|job| Op::Cancel { job }),
    ]
}

fn job_id(n: u8) -> JobId {
    JobId::new(format!("job-{n}"))
}

/// Try the transition against whatever the job currently is; conflicts are expected.
fn apply(store: &JobStore, next_job: &mut u8, op: Op) {
    let attempt = |id: JobId, transition: Transition| {
        if let Some(job) = store.get(&id) {
            let _ = store.transition(&id, &Expected::current(&job), transition, NOW);
        }
    };
    match op {
        Op::Enqueue => {
            store.enqueue(job_config(job_id(*next_job).as_str()), NOW).unwrap();
            *next_job += 1;
        }
        Op::Claim { agent, two_phase } => {
            let mode = if two_phase {
                ClaimMode::TwoPhase
            } else {
                ClaimMode::Direct
            };
            store
                .claim_one(&claim_request(&format!("agent-{agent}"), mode))
                .unwrap();
        }
        Op::Acknowledge { job, instance } => attempt(
            job_id(job),
            Transition::Acknowledge {
                worker_instance: WorkerInstanceId::new(format!("host-{instance}")),
            },
        ),
        Op::Release { job } => attempt(
            job_id(job),
            Transition::Release {
                token: format!("tok-r{job}"),
                reason: "prop".to_string(),
            },
        ),
        Op::Finish { job, success } => attempt(
            job_id(job),
            Transition::Finish {
                status: if success {
                    JobStatus::Success
                } else {
                    JobStatus::Failed
                },
                failure_reason: (!success).then_some(FailureReason::ScriptFailure),
            },
        ),
        Op::Cancel { job } => attempt(job_id(job), Transition::Cancel),
    }
}

proptest! {
    #[test]
    fn invariants_hold_after_any_sequence(ops in prop::collection::vec(op(), 1..60)) {
        let store = JobStore::in_memory();
        let mut next_job = 0u8;
        for op in ops {
            apply(&store, &mut next_job, op);

            let state = store.state();
            let pending: HashSet<&JobId> = state.pending_ids().collect();
            for job in state.jobs.values() {
                prop_assert!(job.check_invariants().is_ok(), "{:?}: {:?}", job.check_invariants(), job);
                // The pending index holds exactly the claimable jobs
                prop_assert_eq!(job.is_claimable(), pending.contains(&job.id));
                // Running and finished-after-running jobs have exactly one run
                let has_run = state.runs.contains_key(&job.id);
                prop_assert_eq!(job.started_at_ms.is_some(), has_run);
            }
        }
    }
}
