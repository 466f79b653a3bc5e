// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay

use ra_core::{
    AckWaitStatus, AgentId, AgentRecord, ClaimMode, Event, Job, JobConfig, JobId, JobStatus,
    RunRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Bound;

/// Everything the store knows, rebuilt by folding events.
///
/// `apply_event` is the only mutator and is idempotent: an event whose
/// precondition no longer holds (already applied, or superseded) is ignored,
/// so replaying a WAL over a snapshot that already contains some of its
/// entries converges to the same state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterializedState {
    pub jobs: BTreeMap<JobId, Job>,
    pub agents: BTreeMap<AgentId, AgentRecord>,
    /// One run per job that ever started
    pub runs: BTreeMap<JobId, RunRecord>,
    /// Claimable jobs keyed by enqueue sequence. Derived from `jobs`.
    #[serde(skip)]
    pending: BTreeMap<u64, JobId>,
    #[serde(default)]
    next_enqueue_seq: u64,
}

impl MaterializedState {
    /// Recompute derived indexes after deserializing a snapshot.
    pub fn rebuild_indexes(&mut self) {
        self.pending = self
            .jobs
            .values()
            .filter(|job| job.is_claimable())
            .map(|job| (job.enqueue_seq, job.id.clone()))
            .collect();
        let max_seq = self.jobs.values().map(|job| job.enqueue_seq).max();
        self.next_enqueue_seq = self.next_enqueue_seq.max(max_seq.map_or(0, |s| s + 1));
    }

    /// Sequence the next enqueued job will take in the pending index.
    pub fn next_enqueue_seq(&self) -> u64 {
        self.next_enqueue_seq
    }

    /// Claimable job ids in queue order.
    pub fn pending_ids(&self) -> impl Iterator<Item = &JobId> {
        self.pending.values()
    }

    /// Claimable jobs after enqueue sequence `after` (all of them for `None`).
    pub fn pending_after(&self, after: Option<u64>) -> impl Iterator<Item = (u64, &JobId)> {
        let lower = match after {
            Some(seq) => Bound::Excluded(seq),
            None => Bound::Unbounded,
        };
        self.pending
            .range((lower, Bound::Unbounded))
            .map(|(seq, id)| (*seq, id))
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn agent_by_credential(&self, credential: &str) -> Option<&AgentRecord> {
        self.agents
            .values()
            .find(|agent| agent.credential_matches(credential))
    }

    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::JobEnqueued {
                id,
                token,
                name,
                tags,
                protected,
                required_features,
                enqueue_seq,
                at_ms,
            } => {
                if self.jobs.contains_key(id) {
                    return;
                }
                let config = JobConfig {
                    id: id.to_string(),
                    token: token.clone(),
                    name: name.clone(),
                    tags: tags.clone(),
                    protected: *protected,
                    required_features: required_features.clone(),
                };
                let job = Job::new(config, *enqueue_seq, *at_ms);
                self.pending.insert(*enqueue_seq, id.clone());
                self.next_enqueue_seq = self.next_enqueue_seq.max(enqueue_seq + 1);
                self.jobs.insert(id.clone(), job);
            }

            Event::JobClaimed {
                id,
                agent_id,
                worker_instance_id,
                mode,
                at_ms,
            } => {
                let Some(job) = self.jobs.get_mut(id) else {
                    return;
                };
                if !job.is_claimable() {
                    return;
                }
                self.pending.remove(&job.enqueue_seq);
                job.assigned_agent_id = Some(agent_id.clone());
                job.claimed_at_ms = Some(*at_ms);
                job.claim_mode = Some(*mode);
                match mode {
                    ClaimMode::Direct => {
                        job.status = JobStatus::Running;
                        job.started_at_ms = Some(*at_ms);
                        job.assigned_worker_instance_id = Some(worker_instance_id.clone());
                        self.runs.entry(id.clone()).or_insert_with(|| {
                            RunRecord::open(
                                id.clone(),
                                agent_id.clone(),
                                worker_instance_id.clone(),
                                *at_ms,
                            )
                        });
                    }
                    ClaimMode::TwoPhase => {
                        job.ack_wait = AckWaitStatus::Waiting;
                    }
                }
            }

            Event::JobAcknowledged {
                id,
                worker_instance_id,
                at_ms,
            } => {
                let Some(job) = self.jobs.get_mut(id) else {
                    return;
                };
                if !job.is_waiting_for_ack() || job.status != JobStatus::Pending {
                    return;
                }
                let Some(agent_id) = job.assigned_agent_id.clone() else {
                    return;
                };
                job.status = JobStatus::Running;
                job.ack_wait = AckWaitStatus::NotWaiting;
                job.started_at_ms = Some(*at_ms);
                job.assigned_worker_instance_id = Some(worker_instance_id.clone());
                self.runs.entry(id.clone()).or_insert_with(|| {
                    RunRecord::open(id.clone(), agent_id, worker_instance_id.clone(), *at_ms)
                });
            }

            Event::JobReleased { id, token, .. } => {
                let Some(job) = self.jobs.get_mut(id) else {
                    return;
                };
                if !job.is_waiting_for_ack() {
                    return;
                }
                job.token = token.clone();
                job.ack_wait = AckWaitStatus::NotWaiting;
                job.assigned_agent_id = None;
                job.claim_mode = None;
                job.claimed_at_ms = None;
                self.pending.insert(job.enqueue_seq, id.clone());
            }

            Event::JobFinished {
                id,
                status,
                failure_reason,
                at_ms,
            } => {
                let Some(job) = self.jobs.get_mut(id) else {
                    return;
                };
                if job.is_terminal() || !status.is_terminal() {
                    return;
                }
                self.pending.remove(&job.enqueue_seq);
                job.status = *status;
                job.ack_wait = AckWaitStatus::NotWaiting;
                job.failure_reason = *failure_reason;
                job.finished_at_ms = Some(*at_ms);
                if let Some(run) = self.runs.get_mut(id) {
                    run.close(*status, *at_ms);
                }
            }

            Event::JobDropped { id, reason, at_ms } => {
                let Some(job) = self.jobs.get_mut(id) else {
                    return;
                };
                if !job.is_claimable() {
                    return;
                }
                self.pending.remove(&job.enqueue_seq);
                job.status = JobStatus::Failed;
                job.failure_reason = Some(*reason);
                job.finished_at_ms = Some(*at_ms);
            }

            Event::AgentRegistered {
                id,
                name,
                credential_digest,
                tags,
                run_untagged,
                access_level,
                at_ms,
            } => {
                self.agents.entry(id.clone()).or_insert_with(|| AgentRecord {
                    id: id.clone(),
                    name: name.clone(),
                    credential_digest: credential_digest.clone(),
                    tags: tags.clone(),
                    run_untagged: *run_untagged,
                    access_level: *access_level,
                    active: true,
                    registered_at_ms: *at_ms,
                    contacted_at_ms: None,
                    instances: BTreeMap::new(),
                });
            }

            Event::AgentContacted {
                id,
                worker_instance_id,
                at_ms,
            } => {
                if let Some(agent) = self.agents.get_mut(id) {
                    agent.touch(worker_instance_id.as_ref(), *at_ms);
                }
            }

            Event::AgentActivity { id, active } => {
                if let Some(agent) = self.agents.get_mut(id) {
                    agent.active = *active;
                }
            }

            Event::Custom => {}
        }
    }
}

#[cfg(test)]
#[path = "state_tests/mod.rs"]
mod tests;
